//! Interceptors around a single handler invocation.

use std::fmt;
use std::sync::Arc;

use tracing::{error, trace};

use super::handler::Handler;
use super::request::{WebRequest, WebResponse};
use super::view::ModelAndView;
use crate::error::{ContextError, ContextResult};

/// Whether the pipeline continues after a pre-phase call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    Continue,
    /// The interceptor produced the response itself.
    Stop,
}

/// Hooks before and after a handler.
///
/// Pre-phase calls run in registration order, post and completion calls in
/// reverse. Completion only runs for interceptors whose pre-phase returned
/// [`Flow::Continue`].
pub trait HandlerInterceptor: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn pre_handle(&self, request: &mut WebRequest, response: &mut WebResponse, handler: &Handler) -> ContextResult<Flow> {
        let _ = (request, response, handler);
        Ok(Flow::Continue)
    }

    /// May change the pending model and view.
    fn post_handle(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        handler: &Handler,
        model_and_view: Option<&mut ModelAndView>,
    ) -> ContextResult<()> {
        let _ = (request, response, handler, model_and_view);
        Ok(())
    }

    /// Receives the handler error unless an exception resolver handled it.
    fn after_completion(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        handler: &Handler,
        error: Option<&ContextError>,
    ) -> ContextResult<()> {
        let _ = (request, response, handler, error);
        Ok(())
    }

    /// Runs instead of post and completion calls when the handler deferred
    /// its result.
    fn after_concurrent_handling_started(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        handler: &Handler,
    ) -> ContextResult<()> {
        let _ = (request, response, handler);
        Ok(())
    }
}

/// A handler with its interceptors.
///
/// ```
/// use ferrous_context::web::{Flow, Handler, HandlerExecutionChain, HandlerInterceptor, WebRequest, WebResponse};
/// use ferrous_context::ContextResult;
/// use std::sync::Arc;
///
/// struct Deny;
///
/// impl HandlerInterceptor for Deny {
///     fn pre_handle(&self, _: &mut WebRequest, resp: &mut WebResponse, _: &Handler) -> ContextResult<Flow> {
///         resp.set_status(http::StatusCode::FORBIDDEN);
///         Ok(Flow::Stop)
///     }
/// }
///
/// let mut chain = HandlerExecutionChain::new(Handler::new("noop", ()));
/// chain.add_interceptor(Arc::new(Deny));
///
/// let mut response = WebResponse::new();
/// let proceed = chain.apply_pre_handle(&mut WebRequest::get("/"), &mut response).unwrap();
/// assert!(!proceed);
/// assert_eq!(response.status(), http::StatusCode::FORBIDDEN);
/// ```
#[derive(Clone)]
pub struct HandlerExecutionChain {
    handler: Handler,
    interceptors: Vec<Arc<dyn HandlerInterceptor>>,
    interceptor_index: Option<usize>,
}

impl HandlerExecutionChain {
    pub fn new(handler: Handler) -> Self {
        Self {
            handler,
            interceptors: Vec::new(),
            interceptor_index: None,
        }
    }

    pub fn with_interceptors(handler: Handler, interceptors: Vec<Arc<dyn HandlerInterceptor>>) -> Self {
        Self {
            handler,
            interceptors,
            interceptor_index: None,
        }
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn interceptors(&self) -> &[Arc<dyn HandlerInterceptor>] {
        &self.interceptors
    }

    pub fn add_interceptor(&mut self, interceptor: Arc<dyn HandlerInterceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Runs pre-phase calls in order. On [`Flow::Stop`] the completion phase
    /// runs for the interceptors that already continued and `false` is
    /// returned.
    pub fn apply_pre_handle(&mut self, request: &mut WebRequest, response: &mut WebResponse) -> ContextResult<bool> {
        for index in 0..self.interceptors.len() {
            let interceptor = self.interceptors[index].clone();
            match interceptor.pre_handle(request, response, &self.handler)? {
                Flow::Continue => self.interceptor_index = Some(index),
                Flow::Stop => {
                    trace!(interceptor = interceptor.name(), handler = self.handler.name(), "pre-handle stopped request");
                    self.trigger_after_completion(request, response, None);
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Runs post-phase calls in reverse order.
    pub fn apply_post_handle(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        mut model_and_view: Option<&mut ModelAndView>,
    ) -> ContextResult<()> {
        for interceptor in self.interceptors.iter().rev() {
            interceptor.post_handle(request, response, &self.handler, model_and_view.as_deref_mut())?;
        }
        Ok(())
    }

    /// Runs completion calls in reverse order for every interceptor whose
    /// pre-phase continued. Failures are logged and do not stop the others.
    pub fn trigger_after_completion(&self, request: &mut WebRequest, response: &mut WebResponse, error: Option<&ContextError>) {
        let Some(last) = self.interceptor_index else {
            return;
        };
        for interceptor in self.interceptors[..=last].iter().rev() {
            if let Err(e) = interceptor.after_completion(request, response, &self.handler, error) {
                error!(interceptor = interceptor.name(), error = %e, "after_completion threw exception");
            }
        }
    }

    /// Runs concurrent-handling-started calls in reverse order.
    pub fn apply_after_concurrent_handling_started(&self, request: &mut WebRequest, response: &mut WebResponse) {
        for interceptor in self.interceptors.iter().rev() {
            if let Err(e) = interceptor.after_concurrent_handling_started(request, response, &self.handler) {
                error!(interceptor = interceptor.name(), error = %e, "after_concurrent_handling_started threw exception");
            }
        }
    }
}

impl fmt::Debug for HandlerExecutionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.interceptors.iter().map(|i| i.name()).collect();
        f.debug_struct("HandlerExecutionChain")
            .field("handler", &self.handler.name())
            .field("interceptors", &names)
            .finish()
    }
}

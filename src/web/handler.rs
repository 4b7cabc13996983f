//! Handlers, the adapters that invoke them, and the mappings that select
//! them.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::trace;

use super::async_support::DeferredResult;
use super::interceptor::{HandlerExecutionChain, HandlerInterceptor};
use super::request::{WebRequest, WebResponse};
use super::view::ModelAndView;
use super::{BEST_MATCHING_PATTERN_ATTRIBUTE, PATH_WITHIN_HANDLER_MAPPING_ATTRIBUTE, URI_TEMPLATE_VARIABLES_ATTRIBUTE};
use crate::error::{ContextError, ContextResult};
use crate::path::{AntPathMatcher, PathMatcher};
use crate::processor::LOWEST_PRECEDENCE;

/// An opaque handler object plus a name for logs.
///
/// Adapters recognize handlers by the concrete type stored inside.
#[derive(Clone)]
pub struct Handler {
    name: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Handler {
    pub fn new<T: Any + Send + Sync>(name: impl Into<String>, handler: T) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(handler),
        }
    }

    /// A handler served by [`ControllerAdapter`].
    pub fn controller(name: impl Into<String>, controller: Arc<dyn Controller>) -> Self {
        Self::new(name, controller)
    }

    /// A [`Controller`] from a closure.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut WebRequest, &mut WebResponse) -> ContextResult<HandlerOutcome> + Send + Sync + 'static,
    {
        Self::controller(name, Arc::new(FnController::new(f)))
    }

    /// A handler served by [`RequestHandlerAdapter`].
    pub fn request_handler(name: impl Into<String>, handler: Arc<dyn RequestHandler>) -> Self {
        Self::new(name, handler)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("name", &self.name).finish()
    }
}

/// What a handler produced for this pass.
#[derive(Debug)]
pub enum HandlerOutcome {
    /// Finished; `None` means the response was written directly.
    Done(Option<ModelAndView>),
    /// The result arrives later through the [`DeferredResult`].
    Deferred(DeferredResult),
}

impl From<ModelAndView> for HandlerOutcome {
    fn from(mv: ModelAndView) -> Self {
        HandlerOutcome::Done(Some(mv))
    }
}

/// Invokes handlers of the kinds it supports.
pub trait HandlerAdapter: Send + Sync {
    fn supports(&self, handler: &Handler) -> bool;

    fn handle(&self, request: &mut WebRequest, response: &mut WebResponse, handler: &Handler) -> ContextResult<HandlerOutcome>;

    /// Last modification time for conditional GET support.
    fn last_modified(&self, request: &WebRequest, handler: &Handler) -> Option<DateTime<Utc>> {
        let _ = (request, handler);
        None
    }
}

pub trait Controller: Send + Sync {
    fn handle_request(&self, request: &mut WebRequest, response: &mut WebResponse) -> ContextResult<HandlerOutcome>;

    fn last_modified(&self, request: &WebRequest) -> Option<DateTime<Utc>> {
        let _ = request;
        None
    }
}

/// [`Controller`] backed by a closure.
pub struct FnController<F> {
    f: F,
    last_modified: Option<DateTime<Utc>>,
}

impl<F> FnController<F>
where
    F: Fn(&mut WebRequest, &mut WebResponse) -> ContextResult<HandlerOutcome> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f, last_modified: None }
    }

    pub fn with_last_modified(mut self, at: DateTime<Utc>) -> Self {
        self.last_modified = Some(at);
        self
    }
}

impl<F> Controller for FnController<F>
where
    F: Fn(&mut WebRequest, &mut WebResponse) -> ContextResult<HandlerOutcome> + Send + Sync,
{
    fn handle_request(&self, request: &mut WebRequest, response: &mut WebResponse) -> ContextResult<HandlerOutcome> {
        (self.f)(request, response)
    }

    fn last_modified(&self, _request: &WebRequest) -> Option<DateTime<Utc>> {
        self.last_modified
    }
}

/// Adapter for handlers holding an `Arc<dyn Controller>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ControllerAdapter;

impl HandlerAdapter for ControllerAdapter {
    fn supports(&self, handler: &Handler) -> bool {
        handler.is::<Arc<dyn Controller>>()
    }

    fn handle(&self, request: &mut WebRequest, response: &mut WebResponse, handler: &Handler) -> ContextResult<HandlerOutcome> {
        let controller = handler
            .downcast_ref::<Arc<dyn Controller>>()
            .ok_or_else(|| ContextError::HandlerNotSupported(handler.name().to_string()))?;
        controller.handle_request(request, response)
    }

    fn last_modified(&self, request: &WebRequest, handler: &Handler) -> Option<DateTime<Utc>> {
        handler
            .downcast_ref::<Arc<dyn Controller>>()
            .and_then(|c| c.last_modified(request))
    }
}

/// Handler that writes the response itself and never renders a view.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: &mut WebRequest, response: &mut WebResponse) -> ContextResult<()>;
}

/// Adapter for handlers holding an `Arc<dyn RequestHandler>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestHandlerAdapter;

impl HandlerAdapter for RequestHandlerAdapter {
    fn supports(&self, handler: &Handler) -> bool {
        handler.is::<Arc<dyn RequestHandler>>()
    }

    fn handle(&self, request: &mut WebRequest, response: &mut WebResponse, handler: &Handler) -> ContextResult<HandlerOutcome> {
        let target = handler
            .downcast_ref::<Arc<dyn RequestHandler>>()
            .ok_or_else(|| ContextError::HandlerNotSupported(handler.name().to_string()))?;
        target.handle(request, response)?;
        Ok(HandlerOutcome::Done(None))
    }
}

/// Selects the handler and interceptors for a request.
pub trait HandlerMapping: Send + Sync {
    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }

    /// `Ok(None)` lets the next mapping try.
    fn handler(&self, request: &mut WebRequest) -> ContextResult<Option<HandlerExecutionChain>>;
}

/// An interceptor applied only to paths matching its include patterns and
/// none of its exclude patterns. No include patterns means all paths.
#[derive(Clone)]
pub struct MappedInterceptor {
    includes: Vec<String>,
    excludes: Vec<String>,
    interceptor: Arc<dyn HandlerInterceptor>,
}

impl MappedInterceptor {
    pub fn new(interceptor: Arc<dyn HandlerInterceptor>) -> Self {
        Self {
            includes: Vec::new(),
            excludes: Vec::new(),
            interceptor,
        }
    }

    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.includes.push(pattern.into());
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excludes.push(pattern.into());
        self
    }

    pub fn interceptor(&self) -> &Arc<dyn HandlerInterceptor> {
        &self.interceptor
    }

    pub fn matches(&self, path: &str, matcher: &dyn PathMatcher) -> bool {
        if self.excludes.iter().any(|p| matcher.matches(p, path)) {
            return false;
        }
        self.includes.is_empty() || self.includes.iter().any(|p| matcher.matches(p, path))
    }
}

/// Maps URL path patterns to handlers.
///
/// Exact paths win over patterns; among patterns the most specific match
/// wins.
///
/// ```
/// use ferrous_context::web::{Handler, HandlerMapping, HandlerOutcome, UrlHandlerMapping, WebRequest};
///
/// let mapping = UrlHandlerMapping::new()
///     .register("/orders/{id}", Handler::from_fn("order", |_, _| Ok(HandlerOutcome::Done(None))))
///     .register("/orders/**", Handler::from_fn("orders", |_, _| Ok(HandlerOutcome::Done(None))));
///
/// let mut request = WebRequest::get("/orders/42");
/// let chain = mapping.handler(&mut request).unwrap().unwrap();
/// assert_eq!(chain.handler().name(), "order");
/// ```
pub struct UrlHandlerMapping {
    handlers: Vec<(String, Handler)>,
    interceptors: Vec<Arc<dyn HandlerInterceptor>>,
    mapped_interceptors: Vec<MappedInterceptor>,
    default_handler: Option<Handler>,
    matcher: Arc<dyn PathMatcher>,
    order: i32,
}

impl UrlHandlerMapping {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            interceptors: Vec::new(),
            mapped_interceptors: Vec::new(),
            default_handler: None,
            matcher: Arc::new(AntPathMatcher::new()),
            order: LOWEST_PRECEDENCE,
        }
    }

    pub fn register(mut self, pattern: impl Into<String>, handler: Handler) -> Self {
        let mut pattern = pattern.into();
        if !pattern.starts_with('/') {
            pattern.insert(0, '/');
        }
        self.handlers.push((pattern, handler));
        self
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn HandlerInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn with_mapped_interceptor(mut self, interceptor: MappedInterceptor) -> Self {
        self.mapped_interceptors.push(interceptor);
        self
    }

    pub fn with_default_handler(mut self, handler: Handler) -> Self {
        self.default_handler = Some(handler);
        self
    }

    pub fn with_path_matcher(mut self, matcher: Arc<dyn PathMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    fn lookup(&self, path: &str) -> Option<(&str, &Handler)> {
        if let Some((pattern, handler)) = self.handlers.iter().find(|(p, _)| p == path) {
            return Some((pattern.as_str(), handler));
        }
        let mut matches: Vec<&(String, Handler)> = self
            .handlers
            .iter()
            .filter(|(pattern, _)| self.matcher.matches(pattern, path))
            .collect();
        matches.sort_by(|a, b| self.matcher.compare_specificity(path, &a.0, &b.0));
        matches.into_iter().next().map(|entry| (entry.0.as_str(), &entry.1))
    }

    fn build_chain(&self, handler: Handler, path: &str) -> HandlerExecutionChain {
        let mut chain = HandlerExecutionChain::with_interceptors(handler, self.interceptors.clone());
        for mapped in &self.mapped_interceptors {
            if mapped.matches(path, self.matcher.as_ref()) {
                chain.add_interceptor(mapped.interceptor().clone());
            }
        }
        chain
    }
}

impl Default for UrlHandlerMapping {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerMapping for UrlHandlerMapping {
    fn order(&self) -> i32 {
        self.order
    }

    fn handler(&self, request: &mut WebRequest) -> ContextResult<Option<HandlerExecutionChain>> {
        let path = request.path().to_string();
        let Some((pattern, handler)) = self.lookup(&path) else {
            return Ok(self
                .default_handler
                .clone()
                .map(|handler| self.build_chain(handler, &path)));
        };
        trace!(path = %path, pattern, handler = handler.name(), "mapped request");

        let within = self.matcher.extract_path_within_pattern(pattern, &path);
        let variables = if self.matcher.is_pattern(pattern) {
            self.matcher.extract_uri_template_variables(pattern, &path)?
        } else {
            Default::default()
        };
        request.set_attribute(PATH_WITHIN_HANDLER_MAPPING_ATTRIBUTE, Arc::new(within));
        request.set_attribute(BEST_MATCHING_PATTERN_ATTRIBUTE, Arc::new(pattern.to_string()));
        request.set_attribute(URI_TEMPLATE_VARIABLES_ATTRIBUTE, Arc::new(variables));

        Ok(Some(self.build_chain(handler.clone(), &path)))
    }
}

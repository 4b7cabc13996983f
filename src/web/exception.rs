//! Turning handler errors into views or error responses.

use std::collections::HashMap;

use http::StatusCode;
use tracing::{debug, warn};

use super::handler::Handler;
use super::request::{WebRequest, WebResponse};
use super::view::ModelAndView;
use crate::error::ContextError;
use crate::processor::LOWEST_PRECEDENCE;

/// Model key under which [`SimpleMappingExceptionResolver`] exposes the error.
pub const DEFAULT_EXCEPTION_ATTRIBUTE: &str = "exception";

/// Resolves a handler error.
///
/// `Some` stops resolution; an empty [`ModelAndView`] means the error was
/// handled and nothing is rendered.
pub trait HandlerExceptionResolver: Send + Sync {
    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }

    fn resolve_exception(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        handler: Option<&Handler>,
        error: &ContextError,
    ) -> Option<ModelAndView>;
}

/// Sends the status carried by [`ContextError::ResponseStatus`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseStatusExceptionResolver;

impl HandlerExceptionResolver for ResponseStatusExceptionResolver {
    fn resolve_exception(
        &self,
        _request: &mut WebRequest,
        response: &mut WebResponse,
        _handler: Option<&Handler>,
        error: &ContextError,
    ) -> Option<ModelAndView> {
        let ContextError::ResponseStatus { status, reason } = error.root_cause() else {
            return None;
        };
        let Ok(status) = StatusCode::from_u16(*status) else {
            warn!(status, "ignoring invalid response status");
            return None;
        };
        let reason = (!reason.is_empty()).then_some(reason.as_str());
        response.send_error(status, reason);
        Some(ModelAndView::new())
    }
}

/// Maps error kinds (see [`ContextError::kind`]) to error view names.
///
/// ```
/// use ferrous_context::web::{HandlerExceptionResolver, SimpleMappingExceptionResolver, WebRequest, WebResponse};
/// use ferrous_context::ContextError;
///
/// let resolver = SimpleMappingExceptionResolver::new()
///     .map_kind("no_such_bean", "errors/missing")
///     .with_status_code("errors/missing", http::StatusCode::NOT_FOUND);
///
/// let mut response = WebResponse::new();
/// let mv = resolver
///     .resolve_exception(&mut WebRequest::get("/"), &mut response, None, &ContextError::NoSuchBean("x".into()))
///     .unwrap();
/// assert_eq!(mv.view_name(), Some("errors/missing"));
/// assert_eq!(response.status(), http::StatusCode::NOT_FOUND);
/// ```
#[derive(Debug, Clone)]
pub struct SimpleMappingExceptionResolver {
    mappings: Vec<(String, String)>,
    default_error_view: Option<String>,
    status_codes: HashMap<String, StatusCode>,
    default_status: Option<StatusCode>,
    exception_attribute: Option<String>,
    order: i32,
}

impl SimpleMappingExceptionResolver {
    pub fn new() -> Self {
        Self {
            mappings: Vec::new(),
            default_error_view: None,
            status_codes: HashMap::new(),
            default_status: None,
            exception_attribute: Some(DEFAULT_EXCEPTION_ATTRIBUTE.to_string()),
            order: LOWEST_PRECEDENCE,
        }
    }

    pub fn map_kind(mut self, kind: impl Into<String>, view_name: impl Into<String>) -> Self {
        self.mappings.push((kind.into(), view_name.into()));
        self
    }

    pub fn with_default_error_view(mut self, view_name: impl Into<String>) -> Self {
        self.default_error_view = Some(view_name.into());
        self
    }

    pub fn with_status_code(mut self, view_name: impl Into<String>, status: StatusCode) -> Self {
        self.status_codes.insert(view_name.into(), status);
        self
    }

    pub fn with_default_status(mut self, status: StatusCode) -> Self {
        self.default_status = Some(status);
        self
    }

    /// `None` keeps the error out of the model.
    pub fn with_exception_attribute(mut self, attribute: Option<String>) -> Self {
        self.exception_attribute = attribute;
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    fn view_name_for(&self, error: &ContextError) -> Option<&str> {
        let kinds = [error.kind(), error.root_cause().kind()];
        self.mappings
            .iter()
            .find(|(kind, _)| kinds.contains(&kind.as_str()))
            .map(|(_, view)| view.as_str())
            .or(self.default_error_view.as_deref())
    }
}

impl Default for SimpleMappingExceptionResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerExceptionResolver for SimpleMappingExceptionResolver {
    fn order(&self) -> i32 {
        self.order
    }

    fn resolve_exception(
        &self,
        _request: &mut WebRequest,
        response: &mut WebResponse,
        handler: Option<&Handler>,
        error: &ContextError,
    ) -> Option<ModelAndView> {
        let view_name = self.view_name_for(error)?;
        debug!(view = view_name, handler = ?handler.map(Handler::name), error = %error, "resolved error to view");
        if let Some(status) = self.status_codes.get(view_name).copied().or(self.default_status) {
            response.set_status(status);
        }
        let mut mv = ModelAndView::with_view_name(view_name);
        if let Some(attribute) = &self.exception_attribute {
            mv.add_object(attribute.clone(), error.to_string());
        }
        Some(mv)
    }
}

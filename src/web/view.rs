//! Models, views and view resolution.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::header::CONTENT_TYPE;
use http::StatusCode;
use serde_json::{Map, Value};

use super::request::{WebRequest, WebResponse};
use super::support;
use crate::error::{ContextError, ContextResult};
use crate::locale::Locale;

/// View name prefix that yields a [`RedirectView`].
pub const REDIRECT_URL_PREFIX: &str = "redirect:";

pub type Model = Map<String, Value>;

/// Renders a model into the response.
pub trait View: Send + Sync {
    fn content_type(&self) -> Option<&str> {
        None
    }

    fn render(&self, model: &Model, request: &mut WebRequest, response: &mut WebResponse) -> ContextResult<()>;
}

/// Maps a view name to a [`View`].
pub trait ViewResolver: Send + Sync {
    fn order(&self) -> i32 {
        crate::processor::LOWEST_PRECEDENCE
    }

    /// `Ok(None)` lets the next resolver try.
    fn resolve_view_name(&self, view_name: &str, locale: &Locale) -> ContextResult<Option<Arc<dyn View>>>;
}

#[derive(Clone)]
enum ViewRef {
    Name(String),
    Instance(Arc<dyn View>),
}

/// Result of a handler: an optional view plus the model to render it with.
///
/// ```
/// use ferrous_context::web::ModelAndView;
///
/// let mv = ModelAndView::with_view_name("orders/show").with("id", 42);
/// assert_eq!(mv.view_name(), Some("orders/show"));
/// assert_eq!(mv.model()["id"], 42);
/// assert!(ModelAndView::new().is_empty());
/// ```
#[derive(Clone, Default)]
pub struct ModelAndView {
    view: Option<ViewRef>,
    model: Model,
    status: Option<StatusCode>,
    cleared: bool,
}

impl ModelAndView {
    /// An empty result. Returned by an exception resolver it means "handled,
    /// nothing to render".
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_view_name(name: impl Into<String>) -> Self {
        Self {
            view: Some(ViewRef::Name(name.into())),
            ..Self::default()
        }
    }

    pub fn with_view(view: Arc<dyn View>) -> Self {
        Self {
            view: Some(ViewRef::Instance(view)),
            ..Self::default()
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_object(key, value);
        self
    }

    pub fn add_object(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.model.insert(key.into(), value.into());
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn view_name(&self) -> Option<&str> {
        match &self.view {
            Some(ViewRef::Name(name)) => Some(name),
            _ => None,
        }
    }

    pub fn set_view_name(&mut self, name: impl Into<String>) {
        self.view = Some(ViewRef::Name(name.into()));
    }

    pub fn view(&self) -> Option<&Arc<dyn View>> {
        match &self.view {
            Some(ViewRef::Instance(view)) => Some(view),
            _ => None,
        }
    }

    pub fn set_view(&mut self, view: Arc<dyn View>) {
        self.view = Some(ViewRef::Instance(view));
    }

    pub fn has_view(&self) -> bool {
        self.view.is_some()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    /// No view and no model.
    pub fn is_empty(&self) -> bool {
        self.view.is_none() && self.model.is_empty()
    }

    /// Drops view and model; a cleared result is not rendered.
    pub fn clear(&mut self) {
        self.view = None;
        self.model.clear();
        self.cleared = true;
    }

    pub fn was_cleared(&self) -> bool {
        self.cleared && self.is_empty()
    }
}

impl fmt::Debug for ModelAndView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let view = match &self.view {
            Some(ViewRef::Name(name)) => format!("\"{name}\""),
            Some(ViewRef::Instance(_)) => "<view instance>".to_string(),
            None => "null".to_string(),
        };
        f.debug_struct("ModelAndView")
            .field("view", &view)
            .field("model", &self.model)
            .field("status", &self.status)
            .finish()
    }
}

/// Writes the model as a JSON object.
#[derive(Debug, Default, Clone)]
pub struct JsonView {
    pretty: bool,
}

impl JsonView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }
}

impl View for JsonView {
    fn content_type(&self) -> Option<&str> {
        Some("application/json")
    }

    fn render(&self, model: &Model, _request: &mut WebRequest, response: &mut WebResponse) -> ContextResult<()> {
        let body = if self.pretty {
            serde_json::to_vec_pretty(model)
        } else {
            serde_json::to_vec(model)
        }
        .map_err(|e| ContextError::Handler(format!("could not serialize model: {e}")))?;
        if let Some(content_type) = self.content_type() {
            response.set_header(CONTENT_TYPE.as_str(), content_type)?;
        }
        response.write(&body);
        Ok(())
    }
}

/// Redirects to a URL, saving the output flash map for the target request.
///
/// Scalar model values are appended as query parameters unless disabled.
#[derive(Debug, Clone)]
pub struct RedirectView {
    url: String,
    status: StatusCode,
    expose_model_attributes: bool,
}

impl RedirectView {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: StatusCode::FOUND,
            expose_model_attributes: true,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn expose_model_attributes(mut self, expose: bool) -> Self {
        self.expose_model_attributes = expose;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn target_url(&self, model: &Model) -> String {
        let mut url = self.url.clone();
        if !self.expose_model_attributes {
            return url;
        }
        let fragment = url.find('#').map(|i| url.split_off(i));
        let mut separator = if url.contains('?') { '&' } else { '?' };
        for (key, value) in model {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            url.push(separator);
            url.push_str(&urlencoding::encode(key));
            url.push('=');
            url.push_str(&urlencoding::encode(&value));
            separator = '&';
        }
        if let Some(fragment) = fragment {
            url.push_str(&fragment);
        }
        url
    }
}

impl View for RedirectView {
    fn render(&self, model: &Model, request: &mut WebRequest, response: &mut WebResponse) -> ContextResult<()> {
        let target = self.target_url(model);
        support::save_output_flash_map(&target, request, response);
        response.send_redirect(&target, self.status)
    }
}

/// Resolves names from a fixed table; `redirect:` names become
/// [`RedirectView`]s.
pub struct StaticViewResolver {
    views: HashMap<String, Arc<dyn View>>,
    order: i32,
}

impl StaticViewResolver {
    pub fn new() -> Self {
        Self {
            views: HashMap::new(),
            order: crate::processor::LOWEST_PRECEDENCE,
        }
    }

    pub fn with_view(mut self, name: impl Into<String>, view: Arc<dyn View>) -> Self {
        self.views.insert(name.into(), view);
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

impl Default for StaticViewResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewResolver for StaticViewResolver {
    fn order(&self) -> i32 {
        self.order
    }

    fn resolve_view_name(&self, view_name: &str, _locale: &Locale) -> ContextResult<Option<Arc<dyn View>>> {
        if let Some(url) = view_name.strip_prefix(REDIRECT_URL_PREFIX) {
            return Ok(Some(Arc::new(RedirectView::new(url))));
        }
        Ok(self.views.get(view_name).cloned())
    }
}

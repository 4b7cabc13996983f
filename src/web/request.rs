//! Opaque request and response handles passed through the dispatch pipeline.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use http::header::{HeaderName, HeaderValue, LOCATION};
use http::{HeaderMap, Method, StatusCode};
use parking_lot::Mutex;
use tracing::{trace, warn};

use super::async_support::AsyncManager;
use crate::error::{ContextError, ContextResult};

/// Value stored as a request or session attribute.
pub type Attribute = Arc<dyn Any + Send + Sync>;

/// How the current pass entered the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DispatchKind {
    #[default]
    Request,
    Forward,
    Include,
    /// Re-entry after a deferred result became available
    Async,
    Error,
}

/// Attribute store that outlives a single request.
pub struct Session {
    id: String,
    created: DateTime<Utc>,
    attributes: Mutex<HashMap<String, Attribute>>,
}

impl Session {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: uuid::Uuid::new_v4().to_string(),
            created: Utc::now(),
            attributes: Mutex::new(HashMap::new()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn attribute(&self, name: &str) -> Option<Attribute> {
        self.attributes.lock().get(name).cloned()
    }

    pub fn attribute_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.attribute(name).and_then(|a| a.downcast::<T>().ok())
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: Attribute) {
        self.attributes.lock().insert(name.into(), value);
    }

    pub fn remove_attribute(&self, name: &str) -> Option<Attribute> {
        self.attributes.lock().remove(name)
    }

    pub fn attribute_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.attributes.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("attributes", &self.attribute_names())
            .finish()
    }
}

type DestructionCallback = Box<dyn FnOnce() + Send>;

/// Inbound request: method, path, query parameters, headers and attributes.
///
/// ```
/// use ferrous_context::web::WebRequest;
///
/// let request = WebRequest::get("/orders/42?expand=items&expand=customer");
/// assert_eq!(request.path(), "/orders/42");
/// assert_eq!(request.parameter("expand"), Some("items"));
/// assert_eq!(request.parameter_values("expand"), vec!["items", "customer"]);
/// ```
pub struct WebRequest {
    method: Method,
    path: String,
    query: Option<String>,
    parameters: Vec<(String, String)>,
    headers: HeaderMap,
    dispatch_kind: DispatchKind,
    attributes: HashMap<String, Attribute>,
    session: Option<Arc<Session>>,
    async_manager: AsyncManager,
    destruction_callbacks: Vec<(String, DestructionCallback)>,
}

impl WebRequest {
    /// Builds a request for `uri`, which may carry a query string.
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (uri, None),
        };
        let parameters = query.as_deref().map(parse_query).unwrap_or_default();
        Self {
            method,
            path: if path.is_empty() { "/".into() } else { path.to_string() },
            query,
            parameters,
            headers: HeaderMap::new(),
            dispatch_kind: DispatchKind::Request,
            attributes: HashMap::new(),
            session: None,
            async_manager: AsyncManager::default(),
            destruction_callbacks: Vec::new(),
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: &str) -> Self {
        Self::new(Method::POST, uri)
    }

    /// Adds a header, ignoring names or values that are not valid HTTP.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => warn!(header = name, "ignoring invalid request header"),
        }
        self
    }

    pub fn with_session(mut self, session: Arc<Session>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_dispatch_kind(mut self, kind: DispatchKind) -> Self {
        self.dispatch_kind = kind;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// First value of a decoded query parameter.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn parameter_values(&self, name: &str) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn parameters(&self) -> &[(String, String)] {
        &self.parameters
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn dispatch_kind(&self) -> DispatchKind {
        self.dispatch_kind
    }

    pub fn set_dispatch_kind(&mut self, kind: DispatchKind) {
        self.dispatch_kind = kind;
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn attribute_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.attributes
            .get(name)
            .and_then(|a| a.clone().downcast::<T>().ok())
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: Attribute) {
        self.attributes.insert(name.into(), value);
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Attribute> {
        self.attributes.remove(name)
    }

    pub fn attribute_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.attributes.keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn snapshot_attributes(&self) -> HashMap<String, Attribute> {
        self.attributes.clone()
    }

    pub(crate) fn restore_attributes(&mut self, attributes: HashMap<String, Attribute>) {
        self.attributes = attributes;
    }

    /// The session, created on demand when `create` is set.
    pub fn session(&mut self, create: bool) -> Option<Arc<Session>> {
        if self.session.is_none() && create {
            let session = Session::new();
            trace!(session = session.id(), "created session");
            self.session = Some(session);
        }
        self.session.clone()
    }

    pub fn existing_session(&self) -> Option<&Arc<Session>> {
        self.session.as_ref()
    }

    pub fn async_manager(&self) -> &AsyncManager {
        &self.async_manager
    }

    pub fn async_manager_mut(&mut self) -> &mut AsyncManager {
        &mut self.async_manager
    }

    /// Registers cleanup to run once the request has completed.
    pub fn register_destruction_callback(&mut self, name: impl Into<String>, callback: impl FnOnce() + Send + 'static) {
        self.destruction_callbacks.push((name.into(), Box::new(callback)));
    }

    /// Runs destruction callbacks in registration order.
    pub fn request_completed(&mut self) {
        for (name, callback) in std::mem::take(&mut self.destruction_callbacks) {
            trace!(callback = %name, "running request destruction callback");
            callback();
        }
    }
}

impl fmt::Debug for WebRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("dispatch_kind", &self.dispatch_kind)
            .field("attributes", &self.attribute_names())
            .finish()
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(key), decode(value))
        })
        .collect()
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

/// Outbound response: status, headers, body and redirect target.
#[derive(Debug, Default)]
pub struct WebResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    error_message: Option<String>,
    committed: bool,
}

impl WebResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> ContextResult<()> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ContextError::InvalidArgument(format!("header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ContextError::InvalidArgument(format!("header value '{value}': {e}")))?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
        self.committed = true;
    }

    /// Commits an error status with an optional message.
    pub fn send_error(&mut self, status: StatusCode, message: Option<&str>) {
        self.status = status;
        self.error_message = message.map(str::to_string);
        self.committed = true;
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Commits a redirect to `location` with the given 3xx status.
    pub fn send_redirect(&mut self, location: &str, status: StatusCode) -> ContextResult<()> {
        let value = HeaderValue::from_str(location)
            .map_err(|e| ContextError::InvalidArgument(format!("redirect location '{location}': {e}")))?;
        self.headers.insert(LOCATION, value);
        self.status = status;
        self.committed = true;
        Ok(())
    }

    pub fn redirected_url(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn mark_committed(&mut self) {
        self.committed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parameters_are_decoded() {
        let request = WebRequest::get("/search?q=hello+world&tag=a%26b&flag");
        assert_eq!(request.parameter("q"), Some("hello world"));
        assert_eq!(request.parameter("tag"), Some("a&b"));
        assert_eq!(request.parameter("flag"), Some(""));
        assert_eq!(request.query_string(), Some("q=hello+world&tag=a%26b&flag"));
    }

    #[test]
    fn sessions_are_created_on_demand() {
        let mut request = WebRequest::get("/");
        assert!(request.session(false).is_none());
        let session = request.session(true).unwrap();
        assert!(Arc::ptr_eq(&session, &request.session(false).unwrap()));
        session.set_attribute("user", Arc::new("ada".to_string()));
        assert_eq!(*session.attribute_as::<String>("user").unwrap(), "ada");
    }

    #[test]
    fn destruction_callbacks_run_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let count = Arc::new(AtomicUsize::new(0));
        let mut request = WebRequest::get("/");
        let c = count.clone();
        request.register_destruction_callback("counter", move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        request.request_completed();
        request.request_completed();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn redirect_commits_response() {
        let mut response = WebResponse::new();
        response.send_redirect("/orders/42", StatusCode::FOUND).unwrap();
        assert!(response.is_committed());
        assert_eq!(response.redirected_url(), Some("/orders/42"));
        assert_eq!(response.status(), StatusCode::FOUND);
    }
}

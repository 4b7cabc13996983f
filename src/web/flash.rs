//! Flash attributes: state saved for exactly one later matching request,
//! typically the target of a redirect.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use super::request::{WebRequest, WebResponse};

/// Default lifetime of a saved flash map, in seconds.
pub const DEFAULT_FLASH_MAP_TIMEOUT_SECS: i64 = 180;

/// Attributes for one later request, with criteria selecting that request.
///
/// ```
/// use ferrous_context::web::{FlashMap, WebRequest};
///
/// let mut flash = FlashMap::new();
/// flash.insert("message", "order saved");
/// flash.set_target_request_path("/orders/42");
/// flash.add_target_request_param("tab", "summary");
///
/// assert!(flash.matches(&WebRequest::get("/orders/42?tab=summary")));
/// assert!(!flash.matches(&WebRequest::get("/orders/42")));
/// assert!(!flash.matches(&WebRequest::get("/orders/7?tab=summary")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlashMap {
    attributes: BTreeMap<String, Value>,
    target_request_path: Option<String>,
    target_request_params: Vec<(String, String)>,
    expiration: Option<DateTime<Utc>>,
}

impl FlashMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn set_target_request_path(&mut self, path: impl Into<String>) {
        self.target_request_path = Some(path.into());
    }

    pub fn target_request_path(&self) -> Option<&str> {
        self.target_request_path.as_deref()
    }

    /// Adds a query parameter the target request must carry. Empty names or
    /// values are ignored.
    pub fn add_target_request_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let (name, value) = (name.into(), value.into());
        if !name.is_empty() && !value.is_empty() {
            self.target_request_params.push((name, value));
        }
    }

    pub fn target_request_params(&self) -> &[(String, String)] {
        &self.target_request_params
    }

    /// Starts the expiration period from now.
    pub fn start_expiration_period(&mut self, timeout_secs: i64) {
        self.expiration = Some(Utc::now() + Duration::seconds(timeout_secs));
    }

    pub fn set_expiration(&mut self, expiration: Option<DateTime<Utc>>) {
        self.expiration = expiration;
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expiration
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|expiration| now > expiration)
    }

    /// Whether `request` satisfies the path and parameter criteria.
    pub fn matches(&self, request: &WebRequest) -> bool {
        if let Some(expected) = &self.target_request_path {
            let path = request.path();
            let trimmed = path.strip_suffix('/').unwrap_or(path);
            let expected_trimmed = expected.strip_suffix('/').unwrap_or(expected);
            if trimmed != expected_trimmed {
                return false;
            }
        }
        self.target_request_params
            .iter()
            .all(|(name, value)| request.parameter_values(name).contains(&value.as_str()))
    }

    /// Orders more specific maps first: more parameters, then a target path.
    pub fn specificity_cmp(&self, other: &FlashMap) -> Ordering {
        other
            .target_request_params
            .len()
            .cmp(&self.target_request_params.len())
            .then_with(|| {
                other
                    .target_request_path
                    .is_some()
                    .cmp(&self.target_request_path.is_some())
            })
    }
}

/// Saves and retrieves flash maps across requests.
pub trait FlashMapManager: Send + Sync {
    /// Removes and returns the flash map matching `request`, purging expired
    /// maps in the same pass.
    fn retrieve_and_update(&self, request: &mut WebRequest, response: &mut WebResponse) -> Option<FlashMap>;

    /// Stores `flash_map` for a later request. Empty maps are dropped.
    fn save_output_flash_map(&self, flash_map: FlashMap, request: &mut WebRequest, response: &mut WebResponse);
}

/// Backing storage for [`DefaultFlashMapManager`].
pub trait FlashMapStore: Send + Sync {
    fn retrieve(&self, request: &WebRequest) -> Vec<FlashMap>;

    fn update(&self, flash_maps: Vec<FlashMap>, request: &mut WebRequest);
}

/// Session attribute that holds the saved flash maps.
pub const FLASH_MAPS_SESSION_ATTRIBUTE: &str = "ferrous_context.web.flash.FLASH_MAPS";

/// Keeps flash maps in the request's session.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionFlashMapStore;

impl FlashMapStore for SessionFlashMapStore {
    fn retrieve(&self, request: &WebRequest) -> Vec<FlashMap> {
        request
            .existing_session()
            .and_then(|session| session.attribute_as::<Vec<FlashMap>>(FLASH_MAPS_SESSION_ATTRIBUTE))
            .map(|maps| maps.as_ref().clone())
            .unwrap_or_default()
    }

    fn update(&self, flash_maps: Vec<FlashMap>, request: &mut WebRequest) {
        if flash_maps.is_empty() {
            if let Some(session) = request.existing_session() {
                session.remove_attribute(FLASH_MAPS_SESSION_ATTRIBUTE);
            }
            return;
        }
        if let Some(session) = request.session(true) {
            session.set_attribute(FLASH_MAPS_SESSION_ATTRIBUTE, Arc::new(flash_maps));
        }
    }
}

/// [`FlashMapManager`] over a [`FlashMapStore`] with a fixed timeout.
pub struct DefaultFlashMapManager {
    store: Arc<dyn FlashMapStore>,
    timeout_secs: i64,
    lock: Mutex<()>,
}

impl DefaultFlashMapManager {
    pub fn new(store: Arc<dyn FlashMapStore>) -> Self {
        Self {
            store,
            timeout_secs: DEFAULT_FLASH_MAP_TIMEOUT_SECS,
            lock: Mutex::new(()),
        }
    }

    pub fn with_timeout_secs(mut self, timeout_secs: i64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn timeout_secs(&self) -> i64 {
        self.timeout_secs
    }

    fn find_match(flash_maps: &[FlashMap], request: &WebRequest, now: DateTime<Utc>) -> Option<FlashMap> {
        let mut candidates: Vec<&FlashMap> = flash_maps
            .iter()
            .filter(|map| !map.is_expired_at(now) && map.matches(request))
            .collect();
        candidates.sort_by(|a, b| a.specificity_cmp(b));
        candidates.first().map(|map| (*map).clone())
    }
}

impl Default for DefaultFlashMapManager {
    fn default() -> Self {
        Self::new(Arc::new(SessionFlashMapStore))
    }
}

impl FlashMapManager for DefaultFlashMapManager {
    fn retrieve_and_update(&self, request: &mut WebRequest, _response: &mut WebResponse) -> Option<FlashMap> {
        let _guard = self.lock.lock();
        let mut flash_maps = self.store.retrieve(request);
        if flash_maps.is_empty() {
            return None;
        }
        let now = Utc::now();
        let matched = Self::find_match(&flash_maps, request, now);

        let before = flash_maps.len();
        flash_maps.retain(|map| !map.is_expired_at(now) && Some(map) != matched.as_ref());
        if flash_maps.len() != before {
            trace!(removed = before - flash_maps.len(), "updating stored flash maps");
            self.store.update(flash_maps, request);
        }
        if let Some(map) = &matched {
            debug!(path = request.path(), attributes = map.len(), "retrieved flash map");
        }
        matched
    }

    fn save_output_flash_map(&self, mut flash_map: FlashMap, request: &mut WebRequest, _response: &mut WebResponse) {
        if flash_map.is_empty() {
            return;
        }
        if let Some(path) = flash_map.target_request_path.take() {
            flash_map.target_request_path = Some(normalize_target_path(&path, request.path()));
        }
        flash_map.start_expiration_period(self.timeout_secs);

        let _guard = self.lock.lock();
        let mut flash_maps = self.store.retrieve(request);
        flash_maps.push(flash_map);
        debug!(path = request.path(), stored = flash_maps.len(), "saved output flash map");
        self.store.update(flash_maps, request);
    }
}

/// Decodes the target path and resolves it against the current request path
/// when relative.
fn normalize_target_path(path: &str, request_path: &str) -> String {
    let decoded = urlencoding::decode(path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| path.to_string());
    if decoded.starts_with('/') {
        return decoded;
    }
    let base = match request_path.rfind('/') {
        Some(index) => &request_path[..=index],
        None => "/",
    };
    format!("{base}{decoded}")
}

//! Profiles and ordered property sources.
//!
//! The [`Environment`] is created with the context and handed to beans that
//! declare environment awareness. Sources are consulted in registration
//! order; the first one that knows a key wins.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ContextError, ContextResult};

/// Property naming the active profiles when none are set explicitly.
pub const ACTIVE_PROFILES_PROPERTY: &str = "profiles.active";

const MAX_PLACEHOLDER_DEPTH: usize = 32;

/// A property value that can be various types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// Parses raw text the way environment variables are read: integer,
    /// float, boolean, otherwise string.
    pub fn parse(raw: &str) -> Self {
        if let Ok(int_val) = raw.parse::<i64>() {
            PropertyValue::Integer(int_val)
        } else if let Ok(float_val) = raw.parse::<f64>() {
            PropertyValue::Float(float_val)
        } else if let Ok(bool_val) = raw.parse::<bool>() {
            PropertyValue::Boolean(bool_val)
        } else {
            PropertyValue::String(raw.to_string())
        }
    }

    pub fn as_str(&self) -> ContextResult<&str> {
        match self {
            PropertyValue::String(s) => Ok(s),
            other => Err(mismatch(other, "a string")),
        }
    }

    pub fn as_i64(&self) -> ContextResult<i64> {
        match self {
            PropertyValue::Integer(i) => Ok(*i),
            PropertyValue::String(s) => s.trim().parse().map_err(|_| mismatch(self, "an integer")),
            other => Err(mismatch(other, "an integer")),
        }
    }

    pub fn as_f64(&self) -> ContextResult<f64> {
        match self {
            PropertyValue::Float(f) => Ok(*f),
            PropertyValue::Integer(i) => Ok(*i as f64),
            PropertyValue::String(s) => s.trim().parse().map_err(|_| mismatch(self, "a number")),
            other => Err(mismatch(other, "a number")),
        }
    }

    pub fn as_bool(&self) -> ContextResult<bool> {
        match self {
            PropertyValue::Boolean(b) => Ok(*b),
            PropertyValue::String(s) => s.trim().parse().map_err(|_| mismatch(self, "a boolean")),
            other => Err(mismatch(other, "a boolean")),
        }
    }

    /// Integer milliseconds as a [`Duration`].
    pub fn as_duration_ms(&self) -> ContextResult<Duration> {
        let ms = self.as_i64()?;
        if ms < 0 {
            return Err(ContextError::Config(format!("duration cannot be negative: {ms}")));
        }
        Ok(Duration::from_millis(ms as u64))
    }
}

fn mismatch(value: &PropertyValue, expected: &str) -> ContextError {
    ContextError::Config(format!("property value {value} is not {expected}"))
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Boolean(b) => write!(f, "{b}"),
            PropertyValue::Integer(i) => write!(f, "{i}"),
            PropertyValue::Float(x) => write!(f, "{x}"),
            PropertyValue::String(s) => f.write_str(s),
            PropertyValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(","))
            }
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Integer(value.into())
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

/// A named source of properties
pub trait PropertySource: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Get a property value by key
    fn get(&self, key: &str) -> Option<PropertyValue>;

    /// List all available keys
    fn keys(&self) -> Vec<String>;
}

/// In-memory property source
#[derive(Debug, Clone, Default)]
pub struct MapPropertySource {
    name: String,
    values: HashMap<String, PropertyValue>,
}

impl MapPropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: HashMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.values.insert(key.into(), value.into());
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<PropertyValue> {
        self.values.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Process environment variables.
///
/// A key such as `server.port` is looked up as `SERVER_PORT`, or
/// `APP_SERVER_PORT` with prefix `app`.
#[derive(Debug, Default, Clone)]
pub struct EnvironmentPropertySource {
    /// Prefix to filter environment variables
    prefix: Option<String>,
}

impl EnvironmentPropertySource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn variable_name(&self, key: &str) -> String {
        let key = key.replace('.', "_").replace('-', "_").to_uppercase();
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key),
            None => key,
        }
    }
}

impl PropertySource for EnvironmentPropertySource {
    fn name(&self) -> &str {
        "systemEnvironment"
    }

    fn get(&self, key: &str) -> Option<PropertyValue> {
        env::var(self.variable_name(key))
            .ok()
            .map(|value| PropertyValue::parse(&value))
    }

    fn keys(&self) -> Vec<String> {
        env::vars()
            .filter_map(|(key, _)| match &self.prefix {
                Some(prefix) => {
                    let prefix_upper = format!("{}_", prefix.to_uppercase());
                    key.strip_prefix(&prefix_upper)
                        .map(|rest| rest.to_lowercase().replace('_', "."))
                }
                None => Some(key.to_lowercase().replace('_', ".")),
            })
            .collect()
    }
}

/// Properties read from a JSON document, nested objects flattened with dots.
#[derive(Debug, Clone)]
pub struct JsonPropertySource {
    name: String,
    values: HashMap<String, PropertyValue>,
}

impl JsonPropertySource {
    pub fn parse(name: impl Into<String>, json: &str) -> ContextResult<Self> {
        let document: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| ContextError::Config(format!("invalid JSON properties: {e}")))?;
        let mut values = HashMap::new();
        flatten("", &document, &mut values);
        Ok(Self {
            name: name.into(),
            values,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> ContextResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ContextError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(path.display().to_string(), &content)
    }
}

fn flatten(prefix: &str, value: &serde_json::Value, out: &mut HashMap<String, PropertyValue>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, nested) in map {
                let full = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&full, nested, out);
            }
        }
        serde_json::Value::Null => {}
        other => {
            if let Ok(converted) = serde_json::from_value::<PropertyValue>(other.clone()) {
                out.insert(prefix.to_string(), converted);
            }
        }
    }
}

impl PropertySource for JsonPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<PropertyValue> {
        self.values.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Active profiles plus the ordered property sources of a context.
///
/// # Examples
///
/// ```
/// use ferrous_context::{Environment, MapPropertySource};
/// use std::sync::Arc;
///
/// let env = Environment::new(
///     vec![Arc::new(
///         MapPropertySource::new("app")
///             .with("server.host", "localhost")
///             .with("server.url", "http://${server.host}:${server.port:8080}"),
///     )],
///     vec!["dev".into()],
/// );
///
/// assert_eq!(env.get_string("server.url").unwrap().as_deref(), Some("http://localhost:8080"));
/// assert!(env.accepts_profiles(&["dev"]));
/// assert!(env.accepts_profiles(&["!prod"]));
/// ```
#[derive(Debug, Clone)]
pub struct Environment {
    sources: Vec<Arc<dyn PropertySource>>,
    active_profiles: Vec<String>,
    default_profiles: Vec<String>,
}

impl Environment {
    /// Creates an environment. When `active_profiles` is empty, the
    /// comma-separated `profiles.active` property supplies them.
    pub fn new(sources: Vec<Arc<dyn PropertySource>>, active_profiles: Vec<String>) -> Self {
        let mut environment = Self {
            sources,
            active_profiles,
            default_profiles: vec!["default".to_string()],
        };
        if environment.active_profiles.is_empty() {
            if let Some(value) = environment.get_property(ACTIVE_PROFILES_PROPERTY) {
                environment.active_profiles = value
                    .to_string()
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }
        environment
    }

    pub fn active_profiles(&self) -> &[String] {
        &self.active_profiles
    }

    pub fn default_profiles(&self) -> &[String] {
        &self.default_profiles
    }

    /// Whether any of `profiles` is accepted. A profile prefixed with `!` is
    /// accepted when it is not active. Default profiles count as active only
    /// while no profile is explicitly active.
    pub fn accepts_profiles(&self, profiles: &[&str]) -> bool {
        let effective = if self.active_profiles.is_empty() {
            &self.default_profiles
        } else {
            &self.active_profiles
        };
        profiles.iter().any(|profile| match profile.strip_prefix('!') {
            Some(negated) => !effective.iter().any(|p| p == negated),
            None => effective.iter().any(|p| p == profile),
        })
    }

    pub fn property_sources(&self) -> impl Iterator<Item = &Arc<dyn PropertySource>> {
        self.sources.iter()
    }

    pub fn contains_property(&self, key: &str) -> bool {
        self.get_property(key).is_some()
    }

    /// Raw value from the first source that has `key`.
    pub fn get_property(&self, key: &str) -> Option<PropertyValue> {
        self.sources.iter().find_map(|source| source.get(key))
    }

    /// String value of `key` with placeholders resolved.
    pub fn get_string(&self, key: &str) -> ContextResult<Option<String>> {
        match self.get_property(key) {
            Some(value) => self.resolve_placeholders(&value.to_string()).map(Some),
            None => Ok(None),
        }
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key)
            .ok()
            .flatten()
            .unwrap_or_else(|| default.to_string())
    }

    /// Value of a property that must exist.
    pub fn required_property(&self, key: &str) -> ContextResult<PropertyValue> {
        self.get_property(key)
            .ok_or_else(|| ContextError::Config(format!("required key '{key}' not found")))
    }

    pub fn get_i64(&self, key: &str) -> ContextResult<Option<i64>> {
        self.get_property(key).map(|v| v.as_i64()).transpose()
    }

    pub fn get_bool(&self, key: &str) -> ContextResult<Option<bool>> {
        self.get_property(key).map(|v| v.as_bool()).transpose()
    }

    pub fn get_duration_ms(&self, key: &str) -> ContextResult<Option<Duration>> {
        self.get_property(key).map(|v| v.as_duration_ms()).transpose()
    }

    /// Replaces `${key}` and `${key:default}` placeholders in `text`.
    ///
    /// Resolved values are themselves resolved. A placeholder with no value
    /// and no default is an error.
    pub fn resolve_placeholders(&self, text: &str) -> ContextResult<String> {
        self.resolve_nested(text, 0)
    }

    fn resolve_nested(&self, text: &str, depth: usize) -> ContextResult<String> {
        if depth > MAX_PLACEHOLDER_DEPTH {
            return Err(ContextError::Config(format!(
                "circular placeholder reference in '{text}'"
            )));
        }
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find('}').ok_or_else(|| {
                ContextError::Config(format!("unterminated placeholder in '{text}'"))
            })?;
            let expression = &after[..end];
            let (key, default) = match expression.split_once(':') {
                Some((key, default)) => (key, Some(default)),
                None => (expression, None),
            };
            let resolved = match (self.get_property(key), default) {
                (Some(value), _) => self.resolve_nested(&value.to_string(), depth + 1)?,
                (None, Some(default)) => default.to_string(),
                (None, None) => {
                    return Err(ContextError::Config(format!(
                        "could not resolve placeholder '{key}' in value '{text}'"
                    )))
                }
            };
            out.push_str(&resolved);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with(source: MapPropertySource) -> Environment {
        Environment::new(vec![Arc::new(source)], Vec::new())
    }

    #[test]
    fn first_source_wins() {
        let env = Environment::new(
            vec![
                Arc::new(MapPropertySource::new("a").with("k", "first")),
                Arc::new(MapPropertySource::new("b").with("k", "second")),
            ],
            Vec::new(),
        );
        assert_eq!(env.get_string("k").unwrap().as_deref(), Some("first"));
    }

    #[test]
    fn unresolved_placeholder_is_an_error() {
        let env = env_with(MapPropertySource::new("a").with("k", "${missing}"));
        assert!(matches!(env.get_string("k"), Err(ContextError::Config(_))));
    }

    #[test]
    fn self_referencing_placeholder_is_bounded() {
        let env = env_with(MapPropertySource::new("a").with("loop", "${loop}"));
        assert!(env.get_string("loop").is_err());
    }

    #[test]
    fn profiles_from_property() {
        let env = env_with(MapPropertySource::new("a").with(ACTIVE_PROFILES_PROPERTY, "dev, cloud"));
        assert_eq!(env.active_profiles(), ["dev".to_string(), "cloud".to_string()]);
        assert!(env.accepts_profiles(&["cloud"]));
        assert!(!env.accepts_profiles(&["default"]));
    }

    #[test]
    fn default_profile_applies_without_active_ones() {
        let env = Environment::default();
        assert!(env.accepts_profiles(&["default"]));
        assert!(!env.accepts_profiles(&["!default"]));
    }

    #[test]
    fn json_source_flattens() {
        let source = JsonPropertySource::parse(
            "json",
            r#"{"server": {"port": 8080, "tls": {"enabled": true}}, "name": "app"}"#,
        )
        .unwrap();
        assert_eq!(source.get("server.port"), Some(PropertyValue::Integer(8080)));
        assert_eq!(source.get("server.tls.enabled"), Some(PropertyValue::Boolean(true)));
        assert_eq!(source.keys(), vec!["name", "server.port", "server.tls.enabled"]);
    }

    #[test]
    fn typed_accessors_convert_strings() {
        let env = env_with(
            MapPropertySource::new("a")
                .with("n", "42")
                .with("flag", "true")
                .with("timeout", 1500),
        );
        assert_eq!(env.get_i64("n").unwrap(), Some(42));
        assert_eq!(env.get_bool("flag").unwrap(), Some(true));
        assert_eq!(env.get_duration_ms("timeout").unwrap(), Some(Duration::from_millis(1500)));
        assert!(env.required_property("absent").is_err());
    }
}

//! Context configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ContextError, ContextResult};

/// Settings controlling how a context creates beans.
///
/// Missing fields take their defaults, so an empty JSON object is valid.
///
/// ```
/// use ferrous_context::ContextSettings;
///
/// let settings = ContextSettings::from_json_str(r#"{ "id": "orders", "active_profiles": ["dev"] }"#).unwrap();
/// assert_eq!(settings.id.as_deref(), Some("orders"));
/// assert!(settings.allow_circular_references);
/// assert!(!settings.allow_raw_injection_despite_wrapping);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    /// Context id; generated when absent
    pub id: Option<String>,
    /// Human-readable name used in logs and error messages
    pub display_name: Option<String>,
    /// Name of the deployed application
    pub application_name: String,
    /// Expose early references so property-level cycles between singletons resolve
    pub allow_circular_references: bool,
    /// Accept a bean whose final wrapper differs from the early reference
    /// already injected into dependents. The final wrapper becomes
    /// authoritative and a warning is logged.
    pub allow_raw_injection_despite_wrapping: bool,
    /// Let a later definition replace an earlier one of the same name
    pub allow_bean_definition_overriding: bool,
    /// Profiles to activate; when empty, the `profiles.active` property is consulted
    pub active_profiles: Vec<String>,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            id: None,
            display_name: None,
            application_name: String::new(),
            allow_circular_references: true,
            allow_raw_injection_despite_wrapping: false,
            allow_bean_definition_overriding: true,
            active_profiles: Vec::new(),
        }
    }
}

impl ContextSettings {
    pub fn from_json_str(json: &str) -> ContextResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ContextError::Config(format!("invalid context settings: {e}")))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> ContextResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ContextError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&content)
    }
}

//! Advice-mode import selection for `Enable*`-style configuration.
//!
//! An importing configuration element carries annotation metadata. A selector
//! reads its own annotation from that metadata, parses the advice mode
//! attribute and returns the configuration names to import for that mode.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ContextError, ContextResult};
use crate::processor::LOWEST_PRECEDENCE;

/// Attribute name selectors read the mode from unless they override it.
pub const DEFAULT_ADVICE_MODE_ATTRIBUTE_NAME: &str = "mode";

/// Strategy used to apply advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdviceMode {
    /// Wrap beans in proxies
    #[default]
    Proxy,
    /// Weave advice into the target code
    AspectJ,
}

impl fmt::Display for AdviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdviceMode::Proxy => f.write_str("PROXY"),
            AdviceMode::AspectJ => f.write_str("ASPECTJ"),
        }
    }
}

impl FromStr for AdviceMode {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PROXY" => Ok(AdviceMode::Proxy),
            "ASPECTJ" => Ok(AdviceMode::AspectJ),
            _ => Err(ContextError::UnresolvableAdviceMode(s.to_string())),
        }
    }
}

/// Value of one annotation attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Mode(AdviceMode),
}

/// Attributes of one annotation on an importing element.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationAttributes {
    annotation: String,
    values: BTreeMap<String, AnnotationValue>,
}

impl AnnotationAttributes {
    pub fn new(annotation: impl Into<String>) -> Self {
        Self {
            annotation: annotation.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: AnnotationValue) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn annotation(&self) -> &str {
        &self.annotation
    }

    pub fn get(&self, name: &str) -> Option<&AnnotationValue> {
        self.values.get(name)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(AnnotationValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(AnnotationValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Reads attribute `name` as an [`AdviceMode`]; string values are parsed.
    pub fn advice_mode(&self, name: &str) -> ContextResult<AdviceMode> {
        match self.values.get(name) {
            Some(AnnotationValue::Mode(mode)) => Ok(*mode),
            Some(AnnotationValue::Str(raw)) => raw.parse(),
            Some(other) => Err(ContextError::UnresolvableAdviceMode(format!(
                "attribute '{name}' of @{} is not an advice mode: {other:?}",
                self.annotation
            ))),
            None => Err(ContextError::UnresolvableAdviceMode(format!(
                "attribute '{name}' missing from @{}",
                self.annotation
            ))),
        }
    }
}

/// Annotations present on an importing configuration element.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationMetadata {
    class_name: String,
    annotations: Vec<AnnotationAttributes>,
}

impl AnnotationMetadata {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            annotations: Vec::new(),
        }
    }

    pub fn with_annotation(mut self, attributes: AnnotationAttributes) -> Self {
        self.annotations.push(attributes);
        self
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn has_annotation(&self, annotation: &str) -> bool {
        self.attributes_for(annotation).is_some()
    }

    pub fn attributes_for(&self, annotation: &str) -> Option<&AnnotationAttributes> {
        self.annotations.iter().find(|a| a.annotation == annotation)
    }
}

/// Chooses configuration imports from the advice mode of an annotation.
pub trait AdviceModeImportSelector: Send + Sync {
    /// Annotation this selector reads.
    fn annotation_name(&self) -> &str;

    fn advice_mode_attribute_name(&self) -> &str {
        DEFAULT_ADVICE_MODE_ATTRIBUTE_NAME
    }

    /// Imports for `mode`. `Some(vec![])` means nothing to import; `None`
    /// means the mode is not supported.
    fn imports_for(&self, mode: AdviceMode) -> Option<Vec<String>>;

    /// Fails with [`ContextError::AnnotationNotPresent`] when the importing
    /// element lacks the annotation, and with
    /// [`ContextError::UnresolvableAdviceMode`] when the mode cannot be read
    /// or is not supported.
    fn select_imports(&self, metadata: &AnnotationMetadata) -> ContextResult<Vec<String>> {
        let attributes = metadata
            .attributes_for(self.annotation_name())
            .ok_or_else(|| ContextError::AnnotationNotPresent {
                annotation: self.annotation_name().to_string(),
                importing: metadata.class_name().to_string(),
            })?;
        let mode = attributes.advice_mode(self.advice_mode_attribute_name())?;
        self.imports_for(mode)
            .ok_or_else(|| ContextError::UnresolvableAdviceMode(mode.to_string()))
    }
}

/// Options of transaction management, with their declared defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnableTransactionManagement {
    pub proxy_target_class: bool,
    pub mode: AdviceMode,
    pub order: i32,
}

impl EnableTransactionManagement {
    pub const ANNOTATION: &'static str = "EnableTransactionManagement";

    pub fn to_attributes(&self) -> AnnotationAttributes {
        AnnotationAttributes::new(Self::ANNOTATION)
            .with("proxyTargetClass", AnnotationValue::Bool(self.proxy_target_class))
            .with(DEFAULT_ADVICE_MODE_ATTRIBUTE_NAME, AnnotationValue::Mode(self.mode))
            .with("order", AnnotationValue::Int(self.order.into()))
    }
}

impl Default for EnableTransactionManagement {
    fn default() -> Self {
        Self {
            proxy_target_class: false,
            mode: AdviceMode::Proxy,
            order: LOWEST_PRECEDENCE,
        }
    }
}

/// Selector for [`EnableTransactionManagement`].
///
/// ```
/// use ferrous_context::{
///     AdviceMode, AdviceModeImportSelector, AnnotationMetadata, EnableTransactionManagement,
///     TransactionManagementSelector,
/// };
///
/// let metadata = AnnotationMetadata::new("app::PersistenceConfig")
///     .with_annotation(EnableTransactionManagement::default().to_attributes());
/// let imports = TransactionManagementSelector.select_imports(&metadata).unwrap();
/// assert_eq!(imports, ["AutoProxyRegistrar", "ProxyTransactionManagementConfiguration"]);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct TransactionManagementSelector;

impl AdviceModeImportSelector for TransactionManagementSelector {
    fn annotation_name(&self) -> &str {
        EnableTransactionManagement::ANNOTATION
    }

    fn imports_for(&self, mode: AdviceMode) -> Option<Vec<String>> {
        match mode {
            AdviceMode::Proxy => Some(vec![
                "AutoProxyRegistrar".to_string(),
                "ProxyTransactionManagementConfiguration".to_string(),
            ]),
            AdviceMode::AspectJ => Some(vec!["AspectJTransactionManagementConfiguration".to_string()]),
        }
    }
}

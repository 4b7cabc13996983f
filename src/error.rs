//! Error types for the application context and the dispatch pipeline.

use thiserror::Error;

use crate::lifecycle::Phase;

/// Application context errors
///
/// Covers bean creation, context binding, advice-mode selection, and request
/// dispatch. Lifecycle failures are wrapped in [`ContextError::LifecyclePhase`]
/// so the caller can see which bean failed and in which phase.
///
/// # Examples
///
/// ```rust
/// use ferrous_context::{ContextError, Phase};
///
/// let cycle = ContextError::CircularReference {
///     path: vec!["a".into(), "b".into(), "a".into()],
///     reason: "unresolvable constructor dependency".into(),
/// };
/// assert_eq!(
///     cycle.to_string(),
///     "Circular reference a -> b -> a: unresolvable constructor dependency"
/// );
///
/// let wrapped = ContextError::in_phase("a", Phase::Population, cycle.clone());
/// assert_eq!(wrapped.bean_name(), Some("a"));
/// assert!(matches!(wrapped.root_cause(), ContextError::CircularReference { .. }));
/// ```
#[derive(Debug, Clone, Error)]
pub enum ContextError {
    /// A dependency cycle could not be satisfied with a consistent early reference
    #[error("Circular reference {}: {reason}", path.join(" -> "))]
    CircularReference { path: Vec<String>, reason: String },
    /// The container offered to a consumer is not of the required kind
    #[error("Invalid application context: needs to be of kind [{required}], got [{actual}]")]
    InvalidContainerType { required: String, actual: String },
    /// A consumer already bound to one container was offered a different one
    #[error("Cannot reinitialize with different application context: current one is [{current}], passed-in one is [{passed}]")]
    ReboundContainer { current: String, passed: String },
    /// A consumer that requires a container was used before binding
    #[error("{consumer} does not run in an application context")]
    NotBound { consumer: String },
    /// Advice mode value or selector mapping could not be resolved
    #[error("Unknown advice mode: {0}")]
    UnresolvableAdviceMode(String),
    /// The selector's annotation is missing from the importing element
    #[error("@{annotation} is not present on importing class '{importing}' as expected")]
    AnnotationNotPresent { annotation: String, importing: String },
    /// No handler adapter claims the handler
    #[error("No adapter for handler [{0}]: does the handler implement a supported contract?")]
    HandlerNotSupported(String),
    /// A bean failed during a named lifecycle phase
    #[error("Error creating bean '{bean}' during {phase}: {source}")]
    LifecyclePhase {
        bean: String,
        phase: Phase,
        #[source]
        source: Box<ContextError>,
    },
    /// No bean with this name in the context hierarchy
    #[error("No bean named '{0}' available")]
    NoSuchBean(String),
    /// A bean exists but is not of the requested type
    #[error("Bean named '{bean}' is expected to be of type '{required}' but was '{actual}'")]
    BeanNotOfRequiredType {
        bean: String,
        required: &'static str,
        actual: String,
    },
    /// Operation not allowed in the context's current lifecycle state
    #[error("Illegal context state: {0}")]
    ContextState(String),
    /// Application code failed while constructing or initializing a bean
    #[error("Bean creation failed: {0}")]
    BeanCreation(String),
    /// Maximum nested creation depth exceeded
    #[error("Max creation depth {0} exceeded")]
    DepthExceeded(usize),
    /// No message for the code and locale
    #[error("No message found under code '{code}' for locale '{locale}'")]
    NoSuchMessage { code: String, locale: String },
    /// A handler or interceptor failed while processing a request
    #[error("Request processing failed: {0}")]
    Handler(String),
    /// A failure that maps to a specific response status
    #[error("{status} {reason}")]
    ResponseStatus { status: u16, reason: String },
    /// No view resolver could resolve the view name
    #[error("Could not resolve view with name '{0}'")]
    ViewNotResolved(String),
    /// Configuration could not be read or converted
    #[error("Configuration error: {0}")]
    Config(String),
    /// Argument rejected by an API contract
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ContextError {
    /// Wraps `source` with the failing bean and lifecycle phase.
    pub fn in_phase(bean: impl Into<String>, phase: Phase, source: ContextError) -> Self {
        ContextError::LifecyclePhase {
            bean: bean.into(),
            phase,
            source: Box::new(source),
        }
    }

    /// Follows nested lifecycle wrappers down to the originating error.
    pub fn root_cause(&self) -> &ContextError {
        let mut current = self;
        while let ContextError::LifecyclePhase { source, .. } = current {
            current = source;
        }
        current
    }

    /// Bean name attached to a lifecycle failure, if any.
    pub fn bean_name(&self) -> Option<&str> {
        match self {
            ContextError::LifecyclePhase { bean, .. } => Some(bean),
            _ => None,
        }
    }

    /// Phase attached to a lifecycle failure, if any.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            ContextError::LifecyclePhase { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Stable identifier of the variant, used by exception resolvers for mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            ContextError::CircularReference { .. } => "circular_reference",
            ContextError::InvalidContainerType { .. } => "invalid_container_type",
            ContextError::ReboundContainer { .. } => "rebound_container",
            ContextError::NotBound { .. } => "not_bound",
            ContextError::UnresolvableAdviceMode(_) => "unresolvable_advice_mode",
            ContextError::AnnotationNotPresent { .. } => "annotation_not_present",
            ContextError::HandlerNotSupported(_) => "handler_not_supported",
            ContextError::LifecyclePhase { .. } => "lifecycle_phase",
            ContextError::NoSuchBean(_) => "no_such_bean",
            ContextError::BeanNotOfRequiredType { .. } => "bean_not_of_required_type",
            ContextError::ContextState(_) => "context_state",
            ContextError::BeanCreation(_) => "bean_creation",
            ContextError::DepthExceeded(_) => "depth_exceeded",
            ContextError::NoSuchMessage { .. } => "no_such_message",
            ContextError::Handler(_) => "handler",
            ContextError::ResponseStatus { .. } => "response_status",
            ContextError::ViewNotResolved(_) => "view_not_resolved",
            ContextError::Config(_) => "config",
            ContextError::InvalidArgument(_) => "invalid_argument",
        }
    }
}

/// Result type for context operations
pub type ContextResult<T> = Result<T, ContextError>;

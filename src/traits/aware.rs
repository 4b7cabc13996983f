//! Callback traits invoked between property population and initialization.

use std::sync::Arc;

use crate::environment::Environment;
use crate::error::ContextResult;

/// Receives the name the bean was registered under.
///
/// Invoked before container awareness and environment awareness.
pub trait BeanNameAware: Send + Sync + 'static {
    fn set_bean_name(&self, name: &str);
}

/// Receives the owning context's environment.
pub trait EnvironmentAware: Send + Sync + 'static {
    fn set_environment(&self, environment: Arc<Environment>);
}

/// Runs once all properties are set and all aware callbacks have fired.
///
/// An error aborts creation of the bean and is reported with the
/// initialization phase attached.
pub trait InitializingBean: Send + Sync + 'static {
    fn after_properties_set(&self) -> ContextResult<()>;
}

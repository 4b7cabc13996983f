//! Bean lifecycle states and phases.

use std::fmt;

/// Observable state of a component instance during construction.
///
/// States advance strictly in declaration order. `EarlyExposed` is optional and
/// only entered when a circular dependency asks for the bean before it has been
/// initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LifecycleState {
    /// Constructed, no dependencies assigned yet
    Raw,
    /// An early reference has been handed to a dependent
    EarlyExposed,
    /// All declared properties assigned
    Populated,
    /// Name, container and environment callbacks invoked
    AwareNotified,
    /// Init callbacks and final post-processing done
    Initialized,
}

/// Named phase attached to lifecycle failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Instantiation,
    EarlyReference,
    Population,
    AwareCallbacks,
    Initialization,
    PostProcessing,
    Destruction,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Instantiation => "instantiation",
            Phase::EarlyReference => "early reference exposure",
            Phase::Population => "property population",
            Phase::AwareCallbacks => "aware callbacks",
            Phase::Initialization => "initialization",
            Phase::PostProcessing => "post-processing",
            Phase::Destruction => "destruction",
        };
        f.write_str(name)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

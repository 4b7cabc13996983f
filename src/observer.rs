//! Observers for bean lifecycle events.
//!
//! Observers are notified synchronously from the creating thread, so keep
//! implementations lightweight.

use std::sync::Arc;

use crate::error::ContextError;
use crate::lifecycle::LifecycleState;

/// Observer trait for bean lifecycle transitions.
///
/// # Examples
///
/// ```
/// use ferrous_context::{ApplicationContext, BeanDefinition, LifecycleObserver, LifecycleState};
/// use std::sync::{Arc, Mutex};
///
/// #[derive(Default)]
/// struct Recorder(Mutex<Vec<(String, LifecycleState)>>);
///
/// impl LifecycleObserver for Recorder {
///     fn state_changed(&self, bean: &str, state: LifecycleState) {
///         self.0.lock().unwrap().push((bean.to_string(), state));
///     }
/// }
///
/// struct Plain;
/// let recorder = Arc::new(Recorder::default());
/// let _ctx = ApplicationContext::builder()
///     .observer(recorder.clone())
///     .bean(BeanDefinition::builder::<Plain>("plain").supplier(|| Plain).build())
///     .build()
///     .unwrap();
///
/// let states: Vec<_> = recorder.0.lock().unwrap().iter().map(|(_, s)| *s).collect();
/// assert_eq!(
///     states,
///     vec![
///         LifecycleState::Raw,
///         LifecycleState::Populated,
///         LifecycleState::AwareNotified,
///         LifecycleState::Initialized,
///     ]
/// );
/// ```
pub trait LifecycleObserver: Send + Sync {
    /// Called each time a bean enters a new lifecycle state.
    fn state_changed(&self, bean: &str, state: LifecycleState);

    /// Called once a singleton has been stored or a prototype handed out.
    fn bean_created(&self, bean: &str) {
        let _ = bean;
    }

    /// Called when creation of a bean fails. The error still propagates.
    fn creation_failed(&self, bean: &str, error: &ContextError) {
        let _ = (bean, error);
    }
}

/// Collection of observers.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn LifecycleObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn LifecycleObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn state_changed(&self, bean: &str, state: LifecycleState) {
        for observer in &self.observers {
            observer.state_changed(bean, state);
        }
    }

    #[inline]
    pub(crate) fn bean_created(&self, bean: &str) {
        for observer in &self.observers {
            observer.bean_created(bean);
        }
    }

    #[inline]
    pub(crate) fn creation_failed(&self, bean: &str, error: &ContextError) {
        for observer in &self.observers {
            observer.creation_failed(bean, error);
        }
    }
}

/// Observer that emits every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl LifecycleObserver for TracingObserver {
    fn state_changed(&self, bean: &str, state: LifecycleState) {
        tracing::trace!(bean, %state, "lifecycle transition");
    }

    fn bean_created(&self, bean: &str) {
        tracing::debug!(bean, "bean created");
    }

    fn creation_failed(&self, bean: &str, error: &ContextError) {
        tracing::warn!(bean, error = %error, "bean creation failed");
    }
}

//! Ordered post-processor chain consulted at each lifecycle hook.

mod auto_proxy;

pub use auto_proxy::{AutoProxyPostProcessor, ProxyFactory};

use std::sync::Arc;

use tracing::trace;

use crate::definition::BeanDefinition;
use crate::error::ContextResult;
use crate::registry::BeanRef;

/// Order value for processors that should run first.
pub const HIGHEST_PRECEDENCE: i32 = i32::MIN;
/// Order value for processors that should run last.
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

/// Policy object invoked at fixed points of a bean's lifecycle.
///
/// Every hook has an identity default, so an implementation only overrides
/// the hooks it cares about. Processors run in ascending [`order`](Self::order)
/// and, for equal order, in registration order.
///
/// # Hook sequence
///
/// 1. [`before_instantiation`](Self::before_instantiation): may supply the
///    bean outright, skipping construction. Only `after_initialization` then runs.
/// 2. [`determine_candidate_constructors`](Self::determine_candidate_constructors)
/// 3. [`after_instantiation`](Self::after_instantiation): returning `false`
///    skips property population.
/// 4. [`early_bean_reference`](Self::early_bean_reference): only when a
///    circular dependency asks for the bean before it is initialized; called
///    at most once per construction.
/// 5. [`before_initialization`](Self::before_initialization), the bean's init
///    callbacks, then [`after_initialization`](Self::after_initialization).
///
/// When construction of a singleton fails at any step,
/// [`creation_failed`](Self::creation_failed) runs instead of the remaining hooks.
pub trait BeanPostProcessor: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }

    fn before_instantiation(&self, definition: &BeanDefinition) -> ContextResult<Option<BeanRef>> {
        let _ = definition;
        Ok(None)
    }

    fn after_instantiation(&self, bean: &BeanRef, name: &str) -> ContextResult<bool> {
        let _ = (bean, name);
        Ok(true)
    }

    /// Predicts the type name of the bean this definition will finally expose.
    fn predict_bean_type(&self, definition: &BeanDefinition) -> Option<&'static str> {
        let _ = definition;
        None
    }

    /// Ordered preference list of constructor names, or `None` to let the
    /// default selection apply.
    fn determine_candidate_constructors(&self, definition: &BeanDefinition) -> Option<Vec<String>> {
        let _ = definition;
        None
    }

    fn early_bean_reference(&self, bean: BeanRef, name: &str) -> ContextResult<BeanRef> {
        let _ = name;
        Ok(bean)
    }

    fn before_initialization(&self, bean: BeanRef, name: &str) -> ContextResult<BeanRef> {
        let _ = name;
        Ok(bean)
    }

    fn after_initialization(&self, bean: BeanRef, name: &str) -> ContextResult<BeanRef> {
        let _ = name;
        Ok(bean)
    }

    /// Drops any per-bean state kept since an earlier hook for `name`.
    fn creation_failed(&self, name: &str) {
        let _ = name;
    }
}

/// Processor that leaves every bean untouched.
///
/// The chain installs it when no processor is registered, so an empty chain
/// behaves exactly like plain construction.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityPostProcessor;

impl BeanPostProcessor for IdentityPostProcessor {
    fn name(&self) -> &str {
        "IdentityPostProcessor"
    }
}

/// Processors sorted by `(order, registration sequence)`.
pub struct PostProcessorChain {
    processors: Vec<Arc<dyn BeanPostProcessor>>,
}

impl PostProcessorChain {
    pub fn new(processors: Vec<Arc<dyn BeanPostProcessor>>) -> Self {
        let mut indexed: Vec<(usize, Arc<dyn BeanPostProcessor>)> =
            processors.into_iter().enumerate().collect();
        indexed.sort_by_key(|(seq, p)| (p.order(), *seq));
        let mut processors: Vec<_> = indexed.into_iter().map(|(_, p)| p).collect();
        if processors.is_empty() {
            processors.push(Arc::new(IdentityPostProcessor));
        }
        Self { processors }
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Processor names in invocation order.
    pub fn names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// First processor to return a bean wins.
    pub fn before_instantiation(&self, definition: &BeanDefinition) -> ContextResult<Option<BeanRef>> {
        for processor in &self.processors {
            if let Some(bean) = processor.before_instantiation(definition)? {
                trace!(bean = definition.name(), processor = processor.name(), "instantiation short-circuited");
                return Ok(Some(bean));
            }
        }
        Ok(None)
    }

    /// Stops at the first processor that vetoes population.
    pub fn after_instantiation(&self, bean: &BeanRef, name: &str) -> ContextResult<bool> {
        for processor in &self.processors {
            if !processor.after_instantiation(bean, name)? {
                trace!(bean = name, processor = processor.name(), "property population skipped");
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn predict_bean_type(&self, definition: &BeanDefinition) -> Option<&'static str> {
        self.processors
            .iter()
            .find_map(|p| p.predict_bean_type(definition))
    }

    /// First non-`None` proposal wins.
    pub fn determine_candidate_constructors(&self, definition: &BeanDefinition) -> Option<Vec<String>> {
        self.processors
            .iter()
            .find_map(|p| p.determine_candidate_constructors(definition))
    }

    pub fn early_bean_reference(&self, bean: BeanRef, name: &str) -> ContextResult<BeanRef> {
        self.processors
            .iter()
            .try_fold(bean, |bean, p| p.early_bean_reference(bean, name))
    }

    pub fn before_initialization(&self, bean: BeanRef, name: &str) -> ContextResult<BeanRef> {
        self.processors
            .iter()
            .try_fold(bean, |bean, p| p.before_initialization(bean, name))
    }

    pub fn after_initialization(&self, bean: BeanRef, name: &str) -> ContextResult<BeanRef> {
        self.processors
            .iter()
            .try_fold(bean, |bean, p| p.after_initialization(bean, name))
    }

    /// Reaches every processor.
    pub fn creation_failed(&self, name: &str) {
        for processor in &self.processors {
            processor.creation_failed(name);
        }
    }
}

impl Default for PostProcessorChain {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl std::fmt::Debug for PostProcessorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostProcessorChain")
            .field("processors", &self.names())
            .finish()
    }
}

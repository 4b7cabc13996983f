//! Post-processor that wraps selected beans in proxies exactly once.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::ContextResult;
use crate::processor::{BeanPostProcessor, LOWEST_PRECEDENCE};
use crate::registry::{bean_address, BeanRef};

/// Decides which beans get proxied and builds the proxies.
pub trait ProxyFactory: Send + Sync {
    fn should_proxy(&self, name: &str, bean: &BeanRef) -> bool;

    fn create_proxy(&self, name: &str, target: BeanRef) -> ContextResult<BeanRef>;
}

/// Wraps matching beans either when an early reference is requested or after
/// initialization, never both.
///
/// When a circular dependency pulls an early reference, the proxy is created
/// then and the raw bean's address is remembered. The later
/// `after_initialization` call sees the same raw bean and passes it through,
/// which tells the context to keep the early proxy as the authoritative
/// reference.
///
/// # Examples
///
/// ```
/// use ferrous_context::{
///     ApplicationContext, AutoProxyPostProcessor, BeanDefinition, BeanRef, ContextResult,
///     ProxyFactory,
/// };
/// use std::sync::Arc;
///
/// struct Audited(BeanRef);
/// struct AuditAll;
///
/// impl ProxyFactory for AuditAll {
///     fn should_proxy(&self, name: &str, _bean: &BeanRef) -> bool {
///         name.ends_with("Service")
///     }
///     fn create_proxy(&self, _name: &str, target: BeanRef) -> ContextResult<BeanRef> {
///         Ok(Arc::new(Audited(target)))
///     }
/// }
///
/// struct OrderService;
///
/// let ctx = ApplicationContext::builder()
///     .post_processor(Arc::new(AutoProxyPostProcessor::new(Arc::new(AuditAll))))
///     .bean(BeanDefinition::builder::<OrderService>("orderService").supplier(|| OrderService).build())
///     .build()
///     .unwrap();
///
/// use ferrous_context::BeanFactory;
/// let bean = ctx.get_bean("orderService").unwrap();
/// assert!(bean.downcast_ref::<Audited>().is_some());
/// ```
pub struct AutoProxyPostProcessor {
    factory: Arc<dyn ProxyFactory>,
    order: i32,
    early_proxy_references: Mutex<HashMap<String, usize>>,
}

impl AutoProxyPostProcessor {
    pub fn new(factory: Arc<dyn ProxyFactory>) -> Self {
        Self {
            factory,
            order: LOWEST_PRECEDENCE,
            early_proxy_references: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    fn wrap_if_necessary(&self, bean: BeanRef, name: &str) -> ContextResult<BeanRef> {
        if !self.factory.should_proxy(name, &bean) {
            return Ok(bean);
        }
        debug!(bean = name, "creating proxy");
        self.factory.create_proxy(name, bean)
    }
}

impl BeanPostProcessor for AutoProxyPostProcessor {
    fn name(&self) -> &str {
        "AutoProxyPostProcessor"
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn early_bean_reference(&self, bean: BeanRef, name: &str) -> ContextResult<BeanRef> {
        self.early_proxy_references
            .lock()
            .insert(name.to_string(), bean_address(&bean));
        self.wrap_if_necessary(bean, name)
    }

    fn after_initialization(&self, bean: BeanRef, name: &str) -> ContextResult<BeanRef> {
        let early = self.early_proxy_references.lock().remove(name);
        if early == Some(bean_address(&bean)) {
            return Ok(bean);
        }
        self.wrap_if_necessary(bean, name)
    }

    fn creation_failed(&self, name: &str) {
        if self.early_proxy_references.lock().remove(name).is_some() {
            trace!(bean = name, "dropped early proxy reference of failed bean");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::same_bean;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Proxy(#[allow(dead_code)] BeanRef);

    #[derive(Default)]
    struct Counting {
        created: AtomicUsize,
    }

    impl ProxyFactory for Counting {
        fn should_proxy(&self, _name: &str, _bean: &BeanRef) -> bool {
            true
        }
        fn create_proxy(&self, _name: &str, target: BeanRef) -> ContextResult<BeanRef> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Proxy(target)))
        }
    }

    #[test]
    fn early_proxy_is_not_wrapped_again() {
        let factory = Arc::new(Counting::default());
        let processor = AutoProxyPostProcessor::new(factory.clone());
        let raw: BeanRef = Arc::new(1u8);

        let early = processor.early_bean_reference(raw.clone(), "a").unwrap();
        assert!(early.downcast_ref::<Proxy>().is_some());

        let after = processor.after_initialization(raw.clone(), "a").unwrap();
        assert!(same_bean(&after, &raw));
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn replaced_bean_is_wrapped_after_initialization() {
        let factory = Arc::new(Counting::default());
        let processor = AutoProxyPostProcessor::new(factory.clone());
        let raw: BeanRef = Arc::new(1u8);
        let other: BeanRef = Arc::new(2u8);

        processor.early_bean_reference(raw, "a").unwrap();
        let after = processor.after_initialization(other, "a").unwrap();
        assert!(after.downcast_ref::<Proxy>().is_some());
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_creation_forgets_early_reference() {
        let factory = Arc::new(Counting::default());
        let processor = AutoProxyPostProcessor::new(factory.clone());
        let raw: BeanRef = Arc::new(1u8);

        processor.early_bean_reference(raw.clone(), "a").unwrap();
        processor.creation_failed("a");

        // Same allocation handed back on a later attempt must still be wrapped
        let after = processor.after_initialization(raw, "a").unwrap();
        assert!(after.downcast_ref::<Proxy>().is_some());
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert!(processor.early_proxy_references.lock().is_empty());
    }
}

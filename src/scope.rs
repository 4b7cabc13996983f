//! Bean scope definitions.

/// Bean scopes controlling instance caching behavior
///
/// # Examples
///
/// ```rust
/// use ferrous_context::{ApplicationContext, BeanDefinition, BeanFactoryExt, BeanScope};
/// use std::sync::Arc;
///
/// struct Counter;
///
/// let ctx = ApplicationContext::builder()
///     .bean(BeanDefinition::builder::<Counter>("shared").supplier(|| Counter).build())
///     .bean(
///         BeanDefinition::builder::<Counter>("fresh")
///             .scope(BeanScope::Prototype)
///             .supplier(|| Counter)
///             .build(),
///     )
///     .build()
///     .unwrap();
///
/// let a = ctx.get_bean_as::<Counter>("shared").unwrap();
/// let b = ctx.get_bean_as::<Counter>("shared").unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// let c = ctx.get_bean_as::<Counter>("fresh").unwrap();
/// let d = ctx.get_bean_as::<Counter>("fresh").unwrap();
/// assert!(!Arc::ptr_eq(&c, &d));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BeanScope {
    /// One instance per context, created once and cached
    ///
    /// Singletons are the only beans that can expose an early reference to
    /// break a circular property dependency.
    #[default]
    Singleton,
    /// New instance on every lookup, never cached
    ///
    /// The context does not track prototypes after handing them out, so no
    /// destroy callbacks run for them.
    Prototype,
}

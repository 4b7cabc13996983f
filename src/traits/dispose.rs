//! Destruction callback trait.

use crate::error::ContextResult;

/// Trait for beans that release resources when their context closes.
///
/// Destroy callbacks run in LIFO order of singleton completion when
/// [`ApplicationContext::close`](crate::ApplicationContext::close) is called.
/// Prototype beans are never destroyed by the context.
///
/// # Examples
///
/// ```
/// use ferrous_context::{ApplicationContext, BeanDefinition, ContextResult, DisposableBean};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Pool {
///     closed: AtomicBool,
/// }
///
/// impl DisposableBean for Pool {
///     fn destroy(&self) -> ContextResult<()> {
///         self.closed.store(true, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// let ctx = ApplicationContext::builder()
///     .bean(BeanDefinition::builder::<Pool>("pool").supplier(Pool::default).disposable().build())
///     .build()
///     .unwrap();
/// ctx.close();
/// ```
pub trait DisposableBean: Send + Sync + 'static {
    /// Release resources held by this bean.
    fn destroy(&self) -> ContextResult<()>;
}

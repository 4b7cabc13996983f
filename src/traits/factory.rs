//! Bean lookup traits.

use std::any::Any;
use std::sync::Arc;

use crate::error::{ContextError, ContextResult};
use crate::registry::BeanRef;

/// Object-safe bean lookup by name.
///
/// Implemented by [`ApplicationContext`](crate::ApplicationContext). Lookups
/// fall back to the parent context when the name is not defined locally.
/// Most callers want [`BeanFactoryExt::get_bean_as`] for typed access.
pub trait BeanFactory: Send + Sync {
    /// Returns the bean registered under `name`, creating it if needed.
    ///
    /// The returned reference is the authoritative one: if a post-processor
    /// wrapped the bean, the wrapper is returned.
    fn get_bean(&self, name: &str) -> ContextResult<BeanRef>;

    /// Whether this factory or an ancestor can supply a bean named `name`.
    fn contains_bean(&self, name: &str) -> bool;

    /// Whether `name` is a shared singleton.
    fn is_singleton(&self, name: &str) -> ContextResult<bool>;

    /// Whether `name` produces a new instance on every lookup.
    fn is_prototype(&self, name: &str) -> ContextResult<bool>;

    /// Type name the bean is expected to have, as predicted by post-processors
    /// or declared by its definition.
    fn bean_type_name(&self, name: &str) -> ContextResult<&'static str>;
}

/// Typed lookups built on [`BeanFactory`].
pub trait BeanFactoryExt: BeanFactory {
    /// Looks up `name` and downcasts it to `T`.
    ///
    /// Fails with [`ContextError::BeanNotOfRequiredType`] if the authoritative
    /// reference is not a `T`, for example when it has been wrapped in a proxy.
    fn get_bean_as<T: Any + Send + Sync>(&self, name: &str) -> ContextResult<Arc<T>> {
        let bean = self.get_bean(name)?;
        bean.downcast::<T>().map_err(|_| ContextError::BeanNotOfRequiredType {
            bean: name.to_string(),
            required: std::any::type_name::<T>(),
            actual: self
                .bean_type_name(name)
                .map(str::to_string)
                .unwrap_or_else(|_| "unknown".into()),
        })
    }

    /// Like [`get_bean_as`](Self::get_bean_as) but returns `None` when no
    /// such bean exists. Other failures still propagate.
    fn find_bean_as<T: Any + Send + Sync>(&self, name: &str) -> ContextResult<Option<Arc<T>>> {
        if !self.contains_bean(name) {
            return Ok(None);
        }
        self.get_bean_as::<T>(name).map(Some)
    }
}

impl<F: BeanFactory + ?Sized> BeanFactoryExt for F {}

//! Association between a component and its owning context.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{ApplicationContext, ContextKind, MessageSource, MessageSourceAccessor};
use crate::error::{ContextError, ContextResult};

#[derive(Clone)]
struct Binding {
    context: Arc<ApplicationContext>,
    accessor: Arc<MessageSourceAccessor>,
}

/// Storage for a component's context binding.
///
/// Embed one in a component and return it from [`ContextSupport::binder`].
#[derive(Default)]
pub struct ContextBinder {
    binding: Mutex<Option<Binding>>,
}

impl ContextBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bound(&self) -> bool {
        self.binding.lock().is_some()
    }

    fn context(&self) -> Option<Arc<ApplicationContext>> {
        self.binding.lock().as_ref().map(|b| b.context.clone())
    }

    fn accessor(&self) -> Option<Arc<MessageSourceAccessor>> {
        self.binding.lock().as_ref().map(|b| b.accessor.clone())
    }
}

impl std::fmt::Debug for ContextBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBinder")
            .field(
                "context",
                &self.context().map(|c| c.display_name().to_string()),
            )
            .finish()
    }
}

/// Components that know their owning [`ApplicationContext`].
///
/// A component is bound at most once. Binding again to the same context is a
/// no-op; binding to a different one fails with
/// [`ContextError::ReboundContainer`]. The
/// [`init_application_context`](Self::init_application_context) hook runs
/// once, right after the first successful binding.
///
/// # Examples
///
/// ```
/// use ferrous_context::{
///     ApplicationContext, BeanDefinition, BeanFactoryExt, ContextBinder, ContextError,
///     ContextSupport,
/// };
///
/// #[derive(Default)]
/// struct Reporter {
///     binder: ContextBinder,
/// }
///
/// impl ContextSupport for Reporter {
///     fn binder(&self) -> &ContextBinder {
///         &self.binder
///     }
/// }
///
/// let ctx = ApplicationContext::builder()
///     .bean(BeanDefinition::builder::<Reporter>("reporter").supplier(Reporter::default).context_aware().build())
///     .build()
///     .unwrap();
///
/// let reporter = ctx.get_bean_as::<Reporter>("reporter").unwrap();
/// assert!(reporter.set_application_context(Some(ctx.clone())).is_ok());
///
/// let other = ApplicationContext::builder().build().unwrap();
/// assert!(matches!(
///     reporter.set_application_context(Some(other)),
///     Err(ContextError::ReboundContainer { .. })
/// ));
/// ```
pub trait ContextSupport: Send + Sync {
    fn binder(&self) -> &ContextBinder;

    /// Whether this component refuses to run without a context.
    fn is_context_required(&self) -> bool {
        false
    }

    /// Kind of context this component accepts.
    fn required_context_kind(&self) -> ContextKind {
        ContextKind::Generic
    }

    /// One-time hook run after the first successful binding.
    fn init_application_context(&self, context: &Arc<ApplicationContext>) -> ContextResult<()> {
        let _ = context;
        Ok(())
    }

    /// Name used in error messages and logs.
    fn consumer_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Binds, re-binds or clears the owning context.
    fn set_application_context(&self, context: Option<Arc<ApplicationContext>>) -> ContextResult<()> {
        let mut binding = self.binder().binding.lock();

        let Some(context) = context else {
            if !self.is_context_required() {
                if binding.take().is_some() {
                    debug!(consumer = self.consumer_name(), "cleared application context binding");
                }
                return Ok(());
            }
            return Err(match binding.as_ref() {
                Some(current) => ContextError::ReboundContainer {
                    current: current.context.display_name().to_string(),
                    passed: "none".into(),
                },
                None => ContextError::InvalidContainerType {
                    required: self.required_context_kind().to_string(),
                    actual: "none".into(),
                },
            });
        };

        if let Some(current) = binding.as_ref() {
            if Arc::ptr_eq(&current.context, &context) {
                return Ok(());
            }
            return Err(ContextError::ReboundContainer {
                current: current.context.display_name().to_string(),
                passed: context.display_name().to_string(),
            });
        }

        let required = self.required_context_kind();
        if !context.kind().satisfies(required) {
            return Err(ContextError::InvalidContainerType {
                required: required.to_string(),
                actual: context.kind().to_string(),
            });
        }

        let source: Arc<dyn MessageSource> = context.clone();
        *binding = Some(Binding {
            context: context.clone(),
            accessor: Arc::new(MessageSourceAccessor::new(source)),
        });
        drop(binding);

        debug!(consumer = self.consumer_name(), context = context.display_name(), "bound to application context");
        self.init_application_context(&context)
    }

    /// The bound context. Fails with [`ContextError::NotBound`] only when a
    /// context is required and none is bound.
    fn application_context(&self) -> ContextResult<Option<Arc<ApplicationContext>>> {
        let context = self.binder().context();
        if context.is_none() && self.is_context_required() {
            return Err(ContextError::NotBound {
                consumer: self.consumer_name().to_string(),
            });
        }
        Ok(context)
    }

    /// The bound context, failing whenever none is bound.
    fn obtain_application_context(&self) -> ContextResult<Arc<ApplicationContext>> {
        self.binder().context().ok_or_else(|| ContextError::NotBound {
            consumer: self.consumer_name().to_string(),
        })
    }

    /// Message accessor scoped to the bound context.
    fn message_accessor(&self) -> ContextResult<Option<Arc<MessageSourceAccessor>>> {
        let accessor = self.binder().accessor();
        if accessor.is_none() && self.is_context_required() {
            return Err(ContextError::NotBound {
                consumer: self.consumer_name().to_string(),
            });
        }
        Ok(accessor)
    }
}

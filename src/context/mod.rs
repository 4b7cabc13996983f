//! The application context: bean container, lifecycle coordinator and
//! message source.

mod binder;
mod builder;
mod factory;
mod message;

pub use binder::{ContextBinder, ContextSupport};
pub use builder::ContextBuilder;
pub use message::{format_message, MessageSource, MessageSourceAccessor, StaticMessageSource};

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tracing::{debug, info, trace, warn};

use crate::definition::BeanDefinition;
use crate::environment::Environment;
use crate::error::{ContextError, ContextResult};
use crate::internal::DisposeBag;
use crate::locale::Locale;
use crate::observer::Observers;
use crate::processor::PostProcessorChain;
use crate::registry::{BeanRef, CreationState, DefinitionRegistry, DependencyGraph, SingletonCache};
use crate::settings::ContextSettings;
use crate::traits::BeanFactory;

/// Bean name the context consults for message lookups.
pub const MESSAGE_SOURCE_BEAN_NAME: &str = "messageSource";

/// Capability class of a context. Web contexts also satisfy generic requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Generic,
    Web,
}

impl ContextKind {
    /// Whether a context of this kind can be used where `required` is expected.
    pub fn satisfies(self, required: ContextKind) -> bool {
        self == required || required == ContextKind::Generic
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextKind::Generic => f.write_str("ApplicationContext"),
            ContextKind::Web => f.write_str("WebApplicationContext"),
        }
    }
}

/// Lifecycle of the context itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextStatus {
    Uninitialized,
    Active,
    Closed,
}

/// Hierarchical bean container.
///
/// Created through [`ContextBuilder`]. Definitions can be added until
/// [`refresh`](Self::refresh) seals them and pre-instantiates every non-lazy
/// singleton. Lookups that miss locally fall back to the parent context.
///
/// # Examples
///
/// ```
/// use ferrous_context::{ApplicationContext, BeanDefinition, BeanFactory, BeanFactoryExt};
/// use std::sync::Arc;
///
/// struct Config {
///     url: String,
/// }
///
/// let parent = ApplicationContext::builder()
///     .singleton("config", Config { url: "db://parent".into() })
///     .build()
///     .unwrap();
///
/// let child = ApplicationContext::builder()
///     .parent(parent.clone())
///     .build()
///     .unwrap();
///
/// assert!(child.contains_bean("config"));
/// assert_eq!(child.get_bean_as::<Config>("config").unwrap().url, "db://parent");
/// assert!(Arc::ptr_eq(child.parent().unwrap(), &parent));
/// ```
pub struct ApplicationContext {
    id: String,
    display_name: String,
    application_name: String,
    serial: u64,
    kind: ContextKind,
    parent: Option<Arc<ApplicationContext>>,
    startup: RwLock<Option<DateTime<Utc>>>,
    status: RwLock<ContextStatus>,
    settings: ContextSettings,
    environment: Arc<Environment>,
    definitions: RwLock<DefinitionRegistry>,
    processors: Arc<PostProcessorChain>,
    singletons: RwLock<SingletonCache>,
    creation: ReentrantMutex<RefCell<CreationState>>,
    dependencies: Mutex<DependencyGraph>,
    disposers: Mutex<DisposeBag>,
    observers: Observers,
    self_ref: Weak<ApplicationContext>,
}

impl ApplicationContext {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// When the context was last refreshed.
    pub fn startup_date(&self) -> Option<DateTime<Utc>> {
        *self.startup.read()
    }

    pub fn parent(&self) -> Option<&Arc<ApplicationContext>> {
        self.parent.as_ref()
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    pub fn status(&self) -> ContextStatus {
        *self.status.read()
    }

    pub fn is_active(&self) -> bool {
        self.status() == ContextStatus::Active
    }

    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.environment
    }

    pub fn post_processors(&self) -> &PostProcessorChain {
        &self.processors
    }

    /// Seals the definitions and creates every non-lazy singleton in
    /// registration order.
    ///
    /// If any singleton fails, the ones already created are destroyed, the
    /// context returns to [`ContextStatus::Uninitialized`] and the error is
    /// returned.
    pub fn refresh(&self) -> ContextResult<()> {
        {
            let mut status = self.status.write();
            match *status {
                ContextStatus::Closed => {
                    return Err(ContextError::ContextState(format!(
                        "{} has been closed already",
                        self.display_name
                    )))
                }
                ContextStatus::Active => {
                    return Err(ContextError::ContextState(format!(
                        "{} does not support multiple refresh attempts",
                        self.display_name
                    )))
                }
                ContextStatus::Uninitialized => *status = ContextStatus::Active,
            }
        }
        *self.startup.write() = Some(Utc::now());
        info!(context = %self.display_name, "refreshing application context");

        let names = {
            let mut definitions = self.definitions.write();
            definitions.seal();
            definitions.names()
        };

        for name in names {
            let eager = self
                .definitions
                .read()
                .get(&name)
                .map(|d| d.is_singleton() && !d.is_lazy_init())
                .unwrap_or(false);
            if !eager {
                continue;
            }
            if let Err(error) = self.do_get_bean(&name) {
                warn!(context = %self.display_name, bean = %name, error = %error,
                    "exception encountered during context initialization, cancelling refresh");
                self.destroy_singletons();
                *self.status.write() = ContextStatus::Uninitialized;
                return Err(error);
            }
        }
        debug!(context = %self.display_name, singletons = self.singletons.read().names().len(),
            "application context refreshed");
        Ok(())
    }

    /// Runs destroy callbacks in reverse creation order and releases all
    /// singletons. Calling it again is a no-op.
    pub fn close(&self) {
        {
            let mut status = self.status.write();
            if *status == ContextStatus::Closed {
                return;
            }
            *status = ContextStatus::Closed;
        }
        info!(context = %self.display_name, "closing application context");
        self.destroy_singletons();
    }

    fn destroy_singletons(&self) {
        let mut bag = std::mem::take(&mut *self.disposers.lock());
        if !bag.is_empty() {
            debug!(context = %self.display_name, callbacks = bag.len(), "running destroy callbacks");
            for (name, error) in bag.run_all_reverse() {
                warn!(bean = %name, error = %error, "destroy callback failed");
            }
        }
        self.singletons.write().clear();
        self.dependencies.lock().clear();
    }

    /// Adds a definition before the context is refreshed.
    pub fn register_bean_definition(&self, definition: BeanDefinition) -> ContextResult<()> {
        self.definitions
            .write()
            .insert(definition, self.settings.allow_bean_definition_overriding)
    }

    /// Registers a fully built object as a singleton. It receives no
    /// lifecycle callbacks.
    pub fn register_singleton<T: Any + Send + Sync>(&self, name: &str, value: T) -> ContextResult<()> {
        self.register_singleton_ref(name, Arc::new(value), std::any::type_name::<T>())
    }

    pub fn register_singleton_ref(
        &self,
        name: &str,
        bean: BeanRef,
        type_name: &'static str,
    ) -> ContextResult<()> {
        if self.status() == ContextStatus::Closed {
            return Err(ContextError::ContextState(format!(
                "cannot register singleton '{name}' on closed context {}",
                self.display_name
            )));
        }
        let mut singletons = self.singletons.write();
        if singletons.contains(name) {
            return Err(ContextError::ContextState(format!(
                "could not register object under bean name '{name}': there is already an object bound"
            )));
        }
        singletons.insert(name, bean, type_name);
        Ok(())
    }

    pub fn bean_definition(&self, name: &str) -> Option<Arc<BeanDefinition>> {
        self.definitions.read().get(name)
    }

    /// Local definition names in registration order.
    pub fn bean_definition_names(&self) -> Vec<String> {
        self.definitions.read().names()
    }

    pub fn bean_definition_count(&self) -> usize {
        self.definitions.read().len()
    }

    /// Whether this context, ignoring its parent, defines or holds `name`.
    pub fn contains_local_bean(&self, name: &str) -> bool {
        self.singletons.read().contains(name) || self.definitions.read().contains(name)
    }

    /// Names of completed singletons in creation order.
    pub fn singleton_names(&self) -> Vec<String> {
        self.singletons.read().names().to_vec()
    }

    /// Beans known to hold a reference to `name`.
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.dependencies.lock().dependents_of(name)
    }

    /// Local beans whose authoritative reference is a `T`, in registration
    /// order. Lazy definitions of other types are not instantiated.
    pub fn beans_of_type<T: Any + Send + Sync>(&self) -> ContextResult<Vec<(String, Arc<T>)>> {
        self.ensure_active()?;
        let all = self.definitions.read().names();
        let mut names: Vec<String> = all
            .into_iter()
            .filter(|name| {
                self.bean_definition(name)
                    .map(|d| d.type_id() == TypeId::of::<T>())
                    .unwrap_or(false)
            })
            .collect();
        for name in self.singleton_names() {
            if !names.contains(&name) && !self.definitions.read().contains(&name) {
                names.push(name);
            }
        }
        let mut beans = Vec::new();
        for name in names {
            if let Ok(bean) = self.do_get_bean(&name)?.downcast::<T>() {
                beans.push((name, bean));
            }
        }
        Ok(beans)
    }

    fn ensure_active(&self) -> ContextResult<()> {
        match self.status() {
            ContextStatus::Active => Ok(()),
            ContextStatus::Closed => Err(ContextError::ContextState(format!(
                "{} has been closed already",
                self.display_name
            ))),
            ContextStatus::Uninitialized => Err(ContextError::ContextState(format!(
                "{} has not been refreshed yet",
                self.display_name
            ))),
        }
    }

    fn self_arc(&self) -> ContextResult<Arc<ApplicationContext>> {
        self.self_ref
            .upgrade()
            .ok_or_else(|| ContextError::ContextState(format!("{} is being dropped", self.display_name)))
    }

    fn local_message_source(&self) -> Option<Arc<dyn MessageSource>> {
        if !self.contains_local_bean(MESSAGE_SOURCE_BEAN_NAME) || !self.is_active() {
            return None;
        }
        match self.do_get_bean(MESSAGE_SOURCE_BEAN_NAME) {
            Ok(bean) => {
                if let Some(source) = bean.downcast_ref::<Arc<dyn MessageSource>>() {
                    return Some(source.clone());
                }
                match bean.downcast::<StaticMessageSource>() {
                    Ok(source) => Some(source),
                    Err(_) => {
                        trace!("bean '{MESSAGE_SOURCE_BEAN_NAME}' is not a message source");
                        None
                    }
                }
            }
            Err(error) => {
                trace!(error = %error, "message source unavailable");
                None
            }
        }
    }

    /// Debug dump of definitions and singletons.
    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let _ = writeln!(out, "{} [{}] {:?}", self.display_name, self.id, self.status());
        for name in self.bean_definition_names() {
            if let Some(def) = self.bean_definition(&name) {
                let created = self.singletons.read().contains(&name);
                let _ = writeln!(
                    out,
                    "  {name}: {} {:?}{}{}",
                    def.type_name(),
                    def.scope(),
                    if def.is_lazy_init() { " lazy" } else { "" },
                    if created { " (created)" } else { "" }
                );
            }
        }
        if let Some(parent) = &self.parent {
            let _ = writeln!(out, "  parent: {}", parent.display_name());
        }
        out
    }
}

impl BeanFactory for ApplicationContext {
    fn get_bean(&self, name: &str) -> ContextResult<BeanRef> {
        self.ensure_active()?;
        self.do_get_bean(name)
    }

    fn contains_bean(&self, name: &str) -> bool {
        self.contains_local_bean(name)
            || self.parent.as_ref().is_some_and(|p| p.contains_bean(name))
    }

    fn is_singleton(&self, name: &str) -> ContextResult<bool> {
        if let Some(def) = self.bean_definition(name) {
            return Ok(def.is_singleton());
        }
        if self.singletons.read().contains(name) {
            return Ok(true);
        }
        match &self.parent {
            Some(parent) => parent.is_singleton(name),
            None => Err(ContextError::NoSuchBean(name.to_string())),
        }
    }

    fn is_prototype(&self, name: &str) -> ContextResult<bool> {
        if let Some(def) = self.bean_definition(name) {
            return Ok(def.is_prototype());
        }
        if self.singletons.read().contains(name) {
            return Ok(false);
        }
        match &self.parent {
            Some(parent) => parent.is_prototype(name),
            None => Err(ContextError::NoSuchBean(name.to_string())),
        }
    }

    fn bean_type_name(&self, name: &str) -> ContextResult<&'static str> {
        if let Some(def) = self.bean_definition(name) {
            return Ok(self
                .processors
                .predict_bean_type(&def)
                .unwrap_or(def.type_name()));
        }
        if let Some(type_name) = self.singletons.read().type_name(name) {
            return Ok(type_name);
        }
        match &self.parent {
            Some(parent) => parent.bean_type_name(name),
            None => Err(ContextError::NoSuchBean(name.to_string())),
        }
    }
}

impl MessageSource for ApplicationContext {
    /// Consults the local `messageSource` bean, then the parent context.
    fn get_message(&self, code: &str, args: &[&str], locale: &Locale) -> Option<String> {
        if let Some(message) = self
            .local_message_source()
            .and_then(|source| source.get_message(code, args, locale))
        {
            return Some(message);
        }
        self.parent
            .as_ref()
            .and_then(|parent| parent.get_message(code, args, locale))
    }
}

impl fmt::Debug for ApplicationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationContext")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("kind", &self.kind)
            .field("status", &self.status())
            .field("definitions", &self.bean_definition_count())
            .field("parent", &self.parent.as_ref().map(|p| p.display_name().to_string()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::BeanFactoryExt;

    #[test]
    fn web_kind_satisfies_generic() {
        assert!(ContextKind::Web.satisfies(ContextKind::Generic));
        assert!(ContextKind::Web.satisfies(ContextKind::Web));
        assert!(!ContextKind::Generic.satisfies(ContextKind::Web));
    }

    #[test]
    fn lookups_require_refresh() {
        let ctx = ApplicationContext::builder()
            .singleton("n", 1u32)
            .prepare()
            .unwrap();
        assert!(matches!(ctx.get_bean("n"), Err(ContextError::ContextState(_))));
        ctx.refresh().unwrap();
        assert_eq!(*ctx.get_bean_as::<u32>("n").unwrap(), 1);
        assert!(ctx.refresh().is_err());
        ctx.close();
        assert!(matches!(ctx.get_bean("n"), Err(ContextError::ContextState(_))));
    }
}

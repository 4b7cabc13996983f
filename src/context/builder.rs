//! Builder collecting everything a context needs before it is refreshed.

use std::any::Any;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use uuid::Uuid;

use super::{ApplicationContext, ContextKind, ContextStatus};
use crate::definition::BeanDefinition;
use crate::environment::{Environment, PropertySource};
use crate::error::ContextResult;
use crate::internal::DisposeBag;
use crate::observer::{LifecycleObserver, Observers};
use crate::processor::{BeanPostProcessor, PostProcessorChain};
use crate::registry::{BeanRef, CreationState, DefinitionRegistry, DependencyGraph, SingletonCache};
use crate::settings::ContextSettings;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Collects definitions, singletons, post-processors and property sources
/// for a new [`ApplicationContext`].
///
/// [`build`](Self::build) returns a refreshed context. Use
/// [`prepare`](Self::prepare) to get an unrefreshed one that still accepts
/// definitions.
pub struct ContextBuilder {
    settings: ContextSettings,
    kind: ContextKind,
    parent: Option<Arc<ApplicationContext>>,
    definitions: Vec<BeanDefinition>,
    singletons: Vec<(String, BeanRef, &'static str)>,
    processors: Vec<Arc<dyn BeanPostProcessor>>,
    property_sources: Vec<Arc<dyn PropertySource>>,
    profiles: Vec<String>,
    observers: Observers,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            settings: ContextSettings::default(),
            kind: ContextKind::Generic,
            parent: None,
            definitions: Vec::new(),
            singletons: Vec::new(),
            processors: Vec::new(),
            property_sources: Vec::new(),
            profiles: Vec::new(),
            observers: Observers::new(),
        }
    }

    /// Replaces all settings at once.
    pub fn settings(mut self, settings: ContextSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.settings.id = Some(id.into());
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.settings.display_name = Some(name.into());
        self
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.settings.application_name = name.into();
        self
    }

    /// Marks the context as a web context, as required by the dispatcher.
    pub fn web(mut self) -> Self {
        self.kind = ContextKind::Web;
        self
    }

    pub fn kind(mut self, kind: ContextKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn parent(mut self, parent: Arc<ApplicationContext>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn bean(mut self, definition: BeanDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// Registers an already built object under `name`.
    pub fn singleton<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.singletons
            .push((name.into(), Arc::new(value), std::any::type_name::<T>()));
        self
    }

    pub fn post_processor(mut self, processor: Arc<dyn BeanPostProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    pub fn property_source(mut self, source: Arc<dyn PropertySource>) -> Self {
        self.property_sources.push(source);
        self
    }

    pub fn active_profile(mut self, profile: impl Into<String>) -> Self {
        self.profiles.push(profile.into());
        self
    }

    pub fn observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    pub fn allow_circular_references(mut self, allow: bool) -> Self {
        self.settings.allow_circular_references = allow;
        self
    }

    pub fn allow_raw_injection_despite_wrapping(mut self, allow: bool) -> Self {
        self.settings.allow_raw_injection_despite_wrapping = allow;
        self
    }

    pub fn allow_bean_definition_overriding(mut self, allow: bool) -> Self {
        self.settings.allow_bean_definition_overriding = allow;
        self
    }

    /// Creates the context without refreshing it.
    pub fn prepare(self) -> ContextResult<Arc<ApplicationContext>> {
        let serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
        let settings = self.settings;
        let id = settings
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let display_name = settings
            .display_name
            .clone()
            .unwrap_or_else(|| format!("{}@{:x}", self.kind, serial));

        let mut profiles = settings.active_profiles.clone();
        profiles.extend(self.profiles);
        let environment = Arc::new(Environment::new(self.property_sources, profiles));

        let mut definitions = DefinitionRegistry::default();
        for definition in self.definitions {
            definitions.insert(definition, settings.allow_bean_definition_overriding)?;
        }

        let kind = self.kind;
        let parent = self.parent;
        let observers = self.observers;
        let processors = Arc::new(PostProcessorChain::new(self.processors));
        let application_name = settings.application_name.clone();

        let context = Arc::new_cyclic(|self_ref| ApplicationContext {
            id,
            display_name,
            application_name,
            serial,
            kind,
            parent,
            startup: RwLock::new(None),
            status: RwLock::new(ContextStatus::Uninitialized),
            settings,
            environment,
            definitions: RwLock::new(definitions),
            processors,
            singletons: RwLock::new(SingletonCache::default()),
            creation: ReentrantMutex::new(RefCell::new(CreationState::default())),
            dependencies: Mutex::new(DependencyGraph::default()),
            disposers: Mutex::new(DisposeBag::default()),
            observers,
            self_ref: self_ref.clone(),
        });

        for (name, bean, type_name) in self.singletons {
            context.register_singleton_ref(&name, bean, type_name)?;
        }
        Ok(context)
    }

    /// Creates and refreshes the context.
    pub fn build(self) -> ContextResult<Arc<ApplicationContext>> {
        let context = self.prepare()?;
        context.refresh()?;
        Ok(context)
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

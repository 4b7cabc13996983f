//! Bean creation: instantiation, early references, population, aware
//! callbacks and initialization.
//!
//! Singleton creation is serialized by the context's re-entrant creation lock.
//! A singleton under construction registers an early-reference factory right
//! after instantiation; a dependent that asks for it before it is initialized
//! triggers that factory once and every later dependent sees the cached result.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::ApplicationContext;
use crate::definition::{BeanDefinition, ConstructorArgs, ConstructorSpec};
use crate::error::{ContextError, ContextResult};
use crate::internal::creation;
use crate::internal::CreationGuard;
use crate::lifecycle::{LifecycleState, Phase};
use crate::registry::{same_bean, BeanRef, EarlyFactory};
use crate::scope::BeanScope;

impl ApplicationContext {
    /// Resolves `name` locally or through the parent chain.
    pub(crate) fn do_get_bean(&self, name: &str) -> ContextResult<BeanRef> {
        if let Some(bean) = self.singletons.read().get(name) {
            return Ok(bean);
        }

        let definition = self.definitions.read().get(name);
        let Some(definition) = definition else {
            return match &self.parent {
                Some(parent) => {
                    trace!(bean = name, parent = parent.display_name(), "delegating lookup to parent");
                    crate::traits::BeanFactory::get_bean(parent.as_ref(), name)
                }
                None => Err(ContextError::NoSuchBean(name.to_string())),
            };
        };

        for dependency in definition.depends_on() {
            if self.dependencies.lock().is_dependent(name, dependency) {
                return Err(ContextError::CircularReference {
                    path: vec![name.to_string(), dependency.clone(), name.to_string()],
                    reason: "circular depends-on relationship".into(),
                });
            }
            self.dependencies.lock().register(dependency, name);
            self.do_get_bean(dependency)
                .map_err(|e| ContextError::in_phase(name, Phase::Instantiation, e))?;
        }

        match definition.scope() {
            BeanScope::Singleton => self.get_singleton(&definition),
            BeanScope::Prototype => {
                let _guard = CreationGuard::enter(self.serial, name)?;
                match self.create_bean(&definition) {
                    Ok(bean) => {
                        self.observers.bean_created(name);
                        Ok(bean)
                    }
                    Err(error) => {
                        self.observers.creation_failed(name, &error);
                        Err(error)
                    }
                }
            }
        }
    }

    fn get_singleton(&self, definition: &Arc<BeanDefinition>) -> ContextResult<BeanRef> {
        let name = definition.name();
        let creation = self.creation.lock();

        if let Some(bean) = self.singletons.read().get(name) {
            return Ok(bean);
        }
        if let Some(early) = self.early_singleton(name)? {
            return Ok(early);
        }
        if creation.borrow().in_creation.contains(name) {
            return Err(ContextError::CircularReference {
                path: creation::current_path(self.serial, name),
                reason: "requested bean is currently in creation: is there an unresolvable circular reference?"
                    .into(),
            });
        }

        creation.borrow_mut().in_creation.insert(name.to_string());
        let result = CreationGuard::enter(self.serial, name)
            .and_then(|_guard| self.create_bean(definition));
        creation.borrow_mut().finish(name);

        match result {
            Ok(bean) => {
                let type_name = self
                    .processors
                    .predict_bean_type(definition)
                    .unwrap_or(definition.type_name());
                let bean = self.singletons.write().insert(name, bean, type_name);
                self.observers.bean_created(name);
                Ok(bean)
            }
            Err(error) => {
                self.processors.creation_failed(name);
                self.observers.creation_failed(name, &error);
                Err(error)
            }
        }
    }

    /// Early reference for a singleton under construction, producing it on
    /// first request.
    fn early_singleton(&self, name: &str) -> ContextResult<Option<BeanRef>> {
        let creation = self.creation.lock();
        let cached = creation.borrow().early_objects.get(name).cloned();
        if cached.is_some() {
            return Ok(cached);
        }
        let factory = creation.borrow_mut().early_factories.remove(name);
        let Some(factory) = factory else {
            return Ok(None);
        };
        let early = factory().map_err(|e| ContextError::in_phase(name, Phase::EarlyReference, e))?;
        creation
            .borrow_mut()
            .early_objects
            .insert(name.to_string(), early.clone());
        Ok(Some(early))
    }

    fn is_in_creation(&self, name: &str) -> bool {
        self.creation.lock().borrow().in_creation.contains(name)
    }

    fn add_early_factory(&self, name: &str, raw: BeanRef) {
        let chain = self.processors.clone();
        let observers = self.observers.clone();
        let bean_name = name.to_string();
        let factory: EarlyFactory = Box::new(move || {
            let early = chain.early_bean_reference(raw, &bean_name)?;
            observers.state_changed(&bean_name, LifecycleState::EarlyExposed);
            debug!(bean = %bean_name, "exposing early reference to resolve circular dependency");
            Ok(early)
        });
        self.creation
            .lock()
            .borrow_mut()
            .early_factories
            .insert(name.to_string(), factory);
    }

    /// Runs the full lifecycle for one instance and returns its authoritative
    /// reference.
    pub(crate) fn create_bean(&self, definition: &BeanDefinition) -> ContextResult<BeanRef> {
        let name = definition.name();
        trace!(bean = name, "creating instance of bean");

        if let Some(bean) = self
            .processors
            .before_instantiation(definition)
            .map_err(|e| ContextError::in_phase(name, Phase::Instantiation, e))?
        {
            let bean = self
                .processors
                .after_initialization(bean, name)
                .map_err(|e| ContextError::in_phase(name, Phase::PostProcessing, e))?;
            self.observers.state_changed(name, LifecycleState::Initialized);
            return Ok(bean);
        }

        let raw = self
            .instantiate(definition)
            .map_err(|e| ContextError::in_phase(name, Phase::Instantiation, e))?;
        self.observers.state_changed(name, LifecycleState::Raw);

        let early_exposure = definition.is_singleton()
            && self.settings.allow_circular_references
            && self.is_in_creation(name);
        if early_exposure {
            self.add_early_factory(name, raw.clone());
        }

        self.populate(definition, &raw)
            .map_err(|e| ContextError::in_phase(name, Phase::Population, e))?;
        self.observers.state_changed(name, LifecycleState::Populated);

        self.invoke_aware_callbacks(definition, &raw)
            .map_err(|e| ContextError::in_phase(name, Phase::AwareCallbacks, e))?;
        self.observers.state_changed(name, LifecycleState::AwareNotified);

        let exposed = self.initialize(definition, &raw)?;
        let exposed = if early_exposure {
            self.reconcile_early_reference(name, &raw, exposed)?
        } else {
            exposed
        };

        if definition.is_singleton() && definition.has_destroy_callbacks() {
            self.register_destroy_callbacks(definition, raw);
        }
        self.observers.state_changed(name, LifecycleState::Initialized);
        debug!(bean = name, "finished creating instance of bean");
        Ok(exposed)
    }

    /// Tries the candidate constructors in order and uses the first whose
    /// dependencies all exist.
    fn instantiate(&self, definition: &BeanDefinition) -> ContextResult<BeanRef> {
        let candidates: Vec<&ConstructorSpec> =
            match self.processors.determine_candidate_constructors(definition) {
                Some(names) => names
                    .iter()
                    .filter_map(|n| definition.constructor(n))
                    .collect(),
                None => definition.constructors.iter().take(1).collect(),
            };
        if candidates.is_empty() {
            return Err(ContextError::BeanCreation(format!(
                "no usable constructor declared for {}",
                definition.type_name()
            )));
        }

        let mut last_error = None;
        for constructor in candidates {
            match self.resolve_constructor_args(definition.name(), constructor) {
                Ok(args) => {
                    trace!(bean = definition.name(), constructor = %constructor.name, "invoking constructor");
                    return (constructor.factory)(&args);
                }
                Err(error) if matches!(error.root_cause(), ContextError::NoSuchBean(_)) => {
                    trace!(bean = definition.name(), constructor = %constructor.name, error = %error,
                        "constructor dependencies unsatisfied, trying next candidate");
                    last_error = Some(error);
                }
                Err(error) => return Err(error),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            ContextError::BeanCreation(format!("no satisfiable constructor for {}", definition.type_name()))
        }))
    }

    fn resolve_constructor_args(
        &self,
        requester: &str,
        constructor: &ConstructorSpec,
    ) -> ContextResult<ConstructorArgs> {
        let values = constructor
            .dependencies
            .iter()
            .map(|dependency| self.resolve_reference(dependency, requester))
            .collect::<ContextResult<Vec<_>>>()?;
        Ok(ConstructorArgs::new(constructor.dependencies.clone(), values))
    }

    fn resolve_reference(&self, reference: &str, requester: &str) -> ContextResult<BeanRef> {
        let bean = self.do_get_bean(reference)?;
        self.dependencies.lock().register(reference, requester);
        Ok(bean)
    }

    fn populate(&self, definition: &BeanDefinition, raw: &BeanRef) -> ContextResult<()> {
        if !self.processors.after_instantiation(raw, definition.name())? {
            return Ok(());
        }
        for property in &definition.properties {
            let value = self.resolve_reference(&property.reference, definition.name())?;
            trace!(bean = definition.name(), property = %property.name, reference = %property.reference,
                "assigning property");
            (property.setter)(raw, value)?;
        }
        Ok(())
    }

    /// Name, then context, then environment.
    fn invoke_aware_callbacks(&self, definition: &BeanDefinition, raw: &BeanRef) -> ContextResult<()> {
        if let Some(callback) = &definition.name_aware {
            callback(raw, definition.name())?;
        }
        if let Some(callback) = &definition.context_aware {
            let context = self.self_arc()?;
            callback(raw, &context)?;
        }
        if let Some(callback) = &definition.environment_aware {
            callback(raw, &self.environment)?;
        }
        Ok(())
    }

    fn initialize(&self, definition: &BeanDefinition, raw: &BeanRef) -> ContextResult<BeanRef> {
        let name = definition.name();
        let bean = self
            .processors
            .before_initialization(raw.clone(), name)
            .map_err(|e| ContextError::in_phase(name, Phase::PostProcessing, e))?;
        for init in &definition.init {
            init(raw).map_err(|e| ContextError::in_phase(name, Phase::Initialization, e))?;
        }
        self.processors
            .after_initialization(bean, name)
            .map_err(|e| ContextError::in_phase(name, Phase::PostProcessing, e))
    }

    /// Decides which reference is authoritative once a bean whose early
    /// reference was handed out has finished initializing.
    fn reconcile_early_reference(
        &self,
        name: &str,
        raw: &BeanRef,
        exposed: BeanRef,
    ) -> ContextResult<BeanRef> {
        let early = self.creation.lock().borrow().early_objects.get(name).cloned();
        let Some(early) = early else {
            return Ok(exposed);
        };
        if same_bean(&exposed, raw) || same_bean(&exposed, &early) {
            return Ok(early);
        }

        let dependents = self.dependencies.lock().dependents_of(name);
        if self.settings.allow_raw_injection_despite_wrapping {
            warn!(bean = name, ?dependents,
                "bean was injected into other beans as an early reference but has eventually been wrapped");
            return Ok(exposed);
        }
        let mut path = vec![name.to_string()];
        path.extend(dependents);
        Err(ContextError::in_phase(
            name,
            Phase::PostProcessing,
            ContextError::CircularReference {
                path,
                reason: "early reference superseded by a different wrapper".into(),
            },
        ))
    }

    fn register_destroy_callbacks(&self, definition: &BeanDefinition, raw: BeanRef) {
        let callbacks = definition.destroy.clone();
        let name = definition.name().to_string();
        self.disposers.lock().push(
            name.clone(),
            Box::new(move || {
                debug!(bean = %name, "invoking destroy callbacks");
                for callback in &callbacks {
                    callback(&raw).map_err(|e| ContextError::in_phase(name.as_str(), Phase::Destruction, e))?;
                }
                Ok(())
            }),
        );
    }
}

//! Bean definition and singleton storage.

use std::any::Any;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::definition::BeanDefinition;
use crate::error::{ContextError, ContextResult};

/// Type-erased shared bean reference.
///
/// Raw beans and their wrappers are both carried as `BeanRef`; identity is
/// compared by data address with [`same_bean`].
pub type BeanRef = Arc<dyn Any + Send + Sync>;

/// Data address of a bean, ignoring the vtable.
pub fn bean_address(bean: &BeanRef) -> usize {
    Arc::as_ptr(bean) as *const () as usize
}

/// Whether two references point at the same instance.
pub fn same_bean(a: &BeanRef, b: &BeanRef) -> bool {
    bean_address(a) == bean_address(b)
}

/// Produces the early reference for a singleton under construction.
pub(crate) type EarlyFactory = Box<dyn FnOnce() -> ContextResult<BeanRef> + Send>;

/// Ordered definition registry, sealed when the context refreshes.
#[derive(Default)]
pub(crate) struct DefinitionRegistry {
    order: Vec<String>,
    definitions: HashMap<String, Arc<BeanDefinition>>,
    sealed: bool,
}

impl DefinitionRegistry {
    /// Inserts `definition`, replacing an existing one of the same name only
    /// when `allow_overriding` is set.
    pub(crate) fn insert(
        &mut self,
        definition: BeanDefinition,
        allow_overriding: bool,
    ) -> ContextResult<()> {
        if self.sealed {
            return Err(ContextError::ContextState(format!(
                "cannot register bean definition '{}' after refresh",
                definition.name()
            )));
        }
        let name = definition.name().to_string();
        if self.definitions.contains_key(&name) {
            if !allow_overriding {
                return Err(ContextError::InvalidArgument(format!(
                    "bean definition '{name}' is already registered and overriding is disabled"
                )));
            }
            tracing::debug!(bean = %name, "overriding bean definition");
        } else {
            self.order.push(name.clone());
        }
        self.definitions.insert(name, Arc::new(definition));
        Ok(())
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<BeanDefinition>> {
        self.definitions.get(name).cloned()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Definition names in registration order.
    pub(crate) fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub(crate) fn seal(&mut self) {
        self.sealed = true;
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }
}

/// Completed singletons, append-then-freeze per name.
#[derive(Default)]
pub(crate) struct SingletonCache {
    objects: HashMap<String, BeanRef>,
    type_names: HashMap<String, &'static str>,
    order: Vec<String>,
}

impl SingletonCache {
    pub(crate) fn get(&self, name: &str) -> Option<BeanRef> {
        self.objects.get(name).cloned()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    /// Stores a completed singleton; an existing entry is never replaced.
    pub(crate) fn insert(&mut self, name: &str, bean: BeanRef, type_name: &'static str) -> BeanRef {
        if let Some(existing) = self.objects.get(name) {
            return existing.clone();
        }
        self.objects.insert(name.to_string(), bean.clone());
        self.type_names.insert(name.to_string(), type_name);
        self.order.push(name.to_string());
        bean
    }

    pub(crate) fn type_name(&self, name: &str) -> Option<&'static str> {
        self.type_names.get(name).copied()
    }

    /// Singleton names in completion order.
    pub(crate) fn names(&self) -> &[String] {
        &self.order
    }

    pub(crate) fn clear(&mut self) {
        self.objects.clear();
        self.type_names.clear();
        self.order.clear();
    }
}

/// State guarded by the context's re-entrant creation lock.
#[derive(Default)]
pub(crate) struct CreationState {
    pub(crate) in_creation: HashSet<String>,
    pub(crate) early_objects: HashMap<String, BeanRef>,
    pub(crate) early_factories: HashMap<String, EarlyFactory>,
}

impl CreationState {
    /// Drops every trace of `name` once its creation finished or failed.
    pub(crate) fn finish(&mut self, name: &str) {
        self.in_creation.remove(name);
        self.early_objects.remove(name);
        self.early_factories.remove(name);
    }
}

/// Records which beans were injected with which other beans.
#[derive(Default)]
pub(crate) struct DependencyGraph {
    dependents: HashMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Records that `dependent` holds a reference to `dependency`.
    pub(crate) fn register(&mut self, dependency: &str, dependent: &str) {
        self.dependents
            .entry(dependency.to_string())
            .or_default()
            .insert(dependent.to_string());
    }

    /// Beans that hold a reference to `name`.
    pub(crate) fn dependents_of(&self, name: &str) -> Vec<String> {
        self.dependents
            .get(name)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `dependent` transitively depends on `name`.
    pub(crate) fn is_dependent(&self, name: &str, dependent: &str) -> bool {
        let mut seen = HashSet::new();
        let mut pending = vec![name.to_string()];
        while let Some(current) = pending.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(direct) = self.dependents.get(&current) {
                if direct.contains(dependent) {
                    return true;
                }
                pending.extend(direct.iter().cloned());
            }
        }
        false
    }

    pub(crate) fn clear(&mut self) {
        self.dependents.clear();
    }
}

//! Bean definitions and their builder.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::context::{ApplicationContext, ContextSupport};
use crate::environment::Environment;
use crate::error::{ContextError, ContextResult};
use crate::registry::BeanRef;
use crate::scope::BeanScope;
use crate::traits::{BeanNameAware, DisposableBean, EnvironmentAware, InitializingBean};

static INNER_BEAN_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub(crate) type ConstructorFn = Arc<dyn Fn(&ConstructorArgs) -> ContextResult<BeanRef> + Send + Sync>;
pub(crate) type PropertySetter = Arc<dyn Fn(&BeanRef, BeanRef) -> ContextResult<()> + Send + Sync>;
pub(crate) type BeanCallback = Arc<dyn Fn(&BeanRef) -> ContextResult<()> + Send + Sync>;
pub(crate) type NameCallback = Arc<dyn Fn(&BeanRef, &str) -> ContextResult<()> + Send + Sync>;
pub(crate) type ContextCallback =
    Arc<dyn Fn(&BeanRef, &Arc<ApplicationContext>) -> ContextResult<()> + Send + Sync>;
pub(crate) type EnvironmentCallback =
    Arc<dyn Fn(&BeanRef, &Arc<Environment>) -> ContextResult<()> + Send + Sync>;

/// A declared way of constructing a bean.
#[derive(Clone)]
pub(crate) struct ConstructorSpec {
    pub(crate) name: String,
    pub(crate) dependencies: Vec<String>,
    pub(crate) factory: ConstructorFn,
}

/// A property assigned from another bean after construction.
#[derive(Clone)]
pub(crate) struct PropertySpec {
    pub(crate) name: String,
    pub(crate) reference: String,
    pub(crate) setter: PropertySetter,
}

/// Resolved constructor arguments, in declaration order.
pub struct ConstructorArgs {
    names: Vec<String>,
    values: Vec<BeanRef>,
}

impl ConstructorArgs {
    pub(crate) fn new(names: Vec<String>, values: Vec<BeanRef>) -> Self {
        Self { names, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Argument `index` as the untyped reference the context resolved.
    pub fn raw(&self, index: usize) -> ContextResult<BeanRef> {
        self.values.get(index).cloned().ok_or_else(|| {
            ContextError::InvalidArgument(format!(
                "constructor argument index {index} out of range ({} arguments)",
                self.values.len()
            ))
        })
    }

    /// Argument `index` downcast to `T`.
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> ContextResult<Arc<T>> {
        let raw = self.raw(index)?;
        raw.downcast::<T>().map_err(|_| ContextError::BeanNotOfRequiredType {
            bean: self.names[index].clone(),
            required: type_name::<T>(),
            actual: "a different type".into(),
        })
    }
}

/// Fully resolved description of one bean.
///
/// Definitions are handed to the context through
/// [`ContextBuilder::bean`](crate::ContextBuilder::bean) or
/// [`ApplicationContext::register_bean_definition`] and become immutable once
/// the context is refreshed.
///
/// # Examples
///
/// ```
/// use ferrous_context::{ApplicationContext, BeanDefinition, BeanFactoryExt};
/// use std::sync::Arc;
///
/// struct Repository;
/// struct Service {
///     repository: Arc<Repository>,
/// }
///
/// let ctx = ApplicationContext::builder()
///     .bean(BeanDefinition::builder::<Repository>("repository").supplier(|| Repository).build())
///     .bean(
///         BeanDefinition::builder::<Service>("service")
///             .constructor(&["repository"], |args| {
///                 Ok(Service { repository: args.get::<Repository>(0)? })
///             })
///             .build(),
///     )
///     .build()
///     .unwrap();
///
/// let service = ctx.get_bean_as::<Service>("service").unwrap();
/// let repository = ctx.get_bean_as::<Repository>("repository").unwrap();
/// assert!(Arc::ptr_eq(&service.repository, &repository));
/// ```
#[derive(Clone)]
pub struct BeanDefinition {
    pub(crate) name: String,
    pub(crate) type_name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) scope: BeanScope,
    pub(crate) lazy_init: bool,
    pub(crate) description: Option<String>,
    pub(crate) depends_on: Vec<String>,
    pub(crate) constructors: Vec<ConstructorSpec>,
    pub(crate) properties: Vec<PropertySpec>,
    pub(crate) name_aware: Option<NameCallback>,
    pub(crate) context_aware: Option<ContextCallback>,
    pub(crate) environment_aware: Option<EnvironmentCallback>,
    pub(crate) init: Vec<BeanCallback>,
    pub(crate) destroy: Vec<BeanCallback>,
}

impl BeanDefinition {
    /// Starts a definition for a bean of type `T` registered under `name`.
    pub fn builder<T: Any + Send + Sync>(name: impl Into<String>) -> BeanDefinitionBuilder<T> {
        BeanDefinitionBuilder::new(name.into())
    }

    /// Starts a definition for an inner bean with a generated `type#N` name.
    pub fn inner<T: Any + Send + Sync>() -> BeanDefinitionBuilder<T> {
        let n = INNER_BEAN_COUNTER.fetch_add(1, Ordering::Relaxed);
        BeanDefinitionBuilder::new(format!("{}#{}", type_name::<T>(), n))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn scope(&self) -> BeanScope {
        self.scope
    }

    pub fn is_singleton(&self) -> bool {
        self.scope == BeanScope::Singleton
    }

    pub fn is_prototype(&self) -> bool {
        self.scope == BeanScope::Prototype
    }

    pub fn is_lazy_init(&self) -> bool {
        self.lazy_init
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Beans that must be created before this one, without being injected.
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    /// Names of the declared constructors, in declaration order.
    pub fn constructor_names(&self) -> Vec<&str> {
        self.constructors.iter().map(|c| c.name.as_str()).collect()
    }

    /// Dependencies of the constructor named `constructor`.
    pub fn constructor_dependencies(&self, constructor: &str) -> Option<&[String]> {
        self.constructor(constructor).map(|c| c.dependencies.as_slice())
    }

    /// `(property, referenced bean)` pairs, in declaration order.
    pub fn property_references(&self) -> Vec<(&str, &str)> {
        self.properties
            .iter()
            .map(|p| (p.name.as_str(), p.reference.as_str()))
            .collect()
    }

    pub fn has_destroy_callbacks(&self) -> bool {
        !self.destroy.is_empty()
    }

    pub(crate) fn constructor(&self, name: &str) -> Option<&ConstructorSpec> {
        self.constructors.iter().find(|c| c.name == name)
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("scope", &self.scope)
            .field("lazy_init", &self.lazy_init)
            .field("constructors", &self.constructor_names())
            .field("properties", &self.property_references())
            .field("depends_on", &self.depends_on)
            .finish()
    }
}

fn typed<T: Any + Send + Sync>(bean: &BeanRef) -> ContextResult<&T> {
    bean.downcast_ref::<T>().ok_or_else(|| {
        ContextError::BeanCreation(format!("raw instance is not a {}", type_name::<T>()))
    })
}

/// Builder for [`BeanDefinition`].
pub struct BeanDefinitionBuilder<T> {
    definition: BeanDefinition,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> BeanDefinitionBuilder<T> {
    fn new(name: String) -> Self {
        Self {
            definition: BeanDefinition {
                name,
                type_name: type_name::<T>(),
                type_id: TypeId::of::<T>(),
                scope: BeanScope::Singleton,
                lazy_init: false,
                description: None,
                depends_on: Vec::new(),
                constructors: Vec::new(),
                properties: Vec::new(),
                name_aware: None,
                context_aware: None,
                environment_aware: None,
                init: Vec::new(),
                destroy: Vec::new(),
            },
            _marker: PhantomData,
        }
    }

    /// Declares a no-argument constructor.
    pub fn supplier<F>(self, f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.named_constructor("default", &[], move |_| Ok(f()))
    }

    /// Declares a constructor taking the named beans as arguments.
    ///
    /// Constructors declared this way are named `ctor0`, `ctor1`, ... in
    /// declaration order. Without a post-processor proposing candidates, the
    /// first declared constructor is used.
    pub fn constructor<F>(self, dependencies: &[&str], f: F) -> Self
    where
        F: Fn(&ConstructorArgs) -> ContextResult<T> + Send + Sync + 'static,
    {
        let name = format!("ctor{}", self.definition.constructors.len());
        self.named_constructor(&name, dependencies, f)
    }

    /// Declares a constructor under an explicit name, which post-processors
    /// can refer to when proposing candidate constructors.
    pub fn named_constructor<F>(mut self, name: &str, dependencies: &[&str], f: F) -> Self
    where
        F: Fn(&ConstructorArgs) -> ContextResult<T> + Send + Sync + 'static,
    {
        self.definition.constructors.push(ConstructorSpec {
            name: name.to_string(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            factory: Arc::new(move |args: &ConstructorArgs| f(args).map(|bean| Arc::new(bean) as BeanRef)),
        });
        self
    }

    /// Declares a property assigned from bean `reference` after construction.
    ///
    /// The setter receives the authoritative reference, which may be a wrapper
    /// or an early reference while a cycle is being resolved.
    pub fn property<F>(mut self, property: &str, reference: &str, setter: F) -> Self
    where
        F: Fn(&T, BeanRef) -> ContextResult<()> + Send + Sync + 'static,
    {
        self.definition.properties.push(PropertySpec {
            name: property.to_string(),
            reference: reference.to_string(),
            setter: Arc::new(move |bean: &BeanRef, value: BeanRef| setter(typed::<T>(bean)?, value)),
        });
        self
    }

    /// Like [`property`](Self::property) but downcasts the referenced bean to `D`.
    pub fn typed_property<D, F>(self, property: &str, reference: &str, setter: F) -> Self
    where
        D: Any + Send + Sync,
        F: Fn(&T, Arc<D>) -> ContextResult<()> + Send + Sync + 'static,
    {
        let reference_name = reference.to_string();
        self.property(property, reference, move |bean, value| {
            let value = value.downcast::<D>().map_err(|_| ContextError::BeanNotOfRequiredType {
                bean: reference_name.clone(),
                required: type_name::<D>(),
                actual: "a different type".into(),
            })?;
            setter(bean, value)
        })
    }

    /// Requires `name` to be created before this bean.
    pub fn depends_on(mut self, name: &str) -> Self {
        self.definition.depends_on.push(name.to_string());
        self
    }

    pub fn scope(mut self, scope: BeanScope) -> Self {
        self.definition.scope = scope;
        self
    }

    pub fn prototype(self) -> Self {
        self.scope(BeanScope::Prototype)
    }

    /// Skip creation during refresh; the bean is created on first lookup.
    pub fn lazy(mut self) -> Self {
        self.definition.lazy_init = true;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.definition.description = Some(description.into());
        self
    }

    /// Builds the definition.
    pub fn build(self) -> BeanDefinition {
        self.definition
    }
}

impl<T: BeanNameAware> BeanDefinitionBuilder<T> {
    /// Passes the registered name to [`BeanNameAware::set_bean_name`].
    pub fn name_aware(mut self) -> Self {
        self.definition.name_aware = Some(Arc::new(|bean: &BeanRef, name: &str| {
            typed::<T>(bean)?.set_bean_name(name);
            Ok(())
        }));
        self
    }
}

impl<T: ContextSupport + Any> BeanDefinitionBuilder<T> {
    /// Binds the bean to its owning context through [`ContextSupport`].
    pub fn context_aware(mut self) -> Self {
        self.definition.context_aware = Some(Arc::new(|bean: &BeanRef, context: &Arc<ApplicationContext>| {
            typed::<T>(bean)?.set_application_context(Some(context.clone()))
        }));
        self
    }
}

impl<T: EnvironmentAware> BeanDefinitionBuilder<T> {
    pub fn environment_aware(mut self) -> Self {
        self.definition.environment_aware = Some(Arc::new(|bean: &BeanRef, environment: &Arc<Environment>| {
            typed::<T>(bean)?.set_environment(environment.clone());
            Ok(())
        }));
        self
    }
}

impl<T: InitializingBean> BeanDefinitionBuilder<T> {
    /// Calls [`InitializingBean::after_properties_set`] during initialization,
    /// before any custom init method.
    pub fn initializing(mut self) -> Self {
        self.definition
            .init
            .insert(0, Arc::new(|bean: &BeanRef| typed::<T>(bean)?.after_properties_set()));
        self
    }
}

impl<T: DisposableBean> BeanDefinitionBuilder<T> {
    /// Calls [`DisposableBean::destroy`] when the context closes.
    pub fn disposable(mut self) -> Self {
        self.definition
            .destroy
            .insert(0, Arc::new(|bean: &BeanRef| typed::<T>(bean)?.destroy()));
        self
    }
}

impl<T: Any + Send + Sync> BeanDefinitionBuilder<T> {
    /// Custom init callback, run after [`InitializingBean`] if both are declared.
    pub fn init_method<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> ContextResult<()> + Send + Sync + 'static,
    {
        self.definition
            .init
            .push(Arc::new(move |bean: &BeanRef| f(typed::<T>(bean)?)));
        self
    }

    /// Custom destroy callback, run after [`DisposableBean`] if both are declared.
    pub fn destroy_method<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> ContextResult<()> + Send + Sync + 'static,
    {
        self.definition
            .destroy
            .push(Arc::new(move |bean: &BeanRef| f(typed::<T>(bean)?)));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;

    #[test]
    fn inner_definitions_get_generated_names() {
        let a = BeanDefinition::inner::<Plain>().supplier(|| Plain).build();
        let b = BeanDefinition::inner::<Plain>().supplier(|| Plain).build();
        assert_ne!(a.name(), b.name());
        assert!(a.name().starts_with(type_name::<Plain>()));
        assert!(a.name().contains('#'));
    }

    #[test]
    fn constructors_are_named_in_order() {
        let def = BeanDefinition::builder::<Plain>("plain")
            .constructor(&["x"], |_| Ok(Plain))
            .constructor(&[], |_| Ok(Plain))
            .named_constructor("custom", &["y", "z"], |_| Ok(Plain))
            .build();
        assert_eq!(def.constructor_names(), vec!["ctor0", "ctor1", "custom"]);
        assert_eq!(
            def.constructor_dependencies("custom"),
            Some(&["y".to_string(), "z".to_string()][..])
        );
    }

    #[test]
    fn constructor_args_report_type_mismatch() {
        let args = ConstructorArgs::new(vec!["n".into()], vec![Arc::new(1u32) as BeanRef]);
        assert_eq!(*args.get::<u32>(0).unwrap(), 1);
        assert!(matches!(
            args.get::<String>(0),
            Err(ContextError::BeanNotOfRequiredType { .. })
        ));
        assert!(matches!(args.raw(3), Err(ContextError::InvalidArgument(_))));
    }
}

//! # ferrous-context
//!
//! Application context for Rust: a bean container with an ordered
//! post-processor chain, early references for circular dependencies, context
//! binding for context-aware components, and an MVC-style request dispatch
//! pipeline.
//!
//! ## Features
//!
//! - **Bean lifecycle**: instantiation, property population, aware callbacks and init callbacks in a fixed order
//! - **Circular references**: singletons expose an early reference through the post-processor chain
//! - **Post-processors**: ordered hooks that can short-circuit construction or wrap beans
//! - **Context hierarchy**: child contexts fall back to their parent for beans and messages
//! - **Dispatch pipeline**: locale and theme resolution, interceptors, exception resolvers, flash attributes and async handoff
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_context::{ApplicationContext, BeanDefinition, BeanFactoryExt};
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//!
//! struct Repository {
//!     url: String,
//! }
//!
//! #[derive(Default)]
//! struct OrderService {
//!     repository: Mutex<Option<Arc<Repository>>>,
//! }
//!
//! let ctx = ApplicationContext::builder()
//!     .singleton("repository", Repository { url: "db://orders".into() })
//!     .bean(
//!         BeanDefinition::builder::<OrderService>("orderService")
//!             .supplier(OrderService::default)
//!             .typed_property::<Repository, _>("repository", "repository", |service, repo| {
//!                 *service.repository.lock() = Some(repo);
//!                 Ok(())
//!             })
//!             .build(),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let service = ctx.get_bean_as::<OrderService>("orderService").unwrap();
//! assert_eq!(service.repository.lock().as_ref().unwrap().url, "db://orders");
//! ```
//!
//! ## Circular References
//!
//! Two singletons that reference each other through properties are resolved
//! by handing out an early reference. Constructor cycles cannot be resolved
//! and fail with [`ContextError::CircularReference`].
//!
//! ```rust
//! use ferrous_context::{ApplicationContext, BeanDefinition, BeanFactoryExt};
//! use parking_lot::Mutex;
//! use std::sync::{Arc, Weak};
//!
//! #[derive(Default)]
//! struct Node {
//!     peer: Mutex<Weak<Node>>,
//! }
//!
//! let node = |name: &str, peer: &str| {
//!     BeanDefinition::builder::<Node>(name)
//!         .supplier(Node::default)
//!         .typed_property::<Node, _>("peer", peer, |node, peer| {
//!             *node.peer.lock() = Arc::downgrade(&peer);
//!             Ok(())
//!         })
//!         .build()
//! };
//!
//! let ctx = ApplicationContext::builder()
//!     .bean(node("a", "b"))
//!     .bean(node("b", "a"))
//!     .build()
//!     .unwrap();
//!
//! let a = ctx.get_bean_as::<Node>("a").unwrap();
//! let b = ctx.get_bean_as::<Node>("b").unwrap();
//! assert!(Arc::ptr_eq(&a.peer.lock().upgrade().unwrap(), &b));
//! assert!(Arc::ptr_eq(&b.peer.lock().upgrade().unwrap(), &a));
//! ```

pub mod advice;
pub mod context;
pub mod definition;
pub mod environment;
pub mod error;
pub mod lifecycle;
pub mod locale;
pub mod observer;
pub mod path;
pub mod processor;
pub mod registry;
pub mod scope;
pub mod settings;
pub mod traits;
pub mod web;

mod internal;

pub use advice::{
    AdviceMode, AdviceModeImportSelector, AnnotationAttributes, AnnotationMetadata, AnnotationValue,
    EnableTransactionManagement, TransactionManagementSelector, DEFAULT_ADVICE_MODE_ATTRIBUTE_NAME,
};
pub use context::{
    format_message, ApplicationContext, ContextBinder, ContextBuilder, ContextKind, ContextStatus, ContextSupport,
    MessageSource, MessageSourceAccessor, StaticMessageSource, MESSAGE_SOURCE_BEAN_NAME,
};
pub use definition::{BeanDefinition, BeanDefinitionBuilder, ConstructorArgs};
pub use environment::{
    Environment, EnvironmentPropertySource, JsonPropertySource, MapPropertySource, PropertySource, PropertyValue,
    ACTIVE_PROFILES_PROPERTY,
};
pub use error::{ContextError, ContextResult};
pub use lifecycle::{LifecycleState, Phase};
pub use locale::Locale;
pub use observer::{LifecycleObserver, TracingObserver};
pub use path::{AntPathMatcher, PathMatcher};
pub use processor::{
    AutoProxyPostProcessor, BeanPostProcessor, IdentityPostProcessor, PostProcessorChain, ProxyFactory,
    HIGHEST_PRECEDENCE, LOWEST_PRECEDENCE,
};
pub use registry::{bean_address, same_bean, BeanRef};
pub use scope::BeanScope;
pub use settings::ContextSettings;
pub use traits::{BeanFactory, BeanFactoryExt, BeanNameAware, DisposableBean, EnvironmentAware, InitializingBean};

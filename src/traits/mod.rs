//! Core traits for beans and bean factories.

mod aware;
mod dispose;
mod factory;

pub use aware::{BeanNameAware, EnvironmentAware, InitializingBean};
pub use dispose::DisposableBean;
pub use factory::{BeanFactory, BeanFactoryExt};

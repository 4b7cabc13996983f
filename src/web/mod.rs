//! Request dispatch: locale, theme and flash state resolution, handler
//! selection, interceptors, exception resolution and view rendering.

mod async_support;
mod dispatcher;
mod exception;
mod flash;
mod handler;
mod interceptor;
mod locale;
mod request;
pub mod support;
mod theme;
mod view;

pub use async_support::{AsyncManager, DeferredCallback, DeferredResult};
pub use dispatcher::{
    AttributeScope, DispatchOutcome, Dispatcher, DispatcherBuilder, RequestContext, FLASH_MAP_MANAGER_BEAN_NAME,
    LOCALE_RESOLVER_BEAN_NAME, THEME_RESOLVER_BEAN_NAME, THEME_SOURCE_BEAN_NAME,
};
pub use exception::{
    HandlerExceptionResolver, ResponseStatusExceptionResolver, SimpleMappingExceptionResolver,
    DEFAULT_EXCEPTION_ATTRIBUTE,
};
pub use flash::{
    DefaultFlashMapManager, FlashMap, FlashMapManager, FlashMapStore, SessionFlashMapStore,
    DEFAULT_FLASH_MAP_TIMEOUT_SECS, FLASH_MAPS_SESSION_ATTRIBUTE,
};
pub use handler::{
    Controller, ControllerAdapter, FnController, Handler, HandlerAdapter, HandlerMapping, HandlerOutcome,
    MappedInterceptor, RequestHandler, RequestHandlerAdapter, UrlHandlerMapping,
};
pub use interceptor::{Flow, HandlerExecutionChain, HandlerInterceptor};
pub use locale::{
    resolve_locale_context, AcceptHeaderLocaleResolver, FixedLocaleResolver, LocaleContext, LocaleContextResolver,
    LocaleResolver, SessionLocaleResolver, LOCALE_SESSION_ATTRIBUTE, TIME_ZONE_SESSION_ATTRIBUTE,
};
pub use request::{Attribute, DispatchKind, Session, WebRequest, WebResponse};
pub use theme::{
    resolve_theme, FixedThemeResolver, SessionThemeResolver, StaticThemeSource, Theme, ThemeResolver, ThemeSource,
    DEFAULT_THEME_NAME, THEME_SESSION_ATTRIBUTE,
};
pub use view::{JsonView, Model, ModelAndView, RedirectView, StaticViewResolver, View, ViewResolver, REDIRECT_URL_PREFIX};

/// `Arc<ApplicationContext>` the dispatcher is bound to.
pub const WEB_APPLICATION_CONTEXT_ATTRIBUTE: &str = "ferrous_context.web.dispatcher.CONTEXT";
/// `Arc<dyn LocaleResolver>`
pub const LOCALE_RESOLVER_ATTRIBUTE: &str = "ferrous_context.web.dispatcher.LOCALE_RESOLVER";
/// Resolved [`LocaleContext`]
pub const LOCALE_CONTEXT_ATTRIBUTE: &str = "ferrous_context.web.dispatcher.LOCALE_CONTEXT";
/// `Arc<dyn ThemeResolver>`
pub const THEME_RESOLVER_ATTRIBUTE: &str = "ferrous_context.web.dispatcher.THEME_RESOLVER";
/// `Arc<dyn ThemeSource>`
pub const THEME_SOURCE_ATTRIBUTE: &str = "ferrous_context.web.dispatcher.THEME_SOURCE";
/// Resolved [`Theme`]
pub const THEME_ATTRIBUTE: &str = "ferrous_context.web.dispatcher.THEME";
/// `Arc<dyn FlashMapManager>`
pub const FLASH_MAP_MANAGER_ATTRIBUTE: &str = "ferrous_context.web.dispatcher.FLASH_MAP_MANAGER";
/// [`FlashMap`] retrieved for this request
pub const INPUT_FLASH_MAP_ATTRIBUTE: &str = "ferrous_context.web.dispatcher.INPUT_FLASH_MAP";
/// `Mutex<FlashMap>` to save for the next request
pub const OUTPUT_FLASH_MAP_ATTRIBUTE: &str = "ferrous_context.web.dispatcher.OUTPUT_FLASH_MAP";
/// [`RequestContext`] of the current pass
pub const REQUEST_CONTEXT_ATTRIBUTE: &str = "ferrous_context.web.dispatcher.REQUEST_CONTEXT";
/// `ContextError` an exception resolver turned into a view
pub const EXCEPTION_ATTRIBUTE: &str = "ferrous_context.web.dispatcher.EXCEPTION";
pub const PATH_WITHIN_HANDLER_MAPPING_ATTRIBUTE: &str = "ferrous_context.web.mapping.PATH_WITHIN_HANDLER_MAPPING";
pub const BEST_MATCHING_PATTERN_ATTRIBUTE: &str = "ferrous_context.web.mapping.BEST_MATCHING_PATTERN";
/// `HashMap<String, String>` of URI template variables
pub const URI_TEMPLATE_VARIABLES_ATTRIBUTE: &str = "ferrous_context.web.mapping.URI_TEMPLATE_VARIABLES";

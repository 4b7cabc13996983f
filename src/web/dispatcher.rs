//! The front controller driving one request pass through the pipeline.

use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use http::header::{IF_MODIFIED_SINCE, LAST_MODIFIED};
use http::{Method, StatusCode};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, trace, warn};

use super::async_support::{collect_deferred, DeferredResult};
use super::exception::{HandlerExceptionResolver, ResponseStatusExceptionResolver};
use super::flash::{DefaultFlashMapManager, FlashMap, FlashMapManager};
use super::handler::{ControllerAdapter, Handler, HandlerAdapter, HandlerMapping, HandlerOutcome, RequestHandlerAdapter};
use super::interceptor::HandlerExecutionChain;
use super::locale::{resolve_locale_context, AcceptHeaderLocaleResolver, LocaleContext, LocaleResolver};
use super::request::{Attribute, DispatchKind, WebRequest, WebResponse};
use super::support;
use super::theme::{resolve_theme, Theme, ThemeResolver, ThemeSource};
use super::view::{ModelAndView, View, ViewResolver};
use super::{
    EXCEPTION_ATTRIBUTE, FLASH_MAP_MANAGER_ATTRIBUTE, INPUT_FLASH_MAP_ATTRIBUTE, LOCALE_CONTEXT_ATTRIBUTE,
    LOCALE_RESOLVER_ATTRIBUTE, OUTPUT_FLASH_MAP_ATTRIBUTE, REQUEST_CONTEXT_ATTRIBUTE, THEME_ATTRIBUTE,
    THEME_RESOLVER_ATTRIBUTE, THEME_SOURCE_ATTRIBUTE, WEB_APPLICATION_CONTEXT_ATTRIBUTE,
};
use crate::context::{ApplicationContext, ContextBinder, ContextKind, ContextSupport};
use crate::error::{ContextError, ContextResult};
use crate::locale::Locale;
use crate::traits::BeanFactoryExt;

pub const LOCALE_RESOLVER_BEAN_NAME: &str = "localeResolver";
pub const THEME_RESOLVER_BEAN_NAME: &str = "themeResolver";
pub const THEME_SOURCE_BEAN_NAME: &str = "themeSource";
pub const FLASH_MAP_MANAGER_BEAN_NAME: &str = "flashMapManager";

/// How a pass through [`Dispatcher::service`] ended.
#[derive(Debug)]
pub enum DispatchOutcome {
    Completed,
    /// The handler deferred its result. Call [`Dispatcher::resume_async`]
    /// with the same request and response to finish.
    AsyncStarted(DeferredResult),
    /// No resolver handled the error; a 500 response was sent if possible.
    Failed(ContextError),
}

impl DispatchOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, DispatchOutcome::Completed)
    }

    pub fn is_async_started(&self) -> bool {
        matches!(self, DispatchOutcome::AsyncStarted(_))
    }

    pub fn error(&self) -> Option<&ContextError> {
        match self {
            DispatchOutcome::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Per-pass state resolved before handler selection.
#[derive(Debug, Clone)]
pub struct RequestContext {
    locale_context: LocaleContext,
    theme: Option<Arc<Theme>>,
    input_flash_map: Option<Arc<FlashMap>>,
    dispatch_kind: DispatchKind,
}

impl RequestContext {
    pub fn locale(&self) -> Locale {
        self.locale_context.locale.clone().unwrap_or_default()
    }

    pub fn time_zone(&self) -> Option<FixedOffset> {
        self.locale_context.time_zone
    }

    pub fn theme(&self) -> Option<&Arc<Theme>> {
        self.theme.as_ref()
    }

    pub fn input_flash_map(&self) -> Option<&Arc<FlashMap>> {
        self.input_flash_map.as_ref()
    }

    pub fn dispatch_kind(&self) -> DispatchKind {
        self.dispatch_kind
    }
}

/// Exclusive access to a request that restores its attributes on drop.
///
/// Used for include dispatches so the including request sees its own
/// attributes again whichever way the included pass exits.
pub struct AttributeScope<'a> {
    request: &'a mut WebRequest,
    snapshot: Option<HashMap<String, Attribute>>,
}

impl<'a> AttributeScope<'a> {
    pub fn enter(request: &'a mut WebRequest, restore: bool) -> Self {
        let snapshot = restore.then(|| request.snapshot_attributes());
        Self { request, snapshot }
    }
}

impl Deref for AttributeScope<'_> {
    type Target = WebRequest;

    fn deref(&self) -> &WebRequest {
        self.request
    }
}

impl DerefMut for AttributeScope<'_> {
    fn deref_mut(&mut self) -> &mut WebRequest {
        self.request
    }
}

impl Drop for AttributeScope<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            trace!("restoring request attributes after include");
            self.request.restore_attributes(snapshot);
        }
    }
}

#[derive(Clone, Default)]
struct Strategies {
    handler_mappings: Vec<Arc<dyn HandlerMapping>>,
    handler_adapters: Vec<Arc<dyn HandlerAdapter>>,
    exception_resolvers: Vec<Arc<dyn HandlerExceptionResolver>>,
    view_resolvers: Vec<Arc<dyn ViewResolver>>,
    locale_resolver: Option<Arc<dyn LocaleResolver>>,
    theme_resolver: Option<Arc<dyn ThemeResolver>>,
    theme_source: Option<Arc<dyn ThemeSource>>,
    flash_map_manager: Option<Arc<dyn FlashMapManager>>,
}

impl Strategies {
    fn sort(&mut self) {
        self.handler_mappings.sort_by_key(|m| m.order());
        self.exception_resolvers.sort_by_key(|r| r.order());
        self.view_resolvers.sort_by_key(|r| r.order());
    }

    fn or_defaults(mut self, defaults: &Strategies) -> Self {
        if self.handler_adapters.is_empty() {
            self.handler_adapters = defaults.handler_adapters.clone();
        }
        if self.exception_resolvers.is_empty() {
            self.exception_resolvers = defaults.exception_resolvers.clone();
        }
        self.locale_resolver = self.locale_resolver.or_else(|| defaults.locale_resolver.clone());
        self.flash_map_manager = self.flash_map_manager.or_else(|| defaults.flash_map_manager.clone());
        self
    }

    fn defaults() -> Self {
        Self {
            handler_adapters: vec![
                Arc::new(ControllerAdapter) as Arc<dyn HandlerAdapter>,
                Arc::new(RequestHandlerAdapter),
            ],
            exception_resolvers: vec![Arc::new(ResponseStatusExceptionResolver) as Arc<dyn HandlerExceptionResolver>],
            locale_resolver: Some(Arc::new(AcceptHeaderLocaleResolver::new())),
            flash_map_manager: Some(Arc::new(DefaultFlashMapManager::default())),
            ..Self::default()
        }
    }
}

enum Pass {
    Finished,
    Handled(Option<ModelAndView>),
    AsyncStarted(DeferredResult),
}

/// Configures a [`Dispatcher`].
pub struct DispatcherBuilder {
    strategies: Strategies,
    clean_up_after_include: bool,
}

impl DispatcherBuilder {
    pub fn handler_mapping(mut self, mapping: Arc<dyn HandlerMapping>) -> Self {
        self.strategies.handler_mappings.push(mapping);
        self
    }

    pub fn handler_adapter(mut self, adapter: Arc<dyn HandlerAdapter>) -> Self {
        self.strategies.handler_adapters.push(adapter);
        self
    }

    pub fn exception_resolver(mut self, resolver: Arc<dyn HandlerExceptionResolver>) -> Self {
        self.strategies.exception_resolvers.push(resolver);
        self
    }

    pub fn view_resolver(mut self, resolver: Arc<dyn ViewResolver>) -> Self {
        self.strategies.view_resolvers.push(resolver);
        self
    }

    pub fn locale_resolver(mut self, resolver: Arc<dyn LocaleResolver>) -> Self {
        self.strategies.locale_resolver = Some(resolver);
        self
    }

    pub fn theme_resolver(mut self, resolver: Arc<dyn ThemeResolver>) -> Self {
        self.strategies.theme_resolver = Some(resolver);
        self
    }

    pub fn theme_source(mut self, source: Arc<dyn ThemeSource>) -> Self {
        self.strategies.theme_source = Some(source);
        self
    }

    pub fn flash_map_manager(mut self, manager: Arc<dyn FlashMapManager>) -> Self {
        self.strategies.flash_map_manager = Some(manager);
        self
    }

    /// Whether include dispatches restore the request attributes afterwards.
    /// On by default.
    pub fn clean_up_after_include(mut self, clean_up: bool) -> Self {
        self.clean_up_after_include = clean_up;
        self
    }

    pub fn build(self) -> Dispatcher {
        let mut strategies = self.strategies;
        strategies.sort();
        Dispatcher {
            binder: ContextBinder::new(),
            strategies: RwLock::new(strategies),
            defaults: Strategies::defaults(),
            clean_up_after_include: self.clean_up_after_include,
        }
    }
}

/// Front controller for the request pipeline.
///
/// Strategies come from the builder. When bound to a web
/// [`ApplicationContext`] it also picks up handler mappings, adapters,
/// exception resolvers and view resolvers registered as `Arc<dyn ...>`
/// singletons, plus the `localeResolver`, `themeResolver`, `themeSource` and
/// `flashMapManager` beans where the builder set none. Missing adapters,
/// exception resolvers, locale resolver and flash map manager fall back to
/// defaults.
///
/// ```
/// use ferrous_context::web::{Dispatcher, Handler, HandlerOutcome, UrlHandlerMapping, WebRequest, WebResponse};
/// use std::sync::Arc;
///
/// let mapping = UrlHandlerMapping::new().register(
///     "/hello",
///     Handler::from_fn("hello", |_, response| {
///         response.write(b"hello");
///         Ok(HandlerOutcome::Done(None))
///     }),
/// );
/// let dispatcher = Dispatcher::builder().handler_mapping(Arc::new(mapping)).build();
///
/// let mut response = WebResponse::new();
/// assert!(dispatcher.service(&mut WebRequest::get("/hello"), &mut response).is_completed());
/// assert_eq!(response.body_text(), "hello");
///
/// let mut response = WebResponse::new();
/// dispatcher.service(&mut WebRequest::get("/missing"), &mut response);
/// assert_eq!(response.status(), http::StatusCode::NOT_FOUND);
/// ```
pub struct Dispatcher {
    binder: ContextBinder,
    strategies: RwLock<Strategies>,
    defaults: Strategies,
    clean_up_after_include: bool,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder {
            strategies: Strategies::default(),
            clean_up_after_include: true,
        }
    }

    fn effective_strategies(&self) -> Strategies {
        self.strategies.read().clone().or_defaults(&self.defaults)
    }

    fn detect_strategies(&self, context: &Arc<ApplicationContext>) -> ContextResult<()> {
        fn unwrap_all<T: ?Sized>(beans: Vec<(String, Arc<Arc<T>>)>) -> Vec<Arc<T>> {
            beans.into_iter().map(|(_, bean)| bean.as_ref().clone()).collect()
        }

        let mappings = unwrap_all(context.beans_of_type::<Arc<dyn HandlerMapping>>()?);
        let adapters = unwrap_all(context.beans_of_type::<Arc<dyn HandlerAdapter>>()?);
        let resolvers = unwrap_all(context.beans_of_type::<Arc<dyn HandlerExceptionResolver>>()?);
        let views = unwrap_all(context.beans_of_type::<Arc<dyn ViewResolver>>()?);
        let locale = context.find_bean_as::<Arc<dyn LocaleResolver>>(LOCALE_RESOLVER_BEAN_NAME)?;
        let theme_resolver = context.find_bean_as::<Arc<dyn ThemeResolver>>(THEME_RESOLVER_BEAN_NAME)?;
        let theme_source = context.find_bean_as::<Arc<dyn ThemeSource>>(THEME_SOURCE_BEAN_NAME)?;
        let flash = context.find_bean_as::<Arc<dyn FlashMapManager>>(FLASH_MAP_MANAGER_BEAN_NAME)?;

        let mut strategies = self.strategies.write();
        debug!(
            context = context.display_name(),
            mappings = mappings.len(),
            adapters = adapters.len(),
            exception_resolvers = resolvers.len(),
            view_resolvers = views.len(),
            "detected dispatcher strategies"
        );
        strategies.handler_mappings.extend(mappings);
        strategies.handler_adapters.extend(adapters);
        strategies.exception_resolvers.extend(resolvers);
        strategies.view_resolvers.extend(views);
        if strategies.locale_resolver.is_none() {
            strategies.locale_resolver = locale.map(|r| r.as_ref().clone());
        }
        if strategies.theme_resolver.is_none() {
            strategies.theme_resolver = theme_resolver.map(|r| r.as_ref().clone());
        }
        if strategies.theme_source.is_none() {
            strategies.theme_source = theme_source.map(|s| s.as_ref().clone());
        }
        if strategies.flash_map_manager.is_none() {
            strategies.flash_map_manager = flash.map(|m| m.as_ref().clone());
        }
        strategies.sort();
        Ok(())
    }

    /// Runs one pass for `request`. Errors no resolver handled become a 500
    /// response and [`DispatchOutcome::Failed`].
    pub fn service(&self, request: &mut WebRequest, response: &mut WebResponse) -> DispatchOutcome {
        let kind = request.dispatch_kind();
        debug!(method = %request.method(), path = request.path(), ?kind, "dispatching request");
        let strategies = self.effective_strategies();
        let restore = kind == DispatchKind::Include && self.clean_up_after_include;

        let outcome = {
            let mut scope = AttributeScope::enter(request, restore);
            let context = self.prepare_request(&mut scope, response, &strategies);
            match self.do_dispatch(&mut scope, response, &strategies, &context) {
                Ok(outcome) => outcome,
                Err(error) => {
                    error!(path = scope.path(), error = %error, "request processing failed");
                    if !response.is_committed() {
                        response.send_error(StatusCode::INTERNAL_SERVER_ERROR, Some("Internal Server Error"));
                    }
                    DispatchOutcome::Failed(error)
                }
            }
        };

        if !outcome.is_async_started() && matches!(kind, DispatchKind::Request | DispatchKind::Async) {
            request.request_completed();
        }
        outcome
    }

    /// Waits for the deferred result of a request whose last pass returned
    /// [`DispatchOutcome::AsyncStarted`], then re-enters the pipeline with
    /// [`DispatchKind::Async`].
    pub fn resume_async(&self, request: &mut WebRequest, response: &mut WebResponse) -> DispatchOutcome {
        if let Err(error) = collect_deferred(request) {
            warn!(path = request.path(), error = %error, "cannot resume request");
            return DispatchOutcome::Failed(error);
        }
        request.set_dispatch_kind(DispatchKind::Async);
        self.service(request, response)
    }

    fn prepare_request(&self, request: &mut WebRequest, response: &mut WebResponse, strategies: &Strategies) -> RequestContext {
        if let Ok(Some(context)) = self.application_context() {
            request.set_attribute(WEB_APPLICATION_CONTEXT_ATTRIBUTE, Arc::new(context));
        }
        if let Some(resolver) = &strategies.locale_resolver {
            request.set_attribute(LOCALE_RESOLVER_ATTRIBUTE, Arc::new(resolver.clone()));
        }
        if let Some(resolver) = &strategies.theme_resolver {
            request.set_attribute(THEME_RESOLVER_ATTRIBUTE, Arc::new(resolver.clone()));
        }
        if let Some(source) = &strategies.theme_source {
            request.set_attribute(THEME_SOURCE_ATTRIBUTE, Arc::new(source.clone()));
        }

        let mut input_flash_map = support::input_flash_map(request);
        if let Some(manager) = &strategies.flash_map_manager {
            request.set_attribute(FLASH_MAP_MANAGER_ATTRIBUTE, Arc::new(manager.clone()));
            if request.dispatch_kind() == DispatchKind::Request {
                if let Some(input) = manager.retrieve_and_update(request, response) {
                    let input = Arc::new(input);
                    request.set_attribute(INPUT_FLASH_MAP_ATTRIBUTE, input.clone());
                    input_flash_map = Some(input);
                }
            }
            request.set_attribute(OUTPUT_FLASH_MAP_ATTRIBUTE, Arc::new(Mutex::new(FlashMap::new())));
        }

        let locale_context = match &strategies.locale_resolver {
            Some(resolver) => resolve_locale_context(resolver.as_ref(), request),
            None => LocaleContext::default(),
        };
        request.set_attribute(LOCALE_CONTEXT_ATTRIBUTE, Arc::new(locale_context.clone()));

        let theme = resolve_theme(strategies.theme_resolver.as_deref(), strategies.theme_source.as_deref(), request);
        if let Some(theme) = &theme {
            request.set_attribute(THEME_ATTRIBUTE, theme.clone());
        }

        let context = RequestContext {
            locale_context,
            theme,
            input_flash_map,
            dispatch_kind: request.dispatch_kind(),
        };
        request.set_attribute(REQUEST_CONTEXT_ATTRIBUTE, Arc::new(context.clone()));
        context
    }

    fn do_dispatch(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        strategies: &Strategies,
        context: &RequestContext,
    ) -> ContextResult<DispatchOutcome> {
        let mut chain = match self.get_handler(request, strategies) {
            Ok(Some(chain)) => chain,
            Ok(None) => {
                warn!(method = %request.method(), path = request.path(), "no handler found");
                response.send_error(StatusCode::NOT_FOUND, None);
                return Ok(DispatchOutcome::Completed);
            }
            Err(error) => {
                self.process_dispatch_result(request, response, None, None, Some(error), strategies, context)?;
                return Ok(DispatchOutcome::Completed);
            }
        };

        match self.invoke_handler(&mut chain, request, response, strategies) {
            Ok(Pass::Finished) => Ok(DispatchOutcome::Completed),
            Ok(Pass::AsyncStarted(deferred)) => {
                debug!(handler = chain.handler().name(), "concurrent handling started");
                request.async_manager_mut().start(deferred.clone());
                chain.apply_after_concurrent_handling_started(request, response);
                Ok(DispatchOutcome::AsyncStarted(deferred))
            }
            Ok(Pass::Handled(mv)) => {
                self.process_dispatch_result(request, response, Some(&chain), mv, None, strategies, context)?;
                Ok(DispatchOutcome::Completed)
            }
            Err(error) => {
                self.process_dispatch_result(request, response, Some(&chain), None, Some(error), strategies, context)?;
                Ok(DispatchOutcome::Completed)
            }
        }
    }

    fn get_handler(&self, request: &mut WebRequest, strategies: &Strategies) -> ContextResult<Option<HandlerExecutionChain>> {
        for mapping in &strategies.handler_mappings {
            if let Some(chain) = mapping.handler(request)? {
                return Ok(Some(chain));
            }
        }
        Ok(None)
    }

    fn get_handler_adapter<'s>(&self, handler: &Handler, strategies: &'s Strategies) -> ContextResult<&'s Arc<dyn HandlerAdapter>> {
        strategies
            .handler_adapters
            .iter()
            .find(|adapter| adapter.supports(handler))
            .ok_or_else(|| ContextError::HandlerNotSupported(handler.name().to_string()))
    }

    fn invoke_handler(
        &self,
        chain: &mut HandlerExecutionChain,
        request: &mut WebRequest,
        response: &mut WebResponse,
        strategies: &Strategies,
    ) -> ContextResult<Pass> {
        let adapter = self.get_handler_adapter(chain.handler(), strategies)?;

        let method = request.method().clone();
        if method == Method::GET || method == Method::HEAD {
            if let Some(last_modified) = adapter.last_modified(request, chain.handler()) {
                if check_not_modified(request, response, last_modified)? {
                    debug!(path = request.path(), "not modified");
                    return Ok(Pass::Finished);
                }
            }
        }

        if !chain.apply_pre_handle(request, response)? {
            return Ok(Pass::Finished);
        }

        let concurrent = if request.dispatch_kind() == DispatchKind::Async {
            request.async_manager_mut().take_concurrent_result()
        } else {
            None
        };
        let outcome = match concurrent {
            Some(result) => {
                trace!(handler = chain.handler().name(), "using concurrent result");
                HandlerOutcome::Done(Some(result?))
            }
            None => adapter.handle(request, response, chain.handler())?,
        };

        match outcome {
            HandlerOutcome::Deferred(deferred) => Ok(Pass::AsyncStarted(deferred)),
            HandlerOutcome::Done(mut mv) => {
                if let Some(mv) = mv.as_mut() {
                    apply_default_view_name(request, mv);
                }
                chain.apply_post_handle(request, response, mv.as_mut())?;
                Ok(Pass::Handled(mv))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process_dispatch_result(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        chain: Option<&HandlerExecutionChain>,
        mv: Option<ModelAndView>,
        error: Option<ContextError>,
        strategies: &Strategies,
        context: &RequestContext,
    ) -> ContextResult<()> {
        let mut mv = mv;
        if let Some(error) = error {
            let handler = chain.map(|c| c.handler());
            match self.process_handler_exception(request, response, handler, &error, strategies) {
                Some(resolved) => mv = (!resolved.is_empty()).then_some(resolved),
                None => {
                    if let Some(chain) = chain {
                        chain.trigger_after_completion(request, response, Some(&error));
                    }
                    return Err(error);
                }
            }
        }

        if let Some(mv) = mv.filter(|mv| !mv.was_cleared()) {
            if let Err(error) = self.render(&mv, request, response, strategies, context) {
                if let Some(chain) = chain {
                    chain.trigger_after_completion(request, response, Some(&error));
                }
                return Err(error);
            }
        }

        if let Some(chain) = chain {
            chain.trigger_after_completion(request, response, None);
        }
        Ok(())
    }

    fn process_handler_exception(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        handler: Option<&Handler>,
        error: &ContextError,
        strategies: &Strategies,
    ) -> Option<ModelAndView> {
        for resolver in &strategies.exception_resolvers {
            let Some(mut mv) = resolver.resolve_exception(request, response, handler, error) else {
                continue;
            };
            if mv.is_empty() {
                debug!(error = %error, "error handled, nothing to render");
                return Some(mv);
            }
            if !mv.has_view() {
                apply_default_view_name(request, &mut mv);
            }
            request.set_attribute(EXCEPTION_ATTRIBUTE, Arc::new(error.clone()));
            debug!(error = %error, ?mv, "using resolved error view");
            return Some(mv);
        }
        None
    }

    fn render(
        &self,
        mv: &ModelAndView,
        request: &mut WebRequest,
        response: &mut WebResponse,
        strategies: &Strategies,
        context: &RequestContext,
    ) -> ContextResult<()> {
        if let Some(status) = mv.status() {
            response.set_status(status);
        }
        let view: Arc<dyn View> = match (mv.view_name(), mv.view()) {
            (Some(name), _) => self
                .resolve_view_name(name, &context.locale(), strategies)?
                .ok_or_else(|| ContextError::ViewNotResolved(name.to_string()))?,
            (None, Some(view)) => view.clone(),
            (None, None) => {
                return Err(ContextError::ViewNotResolved(format!(
                    "ModelAndView [{mv:?}] neither contains a view name nor a view"
                )))
            }
        };
        trace!(view = ?mv.view_name(), "rendering view");
        view.render(mv.model(), request, response)
    }

    fn resolve_view_name(&self, name: &str, locale: &Locale, strategies: &Strategies) -> ContextResult<Option<Arc<dyn View>>> {
        for resolver in &strategies.view_resolvers {
            if let Some(view) = resolver.resolve_view_name(name, locale)? {
                return Ok(Some(view));
            }
        }
        Ok(None)
    }
}

impl ContextSupport for Dispatcher {
    fn binder(&self) -> &ContextBinder {
        &self.binder
    }

    fn required_context_kind(&self) -> ContextKind {
        ContextKind::Web
    }

    fn consumer_name(&self) -> &str {
        "Dispatcher"
    }

    fn init_application_context(&self, context: &Arc<ApplicationContext>) -> ContextResult<()> {
        self.detect_strategies(context)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategies = self.strategies.read();
        f.debug_struct("Dispatcher")
            .field("binder", &self.binder)
            .field("handler_mappings", &strategies.handler_mappings.len())
            .field("handler_adapters", &strategies.handler_adapters.len())
            .field("exception_resolvers", &strategies.exception_resolvers.len())
            .field("view_resolvers", &strategies.view_resolvers.len())
            .finish()
    }
}

/// View name derived from the request path: no slashes at either end and no
/// file extension.
pub(crate) fn default_view_name(path: &str) -> String {
    let trimmed = path.trim_start_matches('/').trim_end_matches('/');
    let without_extension = match (trimmed.rfind('.'), trimmed.rfind('/')) {
        (Some(dot), Some(slash)) if dot > slash => &trimmed[..dot],
        (Some(dot), None) => &trimmed[..dot],
        _ => trimmed,
    };
    without_extension.to_string()
}

fn apply_default_view_name(request: &WebRequest, mv: &mut ModelAndView) {
    if mv.has_view() {
        return;
    }
    let name = default_view_name(request.path());
    if !name.is_empty() {
        mv.set_view_name(name);
    }
}

fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Sets `Last-Modified` and answers 304 when `If-Modified-Since` is not older.
fn check_not_modified(request: &WebRequest, response: &mut WebResponse, last_modified: DateTime<Utc>) -> ContextResult<bool> {
    response.set_header(LAST_MODIFIED.as_str(), &http_date(last_modified))?;
    let since = request
        .headers()
        .get(IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok());
    match since {
        Some(since) if last_modified.timestamp() <= since.timestamp() => {
            response.set_status(StatusCode::NOT_MODIFIED);
            response.mark_committed();
            Ok(true)
        }
        _ => Ok(false),
    }
}

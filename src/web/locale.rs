//! Per-request locale resolution.

use std::sync::Arc;

use chrono::FixedOffset;
use http::header::ACCEPT_LANGUAGE;

use super::request::{WebRequest, WebResponse};
use crate::error::{ContextError, ContextResult};
use crate::locale::Locale;

/// Session attribute holding the locale chosen by [`SessionLocaleResolver`].
pub const LOCALE_SESSION_ATTRIBUTE: &str = "ferrous_context.web.locale.LOCALE";
/// Session attribute holding the time zone chosen by [`SessionLocaleResolver`].
pub const TIME_ZONE_SESSION_ATTRIBUTE: &str = "ferrous_context.web.locale.TIME_ZONE";

/// A locale with an optional time zone offset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocaleContext {
    pub locale: Option<Locale>,
    pub time_zone: Option<FixedOffset>,
}

impl LocaleContext {
    pub fn new(locale: Locale) -> Self {
        Self {
            locale: Some(locale),
            time_zone: None,
        }
    }

    pub fn with_time_zone(mut self, time_zone: FixedOffset) -> Self {
        self.time_zone = Some(time_zone);
        self
    }
}

/// Resolves the locale of a request and optionally lets it be changed.
pub trait LocaleResolver: Send + Sync {
    fn resolve_locale(&self, request: &WebRequest) -> Locale;

    fn set_locale(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        locale: Option<Locale>,
    ) -> ContextResult<()>;

    /// Probe for the richer locale-plus-time-zone capability.
    fn as_context_resolver(&self) -> Option<&dyn LocaleContextResolver> {
        None
    }
}

/// A [`LocaleResolver`] that also yields a time zone.
pub trait LocaleContextResolver: LocaleResolver {
    fn resolve_locale_context(&self, request: &WebRequest) -> LocaleContext;

    fn set_locale_context(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        context: Option<LocaleContext>,
    ) -> ContextResult<()>;
}

/// Resolves from the resolver, using the time zone capability when present.
pub fn resolve_locale_context(resolver: &dyn LocaleResolver, request: &WebRequest) -> LocaleContext {
    match resolver.as_context_resolver() {
        Some(context_resolver) => context_resolver.resolve_locale_context(request),
        None => LocaleContext::new(resolver.resolve_locale(request)),
    }
}

/// Uses the primary locale of the `Accept-Language` header.
///
/// ```
/// use ferrous_context::web::{AcceptHeaderLocaleResolver, LocaleResolver, WebRequest};
/// use ferrous_context::Locale;
///
/// let resolver = AcceptHeaderLocaleResolver::new()
///     .with_supported_locales(vec![Locale::new("de", None), Locale::us()]);
/// let request = WebRequest::get("/").with_header("Accept-Language", "fr-CH, de;q=0.9, en;q=0.8");
/// assert_eq!(resolver.resolve_locale(&request).tag(), "de");
/// ```
#[derive(Debug, Clone, Default)]
pub struct AcceptHeaderLocaleResolver {
    supported: Vec<Locale>,
    default_locale: Option<Locale>,
}

impl AcceptHeaderLocaleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_supported_locales(mut self, locales: Vec<Locale>) -> Self {
        self.supported = locales;
        self
    }

    pub fn with_default_locale(mut self, locale: Locale) -> Self {
        self.default_locale = Some(locale);
        self
    }

    fn requested(request: &WebRequest) -> Vec<Locale> {
        let Some(header) = request.headers().get(ACCEPT_LANGUAGE).and_then(|v| v.to_str().ok()) else {
            return Vec::new();
        };
        let mut ranges: Vec<(f32, usize, Locale)> = header
            .split(',')
            .enumerate()
            .filter_map(|(position, range)| {
                let mut parts = range.trim().split(';');
                let tag = parts.next()?.trim();
                let quality = parts
                    .find_map(|p| p.trim().strip_prefix("q="))
                    .and_then(|q| q.parse::<f32>().ok())
                    .unwrap_or(1.0);
                if tag == "*" || quality <= 0.0 {
                    return None;
                }
                tag.parse::<Locale>().ok().map(|locale| (quality, position, locale))
            })
            .collect();
        ranges.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        ranges.into_iter().map(|(_, _, locale)| locale).collect()
    }
}

impl LocaleResolver for AcceptHeaderLocaleResolver {
    fn resolve_locale(&self, request: &WebRequest) -> Locale {
        let requested = Self::requested(request);
        let fallback = || self.default_locale.clone().unwrap_or_default();
        if requested.is_empty() {
            return fallback();
        }
        if self.supported.is_empty() {
            return requested[0].clone();
        }
        for locale in &requested {
            if self.supported.contains(locale) {
                return locale.clone();
            }
        }
        for locale in &requested {
            let language = locale.language_only();
            if let Some(found) = self.supported.iter().find(|s| s.language() == language.language()) {
                return found.clone();
            }
        }
        self.default_locale.clone().unwrap_or_else(|| requested[0].clone())
    }

    fn set_locale(&self, _request: &mut WebRequest, _response: &mut WebResponse, _locale: Option<Locale>) -> ContextResult<()> {
        Err(ContextError::InvalidArgument(
            "cannot change HTTP Accept-Language header: use a different locale resolution strategy".into(),
        ))
    }
}

/// Always the same locale and time zone.
#[derive(Debug, Clone, Default)]
pub struct FixedLocaleResolver {
    locale: Locale,
    time_zone: Option<FixedOffset>,
}

impl FixedLocaleResolver {
    pub fn new(locale: Locale) -> Self {
        Self { locale, time_zone: None }
    }

    pub fn with_time_zone(mut self, time_zone: FixedOffset) -> Self {
        self.time_zone = Some(time_zone);
        self
    }
}

impl LocaleResolver for FixedLocaleResolver {
    fn resolve_locale(&self, _request: &WebRequest) -> Locale {
        self.locale.clone()
    }

    fn set_locale(&self, _request: &mut WebRequest, _response: &mut WebResponse, _locale: Option<Locale>) -> ContextResult<()> {
        Err(ContextError::InvalidArgument(
            "cannot change fixed locale: use a different locale resolution strategy".into(),
        ))
    }

    fn as_context_resolver(&self) -> Option<&dyn LocaleContextResolver> {
        Some(self)
    }
}

impl LocaleContextResolver for FixedLocaleResolver {
    fn resolve_locale_context(&self, _request: &WebRequest) -> LocaleContext {
        LocaleContext {
            locale: Some(self.locale.clone()),
            time_zone: self.time_zone,
        }
    }

    fn set_locale_context(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        _context: Option<LocaleContext>,
    ) -> ContextResult<()> {
        self.set_locale(request, response, None)
    }
}

/// Keeps a user-chosen locale and time zone in the session, falling back to
/// the default locale or the `Accept-Language` header.
#[derive(Debug, Clone, Default)]
pub struct SessionLocaleResolver {
    default_locale: Option<Locale>,
    default_time_zone: Option<FixedOffset>,
}

impl SessionLocaleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_locale(mut self, locale: Locale) -> Self {
        self.default_locale = Some(locale);
        self
    }

    pub fn with_default_time_zone(mut self, time_zone: FixedOffset) -> Self {
        self.default_time_zone = Some(time_zone);
        self
    }

    fn default_locale_for(&self, request: &WebRequest) -> Locale {
        self.default_locale
            .clone()
            .unwrap_or_else(|| AcceptHeaderLocaleResolver::new().resolve_locale(request))
    }
}

impl LocaleResolver for SessionLocaleResolver {
    fn resolve_locale(&self, request: &WebRequest) -> Locale {
        request
            .existing_session()
            .and_then(|s| s.attribute_as::<Locale>(LOCALE_SESSION_ATTRIBUTE))
            .map(|l| l.as_ref().clone())
            .unwrap_or_else(|| self.default_locale_for(request))
    }

    fn set_locale(&self, request: &mut WebRequest, response: &mut WebResponse, locale: Option<Locale>) -> ContextResult<()> {
        let context = locale.map(LocaleContext::new);
        self.set_locale_context(request, response, context)
    }

    fn as_context_resolver(&self) -> Option<&dyn LocaleContextResolver> {
        Some(self)
    }
}

impl LocaleContextResolver for SessionLocaleResolver {
    fn resolve_locale_context(&self, request: &WebRequest) -> LocaleContext {
        let time_zone = request
            .existing_session()
            .and_then(|s| s.attribute_as::<FixedOffset>(TIME_ZONE_SESSION_ATTRIBUTE))
            .map(|tz| *tz)
            .or(self.default_time_zone);
        LocaleContext {
            locale: Some(self.resolve_locale(request)),
            time_zone,
        }
    }

    fn set_locale_context(
        &self,
        request: &mut WebRequest,
        _response: &mut WebResponse,
        context: Option<LocaleContext>,
    ) -> ContextResult<()> {
        let context = context.unwrap_or_default();
        if let Some(session) = request.session(context.locale.is_some() || context.time_zone.is_some()) {
            match context.locale {
                Some(locale) => session.set_attribute(LOCALE_SESSION_ATTRIBUTE, Arc::new(locale)),
                None => {
                    session.remove_attribute(LOCALE_SESSION_ATTRIBUTE);
                }
            }
            match context.time_zone {
                Some(tz) => session.set_attribute(TIME_ZONE_SESSION_ATTRIBUTE, Arc::new(tz)),
                None => {
                    session.remove_attribute(TIME_ZONE_SESSION_ATTRIBUTE);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_header_without_supported_list_takes_best_quality() {
        let resolver = AcceptHeaderLocaleResolver::new();
        let request = WebRequest::get("/").with_header("Accept-Language", "en;q=0.5, fr-FR");
        assert_eq!(resolver.resolve_locale(&request).tag(), "fr-FR");
        assert_eq!(resolver.resolve_locale(&WebRequest::get("/")), Locale::english());
    }

    #[test]
    fn accept_header_falls_back_to_language_match() {
        let resolver = AcceptHeaderLocaleResolver::new().with_supported_locales(vec![Locale::us()]);
        let request = WebRequest::get("/").with_header("Accept-Language", "en-GB");
        assert_eq!(resolver.resolve_locale(&request), Locale::us());
    }

    #[test]
    fn only_context_resolvers_expose_time_zone() {
        let offset = FixedOffset::east_opt(3600).unwrap();
        let fixed = FixedLocaleResolver::new(Locale::new("de", Some("DE"))).with_time_zone(offset);
        let request = WebRequest::get("/");
        assert_eq!(resolve_locale_context(&fixed, &request).time_zone, Some(offset));

        let header = AcceptHeaderLocaleResolver::new();
        assert!(header.as_context_resolver().is_none());
        assert_eq!(resolve_locale_context(&header, &request).time_zone, None);
    }

    #[test]
    fn session_resolver_remembers_choice() {
        let resolver = SessionLocaleResolver::new().with_default_locale(Locale::english());
        let mut request = WebRequest::get("/");
        assert_eq!(resolver.resolve_locale(&request), Locale::english());
        resolver
            .set_locale(&mut request, &mut WebResponse::new(), Some(Locale::new("it", None)))
            .unwrap();
        assert_eq!(resolver.resolve_locale(&request).tag(), "it");
        resolver.set_locale(&mut request, &mut WebResponse::new(), None).unwrap();
        assert_eq!(resolver.resolve_locale(&request), Locale::english());
    }
}

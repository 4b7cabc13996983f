//! Themes: named message sources for view resources, chosen per request.

use std::collections::HashMap;
use std::sync::Arc;

use super::request::{WebRequest, WebResponse};
use crate::context::MessageSource;
use crate::error::{ContextError, ContextResult};

/// Theme name used when nothing else was chosen.
pub const DEFAULT_THEME_NAME: &str = "theme";
/// Session attribute holding the theme chosen by [`SessionThemeResolver`].
pub const THEME_SESSION_ATTRIBUTE: &str = "ferrous_context.web.theme.THEME";

/// A named set of messages such as stylesheet paths.
pub struct Theme {
    name: String,
    messages: Arc<dyn MessageSource>,
}

impl Theme {
    pub fn new(name: impl Into<String>, messages: Arc<dyn MessageSource>) -> Self {
        Self {
            name: name.into(),
            messages,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message_source(&self) -> &Arc<dyn MessageSource> {
        &self.messages
    }
}

impl std::fmt::Debug for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Theme").field("name", &self.name).finish()
    }
}

pub trait ThemeSource: Send + Sync {
    fn theme(&self, name: &str) -> Option<Arc<Theme>>;
}

pub trait ThemeResolver: Send + Sync {
    fn resolve_theme_name(&self, request: &WebRequest) -> String;

    fn set_theme_name(
        &self,
        request: &mut WebRequest,
        response: &mut WebResponse,
        name: Option<&str>,
    ) -> ContextResult<()>;
}

/// Themes registered up front by name.
#[derive(Default)]
pub struct StaticThemeSource {
    themes: HashMap<String, Arc<Theme>>,
}

impl StaticThemeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.themes.insert(theme.name().to_string(), Arc::new(theme));
        self
    }
}

impl ThemeSource for StaticThemeSource {
    fn theme(&self, name: &str) -> Option<Arc<Theme>> {
        self.themes.get(name).cloned()
    }
}

#[derive(Debug, Clone)]
pub struct FixedThemeResolver {
    name: String,
}

impl FixedThemeResolver {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for FixedThemeResolver {
    fn default() -> Self {
        Self::new(DEFAULT_THEME_NAME)
    }
}

impl ThemeResolver for FixedThemeResolver {
    fn resolve_theme_name(&self, _request: &WebRequest) -> String {
        self.name.clone()
    }

    fn set_theme_name(&self, _request: &mut WebRequest, _response: &mut WebResponse, _name: Option<&str>) -> ContextResult<()> {
        Err(ContextError::InvalidArgument(
            "cannot change theme: use a different theme resolution strategy".into(),
        ))
    }
}

/// Stores the chosen theme name in the session.
#[derive(Debug, Clone)]
pub struct SessionThemeResolver {
    default_name: String,
}

impl SessionThemeResolver {
    pub fn new(default_name: impl Into<String>) -> Self {
        Self {
            default_name: default_name.into(),
        }
    }
}

impl Default for SessionThemeResolver {
    fn default() -> Self {
        Self::new(DEFAULT_THEME_NAME)
    }
}

impl ThemeResolver for SessionThemeResolver {
    fn resolve_theme_name(&self, request: &WebRequest) -> String {
        request
            .existing_session()
            .and_then(|s| s.attribute_as::<String>(THEME_SESSION_ATTRIBUTE))
            .map(|name| name.as_ref().clone())
            .unwrap_or_else(|| self.default_name.clone())
    }

    fn set_theme_name(&self, request: &mut WebRequest, _response: &mut WebResponse, name: Option<&str>) -> ContextResult<()> {
        match name.filter(|n| !n.is_empty()) {
            Some(name) => {
                if let Some(session) = request.session(true) {
                    session.set_attribute(THEME_SESSION_ATTRIBUTE, Arc::new(name.to_string()));
                }
            }
            None => {
                if let Some(session) = request.existing_session() {
                    session.remove_attribute(THEME_SESSION_ATTRIBUTE);
                }
            }
        }
        Ok(())
    }
}

/// The theme for `request` when both a resolver and a source are present.
pub fn resolve_theme(
    resolver: Option<&dyn ThemeResolver>,
    source: Option<&dyn ThemeSource>,
    request: &WebRequest,
) -> Option<Arc<Theme>> {
    let (resolver, source) = (resolver?, source?);
    source.theme(&resolver.resolve_theme_name(request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StaticMessageSource;

    fn source() -> StaticThemeSource {
        let messages = StaticMessageSource::new();
        messages.add_message("css", None, "/themes/dark.css");
        StaticThemeSource::new().with_theme(Theme::new("dark", Arc::new(messages)))
    }

    #[test]
    fn theme_needs_resolver_and_source() {
        let request = WebRequest::get("/");
        let resolver = FixedThemeResolver::new("dark");
        let source = source();
        assert!(resolve_theme(Some(&resolver), None, &request).is_none());
        assert!(resolve_theme(None, Some(&source), &request).is_none());
        let theme = resolve_theme(Some(&resolver), Some(&source), &request).unwrap();
        assert_eq!(theme.name(), "dark");
    }

    #[test]
    fn session_resolver_switches_theme() {
        let resolver = SessionThemeResolver::default();
        let mut request = WebRequest::get("/");
        assert_eq!(resolver.resolve_theme_name(&request), DEFAULT_THEME_NAME);
        resolver.set_theme_name(&mut request, &mut WebResponse::new(), Some("dark")).unwrap();
        assert_eq!(resolver.resolve_theme_name(&request), "dark");
    }
}

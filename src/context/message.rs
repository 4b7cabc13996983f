//! Message lookup by code and locale.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ContextError, ContextResult};
use crate::locale::Locale;

/// Resolves message codes to text for a locale.
pub trait MessageSource: Send + Sync {
    /// Message for `code` with `{0}`, `{1}`, ... replaced by `args`, or `None`
    /// when no message is known.
    fn get_message(&self, code: &str, args: &[&str], locale: &Locale) -> Option<String>;

    fn get_message_or(&self, code: &str, args: &[&str], default: &str, locale: &Locale) -> String {
        self.get_message(code, args, locale)
            .unwrap_or_else(|| format_message(default, args))
    }

    fn require_message(&self, code: &str, args: &[&str], locale: &Locale) -> ContextResult<String> {
        self.get_message(code, args, locale)
            .ok_or_else(|| ContextError::NoSuchMessage {
                code: code.to_string(),
                locale: locale.tag(),
            })
    }
}

/// Replaces `{i}` placeholders with the matching argument.
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut out = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        out = out.replace(&format!("{{{i}}}"), arg);
    }
    out
}

/// Message source backed by templates registered in code.
///
/// Lookup tries the exact locale, then its language alone, then the
/// messages registered without a locale.
///
/// ```
/// use ferrous_context::{Locale, MessageSource, StaticMessageSource};
///
/// let source = StaticMessageSource::new();
/// source.add_message("greeting", Some(&Locale::english()), "Hello, {0}");
/// source.add_message("greeting", None, "Hi {0}");
///
/// let us = Locale::us();
/// assert_eq!(source.get_message("greeting", &["Ada"], &us).as_deref(), Some("Hello, Ada"));
/// let fr: Locale = "fr".parse().unwrap();
/// assert_eq!(source.get_message("greeting", &["Ada"], &fr).as_deref(), Some("Hi Ada"));
/// ```
#[derive(Debug, Default)]
pub struct StaticMessageSource {
    messages: RwLock<HashMap<(String, String), String>>,
}

impl StaticMessageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `template` for `code`; `None` registers the fallback.
    pub fn add_message(&self, code: &str, locale: Option<&Locale>, template: &str) {
        let tag = locale.map(Locale::tag).unwrap_or_default();
        self.messages
            .write()
            .insert((code.to_string(), tag), template.to_string());
    }

    fn lookup(&self, code: &str, tag: &str) -> Option<String> {
        self.messages
            .read()
            .get(&(code.to_string(), tag.to_string()))
            .cloned()
    }
}

impl MessageSource for StaticMessageSource {
    fn get_message(&self, code: &str, args: &[&str], locale: &Locale) -> Option<String> {
        let template = self
            .lookup(code, &locale.tag())
            .or_else(|| self.lookup(code, locale.language()))
            .or_else(|| self.lookup(code, ""))?;
        Some(format_message(&template, args))
    }
}

/// Message lookups against one source with a default locale.
#[derive(Clone)]
pub struct MessageSourceAccessor {
    source: Arc<dyn MessageSource>,
    default_locale: Locale,
}

impl MessageSourceAccessor {
    pub fn new(source: Arc<dyn MessageSource>) -> Self {
        Self::with_locale(source, Locale::default())
    }

    pub fn with_locale(source: Arc<dyn MessageSource>, default_locale: Locale) -> Self {
        Self {
            source,
            default_locale,
        }
    }

    pub fn default_locale(&self) -> &Locale {
        &self.default_locale
    }

    /// Message in the default locale; missing codes are an error.
    pub fn get_message(&self, code: &str, args: &[&str]) -> ContextResult<String> {
        self.source.require_message(code, args, &self.default_locale)
    }

    pub fn get_message_in(&self, code: &str, args: &[&str], locale: &Locale) -> ContextResult<String> {
        self.source.require_message(code, args, locale)
    }

    pub fn get_message_or(&self, code: &str, args: &[&str], default: &str) -> String {
        self.source
            .get_message_or(code, args, default, &self.default_locale)
    }
}

impl std::fmt::Debug for MessageSourceAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSourceAccessor")
            .field("default_locale", &self.default_locale)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_replaces_indexed_args() {
        assert_eq!(format_message("{1} before {0}", &["a", "b"]), "b before a");
        assert_eq!(format_message("no args", &["x"]), "no args");
    }

    #[test]
    fn accessor_reports_missing_code() {
        let accessor = MessageSourceAccessor::new(Arc::new(StaticMessageSource::new()));
        match accessor.get_message("missing", &[]) {
            Err(ContextError::NoSuchMessage { code, locale }) => {
                assert_eq!(code, "missing");
                assert_eq!(locale, "en");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(accessor.get_message_or("missing", &["z"], "fallback {0}"), "fallback z");
    }

    #[test]
    fn exact_locale_preferred_over_language() {
        let source = StaticMessageSource::new();
        source.add_message("color", Some(&Locale::english()), "colour");
        source.add_message("color", Some(&Locale::us()), "color");
        assert_eq!(source.get_message("color", &[], &Locale::us()).as_deref(), Some("color"));
        let gb: Locale = "en-GB".parse().unwrap();
        assert_eq!(source.get_message("color", &[], &gb).as_deref(), Some("colour"));
    }
}

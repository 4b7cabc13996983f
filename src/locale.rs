//! Language and region identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ContextError;

/// A language with an optional country, such as `en` or `en-US`.
///
/// Parsing accepts `-` or `_` as separator and normalizes case: the
/// language is lowercased and the country uppercased.
///
/// ```
/// use ferrous_context::Locale;
///
/// let locale: Locale = "pt_br".parse().unwrap();
/// assert_eq!(locale.tag(), "pt-BR");
/// assert_eq!(locale.language(), "pt");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locale {
    language: String,
    country: Option<String>,
}

impl Locale {
    pub fn new(language: &str, country: Option<&str>) -> Self {
        Self {
            language: language.to_ascii_lowercase(),
            country: country.filter(|c| !c.is_empty()).map(|c| c.to_ascii_uppercase()),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    /// The same locale without its country.
    pub fn language_only(&self) -> Locale {
        Locale::new(&self.language, None)
    }

    /// Tag in `language-COUNTRY` form.
    pub fn tag(&self) -> String {
        match &self.country {
            Some(country) => format!("{}-{}", self.language, country),
            None => self.language.clone(),
        }
    }

    pub fn english() -> Self {
        Self::new("en", None)
    }

    pub fn us() -> Self {
        Self::new("en", Some("US"))
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::english()
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

impl FromStr for Locale {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split(|c: char| c == '-' || c == '_');
        let language = parts.next().unwrap_or_default();
        if language.is_empty() || !language.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ContextError::InvalidArgument(format!("invalid locale '{s}'")));
        }
        let country = parts.next();
        if let Some(country) = country {
            if !country.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ContextError::InvalidArgument(format!("invalid locale '{s}'")));
            }
        }
        Ok(Locale::new(language, country))
    }
}

impl TryFrom<String> for Locale {
    type Error = ContextError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.tag()
    }
}

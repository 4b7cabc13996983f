//! Ant-style path patterns.
//!
//! `?` matches one character, `*` zero or more characters within a segment,
//! `**` zero or more segments, and `{name}` captures part of a segment as a
//! URI template variable.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::{ContextError, ContextResult};

const SEPARATOR: char = '/';

/// String-based path matching.
pub trait PathMatcher: Send + Sync {
    /// Whether `path` contains pattern syntax.
    fn is_pattern(&self, path: &str) -> bool;

    /// Whether `path` matches `pattern` completely.
    fn matches(&self, pattern: &str, path: &str) -> bool;

    /// Whether `pattern` could match `path` extended with more segments.
    fn match_start(&self, pattern: &str, path: &str) -> bool;

    /// Part of `path` matched by the wildcard portion of `pattern`.
    fn extract_path_within_pattern(&self, pattern: &str, path: &str) -> String;

    /// Values of the `{name}` variables in `pattern` for `path`.
    fn extract_uri_template_variables(
        &self,
        pattern: &str,
        path: &str,
    ) -> ContextResult<HashMap<String, String>>;

    /// Orders two patterns that both match `path`, most specific first.
    fn compare_specificity(&self, path: &str, pattern1: &str, pattern2: &str) -> Ordering;

    /// Combines a type-level and a method-level pattern.
    fn combine(&self, pattern1: &str, pattern2: &str) -> ContextResult<String>;
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Char(char),
    AnyChar,
    AnyString,
    Variable(String),
}

fn tokenize_segment(segment: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = segment.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '?' => tokens.push(Token::AnyChar),
            '*' => {
                if tokens.last() != Some(&Token::AnyString) {
                    tokens.push(Token::AnyString);
                }
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    name.push(inner);
                }
                if closed {
                    // Constraints after ':' are not evaluated; the variable takes any text.
                    let name = name.split(':').next().unwrap_or_default().to_string();
                    tokens.push(Token::Variable(name));
                } else {
                    tokens.push(Token::Char('{'));
                    tokens.extend(name.chars().map(Token::Char));
                }
            }
            other => tokens.push(Token::Char(other)),
        }
    }
    tokens
}

fn match_tokens(tokens: &[Token], text: &[char], captures: &mut Vec<(String, String)>) -> bool {
    let Some((first, rest)) = tokens.split_first() else {
        return text.is_empty();
    };
    match first {
        Token::Char(c) => text.first() == Some(c) && match_tokens(rest, &text[1..], captures),
        Token::AnyChar => !text.is_empty() && match_tokens(rest, &text[1..], captures),
        Token::AnyString | Token::Variable(_) => {
            for split in 0..=text.len() {
                let mark = captures.len();
                if let Token::Variable(name) = first {
                    captures.push((name.clone(), text[..split].iter().collect()));
                }
                if match_tokens(rest, &text[split..], captures) {
                    return true;
                }
                captures.truncate(mark);
            }
            false
        }
    }
}

fn match_segment(pattern: &str, segment: &str, captures: &mut Vec<(String, String)>) -> bool {
    let tokens = tokenize_segment(pattern);
    let text: Vec<char> = segment.chars().collect();
    match_tokens(&tokens, &text, captures)
}

fn split_path(path: &str) -> Vec<&str> {
    path.split(SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn match_parts(
    pattern: &[&str],
    path: &[&str],
    full: bool,
    captures: &mut Vec<(String, String)>,
) -> bool {
    let Some((first, rest)) = pattern.split_first() else {
        return path.is_empty();
    };
    if *first == "**" {
        for skip in 0..=path.len() {
            let mark = captures.len();
            if match_parts(rest, &path[skip..], full, captures) {
                return true;
            }
            captures.truncate(mark);
        }
        return false;
    }
    let Some((segment, remaining)) = path.split_first() else {
        // Path exhausted: a prefix match succeeds, a full match needs only `**` left.
        return !full || pattern.iter().all(|p| *p == "**");
    };
    let mark = captures.len();
    if match_segment(first, segment, captures) && match_parts(rest, remaining, full, captures) {
        return true;
    }
    captures.truncate(mark);
    false
}

/// [`PathMatcher`] with Ant-style wildcards and `/` as separator.
///
/// ```
/// use ferrous_context::{AntPathMatcher, PathMatcher};
///
/// let matcher = AntPathMatcher::new();
/// assert!(matcher.matches("/orders/*", "/orders/42"));
/// assert!(matcher.matches("/static/**/*.css", "/static/css/site/main.css"));
/// assert!(!matcher.matches("/orders/*", "/orders/42/items"));
///
/// let vars = matcher.extract_uri_template_variables("/orders/{id}", "/orders/42").unwrap();
/// assert_eq!(vars["id"], "42");
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct AntPathMatcher;

impl AntPathMatcher {
    pub fn new() -> Self {
        Self
    }

    fn do_match(&self, pattern: &str, path: &str, full: bool, captures: &mut Vec<(String, String)>) -> bool {
        if path.starts_with(SEPARATOR) != pattern.starts_with(SEPARATOR) {
            return false;
        }
        let pattern_parts = split_path(pattern);
        let path_parts = split_path(path);
        if !match_parts(&pattern_parts, &path_parts, full, captures) {
            return false;
        }
        if full && !pattern_parts.last().is_some_and(|p| p.contains('*')) {
            return pattern.ends_with(SEPARATOR) == path.ends_with(SEPARATOR);
        }
        true
    }
}

fn concat(path1: &str, path2: &str) -> String {
    let ends = path1.ends_with(SEPARATOR);
    let starts = path2.starts_with(SEPARATOR);
    if ends && starts {
        format!("{}{}", path1, &path2[1..])
    } else if ends || starts {
        format!("{path1}{path2}")
    } else {
        format!("{path1}{SEPARATOR}{path2}")
    }
}

struct PatternInfo {
    catch_all: bool,
    prefix: bool,
    variables: usize,
    single_wildcards: usize,
    double_wildcards: usize,
    length: usize,
}

impl PatternInfo {
    fn new(pattern: &str) -> Self {
        let double_wildcards = pattern.matches("**").count();
        let single_wildcards = pattern.matches('*').count() - 2 * double_wildcards;
        let variables = pattern.matches('{').count();
        let mut length = 0;
        let mut in_variable = false;
        for c in pattern.chars() {
            match c {
                '{' => {
                    in_variable = true;
                    length += 1;
                }
                '}' => in_variable = false,
                _ if !in_variable => length += 1,
                _ => {}
            }
        }
        Self {
            catch_all: pattern == "/**",
            prefix: !pattern.is_empty() && pattern.ends_with("/**") && pattern != "/**",
            variables,
            single_wildcards,
            double_wildcards,
            length,
        }
    }

    fn total(&self) -> usize {
        self.variables + self.single_wildcards + 2 * self.double_wildcards
    }
}

impl PathMatcher for AntPathMatcher {
    fn is_pattern(&self, path: &str) -> bool {
        let mut in_variable = false;
        for c in path.chars() {
            match c {
                '*' | '?' => return true,
                '{' => in_variable = true,
                '}' if in_variable => return true,
                _ => {}
            }
        }
        false
    }

    fn matches(&self, pattern: &str, path: &str) -> bool {
        self.do_match(pattern, path, true, &mut Vec::new())
    }

    fn match_start(&self, pattern: &str, path: &str) -> bool {
        self.do_match(pattern, path, false, &mut Vec::new())
    }

    fn extract_path_within_pattern(&self, pattern: &str, path: &str) -> String {
        let pattern_parts = split_path(pattern);
        let path_parts = split_path(path);
        let first_wildcard = pattern_parts
            .iter()
            .position(|p| p.contains('*') || p.contains('?'));
        match first_wildcard {
            Some(index) if index < path_parts.len() => path_parts[index..].join("/"),
            _ => String::new(),
        }
    }

    fn extract_uri_template_variables(
        &self,
        pattern: &str,
        path: &str,
    ) -> ContextResult<HashMap<String, String>> {
        let mut captures = Vec::new();
        if !self.do_match(pattern, path, true, &mut captures) {
            return Err(ContextError::InvalidArgument(format!(
                "pattern \"{pattern}\" is not a match for \"{path}\""
            )));
        }
        Ok(captures
            .into_iter()
            .map(|(name, value)| {
                let value = urlencoding::decode(&value)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or(value);
                (name, value)
            })
            .collect())
    }

    fn compare_specificity(&self, path: &str, pattern1: &str, pattern2: &str) -> Ordering {
        if pattern1 == pattern2 {
            return Ordering::Equal;
        }
        if pattern1 == path {
            return Ordering::Less;
        }
        if pattern2 == path {
            return Ordering::Greater;
        }
        let info1 = PatternInfo::new(pattern1);
        let info2 = PatternInfo::new(pattern2);
        info1
            .catch_all
            .cmp(&info2.catch_all)
            .then(info1.prefix.cmp(&info2.prefix))
            .then(info1.total().cmp(&info2.total()))
            .then(info2.length.cmp(&info1.length))
            .then(info1.single_wildcards.cmp(&info2.single_wildcards))
            .then(info1.variables.cmp(&info2.variables))
    }

    fn combine(&self, pattern1: &str, pattern2: &str) -> ContextResult<String> {
        if pattern1.is_empty() {
            return Ok(pattern2.to_string());
        }
        if pattern2.is_empty() {
            return Ok(pattern1.to_string());
        }
        let pattern1_has_variable = pattern1.contains('{');
        if pattern1 != pattern2 && !pattern1_has_variable && self.matches(pattern1, pattern2) {
            return Ok(pattern2.to_string());
        }
        if let Some(stripped) = pattern1.strip_suffix("/*") {
            return Ok(concat(stripped, pattern2));
        }
        if pattern1.ends_with("/**") {
            return Ok(concat(pattern1, pattern2));
        }

        let Some(star_dot) = pattern1.find("*.") else {
            return Ok(concat(pattern1, pattern2));
        };
        if pattern1_has_variable {
            return Ok(concat(pattern1, pattern2));
        }
        let ext1 = &pattern1[star_dot + 1..];
        let (file2, ext2) = match pattern2.find('.') {
            Some(dot) => (&pattern2[..dot], &pattern2[dot..]),
            None => (pattern2, ""),
        };
        let ext1_all = ext1 == ".*" || ext1.is_empty();
        let ext2_all = ext2 == ".*" || ext2.is_empty();
        if !ext1_all && !ext2_all {
            return Err(ContextError::InvalidArgument(format!(
                "cannot combine patterns: {pattern1} vs {pattern2}"
            )));
        }
        let ext = if ext1_all { ext2 } else { ext1 };
        Ok(format!("{file2}{ext}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m() -> AntPathMatcher {
        AntPathMatcher::new()
    }

    #[test]
    fn basic_matching() {
        assert!(m().matches("/test", "/test"));
        assert!(!m().matches("/test", "test"));
        assert!(m().matches("/t?st", "/test"));
        assert!(m().matches("/*.html", "/index.html"));
        assert!(m().matches("/**", "/a/b/c"));
        assert!(m().matches("/a/**/c", "/a/c"));
        assert!(m().matches("/a/**/c", "/a/x/y/c"));
        assert!(!m().matches("/a/**/c", "/a/x/y/d"));
        assert!(!m().matches("/test/", "/test"));
    }

    #[test]
    fn match_start_accepts_prefixes() {
        assert!(m().match_start("/a/*/c/**", "/a/b"));
        assert!(!m().match_start("/a/*/c", "/x"));
    }

    #[test]
    fn path_within_pattern() {
        assert_eq!(m().extract_path_within_pattern("/docs/cvs/commit.html", "/docs/cvs/commit.html"), "");
        assert_eq!(m().extract_path_within_pattern("/docs/*", "/docs/cvs/commit"), "cvs/commit");
        assert_eq!(m().extract_path_within_pattern("/docs/cvs/*.html", "/docs/cvs/commit.html"), "commit.html");
        assert_eq!(m().extract_path_within_pattern("/docs/**", "/docs/cvs/commit"), "cvs/commit");
        assert_eq!(m().extract_path_within_pattern("/*.html", "/docs/cvs/commit.html"), "docs/cvs/commit.html");
    }

    #[test]
    fn template_variables() {
        let vars = m()
            .extract_uri_template_variables("/hotels/{hotel}/bookings/{booking}.html", "/hotels/1/bookings/2.html")
            .unwrap();
        assert_eq!(vars["hotel"], "1");
        assert_eq!(vars["booking"], "2");
        assert!(m().extract_uri_template_variables("/hotels/{hotel}", "/motels/1").is_err());
    }

    #[test]
    fn combining() {
        let c = |a, b| m().combine(a, b).unwrap();
        assert_eq!(c("", ""), "");
        assert_eq!(c("/hotels", ""), "/hotels");
        assert_eq!(c("", "/hotels"), "/hotels");
        assert_eq!(c("/hotels/*", "booking"), "/hotels/booking");
        assert_eq!(c("/hotels/*", "/booking"), "/hotels/booking");
        assert_eq!(c("/hotels/**", "booking"), "/hotels/**/booking");
        assert_eq!(c("/hotels", "/booking"), "/hotels/booking");
        assert_eq!(c("/hotels/*", "{hotel}"), "/hotels/{hotel}");
        assert_eq!(c("/hotels/{hotel}", "booking"), "/hotels/{hotel}/booking");
        assert_eq!(c("/*.html", "/hotels"), "/hotels.html");
        assert_eq!(c("/*.html", "/hotels.*"), "/hotels.html");
        assert!(m().combine("/*.html", "/hotels.txt").is_err());
    }

    #[test]
    fn specificity() {
        let mut patterns = vec!["/**", "/hotels/**", "/hotels/{hotel}", "/hotels/new", "/hotels/*"];
        patterns.sort_by(|a, b| m().compare_specificity("/hotels/new", a, b));
        assert_eq!(patterns, vec!["/hotels/new", "/hotels/{hotel}", "/hotels/*", "/hotels/**", "/**"]);
    }

    #[test]
    fn detects_patterns() {
        assert!(m().is_pattern("/a/*"));
        assert!(m().is_pattern("/a/{id}"));
        assert!(!m().is_pattern("/a/b"));
        assert!(!m().is_pattern("/a/{b"));
    }
}

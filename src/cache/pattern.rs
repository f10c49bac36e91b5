//! URL / key patterns used by include/exclude filters and `clear`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

const REGEX_PREFIX: &str = "re:";

/// A plain substring, or a regular expression when written as `re:<expr>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UrlPattern {
    Contains(String),
    Regex(Regex),
}

impl UrlPattern {
    pub fn contains(fragment: impl Into<String>) -> Self {
        UrlPattern::Contains(fragment.into())
    }

    pub fn regex(expr: &str) -> crate::Result<Self> {
        Regex::new(expr).map(UrlPattern::Regex).map_err(|e| {
            crate::Error::configuration_with_context(
                format!("invalid URL pattern `{expr}`"),
                crate::ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("url_pattern"),
            )
        })
    }

    /// Parse the textual form: `re:` selects a regex, anything else is a substring.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s.strip_prefix(REGEX_PREFIX) {
            Some(expr) => Self::regex(expr),
            None => Ok(Self::contains(s)),
        }
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        match self {
            UrlPattern::Contains(s) => haystack.contains(s.as_str()),
            UrlPattern::Regex(re) => re.is_match(haystack),
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlPattern::Contains(s) => f.write_str(s),
            UrlPattern::Regex(re) => write!(f, "{}{}", REGEX_PREFIX, re.as_str()),
        }
    }
}

impl PartialEq for UrlPattern {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl TryFrom<String> for UrlPattern {
    type Error = crate::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<UrlPattern> for String {
    fn from(p: UrlPattern) -> Self {
        p.to_string()
    }
}

impl From<&str> for UrlPattern {
    fn from(s: &str) -> Self {
        UrlPattern::contains(s)
    }
}

impl From<Regex> for UrlPattern {
    fn from(re: Regex) -> Self {
        UrlPattern::Regex(re)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_pattern() {
        let p = UrlPattern::from("/api/auth");
        assert!(p.is_match("https://crm.example.com/api/auth/login"));
        assert!(!p.is_match("https://crm.example.com/api/cases"));
    }

    #[test]
    fn test_regex_pattern() {
        let p = UrlPattern::parse(r"re:/api/cases/\d+$").unwrap();
        assert!(p.is_match("/api/cases/42"));
        assert!(!p.is_match("/api/cases/42/notes"));
        assert_eq!(p.to_string(), r"re:/api/cases/\d+$");
    }

    #[test]
    fn test_invalid_regex_is_configuration_error() {
        let err = UrlPattern::parse("re:(unclosed").unwrap_err();
        assert!(matches!(err, crate::Error::Configuration { .. }));
    }

    #[test]
    fn test_serde_round_trip_through_strings() {
        let patterns: Vec<UrlPattern> =
            serde_yaml::from_str("- /api/auth\n- 're:^/api/reports/.*'\n").unwrap();
        assert_eq!(patterns[0], UrlPattern::contains("/api/auth"));
        assert!(matches!(patterns[1], UrlPattern::Regex(_)));
    }
}

//! Login URL scoping for form-like authenticators.

use crate::error::ConfigError;
use crate::http::Request;
use regex::Regex;
use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct UrlMatcherConfig {
    /// Treat every candidate as a regular expression.
    pub use_regex: bool,
    /// Compare against scheme, host, path and query instead of the path.
    pub check_full_url: bool,
}

#[derive(Clone, Debug)]
enum Candidate {
    Exact(String),
    Pattern(Regex),
}

/// Matches the current request against a fixed set of login URLs.
#[derive(Clone, Debug)]
pub struct UrlMatcher {
    urls: Vec<String>,
    candidates: Vec<Candidate>,
    check_full_url: bool,
}

impl UrlMatcher {
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] when a candidate does not compile
    /// in regex mode.
    pub fn new(urls: Vec<String>, config: &UrlMatcherConfig) -> Result<Self, ConfigError> {
        let candidates = urls
            .iter()
            .map(|url| {
                if config.use_regex {
                    Regex::new(url)
                        .map(Candidate::Pattern)
                        .map_err(|source| ConfigError::InvalidPattern {
                            pattern: url.clone(),
                            source,
                        })
                } else {
                    Ok(Candidate::Exact(url.clone()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            urls,
            candidates,
            check_full_url: config.check_full_url,
        })
    }

    #[must_use]
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// The string candidates are compared against.
    #[must_use]
    pub fn comparison_url(&self, request: &Request) -> String {
        if self.check_full_url {
            request.full_url()
        } else {
            request.path().to_string()
        }
    }

    /// True on the first matching candidate; an empty list always matches.
    #[must_use]
    pub fn matches(&self, request: &Request) -> bool {
        if self.candidates.is_empty() {
            return true;
        }
        let url = self.comparison_url(request);
        self.candidates.iter().any(|candidate| match candidate {
            Candidate::Exact(expected) => *expected == url,
            Candidate::Pattern(pattern) => pattern.is_match(&url),
        })
    }

    /// Diagnostic for a failed match, naming the compared URLs.
    #[must_use]
    pub fn mismatch_message(&self, request: &Request) -> String {
        format!(
            "Login URL `{}` did not match `{}`.",
            self.comparison_url(request),
            self.urls.join("` or `")
        )
    }
}

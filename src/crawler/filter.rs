//! Content filter: include/exclude patterns over URLs and page bodies
//!
//! Both predicates share the same two-list rule: when include patterns are
//! configured at least one must match, and any matching exclude pattern
//! rejects. Patterns are case-insensitive regular expressions.

use crate::config::FilterConfig;
use crate::url::normalize_absolute;
use crate::ConfigError;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

/// Path fragments of endpoints that are never documentation
const DENYLIST: &[&str] = &[
    "/api/", "/auth/", "/login/", "/logout/", "/signup/", "/admin/", "/account/", "/billing/",
    "/pricing/", "/search?",
];

#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    url_include: Vec<Regex>,
    url_exclude: Vec<Regex>,
    content_include: Vec<Regex>,
    content_exclude: Vec<Regex>,
    skip_urls: HashSet<String>,
}

impl ContentFilter {
    /// Compiles the configured patterns
    ///
    /// # Returns
    ///
    /// * `Ok(ContentFilter)` - Every pattern compiled
    /// * `Err(ConfigError::InvalidPattern)` - The first pattern that did not
    pub fn from_config(config: &FilterConfig) -> Result<Self, ConfigError> {
        let skip_urls = config
            .skip_urls
            .iter()
            .map(|u| {
                normalize_absolute(u)
                    .map(|n| n.to_string())
                    .unwrap_or_else(|_| u.trim().to_string())
            })
            .collect();

        Ok(Self {
            url_include: compile(&config.url_include)?,
            url_exclude: compile(&config.url_exclude)?,
            content_include: compile(&config.content_include)?,
            content_exclude: compile(&config.content_exclude)?,
            skip_urls,
        })
    }

    /// Decides whether a normalized URL may be crawled
    pub fn allow_url(&self, url: &str) -> bool {
        if self.skip_urls.contains(url) || is_denylisted(url) {
            return false;
        }
        passes(url, &self.url_include, &self.url_exclude)
    }

    /// Decides whether a fetched body may be saved
    pub fn allow_content(&self, body: &str) -> bool {
        passes(body, &self.content_include, &self.content_exclude)
    }
}

/// Returns true if the URL hits the fixed endpoint denylist
pub fn is_denylisted(url: &str) -> bool {
    let lowered = url.to_ascii_lowercase();
    DENYLIST.iter().any(|fragment| lowered.contains(fragment))
}

fn passes(text: &str, include: &[Regex], exclude: &[Regex]) -> bool {
    if !include.is_empty() && !include.iter().any(|re| re.is_match(text)) {
        return false;
    }
    !exclude.iter().any(|re| re.is_match(text))
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
        })
        .collect()
}

//! URL policy
//!
//! - Syntactic validation of citation URLs
//! - Specificity: homepage, search, category and login-wall detection
//! - Skip list of non-citation hosts (fonts, analytics, CDNs)
//! - Citation link extraction from rendered reports

use crate::error::PolicyError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

/// Hosts that never serve citable content
pub const DEFAULT_SKIP_HOSTS: &[&str] = &[
    "fonts.googleapis.com",
    "fonts.gstatic.com",
    "ajax.googleapis.com",
    "www.googletagmanager.com",
    "www.google-analytics.com",
    "cdnjs.cloudflare.com",
    "cdn.jsdelivr.net",
    "unpkg.com",
];

static HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)href\s*=\s*(?:"(https?://[^"]+)"|'(https?://[^']+)')"#).expect("valid regex")
});

/// Parse an authored URL, accepting only absolute http(s) URLs with a host
pub fn parse_citation_url(raw: &str) -> Result<Url, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty url".to_string());
    }
    let url = Url::parse(trimmed).map_err(|e| format!("{e}"))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{other}'")),
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err("missing host".to_string()),
    }
}

/// Decides whether a resolved URL points at a specific page
#[derive(Debug, Clone)]
pub struct PathPolicy {
    blocked: Vec<Regex>,
}

impl PathPolicy {
    /// Compile the blocked path patterns
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PolicyError> {
        let blocked = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|source| PolicyError::InvalidPattern {
                    pattern: p.as_ref().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { blocked })
    }

    /// Site root, or a search/category/login-wall page
    #[must_use]
    pub fn is_non_specific(&self, url: &Url) -> bool {
        let path = url.path();
        if path.is_empty() || path == "/" {
            return true;
        }
        let lowered = path.to_lowercase();
        self.blocked.iter().any(|re| re.is_match(&lowered))
    }
}

/// Hosts excluded from verification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkipList {
    hosts: Vec<String>,
}

impl SkipList {
    /// Create skip list from host names
    #[must_use]
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|h| h.into().trim().trim_start_matches('.').to_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    /// Skip list with the built-in non-citation hosts
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_SKIP_HOSTS.iter().copied())
    }

    /// Host names on the list
    #[inline]
    #[must_use]
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Check if the URL's host (or a parent domain) is listed
    #[must_use]
    pub fn matches(&self, raw_url: &str) -> bool {
        let Ok(url) = Url::parse(raw_url.trim()) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_lowercase();
        self.hosts.iter().any(|listed| {
            host == *listed
                || host
                    .strip_suffix(listed.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

/// Extract unique external link targets from an HTML document, in first-seen order
#[must_use]
pub fn extract_citation_urls(html: &str, skip: &SkipList) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for caps in HREF.captures_iter(html) {
        let Some(raw) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        let url = html_escape::decode_html_entities(raw.as_str()).into_owned();
        if skip.matches(&url) {
            continue;
        }
        if seen.insert(url.clone()) {
            urls.push(url);
        }
    }

    urls
}

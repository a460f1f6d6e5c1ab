//! Verifier configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Path patterns that mark a page as non-specific (search, listing, login wall).
///
/// Matched against the lowercased URL path.
pub const DEFAULT_BLOCKED_PATH_PATTERNS: &[&str] = &[
    r"^/(search|find|results?)(/|$)",
    r"^/(login|log-in|signin|sign-in|signup|sign-up|register|subscribe|paywall)(/|$)",
    r"^/(account|accounts)/(login|signin|sign-in)(/|$)",
    r"^/(category|categories|tag|tags|topic|topics)(/|$)",
    r"^/(index|home|default)\.(html?|php|aspx?)$",
    // bare locale roots such as /en/ or /pt-br
    r"^/(en|de|fr|es|it|pt|nl|sv|da|no|fi|pl|ru|tr|ja|ko|zh)(-[a-z]{2})?/?$",
];

/// Citation verifier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Per-fetch timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Maximum redirects followed before `redirect_loop`
    pub max_redirects: usize,
    /// Global cap on in-flight fetches
    pub max_concurrent_fetches: usize,
    /// Retries for transient transport errors
    pub transport_retries: u32,
    /// Base backoff in milliseconds, doubled per retry
    pub retry_backoff_ms: u64,
    /// Minimum similarity (0.0 - 1.0) for a reworded span to count as a paraphrase
    pub similarity_floor: f64,
    /// Minimum words on each side of a suspected splice
    pub min_splice_words: usize,
    /// Maximum body bytes read per document
    pub max_body_bytes: usize,
    /// User agent sent with every request
    pub user_agent: String,
    /// Regexes over the lowercased path that mark non-specific pages
    pub blocked_path_patterns: Vec<String>,
    /// Maximum pages kept in the per-run cache
    pub cache_capacity: u64,
}

impl VerifierConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With per-fetch timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With redirect limit
    #[inline]
    #[must_use]
    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// With concurrent fetch cap
    #[inline]
    #[must_use]
    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max;
        self
    }

    /// With transport retry policy
    #[inline]
    #[must_use]
    pub fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.transport_retries = retries;
        self.retry_backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With paraphrase similarity floor
    #[inline]
    #[must_use]
    pub fn with_similarity_floor(mut self, floor: f64) -> Self {
        self.similarity_floor = floor;
        self
    }

    /// Per-fetch timeout
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Backoff before retry number `attempt` (0-based)
    #[inline]
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(16);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            max_redirects: 3,
            max_concurrent_fetches: 5,
            transport_retries: 2,
            retry_backoff_ms: 250,
            similarity_floor: 0.6,
            min_splice_words: 3,
            max_body_bytes: 2 * 1024 * 1024,
            user_agent: concat!("pra-citation/", env!("CARGO_PKG_VERSION")).to_string(),
            blocked_path_patterns: DEFAULT_BLOCKED_PATH_PATTERNS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
            cache_capacity: 10_000,
        }
    }
}

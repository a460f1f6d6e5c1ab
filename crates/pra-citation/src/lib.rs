//! PRA Citation Verification
//!
//! Decides whether a URL an evidence source cites actually supports the claim
//! it is attached to, before any citation is shown to a user.
//!
//! # Checks
//!
//! - **Syntax**: absolute http(s) URL with a host, or `malformed_url`
//! - **Reachability**: HEAD (GET fallback), redirects followed up to a limit
//! - **Specificity**: site roots, search, category and login-wall pages rejected
//! - **Quote**: verbatim match on visible text, paraphrase correction, splice refusal
//!
//! # Architecture
//!
//! ```text
//! ProposedCitation → parse → PageCache ─miss→ PageFetcher (HEAD/GET, redirects)
//!                              │                   ↓
//!                              └──── hit ──── ResolvedPage (visible text)
//!                                                  ↓
//!                                   QuoteMatcher → VerificationRecord
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use pra_citation::{CitationVerifier, ProposedCitation, ReqwestFetcher, VerifierConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = VerifierConfig::default();
//! let fetcher = Arc::new(ReqwestFetcher::new(&config)?);
//! let verifier = CitationVerifier::new(config, fetcher)?;
//!
//! let record = verifier
//!     .verify(&ProposedCitation::new("https://example.com/report").with_quote("42% of users"))
//!     .await;
//! println!("{:?}", record.status);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod html;
pub mod matching;
pub mod types;
pub mod url_policy;
mod verifier;

// Re-exports for convenience
pub use cache::CacheStats;
pub use config::{VerifierConfig, DEFAULT_BLOCKED_PATH_PATTERNS};
pub use error::{FetchError, PolicyError, TransportErrorKind};
pub use fetch::{FetchMethod, FetchResponse, PageFetcher, ReqwestFetcher, StaticFetcher};
pub use matching::{normalize, QuoteMatch, QuoteMatcher};
pub use types::{
    Classification, HttpOutcome, ProposedCitation, RejectionReason, VerificationRecord,
    VerificationStatus,
};
pub use url_policy::{
    extract_citation_urls, parse_citation_url, PathPolicy, SkipList, DEFAULT_SKIP_HOSTS,
};
pub use verifier::CitationVerifier;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

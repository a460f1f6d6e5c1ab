//! Citation data model
//!
//! - [`ProposedCitation`]: what an evidence source claims to cite
//! - [`VerificationRecord`]: the verifier's immutable verdict on it

use crate::error::TransportErrorKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A citation as authored by an evidence source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedCitation {
    /// URL exactly as authored
    pub url: String,
    /// Verbatim excerpt the claim relies on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_text: Option<String>,
    /// Title or publication name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_label: Option<String>,
}

impl ProposedCitation {
    /// Create citation for a URL
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            quoted_text: None,
            source_label: None,
        }
    }

    /// With quoted excerpt
    #[inline]
    #[must_use]
    pub fn with_quote(mut self, quote: impl Into<String>) -> Self {
        self.quoted_text = Some(quote.into());
        self
    }

    /// With source label
    #[inline]
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.source_label = Some(label.into());
        self
    }

    /// Quote to match, ignoring blank excerpts
    #[inline]
    #[must_use]
    pub fn quote(&self) -> Option<&str> {
        self.quoted_text
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}

/// Verdict on a citation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Reachable, article-specific, quote found verbatim (or no quote given)
    Verified,
    /// Quote only found reworded; see `corrected_quote`
    UnverifiedParaphrase,
    /// Must not be shown to the user
    Rejected,
}

/// What kind of resource the URL turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// A specific page distinct from the site root
    Article,
    /// Site root, search, category or login-wall page
    Homepage,
    /// Redirect chain too long or cyclic
    RedirectLoop,
    /// Final status outside [200, 400)
    ErrorPage,
    /// Transport failure
    Unreachable,
}

/// Result of the network exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum HttpOutcome {
    /// No request was issued
    NotAttempted,
    /// Final HTTP status code
    Status(u16),
    /// Transport failure tag
    Transport(TransportErrorKind),
}

impl HttpOutcome {
    /// Status code if one was received
    #[inline]
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for HttpOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAttempted => f.write_str("-"),
            Self::Status(code) => write!(f, "{code}"),
            Self::Transport(kind) => write!(f, "{kind}"),
        }
    }
}

/// Machine-readable rejection reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Not an absolute http(s) URL
    MalformedUrl,
    /// Host is on the non-citation skip list
    SkippedHost,
    /// Transport failure
    Unreachable,
    /// Too many redirects or a redirect cycle
    RedirectLoop,
    /// Error status code
    ErrorPage,
    /// Resolves to a non-specific page
    Homepage,
    /// Quote absent, or stitched from non-adjacent passages
    QuoteNotFound,
}

impl RejectionReason {
    /// Stable tag
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MalformedUrl => "malformed_url",
            Self::SkippedHost => "skipped_host",
            Self::Unreachable => "unreachable",
            Self::RedirectLoop => "redirect_loop",
            Self::ErrorPage => "error_page",
            Self::Homepage => "homepage",
            Self::QuoteNotFound => "quote_not_found",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable verdict produced by the verifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    /// URL as authored
    pub url: String,
    /// Post-redirect URL, or the canonical URL when the page declares one
    pub resolved_url: Option<String>,
    /// Verdict
    pub status: VerificationStatus,
    /// Network outcome
    pub http_outcome: HttpOutcome,
    /// Resource classification; absent when no request was issued
    pub classification: Option<Classification>,
    /// Quote found verbatim
    pub matched_quote: Option<String>,
    /// Actual source wording when the quote was paraphrased
    pub corrected_quote: Option<String>,
    /// Typed rejection reason
    pub rejection: Option<RejectionReason>,
    /// Human-readable explanation for rejections
    pub reason: Option<String>,
}

impl VerificationRecord {
    pub(crate) fn rejected(
        url: impl Into<String>,
        rejection: RejectionReason,
        classification: Option<Classification>,
        http_outcome: HttpOutcome,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            resolved_url: None,
            status: VerificationStatus::Rejected,
            http_outcome,
            classification,
            matched_quote: None,
            corrected_quote: None,
            rejection: Some(rejection),
            reason: Some(reason.into()),
        }
    }

    pub(crate) fn accepted(
        url: impl Into<String>,
        resolved_url: String,
        status: u16,
    ) -> Self {
        Self {
            url: url.into(),
            resolved_url: Some(resolved_url),
            status: VerificationStatus::Verified,
            http_outcome: HttpOutcome::Status(status),
            classification: Some(Classification::Article),
            matched_quote: None,
            corrected_quote: None,
            rejection: None,
            reason: None,
        }
    }

    pub(crate) fn with_resolved_url(mut self, resolved: Option<String>) -> Self {
        self.resolved_url = resolved;
        self
    }

    /// Check if verified
    #[inline]
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.status == VerificationStatus::Verified
    }

    /// Check if rejected
    #[inline]
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.status == VerificationStatus::Rejected
    }
}

//! Error types for citation verification
//!
//! Verification itself never fails with an `Err`: every problem with a
//! citation ends up as a rejected [`VerificationRecord`](crate::VerificationRecord).
//! The errors here cover the layers underneath:
//! - Transport failures reported by a [`PageFetcher`](crate::PageFetcher)
//! - Invalid verifier configuration

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport failure category, recorded as the `http_outcome` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// Request exceeded the per-fetch timeout
    Timeout,
    /// Host name could not be resolved
    Dns,
    /// Remote end refused the connection
    ConnectionRefused,
    /// Any other connection-level failure
    Connect,
    /// TLS handshake or certificate failure
    Tls,
    /// Connection dropped while reading the body
    Body,
    /// Unclassified transport failure
    Other,
}

impl TransportErrorKind {
    /// Whether a retry with backoff may succeed.
    ///
    /// DNS and TLS failures do not heal within a run.
    #[inline]
    #[must_use]
    pub fn is_transient(self) -> bool {
        !matches!(self, Self::Dns | Self::Tls)
    }

    /// Stable tag used in diagnostics
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Dns => "dns",
            Self::ConnectionRefused => "connection_refused",
            Self::Connect => "connect",
            Self::Tls => "tls",
            Self::Body => "body",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by a page fetcher
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Network-level failure
    #[error("transport error ({kind}): {message}")]
    Transport {
        /// Failure category
        kind: TransportErrorKind,
        /// Underlying message
        message: String,
    },

    /// HTTP client could not be constructed
    #[error("http client setup failed: {0}")]
    ClientSetup(String),
}

impl FetchError {
    /// Create a transport error
    #[inline]
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            message: message.into(),
        }
    }

    /// Transport category, if this is a transport failure
    #[inline]
    #[must_use]
    pub fn kind(&self) -> Option<TransportErrorKind> {
        match self {
            Self::Transport { kind, .. } => Some(*kind),
            Self::ClientSetup(_) => None,
        }
    }

    /// Check if the fetch should be retried with backoff
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind().is_some_and(TransportErrorKind::is_transient)
    }
}

/// Errors building a verifier from its configuration
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// A blocked path pattern is not a valid regex
    #[error("invalid blocked path pattern '{pattern}': {source}")]
    InvalidPattern {
        /// Offending pattern
        pattern: String,
        /// Regex compile error
        #[source]
        source: regex::Error,
    },

    /// Numeric setting out of range
    #[error("invalid verifier setting: {0}")]
    InvalidSetting(String),
}

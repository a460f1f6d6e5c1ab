//! Error types for PRA Core
//!
//! Provides error handling for:
//! - Capability failures (evidence sources, curator, synthesizer, assembler)
//! - Branch and verification exhaustion
//! - Deadline expiry
//! - Run state machine violations
//! - Configuration problems

use crate::run::RunState;
use pra_citation::PolicyError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure taxonomy shared by diagnostics and run records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Transient network failure
    Transport,
    /// Homepage, redirect loop, error page or missing quote
    PolicyRejection,
    /// Bad URL syntax or unparseable payload
    MalformedInput,
    /// Capability unavailable or contract-violating output
    CapabilityFailure,
    /// Run-level deadline expired
    DeadlineExceeded,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transport => "transport",
            Self::PolicyRejection => "policy_rejection",
            Self::MalformedInput => "malformed_input",
            Self::CapabilityFailure => "capability_failure",
            Self::DeadlineExceeded => "deadline_exceeded",
        })
    }
}

/// Errors reported by external collaborators
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// Capability could not be reached
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    /// Call exceeded the capability timeout
    #[error("capability timed out after {timeout_ms}ms")]
    Timeout {
        /// Timeout that expired
        timeout_ms: u64,
    },

    /// Output did not match the expected schema
    #[error("malformed capability output: {0}")]
    MalformedOutput(String),

    /// Output parsed but broke the capability contract
    #[error("capability contract violation: {0}")]
    ContractViolation(String),
}

impl CapabilityError {
    /// Check if the call may succeed when repeated
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }

    /// Taxonomy class of this error
    #[inline]
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MalformedOutput(_) => ErrorClass::MalformedInput,
            _ => ErrorClass::CapabilityFailure,
        }
    }
}

/// Main pipeline error type
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A capability failed where no sibling could absorb it
    #[error("{stage} capability failed: {source}")]
    Capability {
        /// Stage in which the failure happened
        stage: RunState,
        /// Underlying failure
        #[source]
        source: CapabilityError,
    },

    /// Both evidence branches failed
    #[error("both evidence branches failed (supporting: {supporting}; refuting: {refuting})")]
    AllBranchesFailed {
        /// Supporting branch failure
        supporting: CapabilityError,
        /// Refuting branch failure
        refuting: CapabilityError,
    },

    /// Every gathered claim ended unverifiable
    #[error("verification exhausted for all {claims} claims")]
    VerificationExhausted {
        /// Number of gathered claims
        claims: usize,
    },

    /// Synthesizer output references claims inconsistently
    #[error("synthesizer contract violation: {0}")]
    SynthesizerContract(String),

    /// Overall pipeline deadline expired
    #[error("pipeline deadline of {deadline_ms}ms exceeded during {stage}")]
    DeadlineExceeded {
        /// Stage in flight when the deadline fired
        stage: RunState,
        /// Configured deadline
        deadline_ms: u64,
    },

    /// Run state machine violation
    #[error("illegal run transition: {from} -> {to}")]
    IllegalTransition {
        /// Current state
        from: RunState,
        /// Requested state
        to: RunState,
    },

    /// Every input source failed curation
    #[error("curation failed for all {sources} input sources")]
    CurationFailed {
        /// Number of sources given
        sources: usize,
    },

    /// Verifier could not be built
    #[error("verifier setup failed: {0}")]
    Verifier(#[from] PolicyError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Wrap a capability error raised in `stage`
    #[inline]
    pub fn capability(stage: RunState, source: CapabilityError) -> Self {
        Self::Capability { stage, source }
    }

    /// Taxonomy class of this error
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Capability { source, .. } => source.class(),
            Self::AllBranchesFailed { .. }
            | Self::SynthesizerContract(_)
            | Self::CurationFailed { .. } => ErrorClass::CapabilityFailure,
            Self::VerificationExhausted { .. } => ErrorClass::PolicyRejection,
            Self::DeadlineExceeded { .. } => ErrorClass::DeadlineExceeded,
            Self::IllegalTransition { .. } | Self::Verifier(_) | Self::Config(_) => {
                ErrorClass::MalformedInput
            }
        }
    }

    /// Check if rerunning the pipeline may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Capability { source, .. } => source.is_retryable(),
            Self::AllBranchesFailed {
                supporting,
                refuting,
            } => supporting.is_retryable() || refuting.is_retryable(),
            Self::DeadlineExceeded { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_errors() {
        let err = PipelineError::DeadlineExceeded {
            stage: RunState::Verifying,
            deadline_ms: 1_000,
        };
        assert_eq!(err.class(), ErrorClass::DeadlineExceeded);
        assert!(err.is_retryable());

        let err = PipelineError::capability(
            RunState::Synthesizing,
            CapabilityError::MalformedOutput("not json".into()),
        );
        assert_eq!(err.class(), ErrorClass::MalformedInput);
        assert!(!err.is_retryable());

        let err = PipelineError::AllBranchesFailed {
            supporting: CapabilityError::Timeout { timeout_ms: 10 },
            refuting: CapabilityError::ContractViolation("stance".into()),
        };
        assert_eq!(err.class(), ErrorClass::CapabilityFailure);
        assert!(err.is_retryable());
    }

    #[test]
    fn display_includes_stage() {
        let err = PipelineError::capability(
            RunState::Curating,
            CapabilityError::Unavailable("offline".into()),
        );
        assert_eq!(
            err.to_string(),
            "curating capability failed: capability unavailable: offline"
        );
    }
}

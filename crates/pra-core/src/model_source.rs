//! Evidence source backed by a text-completion model

use crate::capability::EvidenceSource;
use crate::error::CapabilityError;
use crate::schema::{parse_claims, parse_regenerated};
use crate::types::{Claim, CuratedContext, Stance};
use async_trait::async_trait;
use pra_citation::VerificationRecord;
use serde::Serialize;
use std::time::Duration;

/// Structured request sent to a language model
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum CompletionRequest {
    /// Produce claims for one stance
    Generate {
        /// Hypothesis under test
        hypothesis: String,
        /// Merged curation context
        context: CuratedContext,
        /// Branch stance
        stance: Stance,
    },
    /// Replace one claim whose citation was rejected
    Regenerate {
        /// Claim as previously emitted
        claim: Claim,
        /// Rejection tag, e.g. `homepage`
        rejection_reason: String,
        /// Verifier explanation
        detail: Option<String>,
    },
}

/// Text-completion capability
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a request, returning raw model text
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CapabilityError>;
}

/// Adapts a [`LanguageModel`] into an [`EvidenceSource`]
#[derive(Debug, Clone)]
pub struct ModelEvidenceSource<M> {
    model: M,
    max_attempts: u32,
    backoff: Duration,
}

impl<M: LanguageModel> ModelEvidenceSource<M> {
    /// Create adapter with 3 attempts and a 2s base backoff
    #[inline]
    #[must_use]
    pub fn new(model: M) -> Self {
        Self {
            model,
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retries(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    async fn complete_with_retry(&self, request: &CompletionRequest) -> Result<String, CapabilityError> {
        let mut attempt = 1;
        loop {
            match self.model.complete(request).await {
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff * 2u32.saturating_pow(attempt - 1);
                    tracing::warn!(
                        "Model call failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt,
                        self.max_attempts,
                        delay,
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[async_trait]
impl<M: LanguageModel> EvidenceSource for ModelEvidenceSource<M> {
    async fn generate(
        &self,
        hypothesis: &str,
        context: &CuratedContext,
        stance: Stance,
    ) -> Result<Vec<Claim>, CapabilityError> {
        let request = CompletionRequest::Generate {
            hypothesis: hypothesis.to_string(),
            context: context.clone(),
            stance,
        };
        let raw = self.complete_with_retry(&request).await?;
        parse_claims(&raw, stance)
    }

    async fn regenerate(
        &self,
        claim: &Claim,
        rejection: &VerificationRecord,
    ) -> Result<Option<Claim>, CapabilityError> {
        let request = CompletionRequest::Regenerate {
            claim: claim.clone(),
            rejection_reason: rejection
                .rejection
                .map_or_else(|| "rejected".to_string(), |r| r.as_str().to_string()),
            detail: rejection.reason.clone(),
        };
        let raw = self.complete_with_retry(&request).await?;
        parse_regenerated(&raw, claim)
    }
}

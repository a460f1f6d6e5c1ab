//! Verification gate
//!
//! Applies verifier verdicts to a batch of claims:
//! - `verified` passes through unchanged
//! - `unverified_paraphrase` keeps the claim with the source's wording substituted
//! - `rejected` asks the owning evidence source for an alternative, bounded by
//!   a `rounds_remaining` counter; once exhausted the citation is stripped and
//!   the claim kept as `unverifiable`
//!
//! Claims are gated concurrently and reassembled in input order.

use crate::capability::Regenerator;
use crate::config::GateConfig;
use crate::error::CapabilityError;
use crate::schema::validate_claim;
use crate::types::{CitationStatus, Claim, GatedClaim};
use futures::stream::{self, StreamExt};
use pra_citation::{
    CitationVerifier, RejectionReason, SkipList, VerificationRecord, VerificationStatus,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Why a citation attempt did not survive a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionNote {
    /// Round in which it happened (1-based)
    pub round: u32,
    /// Citation URL involved
    pub url: String,
    /// Rejection tag, e.g. `homepage` or `regeneration_failed`
    pub reason: String,
    /// Verifier or capability explanation
    pub detail: Option<String>,
}

/// Per-claim audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimDiagnostic {
    /// Position in the input batch
    pub index: usize,
    /// Verification rounds consumed
    pub rounds: u32,
    /// Final citation state
    pub citation_status: CitationStatus,
    /// Rejections in round order
    pub rejections: Vec<RejectionNote>,
}

/// Gate result, in input order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GateOutcome {
    /// Claims allowed to proceed
    pub accepted: Vec<GatedClaim>,
    /// Diagnostics aligned with `accepted`
    pub diagnostics: Vec<ClaimDiagnostic>,
}

impl GateOutcome {
    /// Claims that went through at least one verification round
    #[must_use]
    pub fn verified_attempts(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.rounds > 0).count()
    }

    /// No claim is left with a usable status and at least one ran out of rounds
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.verified_attempts() > 0
            && self
                .accepted
                .iter()
                .all(|c| c.citation_status == CitationStatus::Unverifiable)
    }

    /// Count of claims with `status`
    #[must_use]
    pub fn count(&self, status: CitationStatus) -> usize {
        self.accepted
            .iter()
            .filter(|c| c.citation_status == status)
            .count()
    }
}

/// Gates claims through a shared per-run verifier
#[derive(Debug, Clone)]
pub struct VerificationGate {
    verifier: Arc<CitationVerifier>,
    skip_hosts: SkipList,
    config: GateConfig,
    regeneration_timeout: Option<Duration>,
}

impl VerificationGate {
    /// Create gate
    #[must_use]
    pub fn new(verifier: Arc<CitationVerifier>, skip_hosts: SkipList, config: GateConfig) -> Self {
        Self {
            verifier,
            skip_hosts,
            config,
            regeneration_timeout: None,
        }
    }

    /// Bound each regeneration call
    #[inline]
    #[must_use]
    pub fn with_regeneration_timeout(mut self, timeout: Duration) -> Self {
        self.regeneration_timeout = Some(timeout);
        self
    }

    /// Underlying verifier
    #[inline]
    #[must_use]
    pub fn verifier(&self) -> &CitationVerifier {
        &self.verifier
    }

    /// Gate `claims`, allowing at most `max_rounds` verification rounds per claim
    pub async fn gate(
        &self,
        claims: Vec<Claim>,
        regenerator: &dyn Regenerator,
        max_rounds: u32,
    ) -> GateOutcome {
        let total = claims.len();
        let max_rounds = max_rounds.max(1);
        let mut slots: Vec<Option<(GatedClaim, ClaimDiagnostic)>> = vec![None; total];

        let mut results = stream::iter(claims.into_iter().enumerate())
            .map(|(index, claim)| self.gate_claim(index, claim, regenerator, max_rounds))
            .buffer_unordered(self.config.max_concurrent_verifications.max(1));

        while let Some((index, gated, diagnostic)) = results.next().await {
            slots[index] = Some((gated, diagnostic));
        }

        let (accepted, diagnostics): (Vec<_>, Vec<_>) = slots.into_iter().flatten().unzip();
        let outcome = GateOutcome {
            accepted,
            diagnostics,
        };
        tracing::info!(
            claims = total,
            verified = outcome.count(CitationStatus::Verified),
            corrected = outcome.count(CitationStatus::Corrected),
            unverifiable = outcome.count(CitationStatus::Unverifiable),
            "Verification gate finished"
        );
        outcome
    }

    async fn gate_claim(
        &self,
        index: usize,
        claim: Claim,
        regenerator: &dyn Regenerator,
        max_rounds: u32,
    ) -> (usize, GatedClaim, ClaimDiagnostic) {
        let mut current = claim;
        let mut rounds_remaining = max_rounds;
        let mut diagnostic = ClaimDiagnostic {
            index,
            rounds: 0,
            citation_status: CitationStatus::Uncited,
            rejections: Vec::new(),
        };

        let gated = loop {
            let Some(citation) = current.proposed_citation.clone() else {
                break GatedClaim::uncited(current);
            };

            if self.skip_hosts.matches(&citation.url) {
                diagnostic.rejections.push(RejectionNote {
                    round: diagnostic.rounds,
                    url: citation.url,
                    reason: RejectionReason::SkippedHost.as_str().to_string(),
                    detail: Some("host is on the non-citation skip list".to_string()),
                });
                break GatedClaim::unverifiable(current);
            }

            rounds_remaining -= 1;
            diagnostic.rounds += 1;
            let record = self.verifier.verify(&citation).await;

            match record.status {
                VerificationStatus::Verified => {
                    break GatedClaim {
                        claim: current,
                        citation_status: CitationStatus::Verified,
                        verification: Some(record),
                    };
                }
                VerificationStatus::UnverifiedParaphrase => {
                    if let Some(citation) = current.proposed_citation.as_mut() {
                        citation.quoted_text.clone_from(&record.corrected_quote);
                    }
                    break GatedClaim {
                        claim: current,
                        citation_status: CitationStatus::Corrected,
                        verification: Some(record),
                    };
                }
                VerificationStatus::Rejected => {}
            }

            tracing::debug!(
                claim_index = index,
                round = diagnostic.rounds,
                url = %record.url,
                "Citation rejected: {}",
                record.reason.as_deref().unwrap_or("-")
            );
            diagnostic.rejections.push(RejectionNote {
                round: diagnostic.rounds,
                url: record.url.clone(),
                reason: record
                    .rejection
                    .map_or_else(|| "rejected".to_string(), |r| r.as_str().to_string()),
                detail: record.reason.clone(),
            });

            if rounds_remaining == 0 {
                break GatedClaim::unverifiable(current);
            }

            match self.regenerate(regenerator, &current, &record).await {
                Ok(Some(next)) => current = next,
                Ok(None) => {
                    diagnostic.rejections.push(RejectionNote {
                        round: diagnostic.rounds,
                        url: record.url,
                        reason: "regeneration_declined".to_string(),
                        detail: None,
                    });
                    break GatedClaim::unverifiable(current);
                }
                Err(err) => {
                    tracing::warn!(claim_index = index, "Regeneration failed: {}", err);
                    diagnostic.rejections.push(RejectionNote {
                        round: diagnostic.rounds,
                        url: record.url,
                        reason: "regeneration_failed".to_string(),
                        detail: Some(err.to_string()),
                    });
                    break GatedClaim::unverifiable(current);
                }
            }
        };

        diagnostic.citation_status = gated.citation_status;
        (index, gated, diagnostic)
    }

    async fn regenerate(
        &self,
        regenerator: &dyn Regenerator,
        claim: &Claim,
        record: &VerificationRecord,
    ) -> Result<Option<Claim>, CapabilityError> {
        let call = regenerator.regenerate(claim, record);
        let regenerated = match self.regeneration_timeout {
            Some(timeout) => tokio::time::timeout(timeout, call).await.map_err(|_| {
                CapabilityError::Timeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }
            })??,
            None => call.await?,
        };
        // only the citation may change; text and stance stay as emitted
        regenerated
            .map(|next| {
                validate_claim(next, claim.stance).map(|next| Claim {
                    proposed_citation: next.proposed_citation,
                    ..claim.clone()
                })
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stance;
    use async_trait::async_trait;
    use pra_citation::{ProposedCitation, StaticFetcher, VerifierConfig};

    const ARTICLE_URL: &str = "https://example.com/research/checkout";
    const ARTICLE: &str = "<p>Users are frustrated with checkout friction.</p>";

    struct Declines;

    #[async_trait]
    impl Regenerator for Declines {
        async fn regenerate(
            &self,
            _claim: &Claim,
            _rejection: &VerificationRecord,
        ) -> Result<Option<Claim>, CapabilityError> {
            Ok(None)
        }
    }

    fn gate(fetcher: StaticFetcher) -> VerificationGate {
        let verifier = CitationVerifier::new(VerifierConfig::default(), Arc::new(fetcher)).unwrap();
        VerificationGate::new(Arc::new(verifier), SkipList::with_defaults(), GateConfig::default())
    }

    fn cited(url: &str, quote: &str) -> Claim {
        Claim::new(Stance::Supporting, "claim")
            .with_citation(ProposedCitation::new(url).with_quote(quote))
    }

    #[tokio::test]
    async fn paraphrase_is_corrected_in_place() {
        let gate = gate(StaticFetcher::new().with_page(ARTICLE_URL, ARTICLE));
        let outcome = gate
            .gate(
                vec![cited(ARTICLE_URL, "Checkout friction frustrates users")],
                &Declines,
                3,
            )
            .await;

        let gated = &outcome.accepted[0];
        assert_eq!(gated.citation_status, CitationStatus::Corrected);
        assert_eq!(
            gated.claim.proposed_citation.as_ref().unwrap().quoted_text.as_deref(),
            Some("Users are frustrated with checkout friction")
        );
        assert_eq!(outcome.diagnostics[0].rounds, 1);
    }

    #[tokio::test]
    async fn skipped_host_is_unverifiable_without_fetching() {
        let gate = gate(StaticFetcher::new());
        let outcome = gate
            .gate(
                vec![cited("https://fonts.googleapis.com/css?family=Inter", "x")],
                &Declines,
                3,
            )
            .await;

        assert_eq!(outcome.accepted[0].citation_status, CitationStatus::Unverifiable);
        assert!(!outcome.accepted[0].claim.is_cited());
        assert_eq!(outcome.diagnostics[0].rounds, 0);
        assert_eq!(
            outcome.diagnostics[0].rejections[0].reason,
            RejectionReason::SkippedHost.as_str()
        );
        assert_eq!(gate.verifier().stats().lookups, 0);
        assert!(!outcome.is_exhausted());
    }

    #[tokio::test]
    async fn declined_regeneration_strips_citation() {
        let gate = gate(StaticFetcher::new().with_page("https://example.com/", ARTICLE));
        let outcome = gate
            .gate(vec![cited("https://example.com/", "anything")], &Declines, 3)
            .await;

        let gated = &outcome.accepted[0];
        assert_eq!(gated.citation_status, CitationStatus::Unverifiable);
        assert!(gated.verification.is_none());
        let reasons: Vec<&str> = outcome.diagnostics[0]
            .rejections
            .iter()
            .map(|r| r.reason.as_str())
            .collect();
        assert_eq!(reasons, vec!["homepage", "regeneration_declined"]);
        assert!(outcome.is_exhausted());
    }

    #[tokio::test]
    async fn usable_claim_prevents_exhaustion() {
        let gate = gate(StaticFetcher::new().with_page("https://example.com/", ARTICLE));
        let claims = vec![
            cited("https://example.com/", "anything"),
            Claim::new(Stance::Supporting, "Still usable"),
        ];
        let outcome = gate.gate(claims, &Declines, 3).await;

        assert_eq!(outcome.count(CitationStatus::Unverifiable), 1);
        assert_eq!(outcome.count(CitationStatus::Uncited), 1);
        assert!(!outcome.is_exhausted());
    }

    #[tokio::test]
    async fn uncited_claims_pass_untouched() {
        let gate = gate(StaticFetcher::new());
        let claim = Claim::new(Stance::Refuting, "No citation here");
        let outcome = gate.gate(vec![claim.clone()], &Declines, 1).await;

        assert_eq!(outcome.accepted[0].claim, claim);
        assert_eq!(outcome.accepted[0].citation_status, CitationStatus::Uncited);
        assert!(!outcome.is_exhausted());
    }
}

//! External collaborator seams
//!
//! The pipeline treats every capability as unreliable: outputs are validated
//! before use and failures are isolated where a sibling can carry on.

use crate::error::CapabilityError;
use crate::run::PipelineRun;
use crate::types::{
    AssembledReport, Claim, CuratedContext, CuratedSource, DecisionStructure, GatedClaim,
    InputSource, Stance,
};
use async_trait::async_trait;
use pra_citation::VerificationRecord;
use std::sync::Arc;

/// Produces candidate claims for one stance
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    /// Generate claims for the hypothesis
    async fn generate(
        &self,
        hypothesis: &str,
        context: &CuratedContext,
        stance: Stance,
    ) -> Result<Vec<Claim>, CapabilityError>;

    /// Offer an alternative for a claim whose citation was rejected.
    ///
    /// `Ok(None)` means no alternative exists.
    async fn regenerate(
        &self,
        claim: &Claim,
        rejection: &VerificationRecord,
    ) -> Result<Option<Claim>, CapabilityError>;
}

/// Callback used by the gate to replace rejected citations
#[async_trait]
pub trait Regenerator: Send + Sync {
    /// Regenerate a single claim
    async fn regenerate(
        &self,
        claim: &Claim,
        rejection: &VerificationRecord,
    ) -> Result<Option<Claim>, CapabilityError>;
}

/// Routes regeneration back to the branch that produced the claim
#[derive(Clone)]
pub struct StanceRouter {
    supporting: Arc<dyn EvidenceSource>,
    refuting: Arc<dyn EvidenceSource>,
}

impl StanceRouter {
    /// Create router over both branches
    #[must_use]
    pub fn new(supporting: Arc<dyn EvidenceSource>, refuting: Arc<dyn EvidenceSource>) -> Self {
        Self {
            supporting,
            refuting,
        }
    }

    /// Source responsible for `stance`
    #[must_use]
    pub fn source(&self, stance: Stance) -> &Arc<dyn EvidenceSource> {
        match stance {
            Stance::Supporting => &self.supporting,
            Stance::Refuting => &self.refuting,
        }
    }
}

#[async_trait]
impl Regenerator for StanceRouter {
    async fn regenerate(
        &self,
        claim: &Claim,
        rejection: &VerificationRecord,
    ) -> Result<Option<Claim>, CapabilityError> {
        self.source(claim.stance).regenerate(claim, rejection).await
    }
}

/// Condenses one raw input into structured context
#[async_trait]
pub trait Curator: Send + Sync {
    /// Curate a single source
    async fn curate(&self, source: &InputSource) -> Result<CuratedSource, CapabilityError>;
}

/// Builds the pro/con decision structure
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize over gated claims only
    async fn synthesize(
        &self,
        hypothesis: &str,
        claims: &[GatedClaim],
    ) -> Result<DecisionStructure, CapabilityError>;
}

/// Renders the finalized run
#[async_trait]
pub trait ReportAssembler: Send + Sync {
    /// Render the run into a self-contained document
    async fn assemble(&self, run: &PipelineRun) -> Result<AssembledReport, CapabilityError>;
}

/// Set of collaborators driven by the orchestrator
#[derive(Clone)]
pub struct Capabilities {
    /// Input curator
    pub curator: Arc<dyn Curator>,
    /// Supporting and refuting evidence sources
    pub evidence: StanceRouter,
    /// Decision synthesizer
    pub synthesizer: Arc<dyn Synthesizer>,
    /// Report renderer
    pub assembler: Arc<dyn ReportAssembler>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}

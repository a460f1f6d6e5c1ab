//! PRA Core
//!
//! Orchestrates a product-research run and gates every citation before it
//! can reach a report.
//!
//! # Stages
//!
//! - **Curating**: condense raw inputs into one [`CuratedContext`]
//! - **Generating**: supporting and refuting [`EvidenceSource`]s in parallel,
//!   one branch may fail without aborting the other
//! - **Verifying**: the [`VerificationGate`] verifies, corrects, regenerates or
//!   strips each citation
//! - **Synthesizing**: a [`Synthesizer`] builds the [`DecisionStructure`]
//! - **Assembling**: a [`ReportAssembler`] renders the [`PipelineRun`]
//!
//! # Architecture
//!
//! ```text
//! ResearchRequest → Curator* → CuratedContext ─┬→ EvidenceSource(supporting) ─┐
//!                                              └→ EvidenceSource(refuting)  ──┤
//!                                                                             ↓
//!          ReportAssembler ← Synthesizer ← VerificationGate ← CitationVerifier (per run)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use pra_core::{Orchestrator, PipelineConfig, ResearchRequest};
//!
//! # async fn example(capabilities: pra_core::Capabilities) -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::default();
//! let fetcher = std::sync::Arc::new(pra_citation::ReqwestFetcher::new(&config.verifier)?);
//! let orchestrator = Orchestrator::new(config, capabilities, fetcher)?;
//!
//! let output = orchestrator
//!     .run(ResearchRequest::new("Travellers want one-tap checkout"))
//!     .await;
//! println!("{:?}: {} claims", output.status(), output.run.claims().len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod capability;
pub mod config;
pub mod error;
pub mod gate;
pub mod model_source;
pub mod orchestrator;
pub mod run;
pub mod schema;
pub mod types;

// Re-exports for convenience
pub use capability::{
    Capabilities, Curator, EvidenceSource, Regenerator, ReportAssembler, StanceRouter, Synthesizer,
};
pub use config::{GateConfig, PipelineConfig};
pub use error::{CapabilityError, ErrorClass, PipelineError};
pub use gate::{ClaimDiagnostic, GateOutcome, RejectionNote, VerificationGate};
pub use model_source::{CompletionRequest, LanguageModel, ModelEvidenceSource};
pub use orchestrator::{Orchestrator, PipelineOutput};
pub use run::{
    PipelineRun, RunFailure, RunId, RunState, RunStatus, StageDiagnostic, StageOutcome,
    StageStatus,
};
pub use types::{
    AssembledReport, CitationStatus, Claim, CuratedContext, CuratedSource, DecisionStep,
    DecisionStructure, GatedClaim, InputSource, RecommendationTier, ResearchRequest, Stance,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Research pipeline orchestrator
//!
//! Sequences curation, parallel evidence generation, verification, synthesis
//! and assembly. Every failure is captured into the [`PipelineRun`]; `run`
//! itself never returns an error.

use crate::capability::{Capabilities, EvidenceSource};
use crate::config::PipelineConfig;
use crate::error::{CapabilityError, PipelineError};
use crate::gate::VerificationGate;
use crate::run::{PipelineRun, RunId, RunState, RunStatus};
use crate::schema::validate_claims;
use crate::types::{AssembledReport, Claim, CuratedContext, InputSource, ResearchRequest, Stance};
use futures::stream::{self, StreamExt};
use pra_citation::{CitationVerifier, PageFetcher};
use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;

/// Input sources curated concurrently
const CURATION_CONCURRENCY: usize = 4;

/// Result of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Finalized run record, including failures
    pub run: PipelineRun,
    /// Rendered report, when assembly was reached and succeeded
    pub report: Option<AssembledReport>,
}

impl PipelineOutput {
    /// Overall status
    #[inline]
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.run.status()
    }
}

/// Drives research runs
#[derive(Debug)]
pub struct Orchestrator {
    config: PipelineConfig,
    capabilities: Capabilities,
    fetcher: Arc<dyn PageFetcher>,
}

impl Orchestrator {
    /// Create orchestrator
    pub fn new(
        config: PipelineConfig,
        capabilities: Capabilities,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            capabilities,
            fetcher,
        })
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute one run end to end.
    ///
    /// # Workflow
    /// 1. Curate every input source and merge the results
    /// 2. Run the supporting and refuting branches in parallel
    /// 3. Gate all claims through a verifier owned by this run
    /// 4. Synthesize the decision structure from gated claims
    /// 5. Assemble the report
    pub async fn run(&self, request: ResearchRequest) -> PipelineOutput {
        let mut run = PipelineRun::start(RunId::generate(), request.hypothesis.clone());
        let span = tracing::info_span!("pipeline_run", run_id = %run.id());

        async move {
            tracing::info!("Starting run for hypothesis: {}", request.hypothesis);
            let mut report = None;
            let deadline = self.config.pipeline_deadline();

            let result =
                tokio::time::timeout(deadline, self.drive(&request, &mut run, &mut report)).await;
            match result {
                Ok(Ok(())) => {
                    tracing::info!("Run finished with status {:?}", run.status());
                }
                Ok(Err(err)) => run.fail(&err),
                Err(_) => run.fail(&PipelineError::DeadlineExceeded {
                    stage: run.state(),
                    deadline_ms: self.config.pipeline_deadline_ms,
                }),
            }

            PipelineOutput { run, report }
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        request: &ResearchRequest,
        run: &mut PipelineRun,
        report: &mut Option<AssembledReport>,
    ) -> Result<(), PipelineError> {
        let context = self.curate(&request.sources, run).await?;

        run.advance(RunState::Generating)?;
        let claims = self.generate(&request.hypothesis, &context, run).await?;

        run.advance(RunState::Verifying)?;
        let verifier = Arc::new(CitationVerifier::new(
            self.config.verifier.clone(),
            Arc::clone(&self.fetcher),
        )?);
        let gate = VerificationGate::new(
            Arc::clone(&verifier),
            self.config.skip_hosts.clone(),
            self.config.gate,
        )
        .with_regeneration_timeout(self.config.capability_timeout());
        let outcome = gate
            .gate(claims, &self.capabilities.evidence, self.config.gate.max_rounds)
            .await;
        run.set_verification_stats(verifier.stats());
        let exhausted = outcome.is_exhausted();
        let gathered = outcome.accepted.len();
        run.set_claims(outcome.accepted, outcome.diagnostics);
        if exhausted {
            return Err(PipelineError::VerificationExhausted { claims: gathered });
        }

        run.advance(RunState::Synthesizing)?;
        let decision = self
            .call(
                self.capabilities
                    .synthesizer
                    .synthesize(run.hypothesis(), run.claims()),
            )
            .await
            .map_err(|e| PipelineError::capability(RunState::Synthesizing, e))?;
        decision
            .validate(run.claims())
            .map_err(PipelineError::SynthesizerContract)?;
        tracing::info!("Decision tier: {:?}", decision.tier);
        run.set_decision(decision);

        run.advance(RunState::Assembling)?;
        let assembled = self
            .call(self.capabilities.assembler.assemble(run))
            .await
            .map_err(|e| PipelineError::capability(RunState::Assembling, e))?;
        *report = Some(assembled);

        run.complete()
    }

    async fn curate(
        &self,
        sources: &[InputSource],
        run: &mut PipelineRun,
    ) -> Result<CuratedContext, PipelineError> {
        if sources.is_empty() {
            return Ok(CuratedContext::default());
        }

        let results: Vec<_> = stream::iter(sources)
            .map(|source| self.call(self.capabilities.curator.curate(source)))
            .buffered(CURATION_CONCURRENCY)
            .collect()
            .await;

        let mut curated = Vec::with_capacity(sources.len());
        for (source, result) in sources.iter().zip(results) {
            match result {
                Ok(c) => curated.push(c),
                Err(err) => run.note(format!("source:{}", source.label), err.class(), err.to_string()),
            }
        }

        if curated.is_empty() {
            return Err(PipelineError::CurationFailed {
                sources: sources.len(),
            });
        }
        tracing::info!("Curation finished for {} of {} sources", curated.len(), sources.len());
        Ok(CuratedContext::merge(&curated))
    }

    async fn generate(
        &self,
        hypothesis: &str,
        context: &CuratedContext,
        run: &mut PipelineRun,
    ) -> Result<Vec<Claim>, PipelineError> {
        let evidence = &self.capabilities.evidence;
        let (supporting, refuting) = tokio::join!(
            self.branch(evidence.source(Stance::Supporting), hypothesis, context, Stance::Supporting),
            self.branch(evidence.source(Stance::Refuting), hypothesis, context, Stance::Refuting),
        );

        let claims = match (supporting, refuting) {
            (Ok(mut supporting), Ok(refuting)) => {
                supporting.extend(refuting);
                supporting
            }
            (Ok(claims), Err(err)) => {
                run.note("branch:refuting", err.class(), err.to_string());
                claims
            }
            (Err(err), Ok(claims)) => {
                run.note("branch:supporting", err.class(), err.to_string());
                claims
            }
            (Err(supporting), Err(refuting)) => {
                return Err(PipelineError::AllBranchesFailed {
                    supporting,
                    refuting,
                });
            }
        };

        tracing::info!("Evidence branches returned {} claims", claims.len());
        Ok(claims)
    }

    async fn branch(
        &self,
        source: &Arc<dyn EvidenceSource>,
        hypothesis: &str,
        context: &CuratedContext,
        stance: Stance,
    ) -> Result<Vec<Claim>, CapabilityError> {
        let claims = self.call(source.generate(hypothesis, context, stance)).await?;
        validate_claims(claims, stance)
    }

    /// Bound a capability call by the configured timeout
    async fn call<T>(
        &self,
        call: impl Future<Output = Result<T, CapabilityError>>,
    ) -> Result<T, CapabilityError> {
        let timeout = self.config.capability_timeout();
        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| CapabilityError::Timeout {
                timeout_ms: self.config.capability_timeout_ms,
            })?
    }
}

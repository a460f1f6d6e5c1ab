//! Pipeline run record and state machine
//!
//! ```text
//! curating → generating → verifying → synthesizing → assembling → complete
//!     └──────────┴────────────┴────────────┴─────────────┴──→ failed
//! ```
//!
//! The record is mutated only by the orchestrator and is read-only to
//! everything downstream.

use crate::error::{ErrorClass, PipelineError};
use crate::gate::ClaimDiagnostic;
use crate::types::{DecisionStructure, GatedClaim};
use chrono::{DateTime, Utc};
use pra_citation::CacheStats;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Run identifier, `PRA-<yyyymmddTHHMMSS>-<8 hex>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh id from the current UTC time
    #[must_use]
    pub fn generate() -> Self {
        Self::at(Utc::now())
    }

    /// Generate an id stamped with `now`
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("PRA-{}-{}", now.format("%Y%m%dT%H%M%S"), &suffix[..8]))
    }

    /// Get as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Curating input sources
    Curating,
    /// Running both evidence branches
    Generating,
    /// Gating citations
    Verifying,
    /// Building the decision structure
    Synthesizing,
    /// Rendering the report
    Assembling,
    /// Finished
    Complete,
    /// Terminal failure
    Failed,
}

impl RunState {
    /// Check if no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Curating => "curating",
            Self::Generating => "generating",
            Self::Verifying => "verifying",
            Self::Synthesizing => "synthesizing",
            Self::Assembling => "assembling",
            Self::Complete => "complete",
            Self::Failed => "failed",
        })
    }
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: RunState) -> Vec<RunState> {
    use RunState::{Assembling, Complete, Curating, Failed, Generating, Synthesizing, Verifying};
    match from {
        Curating => vec![Generating, Failed],
        Generating => vec![Verifying, Failed],
        Verifying => vec![Synthesizing, Failed],
        Synthesizing => vec![Assembling, Failed],
        Assembling => vec![Complete, Failed],
        Complete | Failed => vec![],
    }
}

/// Validate a state transition
pub fn validate_transition(from: RunState, to: RunState) -> Result<(), PipelineError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(PipelineError::IllegalTransition { from, to })
    }
}

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Still in flight
    Running,
    /// Every stage succeeded without partial failures
    Complete,
    /// Finished, but some branch or source failed
    Partial,
    /// Unrecoverable failure; the record holds what was gathered
    Failed,
}

/// How a stage ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Finished cleanly
    Succeeded,
    /// Finished with isolated failures
    Partial,
    /// Aborted the run
    Failed,
}

/// Timing and result of one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    /// Stage
    pub stage: RunState,
    /// Result
    pub status: StageStatus,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds
    pub elapsed_ms: u64,
}

/// Isolated failure recorded without aborting the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDiagnostic {
    /// Stage that recorded it
    pub stage: RunState,
    /// Failing unit, e.g. `branch:refuting` or `source:survey.csv`
    pub subject: String,
    /// Taxonomy class
    pub class: ErrorClass,
    /// Human-readable message
    pub message: String,
}

/// Terminal failure of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    /// Stage in flight
    pub stage: RunState,
    /// Taxonomy class
    pub class: ErrorClass,
    /// Error message
    pub message: String,
}

/// Record of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    id: RunId,
    hypothesis: String,
    state: RunState,
    status: RunStatus,
    stages: Vec<StageOutcome>,
    diagnostics: Vec<StageDiagnostic>,
    claims: Vec<GatedClaim>,
    claim_diagnostics: Vec<ClaimDiagnostic>,
    decision: Option<DecisionStructure>,
    verification_stats: Option<CacheStats>,
    failure: Option<RunFailure>,
    started_at: DateTime<Utc>,
    stage_started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// Start a run in the `curating` state
    #[must_use]
    pub fn start(id: RunId, hypothesis: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            hypothesis: hypothesis.into(),
            state: RunState::Curating,
            status: RunStatus::Running,
            stages: Vec::new(),
            diagnostics: Vec::new(),
            claims: Vec::new(),
            claim_diagnostics: Vec::new(),
            decision: None,
            verification_stats: None,
            failure: None,
            started_at: now,
            stage_started_at: now,
            finished_at: None,
        }
    }

    /// Run identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> &RunId {
        &self.id
    }

    /// Hypothesis under test
    #[inline]
    #[must_use]
    pub fn hypothesis(&self) -> &str {
        &self.hypothesis
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Overall status
    #[inline]
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Finished stages in order
    #[inline]
    #[must_use]
    pub fn stages(&self) -> &[StageOutcome] {
        &self.stages
    }

    /// Isolated failures
    #[inline]
    #[must_use]
    pub fn diagnostics(&self) -> &[StageDiagnostic] {
        &self.diagnostics
    }

    /// Final claim set in generation order
    #[inline]
    #[must_use]
    pub fn claims(&self) -> &[GatedClaim] {
        &self.claims
    }

    /// Per-claim gate diagnostics, aligned with [`claims`](Self::claims)
    #[inline]
    #[must_use]
    pub fn claim_diagnostics(&self) -> &[ClaimDiagnostic] {
        &self.claim_diagnostics
    }

    /// Synthesizer output
    #[inline]
    #[must_use]
    pub fn decision(&self) -> Option<&DecisionStructure> {
        self.decision.as_ref()
    }

    /// Verifier cache statistics
    #[inline]
    #[must_use]
    pub fn verification_stats(&self) -> Option<CacheStats> {
        self.verification_stats
    }

    /// Terminal failure, if the run failed
    #[inline]
    #[must_use]
    pub fn failure(&self) -> Option<&RunFailure> {
        self.failure.as_ref()
    }

    /// Start time
    #[inline]
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Finish time, once terminal
    #[inline]
    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Diagnostics recorded during `stage`
    pub fn diagnostics_for(&self, stage: RunState) -> impl Iterator<Item = &StageDiagnostic> {
        self.diagnostics.iter().filter(move |d| d.stage == stage)
    }

    pub(crate) fn note(&mut self, subject: impl Into<String>, class: ErrorClass, message: impl Into<String>) {
        let diagnostic = StageDiagnostic {
            stage: self.state,
            subject: subject.into(),
            class,
            message: message.into(),
        };
        tracing::warn!(
            run_id = %self.id,
            stage = %diagnostic.stage,
            subject = %diagnostic.subject,
            "Partial failure: {}",
            diagnostic.message
        );
        self.diagnostics.push(diagnostic);
    }

    /// Close the current stage and enter `to`
    pub(crate) fn advance(&mut self, to: RunState) -> Result<(), PipelineError> {
        validate_transition(self.state, to)?;
        let status = if self.diagnostics_for(self.state).next().is_some() {
            StageStatus::Partial
        } else {
            StageStatus::Succeeded
        };
        self.close_stage(status);
        tracing::debug!(run_id = %self.id, "Run transition {} -> {}", self.state, to);
        self.state = to;
        Ok(())
    }

    /// Record a terminal failure; the gathered data is preserved
    pub(crate) fn fail(&mut self, error: &PipelineError) {
        if self.state.is_terminal() {
            return;
        }
        tracing::error!(run_id = %self.id, stage = %self.state, "Run failed: {}", error);
        self.close_stage(StageStatus::Failed);
        self.failure = Some(RunFailure {
            stage: self.state,
            class: error.class(),
            message: error.to_string(),
        });
        self.state = RunState::Failed;
        self.status = RunStatus::Failed;
        self.finished_at = Some(Utc::now());
    }

    /// Enter `complete`, downgrading to partial if anything failed in isolation
    pub(crate) fn complete(&mut self) -> Result<(), PipelineError> {
        self.advance(RunState::Complete)?;
        self.status = if self.diagnostics.is_empty() {
            RunStatus::Complete
        } else {
            RunStatus::Partial
        };
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub(crate) fn set_claims(&mut self, claims: Vec<GatedClaim>, diagnostics: Vec<ClaimDiagnostic>) {
        self.claims = claims;
        self.claim_diagnostics = diagnostics;
    }

    pub(crate) fn set_decision(&mut self, decision: DecisionStructure) {
        self.decision = Some(decision);
    }

    pub(crate) fn set_verification_stats(&mut self, stats: CacheStats) {
        self.verification_stats = Some(stats);
    }

    fn close_stage(&mut self, status: StageStatus) {
        let now = Utc::now();
        let elapsed = (now - self.stage_started_at).num_milliseconds().max(0);
        self.stages.push(StageOutcome {
            stage: self.state,
            status,
            started_at: self.stage_started_at,
            elapsed_ms: u64::try_from(elapsed).unwrap_or_default(),
        });
        self.stage_started_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_format() {
        let now = DateTime::parse_from_rfc3339("2025-03-04T05:06:07Z")
            .unwrap()
            .with_timezone(&Utc);
        let id = RunId::at(now);
        let s = id.as_str();
        assert!(s.starts_with("PRA-20250304T050607-"), "{s}");
        let suffix = &s["PRA-20250304T050607-".len()..];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(RunId::at(now), id);
    }

    #[test]
    fn forward_transitions_only() {
        assert!(validate_transition(RunState::Curating, RunState::Generating).is_ok());
        assert!(validate_transition(RunState::Assembling, RunState::Complete).is_ok());
        assert!(validate_transition(RunState::Curating, RunState::Verifying).is_err());
        assert!(validate_transition(RunState::Verifying, RunState::Generating).is_err());
        assert!(validate_transition(RunState::Complete, RunState::Failed).is_err());
    }

    #[test]
    fn every_live_state_can_fail() {
        for state in [
            RunState::Curating,
            RunState::Generating,
            RunState::Verifying,
            RunState::Synthesizing,
            RunState::Assembling,
        ] {
            assert!(allowed_transitions(state).contains(&RunState::Failed));
        }
    }

    #[test]
    fn partial_stage_and_status() {
        let mut run = PipelineRun::start(RunId::generate(), "h");
        run.advance(RunState::Generating).unwrap();
        run.note("branch:refuting", ErrorClass::CapabilityFailure, "timeout");
        for next in [RunState::Verifying, RunState::Synthesizing, RunState::Assembling] {
            run.advance(next).unwrap();
        }
        run.complete().unwrap();

        assert_eq!(run.status(), RunStatus::Partial);
        let statuses: Vec<_> = run.stages().iter().map(|s| (s.stage, s.status)).collect();
        assert_eq!(statuses[0], (RunState::Curating, StageStatus::Succeeded));
        assert_eq!(statuses[1], (RunState::Generating, StageStatus::Partial));
        assert_eq!(statuses.len(), 5);
        assert!(run.finished_at().is_some());
    }

    #[test]
    fn fail_preserves_record() {
        let mut run = PipelineRun::start(RunId::generate(), "h");
        run.advance(RunState::Generating).unwrap();
        run.fail(&PipelineError::CurationFailed { sources: 2 });

        assert_eq!(run.state(), RunState::Failed);
        assert_eq!(run.status(), RunStatus::Failed);
        let failure = run.failure().unwrap();
        assert_eq!(failure.stage, RunState::Generating);
        assert_eq!(failure.class, ErrorClass::CapabilityFailure);
        assert_eq!(run.stages().last().unwrap().status, StageStatus::Failed);
        assert!(run.advance(RunState::Verifying).is_err());
    }
}

//! Testing utilities for PRA workspace
//!
//! Scripted collaborators, page fixtures and claim helpers.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use pra_citation::{ProposedCitation, VerificationRecord};
use pra_core::{
    AssembledReport, Capabilities, CapabilityError, Claim, CuratedContext, CuratedSource,
    Curator, DecisionStep, DecisionStructure, EvidenceSource, GatedClaim, InputSource,
    PipelineRun, RecommendationTier, ReportAssembler, Stance, StanceRouter, Synthesizer,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// HTML page with a title and paragraphs
pub fn article_html(title: &str, paragraphs: &[&str]) -> String {
    let body: String = paragraphs.iter().map(|p| format!("<p>{p}</p>\n")).collect();
    format!(
        "<!doctype html><html><head><title>{title}</title></head>\
         <body><nav><a href=\"/\">Home</a></nav><article><h1>{title}</h1>\n{body}</article></body></html>"
    )
}

pub fn supporting(text: &str) -> Claim {
    Claim::new(Stance::Supporting, text)
}

pub fn refuting(text: &str) -> Claim {
    Claim::new(Stance::Refuting, text)
}

pub fn cited(stance: Stance, text: &str, url: &str, quote: Option<&str>) -> Claim {
    let mut citation = ProposedCitation::new(url);
    if let Some(quote) = quote {
        citation = citation.with_quote(quote);
    }
    Claim::new(stance, text).with_citation(citation)
}

/// Evidence source replaying fixed claims
#[derive(Debug, Default)]
pub struct ScriptedEvidenceSource {
    claims: Vec<Claim>,
    failure: Option<CapabilityError>,
    delay: Option<Duration>,
    regenerations: Mutex<HashMap<String, VecDeque<Option<Claim>>>>,
    regeneration_failure: Option<CapabilityError>,
    generate_calls: AtomicUsize,
    regenerate_calls: AtomicUsize,
}

impl ScriptedEvidenceSource {
    pub fn new(claims: Vec<Claim>) -> Self {
        Self {
            claims,
            ..Self::default()
        }
    }

    pub fn failing(error: CapabilityError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// Sleep before answering `generate`
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue the answer to the next regeneration of the claim with `text`
    #[must_use]
    pub fn with_regeneration(self, text: &str, replacement: Option<Claim>) -> Self {
        self.regenerations
            .lock()
            .entry(text.to_string())
            .or_default()
            .push_back(replacement);
        self
    }

    #[must_use]
    pub fn with_regeneration_failure(mut self, error: CapabilityError) -> Self {
        self.regeneration_failure = Some(error);
        self
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn regenerate_calls(&self) -> usize {
        self.regenerate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EvidenceSource for ScriptedEvidenceSource {
    async fn generate(
        &self,
        _hypothesis: &str,
        _context: &CuratedContext,
        _stance: Stance,
    ) -> Result<Vec<Claim>, CapabilityError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(self.claims.clone()),
        }
    }

    async fn regenerate(
        &self,
        claim: &Claim,
        _rejection: &VerificationRecord,
    ) -> Result<Option<Claim>, CapabilityError> {
        self.regenerate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.regeneration_failure {
            return Err(err.clone());
        }
        Ok(self
            .regenerations
            .lock()
            .get_mut(&claim.text)
            .and_then(VecDeque::pop_front)
            .flatten())
    }
}

/// Curator echoing source content, with optional per-label failures
#[derive(Debug, Default)]
pub struct StaticCurator {
    failures: HashMap<String, CapabilityError>,
}

impl StaticCurator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing_for(mut self, label: &str, error: CapabilityError) -> Self {
        self.failures.insert(label.to_string(), error);
        self
    }
}

#[async_trait]
impl Curator for StaticCurator {
    async fn curate(&self, source: &InputSource) -> Result<CuratedSource, CapabilityError> {
        if let Some(err) = self.failures.get(&source.label) {
            return Err(err.clone());
        }
        Ok(CuratedSource {
            source_type: "text".to_string(),
            summary: source.content.clone(),
            key_data_points: vec![format!("{}: {} chars", source.label, source.content.len())],
            verbatim_quotes: Vec::new(),
        })
    }
}

/// Synthesizer citing every claim under its own stance
#[derive(Debug)]
pub struct FixedSynthesizer {
    tier: RecommendationTier,
    bogus_reference: bool,
    seen: Mutex<Vec<GatedClaim>>,
}

impl FixedSynthesizer {
    pub fn new(tier: RecommendationTier) -> Self {
        Self {
            tier,
            bogus_reference: false,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Reference a claim index that does not exist
    #[must_use]
    pub fn with_bogus_reference(mut self) -> Self {
        self.bogus_reference = true;
        self
    }

    /// Claims handed to the last `synthesize` call
    pub fn seen(&self) -> Vec<GatedClaim> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Synthesizer for FixedSynthesizer {
    async fn synthesize(
        &self,
        _hypothesis: &str,
        claims: &[GatedClaim],
    ) -> Result<DecisionStructure, CapabilityError> {
        *self.seen.lock() = claims.to_vec();
        let indices = |stance: Stance| -> Vec<usize> {
            claims
                .iter()
                .enumerate()
                .filter(|(_, c)| c.claim.stance == stance)
                .map(|(i, _)| i)
                .collect()
        };
        let mut supporting = indices(Stance::Supporting);
        if self.bogus_reference {
            supporting.push(claims.len() + 10);
        }
        Ok(DecisionStructure {
            tier: self.tier,
            decision_path: vec![DecisionStep {
                node: "USER_DEMAND".to_string(),
                answer: "yes".to_string(),
                rationale: String::new(),
            }],
            supporting,
            refuting: indices(Stance::Refuting),
            summary: format!("{} claims considered", claims.len()),
        })
    }
}

/// Assembler that snapshots the run it was given
#[derive(Debug, Default)]
pub struct RecordingAssembler {
    runs: Mutex<Vec<PipelineRun>>,
    failure: Option<CapabilityError>,
}

impl RecordingAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: CapabilityError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    pub fn runs(&self) -> Vec<PipelineRun> {
        self.runs.lock().clone()
    }
}

#[async_trait]
impl ReportAssembler for RecordingAssembler {
    async fn assemble(&self, run: &PipelineRun) -> Result<AssembledReport, CapabilityError> {
        self.runs.lock().push(run.clone());
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let document = serde_json::to_string(run)
            .map_err(|e| CapabilityError::ContractViolation(e.to_string()))?;
        Ok(AssembledReport { document })
    }
}

/// Handles kept by tests alongside the capabilities they back
pub struct Harness {
    pub curator: Arc<StaticCurator>,
    pub supporting: Arc<ScriptedEvidenceSource>,
    pub refuting: Arc<ScriptedEvidenceSource>,
    pub synthesizer: Arc<FixedSynthesizer>,
    pub assembler: Arc<RecordingAssembler>,
}

impl Harness {
    pub fn new(supporting: ScriptedEvidenceSource, refuting: ScriptedEvidenceSource) -> Self {
        Self {
            curator: Arc::new(StaticCurator::new()),
            supporting: Arc::new(supporting),
            refuting: Arc::new(refuting),
            synthesizer: Arc::new(FixedSynthesizer::new(RecommendationTier::BuildMvp)),
            assembler: Arc::new(RecordingAssembler::new()),
        }
    }

    #[must_use]
    pub fn with_curator(mut self, curator: StaticCurator) -> Self {
        self.curator = Arc::new(curator);
        self
    }

    #[must_use]
    pub fn with_synthesizer(mut self, synthesizer: FixedSynthesizer) -> Self {
        self.synthesizer = Arc::new(synthesizer);
        self
    }

    #[must_use]
    pub fn with_assembler(mut self, assembler: RecordingAssembler) -> Self {
        self.assembler = Arc::new(assembler);
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            curator: self.curator.clone(),
            evidence: StanceRouter::new(self.supporting.clone(), self.refuting.clone()),
            synthesizer: self.synthesizer.clone(),
            assembler: self.assembler.clone(),
        }
    }
}

//! Core data model
//!
//! Claims flow from the evidence sources through the verification gate to the
//! synthesizer and report assembler. Curation types describe the input side,
//! decision types the synthesizer's output contract.

use pra_citation::{ProposedCitation, VerificationRecord};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of the hypothesis a claim argues for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    /// Evidence for the hypothesis
    Supporting,
    /// Evidence against the hypothesis
    Refuting,
}

impl Stance {
    /// Both stances, supporting first
    pub const ALL: [Stance; 2] = [Stance::Supporting, Stance::Refuting];
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Supporting => f.write_str("supporting"),
            Self::Refuting => f.write_str("refuting"),
        }
    }
}

/// A unit of evidence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Stance of the emitting branch
    pub stance: Stance,
    /// Claim text
    pub text: String,
    /// Citation as authored, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_citation: Option<ProposedCitation>,
}

impl Claim {
    /// Create uncited claim
    #[inline]
    #[must_use]
    pub fn new(stance: Stance, text: impl Into<String>) -> Self {
        Self {
            stance,
            text: text.into(),
            proposed_citation: None,
        }
    }

    /// With citation
    #[inline]
    #[must_use]
    pub fn with_citation(mut self, citation: ProposedCitation) -> Self {
        self.proposed_citation = Some(citation);
        self
    }

    /// Check if the claim carries a citation
    #[inline]
    #[must_use]
    pub fn is_cited(&self) -> bool {
        self.proposed_citation.is_some()
    }
}

/// Citation state of a claim handed to the report layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationStatus {
    /// Citation verified as authored
    Verified,
    /// Quote replaced by the source's actual wording
    Corrected,
    /// Citation stripped after regeneration was exhausted
    Unverifiable,
    /// Claim never carried a citation
    #[serde(rename = "none")]
    Uncited,
}

impl CitationStatus {
    /// Stable tag
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Corrected => "corrected",
            Self::Unverifiable => "unverifiable",
            Self::Uncited => "none",
        }
    }
}

impl fmt::Display for CitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A claim after gating, paired with its terminal verification record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatedClaim {
    /// Claim as it may be shown; citation stripped when unverifiable
    pub claim: Claim,
    /// Citation state
    pub citation_status: CitationStatus,
    /// Record backing the citation; `None` when no citation is shown
    pub verification: Option<VerificationRecord>,
}

impl GatedClaim {
    /// Claim without a citation
    #[must_use]
    pub fn uncited(claim: Claim) -> Self {
        Self {
            claim,
            citation_status: CitationStatus::Uncited,
            verification: None,
        }
    }

    /// Claim whose citation was stripped
    #[must_use]
    pub fn unverifiable(mut claim: Claim) -> Self {
        claim.proposed_citation = None;
        Self {
            claim,
            citation_status: CitationStatus::Unverifiable,
            verification: None,
        }
    }
}

/// Raw input handed to the curator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSource {
    /// Name used in diagnostics (usually a file name)
    pub label: String,
    /// Source content
    pub content: String,
}

impl InputSource {
    /// Create input source
    #[inline]
    #[must_use]
    pub fn new(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            content: content.into(),
        }
    }
}

/// Curator output for one input source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratedSource {
    /// Kind of source (survey, transcript, article, ...)
    pub source_type: String,
    /// Short summary
    pub summary: String,
    /// Notable figures and findings
    #[serde(default)]
    pub key_data_points: Vec<String>,
    /// Verbatim quotes lifted from the source
    #[serde(default)]
    pub verbatim_quotes: Vec<String>,
}

/// Merged curation context passed to both evidence branches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratedContext {
    /// Non-empty summaries joined by a space
    pub summary: String,
    /// Data points in input order
    pub key_data_points: Vec<String>,
    /// Quotes in input order
    pub verbatim_quotes: Vec<String>,
}

impl CuratedContext {
    /// Merge curated sources in input order
    #[must_use]
    pub fn merge<'a>(sources: impl IntoIterator<Item = &'a CuratedSource>) -> Self {
        let mut summaries = Vec::new();
        let mut merged = Self::default();
        for source in sources {
            if !source.summary.trim().is_empty() {
                summaries.push(source.summary.as_str());
            }
            merged
                .key_data_points
                .extend(source.key_data_points.iter().cloned());
            merged
                .verbatim_quotes
                .extend(source.verbatim_quotes.iter().cloned());
        }
        merged.summary = summaries.join(" ");
        merged
    }
}

/// Input to one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchRequest {
    /// Product hypothesis under test
    pub hypothesis: String,
    /// Raw inputs to curate
    #[serde(default)]
    pub sources: Vec<InputSource>,
}

impl ResearchRequest {
    /// Create request for a hypothesis
    #[inline]
    #[must_use]
    pub fn new(hypothesis: impl Into<String>) -> Self {
        Self {
            hypothesis: hypothesis.into(),
            sources: Vec::new(),
        }
    }

    /// With input source
    #[inline]
    #[must_use]
    pub fn with_source(mut self, source: InputSource) -> Self {
        self.sources.push(source);
        self
    }
}

/// Recommendation tier emitted by the synthesizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationTier {
    /// High confidence, build now
    StrongBuild,
    /// Promising, validate with a minimal version
    BuildMvp,
    /// Mixed evidence, gather more data
    ReEvaluate,
    /// Weak evidence, do not prioritise
    Deprioritize,
}

/// One node visited in the decision tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionStep {
    /// Tree node id, e.g. `USER_DEMAND`
    pub node: String,
    /// Answer taken at the node
    pub answer: String,
    /// Short justification
    #[serde(default)]
    pub rationale: String,
}

/// Synthesizer output
///
/// `supporting` and `refuting` index into the gated claim list handed to the
/// synthesizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionStructure {
    /// Recommendation
    pub tier: RecommendationTier,
    /// Path taken through the decision tree
    pub decision_path: Vec<DecisionStep>,
    /// Indices of supporting claims relied on
    pub supporting: Vec<usize>,
    /// Indices of refuting claims relied on
    pub refuting: Vec<usize>,
    /// Executive summary
    pub summary: String,
}

impl DecisionStructure {
    /// Check that every referenced claim exists and has the matching stance
    pub fn validate(&self, claims: &[GatedClaim]) -> Result<(), String> {
        for (indices, stance) in [
            (&self.supporting, Stance::Supporting),
            (&self.refuting, Stance::Refuting),
        ] {
            for &index in indices {
                let Some(gated) = claims.get(index) else {
                    return Err(format!(
                        "{stance} reference {index} out of range ({} claims)",
                        claims.len()
                    ));
                };
                if gated.claim.stance != stance {
                    return Err(format!(
                        "claim {index} listed as {stance} but has stance {}",
                        gated.claim.stance
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Rendered report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledReport {
    /// Self-contained document
    pub document: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(summary: &str, points: &[&str], quotes: &[&str]) -> CuratedSource {
        CuratedSource {
            source_type: "survey".into(),
            summary: summary.into(),
            key_data_points: points.iter().map(|s| (*s).to_string()).collect(),
            verbatim_quotes: quotes.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[test]
    fn merge_keeps_input_order_and_skips_blank_summaries() {
        let merged = CuratedContext::merge(&[
            source("First.", &["a"], &["q1"]),
            source("  ", &["b"], &[]),
            source("Third.", &[], &["q3"]),
        ]);
        assert_eq!(merged.summary, "First. Third.");
        assert_eq!(merged.key_data_points, vec!["a", "b"]);
        assert_eq!(merged.verbatim_quotes, vec!["q1", "q3"]);
    }

    #[test]
    fn citation_status_serializes_uncited_as_none() {
        assert_eq!(
            serde_json::to_string(&CitationStatus::Uncited).unwrap(),
            "\"none\""
        );
        assert_eq!(CitationStatus::Corrected.to_string(), "corrected");
    }

    #[test]
    fn unverifiable_strips_citation() {
        let claim = Claim::new(Stance::Supporting, "Demand is rising")
            .with_citation(ProposedCitation::new("https://example.com/"));
        let gated = GatedClaim::unverifiable(claim);
        assert!(!gated.claim.is_cited());
        assert_eq!(gated.citation_status, CitationStatus::Unverifiable);
    }

    #[test]
    fn decision_validation() {
        let claims = vec![
            GatedClaim::uncited(Claim::new(Stance::Supporting, "a")),
            GatedClaim::uncited(Claim::new(Stance::Refuting, "b")),
        ];
        let mut decision = DecisionStructure {
            tier: RecommendationTier::BuildMvp,
            decision_path: vec![],
            supporting: vec![0],
            refuting: vec![1],
            summary: String::new(),
        };
        assert!(decision.validate(&claims).is_ok());

        decision.refuting = vec![0];
        assert!(decision.validate(&claims).is_err());

        decision.refuting = vec![7];
        assert!(decision.validate(&claims).is_err());
    }

    #[test]
    fn tier_uses_screaming_case() {
        assert_eq!(
            serde_json::to_string(&RecommendationTier::StrongBuild).unwrap(),
            "\"STRONG_BUILD\""
        );
    }
}

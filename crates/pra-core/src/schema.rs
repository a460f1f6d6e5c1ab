//! Claim schema validation
//!
//! Evidence source output is untrusted. It is parsed against an explicit
//! schema and checked at the orchestration boundary; anything that does not
//! fit is a [`CapabilityError`], never coerced.

use crate::error::CapabilityError;
use crate::types::{Claim, Stance};
use pra_citation::ProposedCitation;
use serde::Deserialize;

/// Claim as emitted by a model
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClaimPayload {
    /// Optional stance echo; must match the branch when present
    #[serde(default)]
    pub stance: Option<Stance>,
    /// Claim text
    pub text: String,
    /// Optional citation
    #[serde(default)]
    pub citation: Option<CitationPayload>,
}

/// Citation as emitted by a model
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CitationPayload {
    /// URL as authored
    pub url: String,
    /// Verbatim excerpt
    #[serde(default)]
    pub quoted_text: Option<String>,
    /// Title or publication
    #[serde(default)]
    pub source_label: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClaimsEnvelope {
    claims: Vec<ClaimPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegeneratedEnvelope {
    claim: Option<ClaimPayload>,
}

/// Strip a surrounding markdown code fence, if any
#[must_use]
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parse `{"claims": [...]}` produced for `stance`
pub fn parse_claims(raw: &str, stance: Stance) -> Result<Vec<Claim>, CapabilityError> {
    let envelope: ClaimsEnvelope = serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| CapabilityError::MalformedOutput(e.to_string()))?;
    let claims = envelope
        .claims
        .into_iter()
        .map(|payload| payload.into_claim(stance))
        .collect();
    validate_claims(claims, stance)
}

/// Parse `{"claim": {...} | null}` produced when regenerating `original`
pub fn parse_regenerated(raw: &str, original: &Claim) -> Result<Option<Claim>, CapabilityError> {
    let envelope: RegeneratedEnvelope = serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| CapabilityError::MalformedOutput(e.to_string()))?;
    envelope
        .claim
        .map(|payload| validate_claim(payload.into_claim(original.stance), original.stance))
        .transpose()
}

impl ClaimPayload {
    fn into_claim(self, branch: Stance) -> Claim {
        Claim {
            stance: self.stance.unwrap_or(branch),
            text: self.text,
            proposed_citation: self.citation.map(|c| ProposedCitation {
                url: c.url,
                quoted_text: c.quoted_text,
                source_label: c.source_label,
            }),
        }
    }
}

/// Validate a batch of claims from the `stance` branch
pub fn validate_claims(claims: Vec<Claim>, stance: Stance) -> Result<Vec<Claim>, CapabilityError> {
    claims
        .into_iter()
        .enumerate()
        .map(|(index, claim)| {
            validate_claim(claim, stance).map_err(|e| match e {
                CapabilityError::ContractViolation(msg) => {
                    CapabilityError::ContractViolation(format!("claim {index}: {msg}"))
                }
                other => other,
            })
        })
        .collect()
}

/// Validate one claim, normalizing blank quotes and labels to absent
pub fn validate_claim(mut claim: Claim, stance: Stance) -> Result<Claim, CapabilityError> {
    if claim.text.trim().is_empty() {
        return Err(CapabilityError::ContractViolation("empty claim text".into()));
    }
    if claim.stance != stance {
        return Err(CapabilityError::ContractViolation(format!(
            "stance {} returned by the {stance} branch",
            claim.stance
        )));
    }
    if let Some(citation) = claim.proposed_citation.as_mut() {
        if citation.url.trim().is_empty() {
            return Err(CapabilityError::ContractViolation("empty citation url".into()));
        }
        if citation.quoted_text.as_deref().is_some_and(|q| q.trim().is_empty()) {
            citation.quoted_text = None;
        }
        if citation.source_label.as_deref().is_some_and(|l| l.trim().is_empty()) {
            citation.source_label = None;
        }
    }
    Ok(claim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[1]\n```\n"), "[1]");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn parses_claims_with_and_without_citations() {
        let raw = r#"```json
        {"claims": [
            {"text": "Friction drives abandonment",
             "citation": {"url": "https://example.com/study", "quoted_text": "Users are frustrated"}},
            {"text": "Loyalty matters", "stance": "supporting",
             "citation": {"url": "https://example.com/loyalty", "quoted_text": "   "}},
            {"text": "Uncited hunch"}
        ]}
        ```"#;
        let claims = parse_claims(raw, Stance::Supporting).unwrap();
        assert_eq!(claims.len(), 3);
        assert_eq!(
            claims[0].proposed_citation.as_ref().unwrap().quoted_text.as_deref(),
            Some("Users are frustrated")
        );
        assert_eq!(claims[1].proposed_citation.as_ref().unwrap().quoted_text, None);
        assert!(!claims[2].is_cited());
    }

    #[test]
    fn unknown_fields_are_malformed() {
        let raw = r#"{"claims": [{"text": "x", "confidence": 0.9}]}"#;
        assert!(matches!(
            parse_claims(raw, Stance::Refuting),
            Err(CapabilityError::MalformedOutput(_))
        ));
        assert!(matches!(
            parse_claims("not json at all", Stance::Refuting),
            Err(CapabilityError::MalformedOutput(_))
        ));
    }

    #[test]
    fn wrong_stance_and_empty_fields_violate_contract() {
        let raw = r#"{"claims": [{"text": "x", "stance": "refuting"}]}"#;
        assert!(matches!(
            parse_claims(raw, Stance::Supporting),
            Err(CapabilityError::ContractViolation(_))
        ));

        let raw = r#"{"claims": [{"text": "ok"}, {"text": "  "}]}"#;
        let err = parse_claims(raw, Stance::Supporting).unwrap_err();
        assert_eq!(
            err,
            CapabilityError::ContractViolation("claim 1: empty claim text".into())
        );

        let raw = r#"{"claims": [{"text": "x", "citation": {"url": ""}}]}"#;
        assert!(parse_claims(raw, Stance::Supporting).is_err());
    }

    #[test]
    fn regenerated_claim_may_be_null() {
        let original = Claim::new(Stance::Refuting, "x");
        assert_eq!(parse_regenerated(r#"{"claim": null}"#, &original).unwrap(), None);

        let replaced = parse_regenerated(
            r#"{"claim": {"text": "y", "citation": {"url": "https://example.com/b"}}}"#,
            &original,
        )
        .unwrap()
        .unwrap();
        assert_eq!(replaced.stance, Stance::Refuting);
        assert_eq!(replaced.text, "y");
    }
}

//! Verdict rendering

use pra_citation::{VerificationRecord, VerificationStatus};
use serde::Serialize;
use std::fmt::{self, Write as _};

/// Verdict counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub(crate) struct Summary {
    pub(crate) total: usize,
    pub(crate) verified: usize,
    pub(crate) paraphrased: usize,
    pub(crate) rejected: usize,
}

impl Summary {
    pub(crate) fn of(records: &[VerificationRecord]) -> Self {
        records.iter().fold(
            Self {
                total: records.len(),
                ..Self::default()
            },
            |mut summary, record| {
                match record.status {
                    VerificationStatus::Verified => summary.verified += 1,
                    VerificationStatus::UnverifiedParaphrase => summary.paraphrased += 1,
                    VerificationStatus::Rejected => summary.rejected += 1,
                }
                summary
            },
        )
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} links: {} verified, {} paraphrased, {} rejected",
            self.total, self.verified, self.paraphrased, self.rejected
        )
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonReport<'a> {
    summary: Summary,
    links: &'a [VerificationRecord],
}

impl<'a> JsonReport<'a> {
    pub(crate) fn new(links: &'a [VerificationRecord], summary: Summary) -> Self {
        Self { summary, links }
    }
}

fn verdict(record: &VerificationRecord) -> &'static str {
    match record.status {
        VerificationStatus::Verified => "OK",
        VerificationStatus::UnverifiedParaphrase => "PARAPHRASE",
        VerificationStatus::Rejected => "REJECTED",
    }
}

/// One line per link: verdict, HTTP outcome, URL and rejection reason
pub(crate) fn render_table(records: &[VerificationRecord]) -> String {
    let mut out = String::new();
    for record in records {
        let outcome = record.http_outcome.to_string();
        let _ = write!(out, "{:<10} {outcome:>5}  {}", verdict(record), record.url);
        if let Some(reason) = &record.reason {
            let _ = write!(out, "  ({reason})");
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pra_citation::{CitationVerifier, ProposedCitation, StaticFetcher, VerifierConfig};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    async fn records() -> Vec<VerificationRecord> {
        let fetcher = StaticFetcher::new()
            .with_page("https://example.com/research/a", "<p>Body</p>")
            .with_status("https://example.com/research/b", 404);
        let verifier = CitationVerifier::new(VerifierConfig::default(), Arc::new(fetcher)).unwrap();
        let mut out = Vec::new();
        for url in ["https://example.com/research/a", "https://example.com/research/b"] {
            out.push(verifier.verify(&ProposedCitation::new(url)).await);
        }
        out
    }

    #[tokio::test]
    async fn summary_counts_verdicts() {
        let records = records().await;
        let summary = Summary::of(&records);
        assert_eq!(
            summary,
            Summary {
                total: 2,
                verified: 1,
                paraphrased: 0,
                rejected: 1
            }
        );
        assert_eq!(summary.to_string(), "2 links: 1 verified, 0 paraphrased, 1 rejected");
    }

    #[tokio::test]
    async fn table_lists_each_link() {
        let table = render_table(&records().await);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("OK"));
        assert!(lines[0].contains("200  https://example.com/research/a"));
        assert!(lines[1].starts_with("REJECTED"));
        assert!(lines[1].contains("404"));
    }

    #[test]
    fn empty_report_summary() {
        assert_eq!(Summary::of(&[]).to_string(), "0 links: 0 verified, 0 paraphrased, 0 rejected");
    }
}

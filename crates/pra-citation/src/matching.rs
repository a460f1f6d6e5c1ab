//! Quote matching
//!
//! Verbatim search is performed on normalized text: whitespace runs collapse
//! to one space and typographic quote characters map to their ASCII forms.
//! Nothing else is folded, so case and wording must match exactly.
//!
//! When no verbatim match exists the matcher looks for the most similar span
//! (Dice coefficient over lightly stemmed word multisets). Before that, quotes
//! stitched together from non-adjacent passages are detected and refused.

use std::collections::HashMap;

/// Ellipsis forms that mark an elided gap inside a quote
const ELLIPSES: &[&str] = &["...", "\u{2026}"];

/// Normalize whitespace and quote characters
#[must_use]
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for ch in text.chars() {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(match ch {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' | '`' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' | '\u{00AB}'
            | '\u{00BB}' => '"',
            other => other,
        });
    }

    out
}

/// Outcome of searching a document for a quote
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteMatch {
    /// Quote appears verbatim
    Exact,
    /// Quote appears only reworded
    Paraphrase {
        /// Source wording, itself a verbatim span of the document
        span: String,
        /// Similarity in [0, 1]
        score: f64,
    },
    /// Quote joins passages that are not adjacent in the source
    Spliced,
    /// Nothing similar enough
    NotFound {
        /// Best similarity seen
        best_score: f64,
    },
}

#[derive(Debug, Clone)]
struct Token {
    start: usize,
    end: usize,
    stem: String,
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, ch) in text.char_indices() {
        match (ch.is_alphanumeric(), start) {
            (true, None) => start = Some(idx),
            (false, Some(s)) => {
                tokens.push(Token {
                    start: s,
                    end: idx,
                    stem: stem(&text[s..idx]),
                });
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        tokens.push(Token {
            start: s,
            end: text.len(),
            stem: stem(&text[s..]),
        });
    }

    tokens
}

/// Lowercase and strip one common inflectional suffix
fn stem(word: &str) -> String {
    let lower = word.to_lowercase();
    for suffix in ["ing", "ed", "es", "s"] {
        if let Some(base) = lower.strip_suffix(suffix) {
            if base.chars().count() >= 3 {
                return base.to_string();
            }
        }
    }
    lower
}

/// Locates quotes in normalized document text
#[derive(Debug, Clone, Copy)]
pub struct QuoteMatcher {
    similarity_floor: f64,
    min_splice_words: usize,
}

impl QuoteMatcher {
    /// Create matcher
    #[inline]
    #[must_use]
    pub fn new(similarity_floor: f64, min_splice_words: usize) -> Self {
        Self {
            similarity_floor: similarity_floor.clamp(0.0, 1.0),
            min_splice_words: min_splice_words.max(1),
        }
    }

    /// Search `text` (already normalized) for `quote`
    #[must_use]
    pub fn find(&self, quote: &str, text: &str) -> QuoteMatch {
        let quote = normalize(quote);
        if quote.is_empty() {
            return QuoteMatch::NotFound { best_score: 0.0 };
        }
        if text.contains(&quote) {
            return QuoteMatch::Exact;
        }
        if self.is_spliced(&quote, text) {
            return QuoteMatch::Spliced;
        }

        match best_span(&quote, text) {
            Some((score, span)) if score >= self.similarity_floor => QuoteMatch::Paraphrase {
                span: span.to_string(),
                score,
            },
            Some((score, _)) => QuoteMatch::NotFound { best_score: score },
            None => QuoteMatch::NotFound { best_score: 0.0 },
        }
    }

    fn is_spliced(&self, quote: &str, text: &str) -> bool {
        // Elided gaps: every fragment present, but the quote as a whole is not
        let fragments: Vec<&str> = split_on_ellipses(quote);
        if fragments.len() >= 2 && fragments.iter().all(|f| text.contains(f)) {
            return true;
        }

        // Silent joins: a prefix and the remaining suffix each present verbatim
        // but not next to each other
        let tokens = tokenize(quote);
        let min = self.min_splice_words;
        if tokens.len() < 2 * min {
            return false;
        }
        for k in min..=tokens.len() - min {
            let left = quote[..tokens[k - 1].end].trim();
            let right = quote[tokens[k].start..].trim();
            if text.contains(left) && text.contains(right) && !adjacent(text, left, right) {
                return true;
            }
        }
        false
    }
}

impl Default for QuoteMatcher {
    fn default() -> Self {
        Self::new(0.6, 3)
    }
}

fn split_on_ellipses(quote: &str) -> Vec<&str> {
    let mut parts = vec![quote];
    for marker in ELLIPSES {
        parts = parts
            .into_iter()
            .flat_map(|p| p.split(*marker))
            .collect();
    }
    parts
        .into_iter()
        .map(|p| p.trim_matches(|c: char| c.is_whitespace() || c == '.'))
        .filter(|p| !p.is_empty())
        .collect()
}

/// `right` follows some occurrence of `left`, separated only by punctuation/space
fn adjacent(text: &str, left: &str, right: &str) -> bool {
    text.match_indices(left).any(|(pos, _)| {
        text[pos + left.len()..]
            .trim_start_matches(|c: char| !c.is_alphanumeric())
            .starts_with(right)
    })
}

/// Most similar span of `text` to `quote`.
///
/// Candidate spans start and end on tokens shared with the quote and are at
/// most twice the quote's length; trimming unshared edge tokens only raises
/// the score, so no better span is missed.
fn best_span<'t>(quote: &str, text: &'t str) -> Option<(f64, &'t str)> {
    let quote_tokens = tokenize(quote);
    if quote_tokens.is_empty() {
        return None;
    }

    let mut wanted: HashMap<&str, usize> = HashMap::new();
    for token in &quote_tokens {
        *wanted.entry(token.stem.as_str()).or_default() += 1;
    }

    let n = quote_tokens.len();
    let max_window = 2 * n;
    let text_tokens = tokenize(text);
    let mut best: Option<(f64, usize, usize)> = None;

    for i in 0..text_tokens.len() {
        if !wanted.contains_key(text_tokens[i].stem.as_str()) {
            continue;
        }
        let mut seen: HashMap<&str, usize> = HashMap::new();
        let mut shared = 0usize;

        for j in i..text_tokens.len().min(i + max_window) {
            let stem = text_tokens[j].stem.as_str();
            let Some(&cap) = wanted.get(stem) else {
                continue;
            };
            let count = seen.entry(stem).or_default();
            *count += 1;
            if *count <= cap {
                shared += 1;
            }

            let len = j - i + 1;
            #[allow(clippy::cast_precision_loss)]
            let score = (2 * shared) as f64 / (n + len) as f64;
            if best.map_or(true, |(b, _, _)| score > b) {
                best = Some((score, i, j));
            }
        }
    }

    best.map(|(score, i, j)| (score, &text[text_tokens[i].start..text_tokens[j].end]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SOURCE: &str = "Our 2024 survey found many problems. Users are frustrated with \
        checkout friction. Most abandon their carts at the payment step. \
        Separately, loyalty members book twice as often as guests.";

    fn matcher() -> QuoteMatcher {
        QuoteMatcher::default()
    }

    #[test]
    fn normalize_collapses_whitespace_and_quotes() {
        assert_eq!(
            normalize("  \u{201C}Hello\u{201D}\n\t it\u{2019}s   me "),
            "\"Hello\" it's me"
        );
    }

    #[test]
    fn exact_match() {
        let text = normalize(SOURCE);
        assert_eq!(
            matcher().find("Users are frustrated with checkout friction", &text),
            QuoteMatch::Exact
        );
        // Whitespace and curly quote variants still count as verbatim
        assert_eq!(
            matcher().find("Users  are frustrated\nwith checkout friction", &text),
            QuoteMatch::Exact
        );
    }

    #[test]
    fn reworded_quote_is_paraphrase_with_source_wording() {
        let text = normalize(SOURCE);
        match matcher().find("Checkout friction frustrates users", &text) {
            QuoteMatch::Paraphrase { span, score } => {
                assert_eq!(span, "Users are frustrated with checkout friction");
                assert!(score >= 0.6);
            }
            other => panic!("expected paraphrase, got {other:?}"),
        }
    }

    #[test]
    fn unrelated_quote_not_found() {
        let text = normalize(SOURCE);
        assert!(matches!(
            matcher().find("Quantum computing will replace spreadsheets entirely", &text),
            QuoteMatch::NotFound { .. }
        ));
    }

    #[test]
    fn case_difference_is_not_verbatim() {
        let text = normalize(SOURCE);
        assert!(matches!(
            matcher().find("users are frustrated with checkout friction", &text),
            QuoteMatch::Paraphrase { .. }
        ));
    }

    #[test]
    fn silent_splice_is_detected() {
        let text = normalize(SOURCE);
        let quote = "Users are frustrated with checkout friction loyalty members book twice as often";
        assert_eq!(matcher().find(quote, &text), QuoteMatch::Spliced);
    }

    #[test]
    fn ellipsis_splice_is_detected() {
        let text = normalize(SOURCE);
        let quote = "Users are frustrated ... loyalty members book twice as often";
        assert_eq!(matcher().find(quote, &text), QuoteMatch::Spliced);
    }

    #[test]
    fn adjacent_sentences_are_not_a_splice() {
        let text = normalize(SOURCE);
        // Adjacent sentences with the full stop dropped: contiguous, so only reworded
        let quote = "Users are frustrated with checkout friction Most abandon their carts";
        assert!(matches!(
            matcher().find(quote, &text),
            QuoteMatch::Paraphrase { .. }
        ));
    }

    #[test]
    fn stem_strips_one_suffix() {
        assert_eq!(stem("Users"), "user");
        assert_eq!(stem("frustrated"), "frustrat");
        assert_eq!(stem("frustrates"), "frustrat");
        assert_eq!(stem("is"), "is");
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(s in "\\PC{0,80}") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once.clone());
        }

        #[test]
        fn prop_paraphrase_span_is_verbatim(words in proptest::collection::vec("[a-z]{3,8}", 4..12)) {
            let text = normalize(&format!("{} {}", SOURCE, words.join(" ")));
            let mut reordered = words.clone();
            reordered.reverse();
            if let QuoteMatch::Paraphrase { span, .. } = matcher().find(&reordered.join(" "), &text) {
                prop_assert!(text.contains(&normalize(&span)));
                prop_assert_eq!(matcher().find(&span, &text), QuoteMatch::Exact);
            }
        }
    }
}

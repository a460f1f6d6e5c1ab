//! HTML visible-text and canonical-link extraction
//!
//! Regex based and deliberately shallow: pages only need to yield the text a
//! reader would see, in document order, so quotes can be located.

use crate::matching::normalize;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static HIDDEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>|<template\b.*?</template\s*>|<svg\b.*?</svg\s*>|<head\b.*?</head\s*>",
    )
    .expect("valid regex")
});

static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));

static BLOCK_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)</?(p|div|br|hr|li|ul|ol|dl|dd|dt|h[1-6]|tr|td|th|table|thead|tbody|section|article|header|footer|main|nav|aside|blockquote|pre|figure|figcaption)\b[^>]*>",
    )
    .expect("valid regex")
});

static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

static LINK_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<link\b[^>]*>").expect("valid regex"));

static REL_CANONICAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\brel\s*=\s*["']?\s*canonical\s*["']?"#).expect("valid regex")
});

static HREF_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});

/// Visible text of a document, whitespace and quote characters normalized
#[must_use]
pub fn visible_text(html: &str) -> String {
    let text = COMMENT.replace_all(html, " ");
    let text = HIDDEN.replace_all(&text, " ");
    let text = BLOCK_TAG.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, "");
    let decoded = html_escape::decode_html_entities(&text);
    normalize(&decoded)
}

/// Canonical URL declared by the document, resolved against `base`
#[must_use]
pub fn canonical_url(html: &str, base: &Url) -> Option<Url> {
    LINK_TAG
        .find_iter(html)
        .map(|m| m.as_str())
        .filter(|tag| REL_CANONICAL.is_match(tag))
        .find_map(|tag| {
            let caps = HREF_ATTR.captures(tag)?;
            let raw = caps.get(1).or_else(|| caps.get(2))?.as_str().trim();
            if raw.is_empty() {
                return None;
            }
            let decoded = html_escape::decode_html_entities(raw);
            let url = base.join(&decoded).ok()?;
            matches!(url.scheme(), "http" | "https").then_some(url)
        })
}

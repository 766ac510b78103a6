//! HTML extractor: confidence-ranked fallback chain.
//!
//! Explicit document boundary > explicit fence language > heuristic content
//! sniffing > first fence of any kind > raw text with tag hints.

use std::sync::OnceLock;

use regex::Regex;

use super::fence::{FenceScanner, FencedBlock};
use super::{Extraction, Strategy};

/// Structural fragments that mark a string as "probably HTML".
const TAG_HINTS: &[&str] = &[
    "<html", "<head", "<body", "<header", "<section", "<div", "<main",
    "<footer", "<h1", "<p", "<nav", "<ul", "<li",
];

const HTML_FENCE_LANGUAGES: &[&str] = &["html", "htm", "xml", "markup"];

/// Greedy `<html>…</html>` span, case-insensitive, up to the last close tag.
fn html_span_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<html.*</html>").expect("valid html span pattern"))
}

fn has_tag_hint(text: &str) -> bool {
    let lower = text.to_lowercase();
    TAG_HINTS.iter().any(|hint| lower.contains(hint))
}

pub fn extract_html(text: &str) -> Option<Extraction> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }

    // 1) Full document span wins outright.
    if let Some(span) = html_span_re().find(t) {
        return Some(Extraction::new(span.as_str().trim(), Strategy::HtmlDocument));
    }

    let blocks: Vec<FencedBlock> = FenceScanner::new(t).collect();

    // 2) A fence declared as an HTML-ish language.
    for block in &blocks {
        if HTML_FENCE_LANGUAGES.contains(&block.language.to_lowercase().as_str()) {
            return Some(Extraction::new(block.body.clone(), Strategy::HtmlFenceLanguage));
        }
    }

    // 3) A fence whose body sniffs as markup.
    for block in &blocks {
        if has_tag_hint(&block.body) {
            return Some(Extraction::new(block.body.clone(), Strategy::HtmlTagHint));
        }
    }

    // 4) Something is better than nothing: the first fence of any language.
    if let Some(block) = blocks.first() {
        return Some(Extraction::new(block.body.clone(), Strategy::AnyFence));
    }

    // 5) No fences at all, but the raw text carries markup fragments.
    if has_tag_hint(t) {
        return Some(Extraction::new(t, Strategy::RawTagHint));
    }

    let preview: String = t.chars().take(200).collect();
    tracing::debug!(preview = %preview.replace('\n', " "), "no HTML candidate found");
    None
}

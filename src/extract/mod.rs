//! Content extraction from free-form model output.
//!
//! Model text is adversarial with respect to format compliance: requested
//! JSON-only replies arrive wrapped in prose or fences, HTML arrives with or
//! without document tags. Each extractor is therefore an explicit ordered
//! list of fallback strategies, strict attempts before heuristic recovery,
//! with every step independently testable.

pub mod code;
pub mod fence;
pub mod html;
pub mod json_array;

pub use code::extract_code;
pub use fence::{first_block, FenceScanner, FencedBlock};
pub use html::extract_html;
pub use json_array::extract_json_array;

/// Which fallback step produced a payload. Used for logging and diagnostics
/// only; callers must never branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    // HTML extractor
    HtmlDocument,
    HtmlFenceLanguage,
    HtmlTagHint,
    AnyFence,
    RawTagHint,
    // JSON-array extractor
    JsonDirect,
    JsonBracketSlice,
    JsonNarrowSlice,
    JsonFence,
    // Generic code extractor
    CodeFenceLanguage,
    CodeAnyFence,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::HtmlDocument => "html_document",
            Strategy::HtmlFenceLanguage => "html_fence_language",
            Strategy::HtmlTagHint => "html_tag_hint",
            Strategy::AnyFence => "any_fence",
            Strategy::RawTagHint => "raw_tag_hint",
            Strategy::JsonDirect => "json_direct",
            Strategy::JsonBracketSlice => "json_bracket_slice",
            Strategy::JsonNarrowSlice => "json_narrow_slice",
            Strategy::JsonFence => "json_fence",
            Strategy::CodeFenceLanguage => "code_fence_language",
            Strategy::CodeAnyFence => "code_any_fence",
        }
    }
}

/// A successful extraction: the recovered payload and the strategy that
/// matched it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub payload: String,
    pub strategy: Strategy,
}

impl Extraction {
    pub(crate) fn new(payload: impl Into<String>, strategy: Strategy) -> Self {
        let extraction = Extraction { payload: payload.into(), strategy };
        tracing::debug!(strategy = strategy.as_str(), len = extraction.payload.len(), "extraction matched");
        extraction
    }
}

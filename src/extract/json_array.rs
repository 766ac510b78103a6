//! JSON-array extractor.
//!
//! Recovers a JSON array from a reply that should have been bare JSON but
//! may be wrapped in prose, fences, or an object with a `slides` key. Every
//! successful step re-serializes the array to a canonical string, so callers
//! never see intermediate representations.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::fence::first_block;
use super::{Extraction, Strategy};

/// Narrow single-bracket-pair retry for when trailing garbage after the last
/// `]` breaks the greedy first-to-last slice.
fn narrow_pair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\[.*?\]").expect("valid bracket pair pattern"))
}

/// Parse a candidate string and canonicalize it if its root is an array, or
/// an object wrapping an array under `slides`.
fn parse_candidate(candidate: &str) -> Option<String> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    let array = match value {
        Value::Array(_) => value,
        Value::Object(ref map) => map.get("slides").filter(|s| s.is_array())?.clone(),
        _ => return None,
    };
    serde_json::to_string(&array).ok()
}

pub fn extract_json_array(text: &str) -> Option<Extraction> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }

    // 1) The whole reply is already valid JSON.
    if let Some(canonical) = parse_candidate(t) {
        return Some(Extraction::new(canonical, Strategy::JsonDirect));
    }

    // 2) Greedy slice from the first '[' to the last ']'.
    if let (Some(first), Some(last)) = (t.find('['), t.rfind(']')) {
        if last > first {
            if let Some(canonical) = parse_candidate(&t[first..=last]) {
                return Some(Extraction::new(canonical, Strategy::JsonBracketSlice));
            }
        }
    }

    // 3) Non-greedy single pair, in case garbage after the last ']' broke (2).
    if let Some(m) = narrow_pair_re().find(t) {
        if let Some(canonical) = parse_candidate(m.as_str()) {
            return Some(Extraction::new(canonical, Strategy::JsonNarrowSlice));
        }
    }

    // 4) The first fenced block.
    if let Some(block) = first_block(t) {
        if let Some(canonical) = parse_candidate(&block.body) {
            return Some(Extraction::new(canonical, Strategy::JsonFence));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn len_of(payload: &str) -> usize {
        serde_json::from_str::<Vec<Value>>(payload).unwrap().len()
    }

    #[test]
    fn test_direct_parse() {
        let ex = extract_json_array(r#"[{"title":"A"}]"#).unwrap();
        assert_eq!(ex.strategy, Strategy::JsonDirect);
        assert_eq!(len_of(&ex.payload), 1);
    }

    #[test]
    fn test_empty_array_is_still_a_successful_extraction() {
        // The extractor succeeds; flagging zero elements is the dispatcher's job.
        let ex = extract_json_array("[]").unwrap();
        assert_eq!(ex.payload, "[]");
        assert_eq!(len_of(&ex.payload), 0);
    }

    #[test]
    fn test_slides_object_unwrapped() {
        let ex = extract_json_array(r#"{"slides":[{"title":"A"},{"title":"B"}]}"#).unwrap();
        assert_eq!(ex.strategy, Strategy::JsonDirect);
        assert_eq!(len_of(&ex.payload), 2);
        assert!(ex.payload.starts_with('['));
    }

    #[test]
    fn test_bracket_slice_through_prose() {
        let text = "Here is your deck:\n[{\"title\":\"A\"},{\"title\":\"B\"}]\nHope it helps!";
        let ex = extract_json_array(text).unwrap();
        assert_eq!(ex.strategy, Strategy::JsonBracketSlice);
        assert_eq!(len_of(&ex.payload), 2);
    }

    #[test]
    fn test_narrow_retry_when_trailing_bracket_breaks_greedy_slice() {
        // The stray ']' after the array makes the greedy slice unparseable.
        let text = "[{\"title\":\"A\"}]\nP.S. remember option b)]";
        let ex = extract_json_array(text).unwrap();
        assert_eq!(ex.strategy, Strategy::JsonNarrowSlice);
        assert_eq!(len_of(&ex.payload), 1);
    }

    #[test]
    fn test_fenced_reply_recovered() {
        // The bracket slice already reaches inside the fence here; the
        // observable contract is simply that the array comes back intact.
        let text = "Sure! ```json\n[{\"title\":\"A\"}]\n```";
        let ex = extract_json_array(text).unwrap();
        assert_eq!(len_of(&ex.payload), 1);
    }

    #[test]
    fn test_fence_step_reached_when_slices_fail() {
        // The stray "[a]" pair defeats both bracket slices; only the fence
        // body parses, via the slides unwrap.
        let text = "(see note [a])\n```json\n{\"slides\": [{\"title\": \"A\"}]}\n```";
        let ex = extract_json_array(text).unwrap();
        assert_eq!(ex.strategy, Strategy::JsonFence);
        assert_eq!(len_of(&ex.payload), 1);
    }

    #[test]
    fn test_no_array_anywhere() {
        assert!(extract_json_array("no json here").is_none());
        assert!(extract_json_array(r#"{"not":"an array"}"#).is_none());
        assert!(extract_json_array("").is_none());
    }

    #[test]
    fn test_rerun_on_own_output_is_idempotent() {
        let text = "Sure! ```json\n[{\"title\":\"A\",\"content\":\"B\"}]\n```";
        let first = extract_json_array(text).unwrap();
        let second = extract_json_array(&first.payload).unwrap();
        assert_eq!(second.strategy, Strategy::JsonDirect);
        assert_eq!(second.payload, first.payload);
    }
}

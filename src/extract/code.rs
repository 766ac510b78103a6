//! Generic code extractor: prefers JavaScript/TypeScript fences, falls back
//! to the first fenced block of any language.

use super::fence::{FenceScanner, FencedBlock};
use super::{Extraction, Strategy};

const SCRIPT_LANGUAGES: &[&str] = &["javascript", "js", "typescript", "ts"];

pub fn extract_code(text: &str) -> Option<Extraction> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }

    let blocks: Vec<FencedBlock> = FenceScanner::new(t).collect();

    for block in &blocks {
        if SCRIPT_LANGUAGES.contains(&block.language.to_lowercase().as_str()) {
            return Some(Extraction::new(block.body.clone(), Strategy::CodeFenceLanguage));
        }
    }

    blocks
        .into_iter()
        .next()
        .map(|block| Extraction::new(block.body, Strategy::CodeAnyFence))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_script_language() {
        let text = "```python\nprint(1)\n```\n```ts\nconst x = 1;\n```";
        let ex = extract_code(text).unwrap();
        assert_eq!(ex.payload, "const x = 1;");
        assert_eq!(ex.strategy, Strategy::CodeFenceLanguage);
    }

    #[test]
    fn test_falls_back_to_first_fence() {
        let text = "```python\nprint(1)\n```\n```ruby\nputs 1\n```";
        let ex = extract_code(text).unwrap();
        assert_eq!(ex.payload, "print(1)");
        assert_eq!(ex.strategy, Strategy::CodeAnyFence);
    }

    #[test]
    fn test_no_fences() {
        assert!(extract_code("const inline = true;").is_none());
        assert!(extract_code("").is_none());
    }
}

//! Fenced code-block scanner.
//!
//! Line-based rather than one monolithic regex: a block opens on a line that
//! is a fence marker optionally followed by a language tag, and closes on a
//! line that is the fence marker alone. Scanning is lazy, non-overlapping,
//! and left-to-right; a fresh scanner restarts from the top of the text.

const FENCE: &str = "```";

/// One fenced block: the declared language tag (may be empty) and the
/// trimmed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    pub language: String,
    pub body: String,
}

pub struct FenceScanner<'a> {
    lines: std::str::Lines<'a>,
}

impl<'a> FenceScanner<'a> {
    pub fn new(text: &'a str) -> Self {
        FenceScanner { lines: text.lines() }
    }
}

impl Iterator for FenceScanner<'_> {
    type Item = FencedBlock;

    fn next(&mut self) -> Option<FencedBlock> {
        loop {
            // Find the next opening fence. Leading whitespace is tolerated;
            // whatever follows the marker is the language tag.
            let language = loop {
                let line = self.lines.next()?;
                if let Some(rest) = line.trim_start().strip_prefix(FENCE) {
                    break rest.trim().to_string();
                }
            };

            let mut body = String::new();
            let mut closed = false;
            for line in self.lines.by_ref() {
                if line.trim() == FENCE {
                    closed = true;
                    break;
                }
                if !body.is_empty() {
                    body.push('\n');
                }
                body.push_str(line);
            }

            // An unclosed fence consumes the rest of the text and yields
            // nothing.
            if !closed {
                return None;
            }

            let body = body.trim();
            if body.is_empty() {
                continue;
            }
            return Some(FencedBlock { language, body: body.to_string() });
        }
    }
}

/// First non-empty block in the text, if any.
pub fn first_block(text: &str) -> Option<FencedBlock> {
    FenceScanner::new(text).next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(text: &str) -> Vec<FencedBlock> {
        FenceScanner::new(text).collect()
    }

    #[test]
    fn test_single_block_with_language() {
        let blocks = scan("intro\n```python\nprint(1)\n```\noutro");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language, "python");
        assert_eq!(blocks[0].body, "print(1)");
    }

    #[test]
    fn test_missing_language_tag() {
        let blocks = scan("```\nplain body\n```");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language, "");
        assert_eq!(blocks[0].body, "plain body");
    }

    #[test]
    fn test_multiple_blocks_in_order() {
        let text = "```js\na\n```\nprose\n```html\n<div></div>\n```";
        let blocks = scan(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].language, "js");
        assert_eq!(blocks[1].language, "html");
        assert_eq!(blocks[1].body, "<div></div>");
    }

    #[test]
    fn test_empty_body_suppressed() {
        let text = "```json\n\n```\n```txt\n   \n```\n```rust\nfn f() {}\n```";
        let blocks = scan(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language, "rust");
    }

    #[test]
    fn test_unclosed_fence_yields_nothing() {
        assert!(scan("```python\nno closing marker").is_empty());
        assert!(scan("text without fences at all").is_empty());
    }

    #[test]
    fn test_no_trailing_newline_before_close() {
        // A closing marker glued to the body is not a close.
        assert!(scan("```\nlast line```").is_empty());

        // Text ending exactly at the closing marker, no final newline.
        let blocks = scan("prefix\n```go\nx := 1\n```");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].body, "x := 1");
    }

    #[test]
    fn test_indented_fences_tolerated() {
        let blocks = scan("  ```sql\n  select 1;\n  ```");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language, "sql");
        assert_eq!(blocks[0].body, "select 1;");
    }

    #[test]
    fn test_scanner_is_restartable() {
        let text = "```a\nx\n```\n```b\ny\n```";
        let first_pass: Vec<_> = FenceScanner::new(text).collect();
        let second_pass: Vec<_> = FenceScanner::new(text).collect();
        assert_eq!(first_pass, second_pass);
        assert_eq!(first_block(text).unwrap().language, "a");
    }
}

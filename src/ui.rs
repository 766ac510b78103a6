//! UI sink: the one-way surface the relay renders through.
//!
//! Everything user-visible funnels through `UiSink` so the core stays
//! headless. Panels are side surfaces (code workbench, slide preview)
//! rendered next to the transcript; each render carries a monotonically
//! increasing version so hosts can key re-renders.

use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    CodeWorkbench,
    SlidePreview,
}

impl PanelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelKind::CodeWorkbench => "code_workbench",
            PanelKind::SlidePreview => "slide_preview",
        }
    }
}

/// A render instruction for a side panel.
#[derive(Debug, Clone, Serialize)]
pub struct Panel {
    pub kind: PanelKind,
    pub title: String,
    pub payload: Value,
    pub version: u64,
}

/// Host-side rendering surface. Methods are synchronous so adapters can call
/// them from inside a streaming loop without extra plumbing.
pub trait UiSink: Send + Sync {
    /// Append one token to the in-flight assistant message.
    fn push_token(&self, token: &str);

    /// The in-flight message is complete.
    fn finalize(&self);

    /// Transient status text next to the in-flight message. Empty string
    /// clears it.
    fn set_status(&self, text: &str);

    fn render_panel(&self, panel: Panel);

    /// Display a generated image inline, with a caption.
    fn render_image(&self, caption: &str, bytes: Vec<u8>);

    /// A standalone informational or error message.
    fn notify(&self, text: &str);
}

/// Props for the code workbench panel. `code: None` renders the empty
/// workbench shell.
pub fn workbench_panel(code: Option<&str>, title: &str, version: u64) -> Panel {
    Panel {
        kind: PanelKind::CodeWorkbench,
        title: title.to_string(),
        payload: json!({
            "code": code.unwrap_or(""),
            "title": title,
            "filename": "index.html",
            "language": "html",
            "readOnly": false,
            "autoPreview": true,
            "key": format!("workbench-{version}"),
        }),
        version,
    }
}

/// Props for the slide preview panel. `slides_json` is a canonical JSON
/// array string.
pub fn slide_panel(slides_json: &str, title: &str, version: u64) -> Panel {
    Panel {
        kind: PanelKind::SlidePreview,
        title: title.to_string(),
        payload: json!({
            "slides_json": slides_json,
            "title": title,
            "key": format!("slide-preview-{version}"),
        }),
        version,
    }
}

/// Wrap a bare markup fragment in a minimal document so the preview renders
/// it. Full documents and non-markup text pass through untouched.
pub fn wrap_fragment_if_needed(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.starts_with('<') && !trimmed.to_lowercase().contains("<html") {
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n</head>\n<body>\n{trimmed}\n</body>\n</html>"
        )
    } else {
        content.to_string()
    }
}

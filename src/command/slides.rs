//! Slide command: turn a free-form request into a slide deck preview.
//!
//! The deck is produced by a dedicated completion call with a strict
//! JSON-array contract, then recovered through the JSON extractor since
//! models routinely violate the "array only" instruction.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::error::RelayError;
use crate::extract::extract_json_array;
use crate::session::SessionContext;
use crate::ui::{slide_panel, workbench_panel, PanelKind, UiSink};

/// Deck generation always runs on a fixed model; the session's chat model
/// has no bearing here.
const SLIDE_MODEL: &str = "gpt-4o";

const SLIDE_PROMPT_TEMPLATE: &str = r#"
You are a professional presentation-building assistant.
From the user's request below, produce a slide deck as JSON whose slide bodies contain Marp-style Markdown.

# JSON schema
- The root is an array of slide objects (e.g. `[ {...}, {...} ]`).
- Each slide object may carry the following keys:
  - `title` (string, optional): the slide title, equivalent to a Markdown `#` heading.
  - `content` (string, optional): the slide body in Markdown. Bullet lists, bold text and tables are fine. Use `\n` for line breaks.
  - `directives` (object, optional): display directives such as `header`, `footer`, `class`, `backgroundColor`.
  - `notes` (string, optional): speaker notes.

# Example output (return it as a bare JSON array, no code fences)
[
  {"title": "Title", "content": "Presenter: your name\n\nThis is the opening slide."},
  {"title": "Agenda", "content": "- Item 1\n- Item 2\n- Item 3"}
]

# Hard rules
- Reply with the JSON array only. No surrounding prose and no code fences (```).
- Markdown line breaks must use `\n`.

---
User request:
{user_input}
"#;

/// One slide as the preview consumes it. Every field is optional; an object
/// with none of them is still a valid (blank) slide.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Slide {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub directives: Option<Value>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Parse a canonical JSON-array string into slides.
pub fn parse_deck(slides_json: &str) -> Result<Vec<Slide>, RelayError> {
    Ok(serde_json::from_str(slides_json)?)
}

/// Title for the preview panel: the first 20 characters of the request.
fn deck_title(request: &str) -> String {
    let prefix: String = request.chars().take(20).collect();
    format!("{prefix}... slides")
}

fn diagnostic_panel(session: &mut SessionContext, sink: &Arc<dyn UiSink>, raw: &str, title: &str) {
    let version = session.next_panel_version(PanelKind::CodeWorkbench);
    let code = format!("<pre>{raw}</pre>");
    sink.render_panel(workbench_panel(Some(&code), title, version));
}

pub async fn run(
    session: &mut SessionContext,
    sink: &Arc<dyn UiSink>,
    request: &str,
) -> Result<(), RelayError> {
    let Some(client) = session.clients().openai_text.clone() else {
        let err = RelayError::MissingCredential("OPENAI_API_KEY".into());
        sink.notify(&format!("Error: {err}"));
        return Err(err);
    };

    sink.set_status("Generating slides...");
    // The template contains literal braces, so plain replace instead of a
    // format string.
    let prompt = SLIDE_PROMPT_TEMPLATE.replace("{user_input}", request);
    let raw = match client.complete(SLIDE_MODEL, &prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            sink.set_status("");
            sink.notify(&format!("Error: slide generation failed: {e}"));
            return Err(e);
        }
    };
    sink.set_status("");

    let Some(extraction) = extract_json_array(&raw) else {
        tracing::warn!(preview = %raw.chars().take(200).collect::<String>(), "no JSON array in slide reply");
        sink.notify("Could not extract a slide JSON array; showing the raw reply in the sidebar.");
        diagnostic_panel(session, sink, &raw, "Slide JSON Raw Output");
        return Err(RelayError::Extraction("no JSON array in slide reply".into()));
    };

    let deck = match parse_deck(&extraction.payload) {
        Ok(deck) => deck,
        Err(e) => {
            // Valid JSON array, but the elements are not slide objects.
            tracing::warn!(error = %e, "slide array elements did not parse as slides");
            sink.notify("The slide array could not be read as slides; showing the raw reply in the sidebar.");
            diagnostic_panel(session, sink, &raw, "Slide JSON Raw Output");
            return Err(RelayError::Extraction(format!(
                "slide array elements were not slide objects: {e}"
            )));
        }
    };
    if deck.is_empty() {
        sink.notify("Extraction succeeded but the slide array is empty; showing the raw reply in the sidebar.");
        diagnostic_panel(session, sink, &raw, "Slide JSON Raw Output (empty array)");
        return Err(RelayError::EmptyResult("slide array is empty".into()));
    }

    let version = session.next_panel_version(PanelKind::SlidePreview);
    sink.render_panel(slide_panel(&extraction.payload, &deck_title(request), version));
    sink.notify(&format!("Slide preview opened in the sidebar. ({} slides)", deck.len()));
    Ok(())
}

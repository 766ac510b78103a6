//! Code command: open the coding workbench, seeded with the best code
//! candidate available.
//!
//! Seeding order: explicit text passed with the command, then the most
//! recent assistant reply containing markup, then the most recent fenced
//! block of any language. With nothing to show, the empty workbench shell
//! still opens.

use std::sync::Arc;

use crate::error::RelayError;
use crate::extract::{extract_html, first_block};
use crate::history::Role;
use crate::session::SessionContext;
use crate::ui::{workbench_panel, wrap_fragment_if_needed, PanelKind, UiSink};

/// A recovered candidate and whether it came from a non-markup fence.
struct Seed {
    code: String,
    uncertain: bool,
}

fn seed_from_history(session: &SessionContext) -> Option<Seed> {
    for turn in session.history.turns().iter().rev() {
        if turn.role != Role::Assistant {
            continue;
        }
        if let Some(extraction) = extract_html(&turn.text) {
            return Some(Seed { code: extraction.payload, uncertain: false });
        }
        if let Some(block) = first_block(&turn.text) {
            return Some(Seed { code: block.body, uncertain: true });
        }
    }
    None
}

pub fn run(
    session: &mut SessionContext,
    sink: &Arc<dyn UiSink>,
    text: &str,
) -> Result<(), RelayError> {
    let seed = if !text.trim().is_empty() {
        Some(Seed {
            code: extract_html(text).map(|e| e.payload).unwrap_or_else(|| text.to_string()),
            uncertain: false,
        })
    } else {
        seed_from_history(session)
    };

    let version = session.next_panel_version(PanelKind::CodeWorkbench);
    let mut notice = String::from("Opened the code workbench. Switch between Editor and Preview.");
    match seed {
        Some(seed) => {
            let code = wrap_fragment_if_needed(&seed.code);
            sink.render_panel(workbench_panel(Some(&code), "Workbench", version));
            if seed.uncertain {
                notice.push_str("\n(The recovered block is not HTML, so the preview may not render.)");
            }
        }
        None => {
            sink.render_panel(workbench_panel(None, "Workbench", version));
        }
    }
    sink.notify(&notice);
    Ok(())
}

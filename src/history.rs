//! Conversation history: an append-only log of user/assistant turns owned by
//! one session, plus rehydration from a persisted transcript.
//!
//! System prompts are injected per-request and never stored here; the `Role`
//! enum has no system variant, so the invariant holds by construction.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation turn. Immutable once appended; ordering within `History`
/// is the single source of truth for conversation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Turn { role: Role::User, text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Turn { role: Role::Assistant, text: text.into() }
    }
}

// =============================================================================
// Transcript rehydration input
// =============================================================================

/// One message of an externally persisted transcript. Content arrives split
/// into typed fragments; only `type == "text"` fragments survive rehydration.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptMessage {
    pub author: String,
    #[serde(default)]
    pub content: Vec<TranscriptChunk>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptChunk {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

// =============================================================================
// History
// =============================================================================

/// Ordered append-only turn log for the active session.
#[derive(Debug, Default)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    pub fn new() -> Self {
        History::default()
    }

    /// Unconditional append.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Ordered read-only view used to build provider requests. The returned
    /// vector is independent of `History` and safe to mutate.
    pub fn snapshot_for_request(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    /// Remove the most recent turn only if it is a user turn. Used after a
    /// failed provider call so a failed send never leaves an orphaned user
    /// turn behind. Returns true if a turn was removed.
    pub fn rollback_last_if_user(&mut self) -> bool {
        if matches!(self.turns.last(), Some(t) if t.role == Role::User) {
            self.turns.pop();
            true
        } else {
            false
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Rebuild history from a persisted transcript. Per message, text
    /// fragments are concatenated; a message whose concatenated text is empty
    /// after trimming is dropped entirely, as are unknown authors.
    pub fn from_transcript(messages: &[TranscriptMessage]) -> Self {
        let mut history = History::new();
        for message in messages {
            let text: String = message
                .content
                .iter()
                .filter(|c| c.kind == "text")
                .filter_map(|c| c.text.as_deref())
                .collect();
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            match message.author.as_str() {
                "user" => history.append(Turn::user(text)),
                "assistant" => history.append(Turn::assistant(text)),
                _ => {}
            }
        }
        tracing::debug!(turns = history.len(), "restored history from transcript");
        history
    }
}

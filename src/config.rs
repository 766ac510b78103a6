//! Static model catalog, system-prompt choices, and session settings.
//!
//! All of this is read-only configuration shared across sessions; the
//! per-session mutable state lives in [`crate::session::SessionContext`].

use serde::{Deserialize, Serialize};

// =============================================================================
// ModelFamily — which provider adapter handles a model
// =============================================================================

/// Supported provider families. Closed set; one stream adapter per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    OpenAi,
    Gemini,
    Claude,
    Grok,
}

impl ModelFamily {
    /// Parse from the string stored in settings payloads.
    pub fn from_setting(s: &str) -> Option<Self> {
        match s {
            "openai" => Some(ModelFamily::OpenAi),
            "gemini" => Some(ModelFamily::Gemini),
            "claude" => Some(ModelFamily::Claude),
            "grok" => Some(ModelFamily::Grok),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::OpenAi => "openai",
            ModelFamily::Gemini => "gemini",
            ModelFamily::Claude => "claude",
            ModelFamily::Grok => "grok",
        }
    }

    /// Env variable holding this family's API key.
    pub fn key_env(&self) -> &'static str {
        match self {
            ModelFamily::OpenAi => "OPENAI_API_KEY",
            ModelFamily::Gemini => "GOOGLE_API_KEY",
            ModelFamily::Claude => "ANTHROPIC_API_KEY",
            ModelFamily::Grok => "XAI_API_KEY",
        }
    }

    /// Whether replies from this family are scanned for HTML after a
    /// successful turn to auto-populate the code workbench.
    pub fn auto_extracts_html(&self) -> bool {
        matches!(self, ModelFamily::Claude)
    }

    /// Whether this family supports incremental context via a continuation
    /// token instead of re-sending full history.
    pub fn supports_continuation(&self) -> bool {
        matches!(self, ModelFamily::OpenAi)
    }
}

// =============================================================================
// Model catalog
// =============================================================================

/// One selectable model. Immutable; selection is replaced wholesale on every
/// settings update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub label: &'static str,
    pub id: &'static str,
    pub family: ModelFamily,
}

pub const AVAILABLE_MODELS: &[ModelDescriptor] = &[
    ModelDescriptor { label: "GPT-4o-mini", id: "gpt-4o-mini", family: ModelFamily::OpenAi },
    ModelDescriptor { label: "GPT-4.1", id: "gpt-4.1-2025-04-14", family: ModelFamily::OpenAi },
    ModelDescriptor { label: "GPT-5 Chat", id: "gpt-5-chat-latest", family: ModelFamily::OpenAi },
    ModelDescriptor { label: "GPT-5 Nano", id: "gpt-5-nano-2025-08-07", family: ModelFamily::OpenAi },
    ModelDescriptor { label: "GPT-5", id: "gpt-5-2025-08-07", family: ModelFamily::OpenAi },
    ModelDescriptor { label: "Gemini 2.5 Flash-Lite", id: "gemini-2.5-flash-lite", family: ModelFamily::Gemini },
    ModelDescriptor { label: "Gemini 2.5 Flash", id: "gemini-2.5-flash", family: ModelFamily::Gemini },
    ModelDescriptor { label: "Gemini 2.5 Pro", id: "gemini-2.5-pro", family: ModelFamily::Gemini },
    ModelDescriptor { label: "Claude Sonnet 4", id: "claude-sonnet-4-20250514", family: ModelFamily::Claude },
    ModelDescriptor { label: "Claude Sonnet 4.5", id: "claude-sonnet-4-5-20250929", family: ModelFamily::Claude },
    ModelDescriptor { label: "Grok 4", id: "grok-4-0709", family: ModelFamily::Grok },
    ModelDescriptor { label: "Grok 4 fast reasoning", id: "grok-4-fast-reasoning-latest", family: ModelFamily::Grok },
    ModelDescriptor { label: "Grok Code Fast 1", id: "grok-code-fast-1", family: ModelFamily::Grok },
];

pub const DEFAULT_MODEL_INDEX: usize = 0;

/// Look up a catalog entry by its display label.
pub fn model_by_label(label: &str) -> Option<&'static ModelDescriptor> {
    AVAILABLE_MODELS.iter().find(|m| m.label == label)
}

// =============================================================================
// System prompts
// =============================================================================

/// A selectable system-prompt persona. `content` may carry a
/// `{current_time}` placeholder substituted at request-build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptChoice {
    pub label: &'static str,
    pub content: &'static str,
}

pub const SYSTEM_PROMPT_CHOICES: &[PromptChoice] = &[
    PromptChoice {
        label: "Standard assistant",
        content: "Current time: {current_time}\nYou are a helpful assistant.",
    },
    PromptChoice {
        label: "Formal explainer",
        content: "Current time: {current_time}\nUse a formal tone, providing clear, well-structured sentences and precise language.",
    },
    PromptChoice {
        label: "Concise answers",
        content: "Current time: {current_time}\nRespond briefly and directly, using as few words as possible.",
    },
    PromptChoice {
        label: "Socratic teacher",
        content: "Current time: {current_time}\nRespond as a Socratic teacher, guiding the user through questions and reasoning to foster deep understanding.",
    },
];

pub const DEFAULT_PROMPT_INDEX: usize = 0;

/// Substitute `{current_time}` in a prompt template with the local time.
/// Plain string replace; the templates contain no other placeholders.
pub fn render_system_prompt(template: &str) -> String {
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M").to_string();
    template.replace("{current_time}", &now)
}

// =============================================================================
// Session settings
// =============================================================================

/// Session-level settings, replaced wholesale on every settings update.
#[derive(Debug, Clone)]
pub struct Settings {
    pub model: ModelDescriptor,
    /// System-prompt template (pre-substitution). Injected per-request; never
    /// stored in history.
    pub system_prompt: String,
    pub tools_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            model: AVAILABLE_MODELS[DEFAULT_MODEL_INDEX],
            system_prompt: SYSTEM_PROMPT_CHOICES[DEFAULT_PROMPT_INDEX].content.to_string(),
            tools_enabled: false,
        }
    }
}

impl Settings {
    /// Build settings from the labels a settings widget reports, falling
    /// back to the defaults for unknown labels.
    pub fn from_labels(model_label: &str, prompt_label: &str, tools_enabled: bool) -> Self {
        let model = model_by_label(model_label)
            .copied()
            .unwrap_or(AVAILABLE_MODELS[DEFAULT_MODEL_INDEX]);
        let prompt = SYSTEM_PROMPT_CHOICES
            .iter()
            .find(|p| p.label == prompt_label)
            .unwrap_or(&SYSTEM_PROMPT_CHOICES[DEFAULT_PROMPT_INDEX]);
        Settings {
            model,
            system_prompt: prompt.content.to_string(),
            tools_enabled,
        }
    }
}

// =============================================================================
// API keys
// =============================================================================

/// Provider API keys loaded from the environment (with `.env` support).
/// A missing or empty variable means the family is unavailable.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub openai: Option<String>,
    pub google: Option<String>,
    pub anthropic: Option<String>,
    pub xai: Option<String>,
}

impl ApiKeys {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        ApiKeys {
            openai: read_key("OPENAI_API_KEY"),
            google: read_key("GOOGLE_API_KEY"),
            anthropic: read_key("ANTHROPIC_API_KEY"),
            xai: read_key("XAI_API_KEY"),
        }
    }
}

fn read_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

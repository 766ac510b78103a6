//! OpenAI family: streaming responses API, text completion, image generation.
//!
//! The streaming protocol is typed server events. Text arrives as
//! `response.output_text.delta`; tool-call progress events carry no user
//! text and surface only as transient status; `response.completed` closes
//! the stream and yields the response id used to continue context next turn.

use async_trait::async_trait;
use base64::Engine as _;
use futures_util::StreamExt;
use serde_json::{json, Value};

use crate::error::RelayError;
use crate::history::Role;

use super::sse::data_lines;
use super::{CanonicalEvent, Completion, NativeStream, Normalizer, Step, StreamRequest};

const API_BASE: &str = "https://api.openai.com/v1";
const IMAGE_MODEL: &str = "gpt-4.1-mini";

// =============================================================================
// Native events
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenAiEvent {
    OutputTextDelta(String),
    /// A tool call in flight; the tool name when the event carries one.
    ToolCallDelta(Option<String>),
    ToolCallCompleted,
    Completed { response_id: Option<String> },
    Error(String),
    Other,
}

impl OpenAiEvent {
    /// Classify one `data:` payload from the responses stream. Unknown event
    /// types map to `Other` so protocol additions never break the adapter.
    pub fn parse(payload: &str) -> Self {
        let value: Value = match serde_json::from_str(payload) {
            Ok(v) => v,
            Err(_) => return OpenAiEvent::Other,
        };
        let event_type = value.get("type").and_then(Value::as_str).unwrap_or("");
        match event_type {
            "response.output_text.delta" => {
                let delta = value.get("delta").and_then(Value::as_str).unwrap_or("");
                OpenAiEvent::OutputTextDelta(delta.to_string())
            }
            t if t.starts_with("response.") && t.contains("tool_call") && t.ends_with(".delta") => {
                let name = ["/delta/name", "/delta/tool_name", "/delta/function/name"]
                    .iter()
                    .find_map(|p| value.pointer(p).and_then(Value::as_str))
                    .map(str::to_string);
                OpenAiEvent::ToolCallDelta(name)
            }
            "response.tool_call.completed" | "response.tool_calls.done" => {
                OpenAiEvent::ToolCallCompleted
            }
            "response.completed" => {
                let id = value
                    .pointer("/response/id")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                OpenAiEvent::Completed { response_id: id }
            }
            "response.error" | "error" => {
                let message = value
                    .pointer("/error/message")
                    .or_else(|| value.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("provider reported an error");
                OpenAiEvent::Error(message.to_string())
            }
            _ => OpenAiEvent::Other,
        }
    }
}

// =============================================================================
// Normalizer
// =============================================================================

#[derive(Default)]
pub(crate) struct OpenAiNormalizer {
    terminated: bool,
}

impl Normalizer for OpenAiNormalizer {
    type Native = OpenAiEvent;

    fn push(&mut self, native: OpenAiEvent) -> Step {
        if self.terminated {
            return Step::Skip;
        }
        match native {
            OpenAiEvent::OutputTextDelta(text) => {
                if text.is_empty() {
                    Step::Skip
                } else {
                    Step::Emit(CanonicalEvent::Token(text))
                }
            }
            OpenAiEvent::ToolCallDelta(name) => {
                let text = match name {
                    Some(name) => format!("Running tool: {name}"),
                    None => "Running tool...".to_string(),
                };
                Step::Status(text)
            }
            OpenAiEvent::ToolCallCompleted => Step::Status("Generating response...".to_string()),
            OpenAiEvent::Completed { response_id } => {
                self.terminated = true;
                Step::Emit(CanonicalEvent::Completed { continuation: response_id })
            }
            OpenAiEvent::Error(reason) => {
                self.terminated = true;
                Step::Emit(CanonicalEvent::Failed { reason })
            }
            OpenAiEvent::Other => Step::Skip,
        }
    }

    fn finish(&mut self) -> Option<CanonicalEvent> {
        if self.terminated {
            return None;
        }
        self.terminated = true;
        Some(CanonicalEvent::Completed { continuation: None })
    }
}

// =============================================================================
// Client
// =============================================================================

/// OpenAI surface consumed by the relay: the streaming turn plus the two
/// one-shot operations that back the picture and slide workflows.
#[async_trait]
pub trait OpenAiClient: Send + Sync {
    async fn stream_response(
        &self,
        request: &StreamRequest,
    ) -> Result<NativeStream<OpenAiEvent>, RelayError>;

    async fn complete(&self, model: &str, prompt: &str) -> Result<String, RelayError>;

    /// Generate one image from a text prompt, returned as raw bytes.
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, RelayError>;
}

pub struct HttpOpenAiClient {
    http: reqwest::Client,
    api_key: String,
}

/// Hosted tools attached to a responses call when tools are enabled.
fn tool_definitions() -> Value {
    json!([
        { "type": "web_search" },
        { "type": "code_interpreter", "container": { "type": "auto" } },
        { "type": "image_generation" },
        {
            "type": "mcp",
            "server_label": "deepwiki",
            "server_url": "https://mcp.deepwiki.com/mcp",
            "require_approval": "never"
        }
    ])
}

impl HttpOpenAiClient {
    pub fn new(api_key: String) -> Self {
        // Connect timeout only; a total timeout would kill long streams.
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        HttpOpenAiClient { http, api_key }
    }

    fn responses_body(&self, request: &StreamRequest, stream: bool) -> Value {
        let mut input = vec![json!({ "role": "system", "content": request.system_prompt })];
        if request.continuation.is_some() {
            // Continued context: the server already holds the prior turns.
            input.push(json!({ "role": "user", "content": request.latest_user_text() }));
        } else {
            for turn in &request.turns {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                input.push(json!({ "role": role, "content": turn.text }));
            }
        }

        let mut body = json!({
            "model": request.model,
            "input": input,
            "stream": stream,
        });
        if let Some(id) = &request.continuation {
            body["previous_response_id"] = json!(id);
        }
        if request.tools_enabled {
            body["tools"] = tool_definitions();
        }
        body
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, RelayError> {
        let response = self
            .http
            .post(format!("{API_BASE}{path}"))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(RelayError::Transport(format!(
                "openai {path} returned {status}: {detail}"
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl OpenAiClient for HttpOpenAiClient {
    async fn stream_response(
        &self,
        request: &StreamRequest,
    ) -> Result<NativeStream<OpenAiEvent>, RelayError> {
        let body = self.responses_body(request, true);
        let response = self
            .http
            .post(format!("{API_BASE}/responses"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(RelayError::Transport(format!(
                "openai /responses returned {status}: {detail}"
            )));
        }
        let events = data_lines(response).map(|item| item.map(|payload| OpenAiEvent::parse(&payload)));
        Ok(Box::pin(events))
    }

    async fn complete(&self, model: &str, prompt: &str) -> Result<String, RelayError> {
        let body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.7,
            "max_tokens": 4000,
        });
        let value = self.post_json("/chat/completions", &body).await?;
        let content = value
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| RelayError::Transport("openai completion had no content".into()))?;
        Ok(content.to_string())
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, RelayError> {
        let body = json!({
            "model": IMAGE_MODEL,
            "input": prompt,
            "tools": [{ "type": "image_generation" }],
        });
        let value = self.post_json("/responses", &body).await?;
        let encoded = value
            .get("output")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find(|item| item.get("type").and_then(Value::as_str) == Some("image_generation_call"))
            .and_then(|item| item.get("result"))
            .and_then(Value::as_str)
            .ok_or_else(|| RelayError::EmptyResult("no image in provider output".into()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| RelayError::Transport(format!("image payload was not valid base64: {e}")))
    }
}

#[async_trait]
impl Completion for HttpOpenAiClient {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, RelayError> {
        OpenAiClient::complete(self, model, prompt).await
    }
}

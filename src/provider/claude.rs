//! Claude family: Anthropic messages API streaming.
//!
//! The stream interleaves lifecycle events with content deltas; only
//! `content_block_delta` carries user-visible text, and `message_stop`
//! closes the turn. There is no continuation token: full history is resent
//! each turn, with the system prompt as a top-level field rather than a
//! message.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};

use crate::error::RelayError;
use crate::history::Role;

use super::sse::data_lines;
use super::{CanonicalEvent, NativeStream, Normalizer, Step, StreamRequest};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaudeEvent {
    TextDelta(String),
    MessageStop,
    Error(String),
    Other,
}

impl ClaudeEvent {
    pub fn parse(payload: &str) -> Self {
        let value: Value = match serde_json::from_str(payload) {
            Ok(v) => v,
            Err(_) => return ClaudeEvent::Other,
        };
        match value.get("type").and_then(Value::as_str).unwrap_or("") {
            "content_block_delta" => {
                let text = value.pointer("/delta/text").and_then(Value::as_str).unwrap_or("");
                ClaudeEvent::TextDelta(text.to_string())
            }
            "message_stop" => ClaudeEvent::MessageStop,
            "error" => {
                let message = value
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .unwrap_or("provider reported an error");
                ClaudeEvent::Error(message.to_string())
            }
            // message_start, content_block_start, ping and friends.
            _ => ClaudeEvent::Other,
        }
    }
}

#[derive(Default)]
pub(crate) struct ClaudeNormalizer {
    terminated: bool,
}

impl Normalizer for ClaudeNormalizer {
    type Native = ClaudeEvent;

    fn push(&mut self, native: ClaudeEvent) -> Step {
        if self.terminated {
            return Step::Skip;
        }
        match native {
            ClaudeEvent::TextDelta(text) => {
                if text.is_empty() {
                    Step::Skip
                } else {
                    Step::Emit(CanonicalEvent::Token(text))
                }
            }
            ClaudeEvent::MessageStop => {
                self.terminated = true;
                Step::Emit(CanonicalEvent::Completed { continuation: None })
            }
            ClaudeEvent::Error(reason) => {
                self.terminated = true;
                Step::Emit(CanonicalEvent::Failed { reason })
            }
            ClaudeEvent::Other => Step::Skip,
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

#[async_trait]
pub trait ClaudeClient: Send + Sync {
    async fn stream_messages(
        &self,
        request: &StreamRequest,
    ) -> Result<NativeStream<ClaudeEvent>, RelayError>;
}

pub struct HttpClaudeClient {
    http: reqwest::Client,
    api_key: String,
}

impl HttpClaudeClient {
    pub fn new(api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        HttpClaudeClient { http, api_key }
    }

    fn messages_body(request: &StreamRequest) -> Value {
        let messages: Vec<Value> = request
            .turns
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                json!({ "role": role, "content": turn.text })
            })
            .collect();
        json!({
            "model": request.model,
            "system": request.system_prompt,
            "messages": messages,
            "max_tokens": MAX_TOKENS,
            "stream": true,
        })
    }
}

#[async_trait]
impl ClaudeClient for HttpClaudeClient {
    async fn stream_messages(
        &self,
        request: &StreamRequest,
    ) -> Result<NativeStream<ClaudeEvent>, RelayError> {
        let body = Self::messages_body(request);
        let response = self
            .http
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(RelayError::Transport(format!(
                "anthropic messages returned {status}: {detail}"
            )));
        }
        let events = data_lines(response).map(|item| item.map(|payload| ClaudeEvent::parse(&payload)));
        Ok(Box::pin(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[test]
    fn test_parse_content_block_delta() {
        let payload = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#;
        assert_eq!(ClaudeEvent::parse(payload), ClaudeEvent::TextDelta("Hi".into()));
    }

    #[test]
    fn test_parse_lifecycle_events_ignored() {
        assert_eq!(ClaudeEvent::parse(r#"{"type":"message_start"}"#), ClaudeEvent::Other);
        assert_eq!(ClaudeEvent::parse(r#"{"type":"content_block_start"}"#), ClaudeEvent::Other);
        assert_eq!(ClaudeEvent::parse(r#"{"type":"ping"}"#), ClaudeEvent::Other);
        assert_eq!(ClaudeEvent::parse(r#"{"type":"message_stop"}"#), ClaudeEvent::MessageStop);
    }

    #[tokio::test]
    async fn test_normalized_turn() {
        let native: NativeStream<ClaudeEvent> = Box::pin(stream::iter(vec![
            Ok(ClaudeEvent::Other),
            Ok(ClaudeEvent::TextDelta("Hel".into())),
            Ok(ClaudeEvent::TextDelta("lo".into())),
            Ok(ClaudeEvent::MessageStop),
        ]));
        let events: Vec<_> =
            super::super::normalize_stream(native, ClaudeNormalizer::default(), Box::new(|_| {}))
                .collect()
                .await;
        assert_eq!(
            events,
            vec![
                CanonicalEvent::Token("Hel".into()),
                CanonicalEvent::Token("lo".into()),
                CanonicalEvent::Completed { continuation: None },
            ]
        );
    }

    #[test]
    fn test_request_body_shape() {
        let request = StreamRequest {
            model: "claude-sonnet-4-0".into(),
            system_prompt: "be kind".into(),
            turns: vec![crate::history::Turn::user("q"), crate::history::Turn::assistant("a")],
            tools_enabled: false,
            continuation: None,
        };
        let body = HttpClaudeClient::messages_body(&request);
        assert_eq!(body["system"], "be kind");
        assert_eq!(body["max_tokens"], 4096);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");
    }
}

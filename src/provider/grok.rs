//! Grok family: xAI chat-completions streaming.
//!
//! Chunked OpenAI-compatible shape: text rides in
//! `choices[0].delta.content`, and the stream simply ends when the turn is
//! done, so completion comes from exhaustion rather than an explicit event.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};

use crate::error::RelayError;
use crate::history::Role;

use super::sse::data_lines;
use super::{CanonicalEvent, NativeStream, Normalizer, Step, StreamRequest};

const API_URL: &str = "https://api.x.ai/v1/chat/completions";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrokEvent {
    Content(String),
    Error(String),
    Other,
}

impl GrokEvent {
    pub fn parse(payload: &str) -> Self {
        let value: Value = match serde_json::from_str(payload) {
            Ok(v) => v,
            Err(_) => return GrokEvent::Other,
        };
        if let Some(message) = value.pointer("/error/message").and_then(Value::as_str) {
            return GrokEvent::Error(message.to_string());
        }
        match value.pointer("/choices/0/delta/content").and_then(Value::as_str) {
            Some(content) => GrokEvent::Content(content.to_string()),
            None => GrokEvent::Other,
        }
    }
}

#[derive(Default)]
pub(crate) struct GrokNormalizer {
    terminated: bool,
}

impl Normalizer for GrokNormalizer {
    type Native = GrokEvent;

    fn push(&mut self, native: GrokEvent) -> Step {
        if self.terminated {
            return Step::Skip;
        }
        match native {
            GrokEvent::Content(text) => {
                if text.is_empty() {
                    Step::Skip
                } else {
                    Step::Emit(CanonicalEvent::Token(text))
                }
            }
            GrokEvent::Error(reason) => {
                self.terminated = true;
                Step::Emit(CanonicalEvent::Failed { reason })
            }
            GrokEvent::Other => Step::Skip,
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
pub trait GrokClient: Send + Sync {
    async fn stream_chat(
        &self,
        request: &StreamRequest,
    ) -> Result<NativeStream<GrokEvent>, RelayError>;
}

pub struct HttpGrokClient {
    http: reqwest::Client,
    api_key: String,
}

impl HttpGrokClient {
    pub fn new(api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        HttpGrokClient { http, api_key }
    }

    fn chat_body(request: &StreamRequest) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": request.system_prompt })];
        for turn in &request.turns {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(json!({ "role": role, "content": turn.text }));
        }
        json!({
            "model": request.model,
            "messages": messages,
            "stream": true,
        })
    }
}

#[async_trait]
impl GrokClient for HttpGrokClient {
    async fn stream_chat(
        &self,
        request: &StreamRequest,
    ) -> Result<NativeStream<GrokEvent>, RelayError> {
        let body = Self::chat_body(request);
        let response = self
            .http
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(RelayError::Transport(format!(
                "xai chat completions returned {status}: {detail}"
            )));
        }
        let events = data_lines(response).map(|item| item.map(|payload| GrokEvent::parse(&payload)));
        Ok(Box::pin(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[test]
    fn test_parse_content_chunk() {
        let payload = r#"{"choices":[{"delta":{"content":"Hi"},"index":0}]}"#;
        assert_eq!(GrokEvent::parse(payload), GrokEvent::Content("Hi".into()));
    }

    #[test]
    fn test_parse_role_only_chunk_ignored() {
        let payload = r#"{"choices":[{"delta":{"role":"assistant"},"index":0}]}"#;
        assert_eq!(GrokEvent::parse(payload), GrokEvent::Other);
    }

    #[tokio::test]
    async fn test_completion_comes_from_exhaustion() {
        let native: NativeStream<GrokEvent> = Box::pin(stream::iter(vec![
            Ok(GrokEvent::Content("Hel".into())),
            Ok(GrokEvent::Content("lo".into())),
        ]));
        let events: Vec<_> =
            super::super::normalize_stream(native, GrokNormalizer::default(), Box::new(|_| {}))
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
    fn test_chat_body_includes_system_and_turns() {
        let request = StreamRequest {
            model: "grok-4".into(),
            system_prompt: "sys".into(),
            turns: vec![crate::history::Turn::user("q")],
            tools_enabled: false,
            continuation: None,
        };
        let body = HttpGrokClient::chat_body(&request);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(body["stream"], true);
    }
}

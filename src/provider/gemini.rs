//! Gemini family: single-shot generation replayed as a canonical stream.
//!
//! Gemini has no incremental context here, so history is flattened into one
//! prompt per call. The response arrives whole; `replay` turns the first
//! candidate's parts into a token sequence so downstream code sees the same
//! shape as the truly streaming families.

use async_trait::async_trait;
use futures_util::stream;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::RelayError;

use super::{CanonicalEvent, CanonicalStream, Completion, StreamRequest};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

// =============================================================================
// Response shape
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Content,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

impl GeminiResponse {
    /// Text of the first candidate, parts concatenated.
    pub fn first_text(&self) -> String {
        self.candidates
            .first()
            .map(|c| c.content.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Replay a whole response as a canonical stream: one token per non-empty
/// part of the first candidate, then completion.
pub(crate) fn replay(response: GeminiResponse) -> CanonicalStream {
    let mut events: Vec<CanonicalEvent> = response
        .candidates
        .into_iter()
        .next()
        .map(|c| c.content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter(|part| !part.text.is_empty())
        .map(|part| CanonicalEvent::Token(part.text))
        .collect();
    events.push(CanonicalEvent::Completed { continuation: None });
    Box::pin(stream::iter(events))
}

// =============================================================================
// Client
// =============================================================================

#[async_trait]
pub trait GeminiClient: Send + Sync {
    async fn generate(&self, request: &StreamRequest) -> Result<GeminiResponse, RelayError>;
}

pub struct HttpGeminiClient {
    http: reqwest::Client,
    api_key: String,
}

impl HttpGeminiClient {
    pub fn new(api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        HttpGeminiClient { http, api_key }
    }

    fn generate_body(request: &StreamRequest) -> Value {
        let mut body = json!({
            "contents": [{ "parts": [{ "text": request.flattened_prompt() }] }],
        });
        if request.tools_enabled {
            body["tools"] = json!([
                { "google_search": {} },
                { "url_context": {} },
                { "code_execution": {} }
            ]);
        }
        body
    }

    async fn call(&self, model: &str, body: &Value) -> Result<GeminiResponse, RelayError> {
        let url = format!("{API_BASE}/models/{model}:generateContent?key={}", self.api_key);
        let response = self.http.post(url).json(body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(RelayError::Transport(format!(
                "gemini generateContent returned {status}: {detail}"
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl GeminiClient for HttpGeminiClient {
    async fn generate(&self, request: &StreamRequest) -> Result<GeminiResponse, RelayError> {
        let body = Self::generate_body(request);
        self.call(&request.model, &body).await
    }
}

#[async_trait]
impl Completion for HttpGeminiClient {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, RelayError> {
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let response = self.call(model, &body).await?;
        let text = response.first_text();
        if text.is_empty() {
            return Err(RelayError::EmptyResult("gemini completion had no text".into()));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn response_of(parts: &[&str]) -> GeminiResponse {
        GeminiResponse {
            candidates: vec![Candidate {
                content: Content {
                    parts: parts.iter().map(|t| Part { text: t.to_string() }).collect(),
                },
            }],
        }
    }

    #[tokio::test]
    async fn test_replay_tokens_then_completion() {
        let events: Vec<_> = replay(response_of(&["Hel", "", "lo"])).collect().await;
        assert_eq!(
            events,
            vec![
                CanonicalEvent::Token("Hel".into()),
                CanonicalEvent::Token("lo".into()),
                CanonicalEvent::Completed { continuation: None },
            ]
        );
    }

    #[tokio::test]
    async fn test_replay_empty_response_still_completes() {
        let events: Vec<_> = replay(GeminiResponse::default()).collect().await;
        assert_eq!(events, vec![CanonicalEvent::Completed { continuation: None }]);
    }

    #[test]
    fn test_response_deserializes_with_missing_fields() {
        let parsed: GeminiResponse = serde_json::from_str(r#"{"candidates":[{}]}"#).unwrap();
        assert_eq!(parsed.first_text(), "");
        let parsed: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candidates.is_empty());
    }

    #[test]
    fn test_body_includes_tools_when_enabled() {
        let request = StreamRequest {
            model: "gemini-2.5-flash".into(),
            system_prompt: "sys".into(),
            turns: vec![crate::history::Turn::user("hi")],
            tools_enabled: true,
            continuation: None,
        };
        let body = HttpGeminiClient::generate_body(&request);
        assert_eq!(body["tools"].as_array().unwrap().len(), 3);
        let text = body.pointer("/contents/0/parts/0/text").unwrap().as_str().unwrap();
        assert!(text.starts_with("System: sys"));
    }
}

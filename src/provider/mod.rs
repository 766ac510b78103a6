//! Provider stream adapters.
//!
//! Each provider family speaks a structurally different streaming protocol;
//! everything downstream (UI sink, history appender) observes only the
//! canonical `Token` / `Completed` / `Failed` sequence produced here.
//! Provider-native event shapes must never leak past this module.

pub mod claude;
pub mod gemini;
pub mod grok;
pub mod openai;
pub(crate) mod sse;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{stream, Stream, StreamExt};

use crate::config::{ApiKeys, ModelFamily};
use crate::error::RelayError;
use crate::history::Turn;

/// A stream of provider-native events. `Err` items are transport failures
/// and are mapped to a terminal `Failed` by the normalization driver.
pub type NativeStream<T> = Pin<Box<dyn Stream<Item = Result<T, RelayError>> + Send>>;

/// The adapter output every consumer iterates.
pub type CanonicalStream = Pin<Box<dyn Stream<Item = CanonicalEvent> + Send>>;

/// Callback for transient status text (tool-call progress and the like).
/// Status never appears as token content.
pub type StatusFn = Box<dyn FnMut(String) + Send>;

// =============================================================================
// Canonical events
// =============================================================================

/// Adapter-normalized stream event. Exactly one terminal (`Completed` or
/// `Failed`) is produced per stream, and nothing follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalEvent {
    Token(String),
    Completed {
        /// Provider-issued identifier for resuming context on the next turn.
        /// Only the OpenAI family produces one.
        continuation: Option<String>,
    },
    Failed {
        reason: String,
    },
}

impl CanonicalEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CanonicalEvent::Token(_))
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Everything an adapter needs to open a stream. History arrives already
/// filtered to user/assistant turns.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub model: String,
    pub system_prompt: String,
    pub turns: Vec<Turn>,
    pub tools_enabled: bool,
    /// Continuation token from the prior turn (OpenAI family only).
    pub continuation: Option<String>,
}

impl StreamRequest {
    /// Most recent user turn; what continuation-based providers send as the
    /// incremental input.
    pub fn latest_user_text(&self) -> &str {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == crate::history::Role::User)
            .map(|t| t.text.as_str())
            .unwrap_or("")
    }

    /// History flattened to a single prompt: system line first, then each
    /// turn's text in order. Used by the Gemini family, which has no
    /// incremental context.
    pub fn flattened_prompt(&self) -> String {
        let mut parts = Vec::with_capacity(self.turns.len() + 1);
        if !self.system_prompt.is_empty() {
            parts.push(format!("System: {}", self.system_prompt));
        }
        parts.extend(self.turns.iter().map(|t| t.text.clone()));
        parts.join("\n")
    }
}

// =============================================================================
// Normalization
// =============================================================================

/// One step of native-to-canonical translation.
pub(crate) enum Step {
    Emit(CanonicalEvent),
    /// Transient status text, forwarded out-of-band.
    Status(String),
    /// Native event with no canonical counterpart; discarded silently.
    Skip,
}

/// Per-family translation state machine. Implementations own the
/// single-terminal invariant: after emitting a terminal event, every further
/// `push` returns `Skip` and `finish` returns `None`.
pub(crate) trait Normalizer: Send + 'static {
    type Native: Send;

    fn push(&mut self, native: Self::Native) -> Step;

    /// Called once when the native stream is exhausted without an explicit
    /// terminal. Returning `Some` closes the stream with that event.
    fn finish(&mut self) -> Option<CanonicalEvent>;
}

struct DriverState<N: Normalizer> {
    native: NativeStream<N::Native>,
    normalizer: N,
    status: StatusFn,
    done: bool,
}

/// Drive a native stream through a normalizer, producing the canonical
/// stream. Stops polling the native source the moment a terminal event is
/// emitted, so nothing can follow a `Completed` or `Failed`.
pub(crate) fn normalize_stream<N>(
    native: NativeStream<N::Native>,
    normalizer: N,
    status: StatusFn,
) -> CanonicalStream
where
    N: Normalizer,
{
    let state = DriverState { native, normalizer, status, done: false };
    Box::pin(stream::unfold(state, |mut st| async move {
        if st.done {
            return None;
        }
        loop {
            match st.native.next().await {
                Some(Ok(event)) => match st.normalizer.push(event) {
                    Step::Emit(out) => {
                        st.done = out.is_terminal();
                        return Some((out, st));
                    }
                    Step::Status(text) => (st.status)(text),
                    Step::Skip => {}
                },
                Some(Err(e)) => {
                    st.done = true;
                    return Some((CanonicalEvent::Failed { reason: e.to_string() }, st));
                }
                None => {
                    st.done = true;
                    let closing = st.normalizer.finish();
                    return closing.map(|out| (out, st));
                }
            }
        }
    }))
}

/// A stream that fails immediately. Used when the provider call cannot even
/// be opened, so callers handle setup and mid-stream failures identically.
pub(crate) fn failed_stream(error: RelayError) -> CanonicalStream {
    Box::pin(stream::iter([CanonicalEvent::Failed { reason: error.to_string() }]))
}

// =============================================================================
// Text completion (non-streaming collaborator surface)
// =============================================================================

/// One-shot text completion. Backed by any provider that can complete text;
/// consumed by the slide and geocoding workflows.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, RelayError>;
}

// =============================================================================
// Client registry and the single dispatch point
// =============================================================================

/// Per-family provider clients. `None` means the credential is absent and
/// the family is unavailable. Shared read-only across a session.
pub struct ProviderClients {
    pub openai: Option<Arc<dyn openai::OpenAiClient>>,
    pub gemini: Option<Arc<dyn gemini::GeminiClient>>,
    pub claude: Option<Arc<dyn claude::ClaudeClient>>,
    pub grok: Option<Arc<dyn grok::GrokClient>>,
    /// Text-completion views of the same clients, for workflows that only
    /// need `Completion`.
    pub openai_text: Option<Arc<dyn Completion>>,
    pub gemini_text: Option<Arc<dyn Completion>>,
}

impl ProviderClients {
    /// No clients at all. Starting point for tests and custom wiring.
    pub fn empty() -> Self {
        ProviderClients {
            openai: None,
            gemini: None,
            claude: None,
            grok: None,
            openai_text: None,
            gemini_text: None,
        }
    }

    /// Build HTTP clients for every family whose API key is present.
    pub fn from_env(keys: &ApiKeys) -> Self {
        let mut clients = ProviderClients::empty();
        if let Some(key) = &keys.openai {
            let client = Arc::new(openai::HttpOpenAiClient::new(key.clone()));
            clients.openai = Some(client.clone());
            clients.openai_text = Some(client);
        }
        if let Some(key) = &keys.google {
            let client = Arc::new(gemini::HttpGeminiClient::new(key.clone()));
            clients.gemini = Some(client.clone());
            clients.gemini_text = Some(client);
        }
        if let Some(key) = &keys.anthropic {
            clients.claude = Some(Arc::new(claude::HttpClaudeClient::new(key.clone())));
        }
        if let Some(key) = &keys.xai {
            clients.grok = Some(Arc::new(grok::HttpGrokClient::new(key.clone())));
        }
        clients
    }

    pub fn has(&self, family: ModelFamily) -> bool {
        match family {
            ModelFamily::OpenAi => self.openai.is_some(),
            ModelFamily::Gemini => self.gemini.is_some(),
            ModelFamily::Claude => self.claude.is_some(),
            ModelFamily::Grok => self.grok.is_some(),
        }
    }

    /// Fail with `MissingCredential` when the family has no client.
    pub fn require(&self, family: ModelFamily) -> Result<(), RelayError> {
        if self.has(family) {
            Ok(())
        } else {
            Err(RelayError::MissingCredential(family.key_env().to_string()))
        }
    }

    /// The single dispatch point: open a canonical stream for the given
    /// family. Transport problems surface inside the stream as `Failed`, so
    /// the only error here is a missing credential.
    pub async fn open_stream(
        &self,
        family: ModelFamily,
        request: &StreamRequest,
        status: StatusFn,
    ) -> Result<CanonicalStream, RelayError> {
        let missing = || RelayError::MissingCredential(family.key_env().to_string());
        tracing::debug!(family = family.as_str(), model = %request.model, "opening provider stream");
        let stream = match family {
            ModelFamily::OpenAi => {
                let client = self.openai.as_ref().ok_or_else(missing)?;
                match client.stream_response(request).await {
                    Ok(native) => normalize_stream(native, openai::OpenAiNormalizer::default(), status),
                    Err(e) => failed_stream(e),
                }
            }
            ModelFamily::Gemini => {
                let client = self.gemini.as_ref().ok_or_else(missing)?;
                match client.generate(request).await {
                    Ok(response) => gemini::replay(response),
                    Err(e) => failed_stream(e),
                }
            }
            ModelFamily::Claude => {
                let client = self.claude.as_ref().ok_or_else(missing)?;
                match client.stream_messages(request).await {
                    Ok(native) => normalize_stream(native, claude::ClaudeNormalizer::default(), status),
                    Err(e) => failed_stream(e),
                }
            }
            ModelFamily::Grok => {
                let client = self.grok.as_ref().ok_or_else(missing)?;
                match client.stream_chat(request).await {
                    Ok(native) => normalize_stream(native, grok::GrokNormalizer::default(), status),
                    Err(e) => failed_stream(e),
                }
            }
        };
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    struct PassThrough {
        terminated: bool,
    }

    impl Normalizer for PassThrough {
        type Native = CanonicalEvent;

        fn push(&mut self, native: CanonicalEvent) -> Step {
            if self.terminated {
                return Step::Skip;
            }
            self.terminated = native.is_terminal();
            Step::Emit(native)
        }

        fn finish(&mut self) -> Option<CanonicalEvent> {
            if self.terminated {
                None
            } else {
                self.terminated = true;
                Some(CanonicalEvent::Completed { continuation: None })
            }
        }
    }

    fn native_of(events: Vec<Result<CanonicalEvent, RelayError>>) -> NativeStream<CanonicalEvent> {
        Box::pin(stream::iter(events))
    }

    async fn collect(stream: CanonicalStream) -> Vec<CanonicalEvent> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_driver_stops_after_terminal() {
        let native = native_of(vec![
            Ok(CanonicalEvent::Token("a".into())),
            Ok(CanonicalEvent::Completed { continuation: None }),
            Ok(CanonicalEvent::Token("never seen".into())),
        ]);
        let events = collect(normalize_stream(native, PassThrough { terminated: false }, Box::new(|_| {}))).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], CanonicalEvent::Token("a".into()));
        assert!(events[1].is_terminal());
    }

    #[tokio::test]
    async fn test_transport_error_becomes_failed_terminal() {
        let native = native_of(vec![
            Ok(CanonicalEvent::Token("a".into())),
            Err(RelayError::Transport("connection reset".into())),
            Ok(CanonicalEvent::Token("never seen".into())),
        ]);
        let events = collect(normalize_stream(native, PassThrough { terminated: false }, Box::new(|_| {}))).await;
        assert_eq!(events.len(), 2);
        match &events[1] {
            CanonicalEvent::Failed { reason } => assert!(reason.contains("connection reset")),
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exhaustion_closes_with_finish() {
        let native = native_of(vec![Ok(CanonicalEvent::Token("a".into()))]);
        let events = collect(normalize_stream(native, PassThrough { terminated: false }, Box::new(|_| {}))).await;
        assert_eq!(
            events,
            vec![
                CanonicalEvent::Token("a".into()),
                CanonicalEvent::Completed { continuation: None },
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_credential_from_dispatch() {
        let clients = ProviderClients::empty();
        let request = StreamRequest {
            model: "gpt-4o-mini".into(),
            system_prompt: String::new(),
            turns: vec![],
            tools_enabled: false,
            continuation: None,
        };
        // The Ok side is a boxed stream without Debug, so take the error out
        // by hand rather than through unwrap_err.
        let err = clients
            .open_stream(ModelFamily::OpenAi, &request, Box::new(|_| {}))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), "missing_credential");
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_flattened_prompt_order() {
        let request = StreamRequest {
            model: "m".into(),
            system_prompt: "be brief".into(),
            turns: vec![Turn::user("q1"), Turn::assistant("a1"), Turn::user("q2")],
            tools_enabled: false,
            continuation: None,
        };
        assert_eq!(request.flattened_prompt(), "System: be brief\nq1\na1\nq2");
        assert_eq!(request.latest_user_text(), "q2");
    }
}

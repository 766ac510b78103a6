//! Session orchestration: one conversation, one provider turn at a time.
//!
//! `run_turn` owns the invariants around history: the user turn is appended
//! only after the provider family is known to be reachable, and it is rolled
//! back whenever the turn fails, so a retry never sends a dangling user
//! message twice.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{render_system_prompt, Settings};
use crate::error::RelayError;
use crate::extract::extract_html;
use crate::history::{History, TranscriptMessage, Turn};
use crate::provider::{CanonicalEvent, ProviderClients, StreamRequest};
use crate::ui::{workbench_panel, wrap_fragment_if_needed, PanelKind, UiSink};

use futures_util::StreamExt;

pub struct SessionContext {
    pub settings: Settings,
    pub history: History,
    /// Provider continuation token from the last completed turn, when the
    /// active family supports one.
    continuation: Option<String>,
    panel_versions: HashMap<PanelKind, u64>,
    clients: Arc<ProviderClients>,
}

impl SessionContext {
    pub fn new(settings: Settings, clients: Arc<ProviderClients>) -> Self {
        SessionContext {
            settings,
            history: History::default(),
            continuation: None,
            panel_versions: HashMap::new(),
            clients,
        }
    }

    pub fn clients(&self) -> &Arc<ProviderClients> {
        &self.clients
    }

    /// Apply new settings mid-conversation. Switching models invalidates the
    /// continuation token, which is scoped to the model that issued it.
    pub fn apply_settings(&mut self, settings: Settings) {
        if settings.model.id != self.settings.model.id {
            self.continuation = None;
        }
        self.settings = settings;
    }

    /// Rehydrate history from a persisted transcript. Continuation tokens do
    /// not survive resumption.
    pub fn resume(&mut self, transcript: &[TranscriptMessage]) {
        self.history = History::from_transcript(transcript);
        self.continuation = None;
        tracing::info!(turns = self.history.len(), "session resumed from transcript");
    }

    /// Next version for a panel kind. Versions are per-kind and start at 1.
    pub fn next_panel_version(&mut self, kind: PanelKind) -> u64 {
        let version = self.panel_versions.entry(kind).or_insert(0);
        *version += 1;
        *version
    }

    fn build_request(&self) -> StreamRequest {
        let family = self.settings.model.family;
        StreamRequest {
            model: self.settings.model.id.to_string(),
            system_prompt: render_system_prompt(&self.settings.system_prompt),
            turns: self.history.snapshot_for_request(),
            tools_enabled: self.settings.tools_enabled,
            continuation: if family.supports_continuation() {
                self.continuation.clone()
            } else {
                None
            },
        }
    }

    /// Run one chat turn: append the user message, stream the reply through
    /// the sink, and append the assistant reply on success. Returns the full
    /// assistant text.
    pub async fn run_turn(
        &mut self,
        text: &str,
        sink: &Arc<dyn UiSink>,
    ) -> Result<String, RelayError> {
        let family = self.settings.model.family;
        if let Err(e) = self.clients.require(family) {
            // History untouched: nothing was sent.
            sink.notify(&format!("Error: {e}"));
            return Err(e);
        }

        self.history.append(Turn::user(text));
        let request = self.build_request();

        let status_sink = Arc::clone(sink);
        let status = Box::new(move |text: String| status_sink.set_status(&text));

        let mut stream = match self.clients.open_stream(family, &request, status).await {
            Ok(stream) => stream,
            Err(e) => {
                self.history.rollback_last_if_user();
                sink.notify(&format!("Error: {e}"));
                return Err(e);
            }
        };

        let mut assistant_text = String::new();
        while let Some(event) = stream.next().await {
            match event {
                CanonicalEvent::Token(token) => {
                    assistant_text.push_str(&token);
                    sink.push_token(&token);
                }
                CanonicalEvent::Completed { continuation } => {
                    if family.supports_continuation() {
                        self.continuation = continuation;
                    }
                    sink.set_status("");
                    sink.finalize();
                    if !assistant_text.trim().is_empty() {
                        self.history.append(Turn::assistant(assistant_text.clone()));
                    }
                    self.auto_render_markup(&assistant_text, sink);
                    tracing::debug!(
                        family = family.as_str(),
                        chars = assistant_text.len(),
                        "turn completed"
                    );
                    return Ok(assistant_text);
                }
                CanonicalEvent::Failed { reason } => {
                    sink.set_status("");
                    self.history.rollback_last_if_user();
                    sink.notify(&format!("Error: {reason}"));
                    return Err(RelayError::Transport(reason));
                }
            }
        }

        // The adapters always close with a terminal event; reaching here
        // means a driver bug, not a provider failure.
        self.history.rollback_last_if_user();
        Err(RelayError::Internal("stream ended without a terminal event".into()))
    }

    /// Families that habitually answer with full documents get their markup
    /// previewed without an explicit command.
    fn auto_render_markup(&mut self, reply: &str, sink: &Arc<dyn UiSink>) {
        if !self.settings.model.family.auto_extracts_html() {
            return;
        }
        if let Some(extraction) = extract_html(reply) {
            let version = self.next_panel_version(PanelKind::CodeWorkbench);
            let code = wrap_fragment_if_needed(&extraction.payload);
            sink.render_panel(workbench_panel(Some(&code), "Workbench", version));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{model_by_label, ApiKeys};
    use crate::history::Role;
    use crate::provider::openai::{OpenAiClient, OpenAiEvent};
    use crate::provider::NativeStream;
    use crate::ui::Panel;
    use async_trait::async_trait;
    use futures_util::stream;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        tokens: Mutex<Vec<String>>,
        statuses: Mutex<Vec<String>>,
        panels: Mutex<Vec<Panel>>,
        notices: Mutex<Vec<String>>,
        finalized: Mutex<u32>,
    }

    impl UiSink for RecordingSink {
        fn push_token(&self, token: &str) {
            self.tokens.lock().unwrap().push(token.to_string());
        }
        fn finalize(&self) {
            *self.finalized.lock().unwrap() += 1;
        }
        fn set_status(&self, text: &str) {
            self.statuses.lock().unwrap().push(text.to_string());
        }
        fn render_panel(&self, panel: Panel) {
            self.panels.lock().unwrap().push(panel);
        }
        fn render_image(&self, _caption: &str, _bytes: Vec<u8>) {}
        fn notify(&self, text: &str) {
            self.notices.lock().unwrap().push(text.to_string());
        }
    }

    struct ScriptedOpenAi {
        events: Vec<OpenAiEvent>,
    }

    #[async_trait]
    impl OpenAiClient for ScriptedOpenAi {
        async fn stream_response(
            &self,
            _request: &StreamRequest,
        ) -> Result<NativeStream<OpenAiEvent>, RelayError> {
            let events: Vec<Result<OpenAiEvent, RelayError>> =
                self.events.iter().cloned().map(Ok).collect();
            Ok(Box::pin(stream::iter(events)))
        }

        async fn complete(&self, _model: &str, _prompt: &str) -> Result<String, RelayError> {
            Ok(String::new())
        }

        async fn generate_image(&self, _prompt: &str) -> Result<Vec<u8>, RelayError> {
            Ok(vec![])
        }
    }

    fn session_with(events: Vec<OpenAiEvent>) -> SessionContext {
        let mut clients = ProviderClients::empty();
        clients.openai = Some(Arc::new(ScriptedOpenAi { events }));
        let settings = Settings {
            model: *model_by_label("GPT-4o-mini").unwrap(),
            ..Settings::default()
        };
        SessionContext::new(settings, Arc::new(clients))
    }

    fn sink() -> Arc<dyn UiSink> {
        Arc::new(RecordingSink::default()) as Arc<dyn UiSink>
    }

    #[tokio::test]
    async fn test_successful_turn_appends_both_sides() {
        let mut session = session_with(vec![
            OpenAiEvent::OutputTextDelta("Hel".into()),
            OpenAiEvent::OutputTextDelta("lo".into()),
            OpenAiEvent::Completed { response_id: Some("r1".into()) },
        ]);
        let sink = Arc::new(RecordingSink::default());
        let dyn_sink: Arc<dyn UiSink> = sink.clone();

        let reply = session.run_turn("hi", &dyn_sink).await.unwrap();
        assert_eq!(reply, "Hello");
        assert_eq!(session.history.len(), 2);
        let turns = session.history.turns();
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].text, "Hello");
        assert_eq!(*sink.finalized.lock().unwrap(), 1);
        assert_eq!(sink.tokens.lock().unwrap().join(""), "Hello");

        // The continuation token flows into the next request.
        let next = session.build_request();
        assert_eq!(next.continuation.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_failed_turn_rolls_back_user_message() {
        let mut session = session_with(vec![
            OpenAiEvent::OutputTextDelta("par".into()),
            OpenAiEvent::Error("rate limited".into()),
        ]);
        let sink = Arc::new(RecordingSink::default());
        let dyn_sink: Arc<dyn UiSink> = sink.clone();

        let err = session.run_turn("hi", &dyn_sink).await.unwrap_err();
        assert_eq!(err.kind(), "transport");
        assert!(session.history.is_empty());
        let notices = sink.notices.lock().unwrap();
        assert!(notices[0].contains("rate limited"));
    }

    #[tokio::test]
    async fn test_missing_credential_leaves_history_untouched() {
        let settings = Settings {
            model: *model_by_label("GPT-4o-mini").unwrap(),
            ..Settings::default()
        };
        let mut session =
            SessionContext::new(settings, Arc::new(ProviderClients::from_env(&ApiKeys::default())));
        let sink = Arc::new(RecordingSink::default());
        let dyn_sink: Arc<dyn UiSink> = sink.clone();

        let err = session.run_turn("hi", &dyn_sink).await.unwrap_err();
        assert_eq!(err.kind(), "missing_credential");
        assert!(session.history.is_empty());
        assert!(sink.notices.lock().unwrap()[0].contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn test_tool_progress_surfaces_as_status_then_clears() {
        let mut session = session_with(vec![
            OpenAiEvent::ToolCallDelta(Some("web_search".into())),
            OpenAiEvent::OutputTextDelta("done".into()),
            OpenAiEvent::Completed { response_id: None },
        ]);
        let sink = Arc::new(RecordingSink::default());
        let dyn_sink: Arc<dyn UiSink> = sink.clone();

        session.run_turn("hi", &dyn_sink).await.unwrap();
        let statuses = sink.statuses.lock().unwrap();
        assert_eq!(statuses.first().map(String::as_str), Some("Running tool: web_search"));
        assert_eq!(statuses.last().map(String::as_str), Some(""));
        // Status text never leaked into tokens.
        assert_eq!(sink.tokens.lock().unwrap().join(""), "done");
    }

    #[tokio::test]
    async fn test_empty_reply_not_appended() {
        let mut session = session_with(vec![OpenAiEvent::Completed { response_id: None }]);
        session.run_turn("hi", &sink()).await.unwrap();
        // Only the user turn remains.
        assert_eq!(session.history.len(), 1);
    }

    #[test]
    fn test_model_switch_drops_continuation() {
        let mut session = session_with(vec![]);
        session.continuation = Some("r1".into());

        let same = session.settings.clone();
        session.apply_settings(same);
        assert!(session.continuation.is_some());

        let switched = Settings {
            model: *model_by_label("Claude Sonnet 4").unwrap(),
            ..session.settings.clone()
        };
        session.apply_settings(switched);
        assert!(session.continuation.is_none());
    }

    #[test]
    fn test_panel_versions_are_per_kind() {
        let mut session = session_with(vec![]);
        assert_eq!(session.next_panel_version(PanelKind::CodeWorkbench), 1);
        assert_eq!(session.next_panel_version(PanelKind::CodeWorkbench), 2);
        assert_eq!(session.next_panel_version(PanelKind::SlidePreview), 1);
    }
}

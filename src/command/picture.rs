//! Picture command: one-shot image generation from a text prompt.

use std::sync::Arc;

use crate::error::RelayError;
use crate::session::SessionContext;
use crate::ui::UiSink;

pub async fn run(
    session: &mut SessionContext,
    sink: &Arc<dyn UiSink>,
    prompt: &str,
) -> Result<(), RelayError> {
    let Some(client) = session.clients().openai.clone() else {
        let err = RelayError::MissingCredential("OPENAI_API_KEY".into());
        sink.notify(&format!("Error: {err}"));
        return Err(err);
    };

    sink.set_status("Generating image...");
    let result = client.generate_image(prompt).await;
    sink.set_status("");

    match result {
        Ok(bytes) if bytes.is_empty() => {
            let err = RelayError::EmptyResult("image generation returned no data".into());
            sink.notify(&format!("Error: {err}"));
            Err(err)
        }
        Ok(bytes) => {
            tracing::debug!(bytes = bytes.len(), "image generated");
            sink.render_image(&format!("Here's what I generated for \"{prompt}\""), bytes);
            Ok(())
        }
        Err(e) => {
            sink.notify(&format!("Error: {e}"));
            Err(e)
        }
    }
}

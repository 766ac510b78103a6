//! Command dispatch: explicit workflows invoked alongside free-form chat.
//!
//! Commands never mutate conversation history; each renders its result
//! through the sink (image, panel, or notice) and leaves the transcript
//! exactly as it found it.

pub mod map;
pub mod picture;
pub mod slides;
pub mod workbench;

use std::sync::Arc;

use crate::error::RelayError;
use crate::session::SessionContext;
use crate::ui::UiSink;

/// The closed set of invocable commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Picture,
    Code,
    Slide,
    Map,
}

impl Command {
    /// Parse the wire id attached to an incoming message.
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "Picture" => Some(Command::Picture),
            "Code" => Some(Command::Code),
            "slide" => Some(Command::Slide),
            "Map" => Some(Command::Map),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Command::Picture => "Picture",
            Command::Code => "Code",
            Command::Slide => "slide",
            Command::Map => "Map",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Command::Picture => "Picture",
            Command::Code => "Code",
            Command::Slide => "Slide",
            Command::Map => "Map",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Command::Picture => "image",
            Command::Code => "code",
            Command::Slide => "presentation",
            Command::Map => "map",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Command::Picture => "Use gpt4.1-mini to generate an image",
            Command::Code => "Open the coding workbench (editor/preview)",
            Command::Slide => "Generate a slide presentation from text",
            Command::Map => "Resolve a location to map coordinates",
        }
    }

    /// All commands, in menu order.
    pub fn all() -> &'static [Command] {
        &[Command::Picture, Command::Code, Command::Slide, Command::Map]
    }
}

/// Route one command invocation. `text` is whatever the user typed after
/// selecting the command.
pub async fn dispatch(
    session: &mut SessionContext,
    sink: &Arc<dyn UiSink>,
    command: Command,
    text: &str,
) -> Result<(), RelayError> {
    tracing::info!(command = command.id(), "dispatching command");
    match command {
        Command::Picture => picture::run(session, sink, text).await,
        Command::Code => workbench::run(session, sink, text),
        Command::Slide => slides::run(session, sink, text).await,
        Command::Map => map::run(session, sink, text).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip() {
        for &command in Command::all() {
            assert_eq!(Command::from_id(command.id()), Some(command));
        }
        assert_eq!(Command::from_id("Slide"), None);
        assert_eq!(Command::from_id(""), None);
    }

    #[test]
    fn test_slide_wire_id_is_lowercase() {
        assert_eq!(Command::Slide.id(), "slide");
        assert_eq!(Command::Slide.label(), "Slide");
    }
}

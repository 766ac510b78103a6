//! Multi-provider chat relay core.
//!
//! Normalizes four provider streaming protocols into one canonical event
//! stream, recovers structured content (HTML, JSON decks, code) from
//! free-form model output, and drives the command workflows (picture, code
//! workbench, slides, map) on top of a headless session.

pub mod command;
pub mod config;
pub mod error;
pub mod extract;
pub mod history;
pub mod logging;
pub mod provider;
pub mod session;
pub mod ui;

pub use error::RelayError;

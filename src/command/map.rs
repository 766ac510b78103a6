//! Map command: resolve free-form location text to coordinates.
//!
//! Literal "lat, lng" input is parsed directly; anything else goes through
//! an LLM geocoding chain (primary then fallback completion backend), whose
//! replies get the same defensive JSON recovery as every other structured
//! output.

use std::sync::Arc;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::error::RelayError;
use crate::provider::Completion;
use crate::session::SessionContext;
use crate::ui::UiSink;

const GEOCODE_MODEL_OPENAI: &str = "gpt-4o-mini";
const GEOCODE_MODEL_GEMINI: &str = "gemini-2.5-flash";

const GEOCODE_PROMPT_TEMPLATE: &str = r#"Resolve the following place description to WGS84 coordinates.
Reply with a single JSON object only, no prose and no code fences:
{"lat": <latitude as a number>, "lng": <longitude as a number>}

Place description:
{place}"#;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    /// Reject values outside the WGS84 envelope.
    fn validated(lat: f64, lng: f64) -> Option<Self> {
        if lat.abs() <= 90.0 && lng.abs() <= 180.0 {
            Some(Coordinates { lat, lng })
        } else {
            None
        }
    }
}

/// The whole input is a bare coordinate pair.
fn strict_pair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*$")
            .expect("valid strict pair pattern")
    })
}

/// A coordinate pair somewhere inside surrounding text.
fn loose_pair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)").expect("valid loose pair pattern")
    })
}

fn pair_from_captures(caps: &regex::Captures<'_>) -> Option<Coordinates> {
    let lat = caps.get(1)?.as_str().parse().ok()?;
    let lng = caps.get(2)?.as_str().parse().ok()?;
    Coordinates::validated(lat, lng)
}

/// Parse literal coordinate input: the strict whole-string form first, then
/// a pair embedded in text.
pub fn parse_coordinates(text: &str) -> Option<Coordinates> {
    if let Some(caps) = strict_pair_re().captures(text) {
        return pair_from_captures(&caps);
    }
    loose_pair_re()
        .captures_iter(text)
        .find_map(|caps| pair_from_captures(&caps))
}

/// Recover a JSON object from a completion reply: direct parse, then the
/// first-`{` to last-`}` slice.
fn extract_json_object(text: &str) -> Option<Value> {
    let t = text.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str(t) {
        return Some(value);
    }
    let (first, last) = (t.find('{')?, t.rfind('}')?);
    if last <= first {
        return None;
    }
    match serde_json::from_str(&t[first..=last]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

fn coordinates_from_reply(reply: &str) -> Option<Coordinates> {
    let object = extract_json_object(reply)?;
    let lat = object.get("lat").and_then(Value::as_f64)?;
    let lng = object.get("lng").and_then(Value::as_f64)?;
    Coordinates::validated(lat, lng)
}

// =============================================================================
// Geocoding
// =============================================================================

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, place: &str) -> Result<Coordinates, RelayError>;
}

/// Completion-backed geocoder trying each backend in order.
pub struct LlmGeocoder {
    steps: Vec<(Arc<dyn Completion>, &'static str)>,
}

impl LlmGeocoder {
    pub fn from_clients(session: &SessionContext) -> Self {
        let mut steps: Vec<(Arc<dyn Completion>, &'static str)> = Vec::new();
        if let Some(client) = session.clients().openai_text.clone() {
            steps.push((client, GEOCODE_MODEL_OPENAI));
        }
        if let Some(client) = session.clients().gemini_text.clone() {
            steps.push((client, GEOCODE_MODEL_GEMINI));
        }
        LlmGeocoder { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[async_trait]
impl Geocoder for LlmGeocoder {
    async fn geocode(&self, place: &str) -> Result<Coordinates, RelayError> {
        let prompt = GEOCODE_PROMPT_TEMPLATE.replace("{place}", place);
        for (client, model) in &self.steps {
            match client.complete(model, &prompt).await {
                Ok(reply) => {
                    if let Some(coordinates) = coordinates_from_reply(&reply) {
                        return Ok(coordinates);
                    }
                    tracing::debug!(model, "geocode reply carried no usable coordinates");
                }
                Err(e) => {
                    tracing::warn!(model, error = %e, "geocode backend failed, trying next");
                }
            }
        }
        Err(RelayError::Extraction(format!("could not geocode \"{place}\"")))
    }
}

pub async fn run(
    session: &mut SessionContext,
    sink: &Arc<dyn UiSink>,
    text: &str,
) -> Result<(), RelayError> {
    let coordinates = match parse_coordinates(text) {
        Some(coordinates) => coordinates,
        None => {
            let geocoder = LlmGeocoder::from_clients(session);
            if geocoder.is_empty() {
                let err = RelayError::MissingCredential("OPENAI_API_KEY".into());
                sink.notify(&format!("Error: {err}"));
                return Err(err);
            }
            sink.set_status("Resolving location...");
            let result = geocoder.geocode(text).await;
            sink.set_status("");
            match result {
                Ok(coordinates) => coordinates,
                Err(e) => {
                    sink.notify(&format!("Error: {e}"));
                    return Err(e);
                }
            }
        }
    };

    sink.notify(&format!(
        "Location \"{}\": {:.5}, {:.5}",
        text.trim(),
        coordinates.lat,
        coordinates.lng
    ));
    Ok(())
}

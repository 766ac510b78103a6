use serde::Serialize;

/// Crate-wide error type. Every fallible operation returns `Result<T, RelayError>`.
/// Serializes as `{ error, kind }` so the host UI gets structured error messages.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A required provider API key is absent. Reported to the user; history
    /// is never mutated on this path.
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Network or provider-reported failure surfaced through a `Failed`
    /// canonical event.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// An extractor exhausted every fallback step without a match.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Extraction succeeded structurally but the payload is empty
    /// (e.g. a zero-element slide deck). Distinct from `Extraction`.
    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

impl RelayError {
    /// Stable machine-readable tag for each variant.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::MissingCredential(_) => "missing_credential",
            RelayError::Transport(_) => "transport",
            RelayError::Extraction(_) => "extraction",
            RelayError::EmptyResult(_) => "empty_result",
            RelayError::Io(_) => "io",
            RelayError::Serde(_) => "serde",
            RelayError::Internal(_) => "internal",
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        RelayError::Transport(e.to_string())
    }
}

impl Serialize for RelayError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("RelayError", 2)?;
        s.serialize_field("error", &self.to_string())?;
        s.serialize_field("kind", self.kind())?;
        s.end()
    }
}

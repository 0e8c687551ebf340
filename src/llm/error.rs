//! Backend error types.

use thiserror::Error;

/// Errors from the streaming chat backend.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Connection failure or request timeout.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned status {status}: {message}")]
    Api { status: u16, message: String },

    /// A stream line was not valid JSON. Fatal for the stream.
    #[error("malformed stream line: {0}")]
    Decode(#[from] serde_json::Error),

    /// The stream ended before the terminal `done` chunk arrived.
    #[error("stream ended before completion")]
    Truncated,
}

impl From<std::convert::Infallible> for LlmError {
    fn from(e: std::convert::Infallible) -> Self {
        match e {}
    }
}

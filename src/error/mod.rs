//! Error types for Tether.

use thiserror::Error;

/// Primary error type for all Tether operations.
#[derive(Error, Debug)]
pub enum TetherError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Run cancelled")]
    Cancelled,
}

impl TetherError {
    /// Create an API error from a status code and body.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether this error came from the user cancelling the run.
    ///
    /// Cancellation is not a failure: the engine resolves message fate
    /// separately and never surfaces it as an error flag.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Map an HTTP status code to an error.
pub fn status_to_error(status: u16, body: &str) -> TetherError {
    match status {
        401 | 403 => TetherError::api(status, format!("authentication rejected: {body}")),
        _ => TetherError::api(status, body),
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, TetherError>;

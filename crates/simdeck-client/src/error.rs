//! Error types for the engine client.

use thiserror::Error;

/// Result type for engine client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by a single engine request.
#[derive(Debug, Error)]
pub enum Error {
    /// The request never produced a response (connect failure, timeout, ...)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The engine answered with a non-success status
    #[error("Engine returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not valid JSON for the expected schema
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Response decoded but failed ingress validation
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The configured engine address is unusable
    #[error("Invalid engine address: {0}")]
    InvalidAddress(String),
}

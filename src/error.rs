//! Error types for authsock-pin

use thiserror::Error;

/// Main error type for authsock-pin
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Incomplete frame: stream closed mid-message")]
    IncompleteFrame,

    #[error("Truncated message: {0}")]
    Truncated(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Unexpected response from upstream agent: {0}")]
    UnexpectedResponse(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Upstream agent not available: {0}")]
    UpstreamNotAvailable(String),

    #[error("Socket error: {0}")]
    Socket(String),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

//! Top-level error types for Chatline.

use std::sync::Arc;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
///
/// Only configuration errors surface here. Storage and gateway failures are
/// recovered inside the dispatch engine and never reach callers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config from {path}: {source}")]
    Load {
        path: String,
        source: Arc<std::io::Error>,
    },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing required config key: {0}")]
    MissingKey(String),
}

/// Session storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to write session storage at {path}: {source}")]
    Write {
        path: String,
        source: Arc<std::io::Error>,
    },

    #[error("failed to encode session storage: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Reply service exchange errors.
///
/// Every variant is recovered inside the dispatch engine by the contact
/// fallback; none of them reach the presentation layer.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("reply service unreachable: {0}")]
    Transport(String),

    #[error("reply service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("reply service response did not match schema: {0}")]
    Decode(String),

    #[error("reply service did not answer within {0:?}")]
    Timeout(std::time::Duration),
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            GatewayError::Decode(error.to_string())
        } else if error.is_timeout() {
            GatewayError::Transport(format!("timed out: {error}"))
        } else {
            GatewayError::Transport(error.to_string())
        }
    }
}

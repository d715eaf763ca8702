//! Error types for wpp-meta

use thiserror::Error;

/// wpp-meta error type
#[derive(Error, Debug)]
pub enum MetaError {
    #[error("Meta API request failed: {0}")]
    Request(String),

    #[error("Meta API returned a non-JSON body ({status}): {body}")]
    InvalidResponse { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] wpp_core::CoreError),
}

impl From<reqwest::Error> for MetaError {
    fn from(err: reqwest::Error) -> Self {
        MetaError::Request(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, MetaError>;

//! Error types for wpp-core

use thiserror::Error;

/// Main error type for wpp-core
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Missing attribute: {0}")]
    MissingAttribute(String),

    #[error("Secret error: {0}")]
    Secret(String),

    #[error("Key <{key}> not found in secret <{secret}>")]
    SecretKeyNotFound { secret: String, key: String },

    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type alias for wpp-core
pub type Result<T> = std::result::Result<T, CoreError>;

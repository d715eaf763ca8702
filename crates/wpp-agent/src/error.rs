//! Error types for wpp-agent

use thiserror::Error;

/// wpp-agent error type
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Agent runtime request failed: {0}")]
    Request(String),

    #[error("Agent runtime error: {0}")]
    Runtime(String),

    #[error("Malformed agent stream event: {0}")]
    Stream(String),

    #[error("Unknown action group function: {0}")]
    UnknownFunction(String),

    #[error("Missing action group parameter: {0}")]
    MissingParameter(String),

    #[error("Core error: {0}")]
    Core(#[from] wpp_core::CoreError),
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::Request(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AgentError>;

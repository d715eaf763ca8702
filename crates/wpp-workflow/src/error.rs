//! Error types for wpp-workflow

use thiserror::Error;

/// wpp-workflow error type
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),

    #[error("Missing field in event: {0}")]
    MissingField(String),

    #[error("No step registered for {class_name}.{method_name}")]
    UnknownStep {
        class_name: String,
        method_name: String,
    },

    #[error("Message sender returned an error: {0}")]
    SendMessage(String),

    #[error("Execution already exists: {0}")]
    ExecutionAlreadyExists(String),

    #[error("Agent error: {0}")]
    Agent(#[from] wpp_agent::AgentError),

    #[error("Meta API error: {0}")]
    Meta(#[from] wpp_meta::MetaError),

    #[error("Core error: {0}")]
    Core(#[from] wpp_core::CoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkflowError {
    /// Error name recorded on a failed execution
    pub fn error_name(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::MissingField(_) => "MissingFieldError",
            Self::UnknownStep { .. } => "UnknownStepError",
            Self::SendMessage(_) => "SendMessageError",
            Self::ExecutionAlreadyExists(_) => "ExecutionAlreadyExists",
            Self::Agent(_) => "AgentError",
            Self::Meta(_) => "MetaApiError",
            Self::Core(_) => "CoreError",
            Self::Json(_) => "JsonError",
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WorkflowError>;

//! Error types for wpp-webhook

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use wpp_agent::AgentError;
use wpp_core::CoreError;

pub const UNAUTHORIZED_MESSAGE: &str = "Invalid authorization or authentication";

/// wpp-webhook error type
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid authorization or authentication")]
    Unauthorized,

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WebhookError>;

/// Generic API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::Core(CoreError::InvalidItem(_)) => StatusCode::BAD_REQUEST,
            Self::Agent(AgentError::UnknownFunction(_) | AgentError::MissingParameter(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Core(_) | Self::Agent(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

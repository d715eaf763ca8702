//! Route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{action_group, health, receive_message, verify_webhook};
use crate::server::AppState;

/// Prefix of the versioned API
pub const API_PREFIX: &str = "/api/v1";

/// Create the API router
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        // Meta webhook: verification handshake and message delivery
        .route("/webhook", get(verify_webhook).post(receive_message))
        // Agent action-group callback
        .route("/agent/actions", post(action_group));

    Router::new()
        .route("/health", get(health))
        .nest(API_PREFIX, api)
}

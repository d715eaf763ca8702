//! wpp-webhook: inbound HTTP API
//!
//! Receives Meta webhook calls (verification handshake and message
//! delivery), stores each inbound message, and serves the agent's
//! action-group callback.

pub mod error;
pub mod handlers;
pub mod payload;
pub mod routes;
pub mod server;

pub use error::{Result, WebhookError};
pub use server::{app, start_server, AppState};

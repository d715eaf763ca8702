//! wpp-meta: WhatsApp Cloud API sender
//!
//! Builds the send-message payload and posts it to the Graph API
//! `/<phone-number-id>/messages` endpoint.

pub mod api;
pub mod error;
pub mod schemas;

pub use api::{MessageSender, MetaApi};
pub use error::{MetaError, Result};
pub use schemas::PostMessage;

//! HTTP API handlers

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, info_span, Instrument};

use wpp_agent::{ActionGroupEvent, ActionGroupResponse};
use wpp_core::MessageItem;

use crate::error::{Result, WebhookError};
use crate::payload::extract_message;
use crate::server::AppState;

/// Header an upstream caller may use to propagate its correlation id
pub const CORRELATION_ID_HEADER: &str = "correlation-id";

/// Secret key compared against `hub.verify_token`
pub const VERIFY_TOKEN_KEY: &str = "AWS_API_KEY_TOKEN";

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.challenge")]
    pub challenge: String,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReceivedResponse {
    pub message: String,
    pub details: String,
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Current UTC time as stored in `created_at` and the message sort key
fn created_at() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Webhook verification handshake
pub async fn verify_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<VerifyParams>,
) -> Result<impl IntoResponse> {
    let span = info_span!("verify_webhook", correlation_id = %correlation_id(&headers));

    async move {
        info!("Started chatbot handler for verify_webhook");
        debug!("hub.challenge: {}", params.challenge);

        let expected = state.secrets.get_secret_value(VERIFY_TOKEN_KEY).await?;
        if params.verify_token != expected {
            info!("Verify token mismatch");
            return Err(WebhookError::Unauthorized);
        }

        info!("Finished verify_webhook successfully");
        Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/html;charset=UTF-8")],
            params.challenge,
        ))
    }
    .instrument(span)
    .await
}

/// Message delivery: stores the first message of the payload
pub async fn receive_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> Result<Json<ReceivedResponse>> {
    let correlation_id = correlation_id(&headers);
    let span = info_span!("receive_message", correlation_id = %correlation_id);

    async move {
        info!("Started chatbot handler for receive_message");
        debug!("Received body: {}", body);

        let message = extract_message(body, &correlation_id)?;
        let item = MessageItem::new(message, &created_at())?;
        info!("Storing {} message {} from {}", item.message_type, item.whatsapp_id, item.from_number);
        state.messages.put_item(item.to_item()).await?;

        info!("Finished receive_message successfully");
        Ok(Json(ReceivedResponse {
            message: "ok".to_string(),
            details: "Received message".to_string(),
        }))
    }
    .instrument(span)
    .await
}

/// Agent action-group callback
pub async fn action_group(
    State(state): State<AppState>,
    Json(event): Json<ActionGroupEvent>,
) -> Result<Json<ActionGroupResponse>> {
    let response = state.actions.handle(&event).await?;
    Ok(Json(response))
}

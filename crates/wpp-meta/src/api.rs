//! WhatsApp Cloud API client

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as JsonValue;
use tracing::{debug, error, info};

use wpp_core::{MetaConfig, SecretsHelper};

use crate::error::{MetaError, Result};
use crate::schemas::PostMessage;

/// Secret key holding the Graph API bearer token
pub const META_TOKEN_KEY: &str = "META_TOKEN";
/// Secret key holding the sending phone number id
pub const META_PHONE_NUMBER_ID_KEY: &str = "META_FROM_PHONE_NUMBER_ID";

/// Outbound message sender
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send a text message and return the provider's parsed JSON response.
    ///
    /// Provider-level failures come back inside the JSON (an `error` key);
    /// only transport failures are `Err`.
    async fn post_message(
        &self,
        text_message: &str,
        to_phone_number: &str,
        original_message_id: Option<&str>,
    ) -> Result<JsonValue>;
}

/// Graph API client for the WhatsApp Cloud API
#[derive(Clone)]
pub struct MetaApi {
    client: Client,
    api_endpoint: String,
    bearer_token: String,
}

impl MetaApi {
    /// Create a client for a fully built messages endpoint
    pub fn new(api_endpoint: &str, bearer_token: &str) -> Self {
        Self {
            client: Client::new(),
            api_endpoint: api_endpoint.to_string(),
            bearer_token: bearer_token.to_string(),
        }
    }

    /// Load token and phone number id from the chatbot secret
    pub async fn load(config: &MetaConfig, secrets: &SecretsHelper) -> Result<Self> {
        debug!("Loading Meta configurations from secret {}", secrets.secret_name());

        let secret = secrets.get_secret_json().await?;
        let token = secret
            .get(META_TOKEN_KEY)
            .and_then(JsonValue::as_str)
            .ok_or_else(|| MetaError::Config(format!("{} missing from secret", META_TOKEN_KEY)))?;
        let phone_number_id = match secret.get(META_PHONE_NUMBER_ID_KEY) {
            Some(JsonValue::String(s)) => s.clone(),
            Some(JsonValue::Number(n)) => n.to_string(),
            _ => {
                return Err(MetaError::Config(format!(
                    "{} missing from secret",
                    META_PHONE_NUMBER_ID_KEY
                )));
            }
        };

        let endpoint = api_endpoint(config, &format!("{}/messages", phone_number_id));
        Ok(Self::new(&endpoint, token))
    }

    pub fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }
}

/// Join the base endpoint, API version and a path
pub fn api_endpoint(config: &MetaConfig, path: &str) -> String {
    format!(
        "{}/{}/{}",
        config.endpoint.trim_end_matches('/'),
        config.api_version.trim_matches('/'),
        path.trim_start_matches('/')
    )
}

#[async_trait]
impl MessageSender for MetaApi {
    async fn post_message(
        &self,
        text_message: &str,
        to_phone_number: &str,
        original_message_id: Option<&str>,
    ) -> Result<JsonValue> {
        info!("Starting POST request to Meta API: {}", self.api_endpoint);
        debug!("text_message to send: {}", text_message);

        let payload = PostMessage::text(to_phone_number, text_message, original_message_id);

        let response = self
            .client
            .post(&self.api_endpoint)
            .bearer_auth(&self.bearer_token)
            .json(&payload)
            .send()
            .await
            .inspect_err(|e| {
                error!("Unexpected error occurred while executing Meta API request: {}", e)
            })?;

        let status = response.status();
        let body = response.text().await?;
        info!("Response has status_code: {}", status);
        info!("Response data: {}", body);

        serde_json::from_str(&body).map_err(|_| MetaError::InvalidResponse {
            status: status.as_u16(),
            body,
        })
    }
}

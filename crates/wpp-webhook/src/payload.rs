//! Inbound WhatsApp Cloud API webhook payload
//!
//! Only the first message of the first change of the first entry is read:
//! `entry[0].changes[0].value.messages[0]`.

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use wpp_core::{MessageContent, NewMessage};

use crate::error::{Result, WebhookError};

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    pub changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
pub struct Change {
    pub value: ChangeValue,
}

#[derive(Debug, Deserialize)]
pub struct ChangeValue {
    pub messages: Vec<InboundMessage>,
}

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    pub id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub message_type: String,
    /// Type-keyed payload (`text`, `image`, `audio`, ...)
    #[serde(flatten)]
    pub payload: Map<String, JsonValue>,
}

impl WebhookPayload {
    pub fn parse(body: JsonValue) -> Result<Self> {
        serde_json::from_value(body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }

    pub fn first_message(&self) -> Result<&InboundMessage> {
        self.entry
            .first()
            .ok_or_else(|| missing("entry[0]"))?
            .changes
            .first()
            .ok_or_else(|| missing("entry[0].changes[0]"))?
            .value
            .messages
            .first()
            .ok_or_else(|| missing("entry[0].changes[0].value.messages[0]"))
    }
}

fn missing(path: &str) -> WebhookError {
    WebhookError::InvalidPayload(format!("missing {}", path))
}

impl InboundMessage {
    /// Stored type name; voice notes arrive as `audio`
    pub fn stored_type(&self) -> &str {
        match self.message_type.as_str() {
            "audio" => "voice",
            other => other,
        }
    }

    fn payload_object(&self, key: &str) -> Result<&Map<String, JsonValue>> {
        self.payload
            .get(key)
            .and_then(JsonValue::as_object)
            .ok_or_else(|| missing(&format!("message.{}", key)))
    }

    fn required_str<'a>(object: &'a Map<String, JsonValue>, key: &str, path: &str) -> Result<&'a str> {
        object
            .get(key)
            .and_then(JsonValue::as_str)
            .ok_or_else(|| missing(&format!("message.{}.{}", path, key)))
    }

    /// Type-specific content of the message
    pub fn content(&self) -> Result<MessageContent> {
        let optional = |object: &Map<String, JsonValue>, key: &str| {
            object.get(key).and_then(JsonValue::as_str).map(str::to_string)
        };

        match self.message_type.as_str() {
            "text" => {
                let text = self.payload_object("text")?;
                Ok(MessageContent::Text {
                    text: Self::required_str(text, "body", "text")?.to_string(),
                })
            }
            key @ ("image" | "video" | "audio" | "voice") => {
                let media = self.payload_object(key)?;
                Ok(MessageContent::Media {
                    media_id: Self::required_str(media, "id", key)?.to_string(),
                    mime_type: optional(media, "mime_type"),
                    caption: optional(media, "caption"),
                })
            }
            _ => Ok(MessageContent::Empty {}),
        }
    }

    pub fn to_new_message(&self, correlation_id: &str) -> Result<NewMessage> {
        Ok(NewMessage {
            from_number: self.from.clone(),
            whatsapp_id: self.id.clone(),
            whatsapp_timestamp: self.timestamp.clone(),
            message_type: self.stored_type().to_string(),
            correlation_id: Some(correlation_id.to_string()),
            content: self.content()?,
        })
    }
}

/// Extract the message of a webhook body
pub fn extract_message(body: JsonValue, correlation_id: &str) -> Result<NewMessage> {
    let payload = WebhookPayload::parse(body)?;
    payload.first_message()?.to_new_message(correlation_id)
}

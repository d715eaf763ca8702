//! Chat message item

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::models::enums::{prefix, MessageType};
use crate::storage::{require_string_attr, string_attr, AttributeValue, Item, PK, SK};

/// `NUMBER#` followed by a 10 to 13 digit phone number
static NUMBER_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^NUMBER#\d{10,13}$").expect("valid NUMBER# key pattern"));

/// Type-specific payload of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Text body
    Text { text: String },
    /// Image, video or voice reference
    Media {
        media_id: String,
        mime_type: Option<String>,
        caption: Option<String>,
    },
    /// No payload (unsupported message types)
    Empty {},
}

/// Fields extracted from an inbound message, before keys are assigned
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub from_number: String,
    pub whatsapp_id: String,
    pub whatsapp_timestamp: String,
    pub message_type: String,
    pub correlation_id: Option<String>,
    pub content: MessageContent,
}

/// A chat message row
///
/// Keyed by `NUMBER#<phone_number>` / `MESSAGE#<created_at>`. Immutable once
/// written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageItem {
    pub pk: String,
    pub sk: String,
    pub created_at: String,
    pub from_number: String,
    /// Raw type as received; may be outside [`MessageType`]
    pub message_type: String,
    pub whatsapp_id: String,
    pub whatsapp_timestamp: String,
    pub correlation_id: Option<String>,
    pub content: MessageContent,
}

impl MessageItem {
    /// Build a message row created at `created_at`
    pub fn new(message: NewMessage, created_at: &str) -> Result<Self> {
        let item = Self {
            pk: format!("{}{}", prefix::NUMBER, message.from_number),
            sk: format!("{}{}", prefix::MESSAGE, created_at),
            created_at: created_at.to_string(),
            from_number: message.from_number,
            message_type: message.message_type,
            whatsapp_id: message.whatsapp_id,
            whatsapp_timestamp: message.whatsapp_timestamp,
            correlation_id: message.correlation_id,
            content: message.content,
        };
        item.validate()?;
        Ok(item)
    }

    /// Supported type of this message, if any
    pub fn kind(&self) -> Option<MessageType> {
        self.message_type.parse().ok()
    }

    /// Text body for text messages
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text { text } => Some(text),
            _ => None,
        }
    }

    fn validate(&self) -> Result<()> {
        if !NUMBER_KEY.is_match(&self.pk) {
            return Err(CoreError::InvalidItem(format!(
                "PK <{}> does not match {}<10 to 13 digits>",
                self.pk,
                prefix::NUMBER
            )));
        }

        if !self.sk.starts_with(prefix::MESSAGE) {
            return Err(CoreError::InvalidItem(format!(
                "SK <{}> does not start with {}",
                self.sk,
                prefix::MESSAGE
            )));
        }

        Ok(())
    }

    /// Convert to a stored item
    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        item.insert(PK.to_string(), AttributeValue::s(&self.pk));
        item.insert(SK.to_string(), AttributeValue::s(&self.sk));
        item.insert("created_at".to_string(), AttributeValue::s(&self.created_at));
        item.insert("from_number".to_string(), AttributeValue::s(&self.from_number));
        item.insert("type".to_string(), AttributeValue::s(&self.message_type));
        item.insert("whatsapp_id".to_string(), AttributeValue::s(&self.whatsapp_id));
        item.insert(
            "whatsapp_timestamp".to_string(),
            AttributeValue::s(&self.whatsapp_timestamp),
        );
        if let Some(correlation_id) = &self.correlation_id {
            item.insert("correlation_id".to_string(), AttributeValue::s(correlation_id));
        }

        match &self.content {
            MessageContent::Text { text } => {
                item.insert("text".to_string(), AttributeValue::s(text));
            }
            MessageContent::Media {
                media_id,
                mime_type,
                caption,
            } => {
                item.insert("media_id".to_string(), AttributeValue::s(media_id));
                if let Some(mime_type) = mime_type {
                    item.insert("mime_type".to_string(), AttributeValue::s(mime_type));
                }
                if let Some(caption) = caption {
                    item.insert("caption".to_string(), AttributeValue::s(caption));
                }
            }
            MessageContent::Empty {} => {}
        }

        item
    }

    /// Rebuild a message from a stored item
    pub fn from_item(item: &Item) -> Result<Self> {
        let owned = |name: &str| require_string_attr(item, name).map(str::to_string);
        let optional = |name: &str| string_attr(item, name).map(str::to_string);

        let content = if let Some(text) = optional("text") {
            MessageContent::Text { text }
        } else if let Some(media_id) = optional("media_id") {
            MessageContent::Media {
                media_id,
                mime_type: optional("mime_type"),
                caption: optional("caption"),
            }
        } else {
            MessageContent::Empty {}
        };

        let message = Self {
            pk: owned(PK)?,
            sk: owned(SK)?,
            created_at: owned("created_at")?,
            from_number: owned("from_number")?,
            message_type: owned("type")?,
            whatsapp_id: owned("whatsapp_id")?,
            whatsapp_timestamp: owned("whatsapp_timestamp")?,
            correlation_id: optional("correlation_id"),
            content,
        };
        message.validate()?;
        Ok(message)
    }
}

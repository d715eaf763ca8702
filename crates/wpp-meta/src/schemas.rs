//! Request bodies for the WhatsApp Cloud API

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBody {
    pub body: String,
}

/// Reply context pointing at the message being answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContext {
    pub message_id: String,
}

/// Body of a POST to `/<phone-number-id>/messages`
///
/// ```json
/// {
///   "messaging_product": "whatsapp",
///   "to": "to_phone_number",
///   "type": "text",
///   "text": {"body": "text_message"},
///   "context": {"message_id": "original_message_id"}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMessage {
    pub messaging_product: String,
    pub to: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub text: TextBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<MessageContext>,
}

impl PostMessage {
    /// Text reply, threaded under `original_message_id` when given
    pub fn text(to: &str, body: &str, original_message_id: Option<&str>) -> Self {
        Self {
            messaging_product: "whatsapp".to_string(),
            to: to.to_string(),
            message_type: "text".to_string(),
            text: TextBody {
                body: body.to_string(),
            },
            context: original_message_id.map(|id| MessageContext {
                message_id: id.to_string(),
            }),
        }
    }
}

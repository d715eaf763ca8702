//! Message types and key prefixes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// WhatsApp message types handled by the chatbot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Video,
    Voice,
}

impl MessageType {
    /// Every supported type
    pub const ALL: [MessageType; 4] = [Self::Text, Self::Image, Self::Video, Self::Voice];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Voice => "voice",
        }
    }

    /// Comma-separated list of supported type names
    pub fn allowed() -> String {
        Self::ALL
            .iter()
            .map(MessageType::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a supported message type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMessageType(pub String);

impl fmt::Display for UnknownMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message type <{}> is not allowed. Allowed ones are: {}",
            self.0,
            MessageType::allowed()
        )
    }
}

impl std::error::Error for UnknownMessageType {}

impl FromStr for MessageType {
    type Err = UnknownMessageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownMessageType(s.to_string()))
    }
}

/// Partition and sort key prefixes of the single-table layout
pub mod prefix {
    /// Partition key of a chat participant (`NUMBER#<phone>`)
    pub const NUMBER: &str = "NUMBER#";
    /// Sort key of a message (`MESSAGE#<iso-timestamp>`)
    pub const MESSAGE: &str = "MESSAGE#";
    /// Partition key of an agent user (`USER#<id>`)
    pub const USER: &str = "USER#";
    /// Sort key of a calendar day (`DATE#<yyyy-mm-dd>`)
    pub const DATE: &str = "DATE#";
    pub const TODO: &str = "TODO#";
    pub const CONTACT: &str = "CONTACT#";
}

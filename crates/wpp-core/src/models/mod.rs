//! Domain models

mod enums;
mod message;

pub use enums::{prefix, MessageType, UnknownMessageType};
pub use message::{MessageContent, MessageItem, NewMessage};

//! Steps of the message-processing workflow

mod outcome;
mod process_text;
mod process_voice;
mod send_message;
mod validate;

use std::sync::Arc;

use wpp_agent::ChatAgent;
use wpp_meta::MessageSender;

use crate::registry::StepRegistry;

pub use outcome::{Failure, Success};
pub use process_text::ProcessText;
pub use process_voice::{ProcessVoice, VOICE_NOT_IMPLEMENTED_TEXT};
pub use send_message::{SendMessage, NOT_IMPLEMENTED_MESSAGE};
pub use validate::{ValidateMessage, NOT_FOUND_MESSAGE_TYPE};

/// Registry holding every chatbot step
pub fn chatbot_registry(agent: Arc<dyn ChatAgent>, sender: Arc<dyn MessageSender>) -> StepRegistry {
    let mut registry = StepRegistry::new();
    registry.register(Arc::new(ValidateMessage));
    registry.register(Arc::new(ProcessText::new(agent)));
    registry.register(Arc::new(ProcessVoice));
    registry.register(Arc::new(SendMessage::new(sender)));
    registry.register(Arc::new(Success));
    registry.register(Arc::new(Failure));
    registry
}

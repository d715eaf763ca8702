use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::event::WorkflowEvent;
use crate::step::{Step, StepContext};

pub const VOICE_NOT_IMPLEMENTED_TEXT: &str =
    "NOT IMPLEMENTED. PLEASE ANSWER: <I am not able to process voice messages yet>.";

/// Voice notes are not transcribed yet; the row's text is replaced with a
/// fixed prompt so text handling can answer it
pub struct ProcessVoice;

#[async_trait]
impl Step for ProcessVoice {
    fn class_name(&self) -> &str {
        "ProcessVoice"
    }

    fn method_name(&self) -> &str {
        "process_voice"
    }

    async fn run(&self, _ctx: &StepContext, mut event: WorkflowEvent) -> Result<WorkflowEvent> {
        info!("Starting process_voice for the chatbot");
        info!("Generated text: {}", VOICE_NOT_IMPLEMENTED_TEXT);
        event.set_new_image_string("text", VOICE_NOT_IMPLEMENTED_TEXT)?;
        Ok(event)
    }
}

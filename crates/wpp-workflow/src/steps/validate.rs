use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{error, info};

use wpp_core::MessageType;

use crate::error::{Result, WorkflowError};
use crate::event::{WorkflowEvent, CORRELATION_ID, MESSAGE_TYPE};
use crate::step::{Step, StepContext};

/// Type recorded when the stored row has none
pub const NOT_FOUND_MESSAGE_TYPE: &str = "NOT_FOUND_MESSAGE_TYPE";

/// First step: accepts supported message types only
pub struct ValidateMessage;

#[async_trait]
impl Step for ValidateMessage {
    fn class_name(&self) -> &str {
        "ValidateMessage"
    }

    fn method_name(&self) -> &str {
        "validate_input"
    }

    async fn run(&self, ctx: &StepContext, mut event: WorkflowEvent) -> Result<WorkflowEvent> {
        info!("Starting validate_input JSON body validation");

        let message_type = event
            .new_image_string("type")
            .unwrap_or(NOT_FOUND_MESSAGE_TYPE)
            .to_string();

        if let Err(e) = message_type.parse::<MessageType>() {
            error!("Message type {} not allowed", message_type);
            return Err(WorkflowError::Validation(e.to_string()));
        }

        info!("Validation finished successfully");
        event.set(CORRELATION_ID, JsonValue::String(ctx.correlation_id.clone()))?;
        event.set(MESSAGE_TYPE, JsonValue::String(message_type))?;
        Ok(event)
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::info;

use wpp_agent::ChatAgent;

use crate::error::Result;
use crate::event::{WorkflowEvent, RESPONSE_MESSAGE};
use crate::step::{Step, StepContext};

/// Asks the agent for a reply to the row's text
pub struct ProcessText {
    agent: Arc<dyn ChatAgent>,
}

impl ProcessText {
    pub fn new(agent: Arc<dyn ChatAgent>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl Step for ProcessText {
    fn class_name(&self) -> &str {
        "ProcessText"
    }

    fn method_name(&self) -> &str {
        "process_text"
    }

    async fn run(&self, _ctx: &StepContext, mut event: WorkflowEvent) -> Result<WorkflowEvent> {
        info!("Starting process_text for the chatbot");

        let input_text = event.require_new_image_string("text")?.to_string();
        let response_message = self.agent.call_agent(&input_text).await?;
        info!("Generated response message: {}", response_message);

        event.set(RESPONSE_MESSAGE, JsonValue::String(response_message))?;
        Ok(event)
    }
}

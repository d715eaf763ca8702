use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::info;

use crate::error::Result;
use crate::event::{WorkflowEvent, ERROR_MESSAGE, SUCCESS};
use crate::step::{Step, StepContext};

/// Marks a processed event as successful
pub struct Success;

#[async_trait]
impl Step for Success {
    fn class_name(&self) -> &str {
        "Success"
    }

    fn method_name(&self) -> &str {
        "process_success"
    }

    async fn run(&self, _ctx: &StepContext, mut event: WorkflowEvent) -> Result<WorkflowEvent> {
        info!("Successfully processed the event");
        event.set(SUCCESS, JsonValue::Bool(true))?;
        Ok(event)
    }
}

/// Marks a failed event and logs its error message
pub struct Failure;

#[async_trait]
impl Step for Failure {
    fn class_name(&self) -> &str {
        "Failure"
    }

    fn method_name(&self) -> &str {
        "process_failure"
    }

    async fn run(&self, _ctx: &StepContext, mut event: WorkflowEvent) -> Result<WorkflowEvent> {
        info!("Failure during execution of the event");
        let error_message = event
            .get_str(ERROR_MESSAGE)
            .unwrap_or("No error message provided")
            .to_string();
        info!("Error message: {}", error_message);

        event.set(SUCCESS, JsonValue::Bool(false))?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_success_stamps_true() {
        let event = WorkflowEvent::new(json!({"response_message": "hi"}));
        let ctx = StepContext::from_event(&event);
        let output = Success.run(&ctx, event).await.unwrap();
        assert_eq!(output.get(SUCCESS), Some(&json!(true)));
        assert_eq!(output.get_str("response_message"), Some("hi"));
    }

    #[tokio::test]
    async fn test_failure_stamps_false() {
        let event = WorkflowEvent::new(json!({"error_message": "boom"}));
        let ctx = StepContext::from_event(&event);
        let output = Failure.run(&ctx, event).await.unwrap();
        assert_eq!(output.get(SUCCESS), Some(&json!(false)));
        assert_eq!(output.get_str(ERROR_MESSAGE), Some("boom"));
    }
}

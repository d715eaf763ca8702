//! Step trait definition

use async_trait::async_trait;

use crate::error::Result;
use crate::event::WorkflowEvent;

/// Values every step resolves from the incoming event before running
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepContext {
    /// From the event, then the stored row, else freshly generated
    pub correlation_id: String,
    pub message_type: Option<String>,
}

impl StepContext {
    pub fn from_event(event: &WorkflowEvent) -> Self {
        Self {
            correlation_id: event
                .correlation_id()
                .map(str::to_string)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            message_type: event.message_type().map(str::to_string),
        }
    }
}

/// One unit of work of the message-processing workflow
///
/// A step receives the accumulated event and returns it augmented.
#[async_trait]
pub trait Step: Send + Sync {
    /// Name the step is registered under
    fn class_name(&self) -> &str;

    fn method_name(&self) -> &str;

    async fn run(&self, ctx: &StepContext, event: WorkflowEvent) -> Result<WorkflowEvent>;
}

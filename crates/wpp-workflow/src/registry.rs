//! Step registry for looking up and running workflow steps

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, info_span, Instrument};

use crate::error::{Result, WorkflowError};
use crate::event::WorkflowEvent;
use crate::step::{Step, StepContext};

/// Registered steps indexed by (class name, method name)
pub struct StepRegistry {
    steps: HashMap<(String, String), Arc<dyn Step>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self {
            steps: HashMap::new(),
        }
    }

    /// Register a step
    ///
    /// If a step with the same names already exists, it will be replaced.
    pub fn register(&mut self, step: Arc<dyn Step>) {
        let key = (step.class_name().to_string(), step.method_name().to_string());
        self.steps.insert(key, step);
    }

    pub fn get(&self, class_name: &str, method_name: &str) -> Option<Arc<dyn Step>> {
        self.steps
            .get(&(class_name.to_string(), method_name.to_string()))
            .cloned()
    }

    pub fn contains(&self, class_name: &str, method_name: &str) -> bool {
        self.get(class_name, method_name).is_some()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Registered `Class.method` names, sorted
    pub fn step_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .steps
            .keys()
            .map(|(class_name, method_name)| format!("{}.{}", class_name, method_name))
            .collect();
        names.sort();
        names
    }

    /// Run a step inside a span carrying the correlation id and message type
    pub async fn execute(
        &self,
        class_name: &str,
        method_name: &str,
        event: WorkflowEvent,
    ) -> Result<WorkflowEvent> {
        let step = self
            .get(class_name, method_name)
            .ok_or_else(|| WorkflowError::UnknownStep {
                class_name: class_name.to_string(),
                method_name: method_name.to_string(),
            })?;

        let ctx = StepContext::from_event(&event);
        let span = info_span!(
            "step",
            class_name,
            method_name,
            correlation_id = %ctx.correlation_id,
            message_type = ctx.message_type.as_deref().unwrap_or_default(),
        );

        async move {
            info!("{} class event", class_name);
            step.run(&ctx, event).await
        }
        .instrument(span)
        .await
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::new()
    }
}

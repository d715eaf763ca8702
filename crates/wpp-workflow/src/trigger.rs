//! Change stream dispatcher
//!
//! Starts one workflow execution per inserted message row.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::{debug, error, info, info_span, warn, Instrument};

use wpp_core::storage::{StreamConsumer, StreamEventName};
use wpp_core::StreamRecord;

use crate::error::{Result, WorkflowError};
use crate::event::WorkflowEvent;

/// Placeholder for attributes missing from the new image
pub const NOT_FOUND: &str = "NOT_FOUND";

/// Starts named workflow executions
#[async_trait]
pub trait ExecutionStarter: Send + Sync {
    /// Start an execution and return its identifier
    ///
    /// Names are unique; reusing one fails with `ExecutionAlreadyExists`.
    async fn start_execution(&self, execution_name: &str, input: JsonValue) -> Result<String>;
}

/// `<YYYYmmddTHHMMSS>_<from_number>_<correlation_id>`
pub fn execution_name(record: &StreamRecord, now: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}",
        now.format("%Y%m%dT%H%M%S"),
        record.new_image_string("from_number").unwrap_or(NOT_FOUND),
        record.new_image_string("correlation_id").unwrap_or(NOT_FOUND)
    )
}

/// Dispatches change stream records to the workflow
pub struct StreamDispatcher {
    starter: Arc<dyn ExecutionStarter>,
}

impl StreamDispatcher {
    pub fn new(starter: Arc<dyn ExecutionStarter>) -> Self {
        Self { starter }
    }

    /// Start an execution for an `INSERT` record; other records are skipped
    pub async fn dispatch(&self, record: &StreamRecord) -> Result<Option<String>> {
        let correlation_id = record.new_image_string("correlation_id").unwrap_or(NOT_FOUND);
        let span = info_span!("dispatch", correlation_id = %correlation_id, event_id = %record.event_id);

        async move {
            if record.event_name != StreamEventName::Insert {
                debug!("Skipping {:?} stream record", record.event_name);
                return Ok(None);
            }

            let raw_event = record.to_raw_event()?;
            debug!("Stream record: {}", raw_event);

            let name = execution_name(record, Utc::now());
            let input = WorkflowEvent::from_record(raw_event).into_value();

            match self.starter.start_execution(&name, input).await {
                Ok(execution_id) => {
                    info!("State machine execution_id: {}", execution_id);
                    Ok(Some(execution_id))
                }
                Err(e) => {
                    error!("Failed to start execution {}: {}", name, e);
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Drain the change stream one record at a time until it closes
    ///
    /// Records whose execution could not be started go back to the stream
    /// for redelivery. A name that already exists means the record was
    /// already started, so it is not redelivered.
    pub async fn run(&self, mut stream: StreamConsumer) {
        info!("Starting message processing from change stream");
        while let Some(delivery) = stream.next().await {
            match self.dispatch(&delivery.record).await {
                Ok(_) => {}
                Err(WorkflowError::ExecutionAlreadyExists(name)) => {
                    warn!("Execution {} already started, skipping record", name);
                }
                Err(_) => {
                    stream.redeliver(delivery);
                }
            }
        }
        info!("Change stream closed");
    }
}

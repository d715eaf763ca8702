//! Step invocation entry point
//!
//! Accepts `{"event": <event>, "params": {"class_name", "method_name"}}`, runs
//! the named step and returns its event.

use serde_json::{json, Value as JsonValue};
use tracing::{error, info};

use crate::error::Result;
use crate::event::{WorkflowEvent, EXCEPTION_OCURRED};
use crate::registry::StepRegistry;

pub const MISSING_PARAMS_MESSAGE: &str =
    "class_name and method_name are not provided in event params";

/// Build the invocation payload for a step
pub fn invocation_payload(event: JsonValue, class_name: &str, method_name: &str) -> JsonValue {
    json!({
        "event": event,
        "params": {
            "class_name": class_name,
            "method_name": method_name,
        }
    })
}

pub async fn handle_invocation(registry: &StepRegistry, payload: JsonValue) -> Result<JsonValue> {
    let params = payload.get("params");
    let class_name = params
        .and_then(|p| p.get("class_name"))
        .and_then(JsonValue::as_str);
    let method_name = params
        .and_then(|p| p.get("method_name"))
        .and_then(JsonValue::as_str);

    let mut event = WorkflowEvent::new(payload.get("event").cloned().unwrap_or_else(|| json!({})));
    event.set(EXCEPTION_OCURRED, JsonValue::Bool(false))?;
    info!("Step invocation event: {}", event.as_value());

    let (Some(class_name), Some(method_name)) = (class_name, method_name) else {
        info!("{}", MISSING_PARAMS_MESSAGE);
        return Ok(json!({ "Message": MISSING_PARAMS_MESSAGE }));
    };

    match registry.execute(class_name, method_name, event).await {
        Ok(output) => Ok(output.into_value()),
        Err(e) => {
            error!("Error while executing step handler: {}", e);
            error!("Step initial payload was: {}", payload);
            Err(e)
        }
    }
}

//! Workflow event
//!
//! The JSON document carried from step to step. It starts as
//! `{"input": <raw stream record>}` and each step adds fields to it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::{Result, WorkflowError};

/// Path of the stored row inside the event
const NEW_IMAGE_PATH: [&str; 3] = ["input", "dynamodb", "NewImage"];

pub const CORRELATION_ID: &str = "correlation_id";
pub const MESSAGE_TYPE: &str = "message_type";
pub const RESPONSE_MESSAGE: &str = "response_message";
pub const SEND_MESSAGE_RESPONSE: &str = "send_message_response";
pub const EXCEPTION_OCURRED: &str = "ExceptionOcurred";
pub const SUCCESS: &str = "success";
pub const ERROR_MESSAGE: &str = "error_message";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowEvent(JsonValue);

impl WorkflowEvent {
    pub fn new(value: JsonValue) -> Self {
        Self(value)
    }

    /// Wrap a raw stream record as the initial execution input
    pub fn from_record(raw_record: JsonValue) -> Self {
        let mut event = Map::new();
        event.insert("input".to_string(), raw_record);
        Self(JsonValue::Object(event))
    }

    pub fn as_value(&self) -> &JsonValue {
        &self.0
    }

    pub fn into_value(self) -> JsonValue {
        self.0
    }

    /// Top-level field
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(JsonValue::as_str)
    }

    pub fn get_path(&self, path: &[&str]) -> Option<&JsonValue> {
        path.iter().try_fold(&self.0, |value, key| value.get(key))
    }

    /// Set a top-level field, keeping every other field
    pub fn set(&mut self, key: &str, value: JsonValue) -> Result<()> {
        let object = self
            .0
            .as_object_mut()
            .ok_or_else(|| WorkflowError::MissingField("event is not a JSON object".to_string()))?;
        object.insert(key.to_string(), value);
        Ok(())
    }

    /// Set a nested field, creating intermediate objects as needed
    pub fn set_path(&mut self, path: &[&str], value: JsonValue) -> Result<()> {
        let Some((last, parents)) = path.split_last() else {
            return Ok(());
        };

        let mut current = &mut self.0;
        for key in parents {
            let object = current
                .as_object_mut()
                .ok_or_else(|| WorkflowError::MissingField(key.to_string()))?;
            current = object
                .entry(key.to_string())
                .or_insert_with(|| JsonValue::Object(Map::new()));
        }

        let object = current
            .as_object_mut()
            .ok_or_else(|| WorkflowError::MissingField(last.to_string()))?;
        object.insert(last.to_string(), value);
        Ok(())
    }

    /// String attribute of the stored row (`input.dynamodb.NewImage.<name>.S`)
    pub fn new_image_string(&self, name: &str) -> Option<&str> {
        let path = [NEW_IMAGE_PATH[0], NEW_IMAGE_PATH[1], NEW_IMAGE_PATH[2], name, "S"];
        self.get_path(&path).and_then(JsonValue::as_str)
    }

    pub fn require_new_image_string(&self, name: &str) -> Result<&str> {
        self.new_image_string(name)
            .ok_or_else(|| WorkflowError::MissingField(format!("NewImage.{}.S", name)))
    }

    /// Overwrite a string attribute of the stored row
    pub fn set_new_image_string(&mut self, name: &str, value: &str) -> Result<()> {
        let path = [NEW_IMAGE_PATH[0], NEW_IMAGE_PATH[1], NEW_IMAGE_PATH[2], name, "S"];
        self.set_path(&path, JsonValue::String(value.to_string()))
    }

    pub fn message_type(&self) -> Option<&str> {
        self.get_str(MESSAGE_TYPE)
    }

    /// Correlation id from the event, then from the stored row
    pub fn correlation_id(&self) -> Option<&str> {
        self.get_str(CORRELATION_ID)
            .or_else(|| self.new_image_string(CORRELATION_ID))
    }
}

impl From<JsonValue> for WorkflowEvent {
    fn from(value: JsonValue) -> Self {
        Self::new(value)
    }
}

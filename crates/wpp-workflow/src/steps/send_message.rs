use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use wpp_meta::MessageSender;

use crate::error::{Result, WorkflowError};
use crate::event::{WorkflowEvent, RESPONSE_MESSAGE, SEND_MESSAGE_RESPONSE};
use crate::step::{Step, StepContext};

/// Sent when no step produced a reply (image and video messages)
pub const NOT_IMPLEMENTED_MESSAGE: &str =
    "NOT IMPLEMENTED YET. I am only able to answer text and voice messages for now.";

/// Posts the reply back to the sender, threaded under the original message
pub struct SendMessage {
    sender: Arc<dyn MessageSender>,
}

impl SendMessage {
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl Step for SendMessage {
    fn class_name(&self) -> &str {
        "SendMessage"
    }

    fn method_name(&self) -> &str {
        "send_message"
    }

    async fn run(&self, _ctx: &StepContext, mut event: WorkflowEvent) -> Result<WorkflowEvent> {
        info!("Starting send_message for the chatbot");

        let text_message = event
            .get_str(RESPONSE_MESSAGE)
            .unwrap_or(NOT_IMPLEMENTED_MESSAGE)
            .to_string();
        let phone_number = event.require_new_image_string("from_number")?.to_string();
        let original_message_id = event.require_new_image_string("whatsapp_id")?.to_string();

        let response = self
            .sender
            .post_message(&text_message, &phone_number, Some(&original_message_id))
            .await?;
        info!("Meta API response for WhatsApp: {}", response);

        if let Some(provider_error) = response.get("error") {
            error!("Error sending message: {}", provider_error);
            return Err(WorkflowError::SendMessage(provider_error.to_string()));
        }

        event.set(SEND_MESSAGE_RESPONSE, response)?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value as JsonValue};
    use std::sync::Mutex;

    type Sent = (String, String, Option<String>);

    struct FakeSender {
        response: JsonValue,
        sent: Mutex<Vec<Sent>>,
    }

    impl FakeSender {
        fn returning(response: JsonValue) -> Arc<Self> {
            Arc::new(Self {
                response,
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MessageSender for FakeSender {
        async fn post_message(
            &self,
            text_message: &str,
            to_phone_number: &str,
            original_message_id: Option<&str>,
        ) -> wpp_meta::Result<JsonValue> {
            self.sent.lock().unwrap().push((
                text_message.to_string(),
                to_phone_number.to_string(),
                original_message_id.map(str::to_string),
            ));
            Ok(self.response.clone())
        }
    }

    fn event(response_message: Option<&str>) -> WorkflowEvent {
        let mut event = WorkflowEvent::from_record(json!({
            "dynamodb": {"NewImage": {
                "from_number": {"S": "12345678987"},
                "whatsapp_id": {"S": "wamid.1"}
            }}
        }));
        if let Some(text) = response_message {
            event.set(RESPONSE_MESSAGE, json!(text)).unwrap();
        }
        event
    }

    async fn run(sender: Arc<FakeSender>, event: WorkflowEvent) -> Result<WorkflowEvent> {
        let ctx = StepContext::from_event(&event);
        SendMessage::new(sender).run(&ctx, event).await
    }

    #[tokio::test]
    async fn test_sends_reply_with_context() {
        let sender = FakeSender::returning(json!({"messages": [{"id": "wamid.2"}]}));
        let output = run(sender.clone(), event(Some("hi there"))).await.unwrap();

        assert_eq!(
            output.get(SEND_MESSAGE_RESPONSE),
            Some(&json!({"messages": [{"id": "wamid.2"}]}))
        );
        let sent = sender.sent.lock().unwrap();
        assert_eq!(
            sent[0],
            (
                "hi there".to_string(),
                "12345678987".to_string(),
                Some("wamid.1".to_string())
            )
        );
    }

    #[tokio::test]
    async fn test_placeholder_when_no_reply() {
        let sender = FakeSender::returning(json!({"messages": []}));
        run(sender.clone(), event(None)).await.unwrap();
        assert_eq!(sender.sent.lock().unwrap()[0].0, NOT_IMPLEMENTED_MESSAGE);
    }

    #[tokio::test]
    async fn test_provider_error_fails_step() {
        let sender = FakeSender::returning(json!({"error": {"code": 190}}));
        let err = run(sender, event(Some("hi"))).await.unwrap_err();
        assert!(matches!(err, WorkflowError::SendMessage(_)));
    }
}

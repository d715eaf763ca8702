//! Service wiring
//!
//! Connects the webhook, the change stream, the dispatcher and the state
//! machine around a shared set of clients.

use std::sync::Arc;

use wpp_agent::{ActionGroupHandler, ChatAgent};
use wpp_core::{Config, SecretsHelper, TableStore};
use wpp_meta::MessageSender;
use wpp_webhook::AppState;
use wpp_workflow::{chatbot_registry, LocalStateMachine, StateMachineDefinition, StreamDispatcher};

/// Name of the local state machine
pub const STATE_MACHINE_NAME: &str = "wpp-chatbot-state-machine";

/// Clients shared by every part of the pipeline
pub struct Services {
    /// Messages table; its change stream feeds the dispatcher
    pub messages: Arc<dyn TableStore>,
    pub agents_data: Arc<dyn TableStore>,
    pub secrets: Arc<SecretsHelper>,
    pub agent: Arc<dyn ChatAgent>,
    pub sender: Arc<dyn MessageSender>,
}

pub struct Pipeline {
    pub state: AppState,
    pub machine: Arc<LocalStateMachine>,
    pub dispatcher: StreamDispatcher,
}

/// Build the webhook state, the state machine and its dispatcher
pub fn build_pipeline(config: &Config, services: Services) -> Pipeline {
    let registry = chatbot_registry(services.agent, services.sender);
    tracing::info!(
        "Registered {} workflow steps: {:?}",
        registry.len(),
        registry.step_names()
    );

    let machine = Arc::new(
        LocalStateMachine::new(
            STATE_MACHINE_NAME,
            StateMachineDefinition::chatbot(),
            Arc::new(registry),
        )
        .with_history_limit(config.workflow.execution_history),
    );

    let state = AppState {
        messages: services.messages,
        secrets: services.secrets,
        actions: Arc::new(ActionGroupHandler::new(
            services.agents_data,
            &config.agent.user_id,
        )),
    };

    Pipeline {
        state,
        dispatcher: StreamDispatcher::new(machine.clone()),
        machine,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value as JsonValue};
    use std::sync::Mutex;
    use std::time::Duration;
    use tower::ServiceExt;
    use wpp_core::storage::{change_stream, StreamConsumer};
    use wpp_core::{InMemorySecretStore, SqliteTableStore};
    use wpp_workflow::ExecutionStatus;

    struct EchoAgent;

    #[async_trait]
    impl ChatAgent for EchoAgent {
        async fn call_agent(&self, input_text: &str) -> wpp_agent::Result<String> {
            Ok(format!("echo: {}", input_text))
        }
    }

    type Sent = (String, String, Option<String>);

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<Sent>>,
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
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
            Ok(json!({"messages": [{"id": "wamid.reply"}]}))
        }
    }

    #[tokio::test]
    async fn test_webhook_message_is_answered() {
        let config = Config::default();
        let (tx, rx) = change_stream();
        let messages = Arc::new(
            SqliteTableStore::in_memory(&config.storage.messages_table)
                .unwrap()
                .with_stream(tx),
        );
        let agents_data =
            Arc::new(SqliteTableStore::in_memory(&config.storage.agents_data_table).unwrap());
        let secret_store = InMemorySecretStore::new();
        secret_store
            .insert(&config.secrets.secret_name, &json!({"AWS_API_KEY_TOKEN": "token"}))
            .await;
        let sender = Arc::new(RecordingSender::default());

        let pipeline = build_pipeline(
            &config,
            Services {
                messages,
                agents_data,
                secrets: Arc::new(SecretsHelper::new(
                    config.secrets.secret_name.clone(),
                    Arc::new(secret_store),
                )),
                agent: Arc::new(EchoAgent),
                sender: sender.clone(),
            },
        );

        let dispatcher = pipeline.dispatcher;
        let stream = StreamConsumer::new(rx, config.workflow.redrive_policy());
        let dispatch_task = tokio::spawn(async move { dispatcher.run(stream).await });

        let body = json!({
            "object": "whatsapp_business_account",
            "entry": [{"changes": [{"value": {"messages": [{
                "from": "12345678987",
                "id": "wamid.inbound",
                "timestamp": "1718768502",
                "type": "text",
                "text": {"body": "hello"}
            }]}}]}]
        });
        let response = wpp_webhook::app(pipeline.state)
            .oneshot(
                Request::post("/api/v1/webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header("correlation-id", "corr-e2e")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut finished = None;
        for _ in 0..200 {
            let executions = pipeline.machine.list_executions().await;
            if let Some(execution) = executions
                .into_iter()
                .find(|e| e.status != ExecutionStatus::Running)
            {
                finished = Some(execution);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        dispatch_task.abort();

        let execution = finished.expect("execution did not finish");
        assert_eq!(execution.status, ExecutionStatus::Succeeded);
        assert!(execution.name.ends_with("_12345678987_corr-e2e"));
        assert_eq!(execution.output.unwrap()["correlation_id"], "corr-e2e");
        assert_eq!(
            *sender.sent.lock().unwrap(),
            vec![(
                "echo: hello".to_string(),
                "12345678987".to_string(),
                Some("wamid.inbound".to_string())
            )]
        );
    }
}

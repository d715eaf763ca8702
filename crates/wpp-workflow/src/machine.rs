//! Local state machine
//!
//! Runs the chatbot state graph in-process. Each execution gets a unique name
//! and runs on its own tokio task. Running executions and the most recent
//! finished ones stay queryable.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use tracing::{error, info, info_span, warn, Instrument};

use crate::error::{Result, WorkflowError};
use crate::event::MESSAGE_TYPE;
use crate::handler::{handle_invocation, invocation_payload};
use crate::registry::StepRegistry;
use crate::trigger::ExecutionStarter;

pub const NO_CHOICE_MATCHED: &str = "States.NoChoiceMatched";
pub const STATE_RUNTIME: &str = "States.Runtime";

/// Finished executions kept by default
pub const DEFAULT_EXECUTION_HISTORY: usize = 1000;

/// One state of the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    /// Invoke a registered step; its output replaces the state data
    Task {
        class_name: String,
        method_name: String,
        next: String,
    },
    Pass {
        next: String,
    },
    /// Branch on a string field of the state data
    Choice {
        variable: String,
        choices: Vec<(String, String)>,
    },
    Succeed,
    Fail {
        error: String,
        cause: String,
    },
}

impl State {
    fn task(class_name: &str, method_name: &str, next: &str) -> Self {
        Self::Task {
            class_name: class_name.to_string(),
            method_name: method_name.to_string(),
            next: next.to_string(),
        }
    }

    fn pass(next: &str) -> Self {
        Self::Pass {
            next: next.to_string(),
        }
    }
}

/// A state graph
#[derive(Debug, Clone)]
pub struct StateMachineDefinition {
    pub start_at: String,
    pub states: HashMap<String, State>,
}

impl StateMachineDefinition {
    /// The message-processing graph
    ///
    /// `Process Failure` is defined but nothing transitions into it.
    pub fn chatbot() -> Self {
        let states = HashMap::from([
            (
                "Validate Message".to_string(),
                State::task("ValidateMessage", "validate_input", "Message Type?"),
            ),
            (
                "Message Type?".to_string(),
                State::Choice {
                    variable: MESSAGE_TYPE.to_string(),
                    choices: vec![
                        ("text".to_string(), "Text".to_string()),
                        ("voice".to_string(), "Voice".to_string()),
                        ("image".to_string(), "Image".to_string()),
                        ("video".to_string(), "Video".to_string()),
                    ],
                },
            ),
            ("Text".to_string(), State::pass("Process Text")),
            ("Voice".to_string(), State::pass("Process Voice")),
            ("Image".to_string(), State::pass("NotImplemented")),
            ("Video".to_string(), State::pass("NotImplemented")),
            (
                "Process Text".to_string(),
                State::task("ProcessText", "process_text", "Send Message"),
            ),
            (
                "Process Voice".to_string(),
                State::task("ProcessVoice", "process_voice", "Text"),
            ),
            ("NotImplemented".to_string(), State::pass("Send Message")),
            (
                "Send Message".to_string(),
                State::task("SendMessage", "send_message", "Process Success"),
            ),
            (
                "Process Success".to_string(),
                State::task("Success", "process_success", "Succeed"),
            ),
            (
                "Process Failure".to_string(),
                State::task("Failure", "process_failure", "Exception Handling Finished"),
            ),
            ("Succeed".to_string(), State::Succeed),
            (
                "Exception Handling Finished".to_string(),
                State::Fail {
                    error: "ExceptionHandlingFinished".to_string(),
                    cause: "State Machine Exception or Failure".to_string(),
                },
            ),
        ]);

        Self {
            start_at: "Validate Message".to_string(),
            states,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status")]
pub enum ExecutionStatus {
    Running,
    Succeeded,
    Failed { error: String, cause: String },
}

/// Record of one execution
#[derive(Debug, Clone, Serialize)]
pub struct Execution {
    pub name: String,
    pub execution_arn: String,
    pub status: ExecutionStatus,
    pub input: JsonValue,
    pub output: Option<JsonValue>,
    /// State names in the order they were entered
    pub visited_states: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
}

/// Execution records, with finished names in the order they stopped
#[derive(Default)]
struct ExecutionTable {
    by_name: HashMap<String, Execution>,
    finished: VecDeque<String>,
}

impl ExecutionTable {
    /// Evict the oldest finished executions beyond `limit`
    fn evict(&mut self, limit: usize) {
        while self.finished.len() > limit {
            if let Some(name) = self.finished.pop_front() {
                self.by_name.remove(&name);
            }
        }
    }
}

/// In-process state machine runner
#[derive(Clone)]
pub struct LocalStateMachine {
    name: String,
    definition: Arc<StateMachineDefinition>,
    registry: Arc<StepRegistry>,
    history_limit: usize,
    executions: Arc<RwLock<ExecutionTable>>,
}

impl LocalStateMachine {
    pub fn new(name: &str, definition: StateMachineDefinition, registry: Arc<StepRegistry>) -> Self {
        Self {
            name: name.to_string(),
            definition: Arc::new(definition),
            registry,
            history_limit: DEFAULT_EXECUTION_HISTORY,
            executions: Arc::new(RwLock::new(ExecutionTable::default())),
        }
    }

    /// Keep at most `limit` finished executions
    ///
    /// Names are only checked for reuse against executions still held.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn execution_arn(&self, execution_name: &str) -> String {
        format!("local:execution:{}:{}", self.name, execution_name)
    }

    pub async fn describe_execution(&self, execution_name: &str) -> Option<Execution> {
        self.executions.read().await.by_name.get(execution_name).cloned()
    }

    pub async fn list_executions(&self) -> Vec<Execution> {
        let mut executions: Vec<Execution> =
            self.executions.read().await.by_name.values().cloned().collect();
        executions.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        executions
    }

    /// Register a new execution, rejecting names already used
    async fn register(&self, execution_name: &str, input: &JsonValue) -> Result<String> {
        let mut executions = self.executions.write().await;
        if executions.by_name.contains_key(execution_name) {
            warn!("Execution {} already exists", execution_name);
            return Err(WorkflowError::ExecutionAlreadyExists(execution_name.to_string()));
        }

        let execution_arn = self.execution_arn(execution_name);
        executions.by_name.insert(
            execution_name.to_string(),
            Execution {
                name: execution_name.to_string(),
                execution_arn: execution_arn.clone(),
                status: ExecutionStatus::Running,
                input: input.clone(),
                output: None,
                visited_states: Vec::new(),
                started_at: Utc::now(),
                stopped_at: None,
            },
        );
        Ok(execution_arn)
    }

    /// Run an execution to completion and return its record
    pub async fn execute(&self, execution_name: &str, input: JsonValue) -> Result<Execution> {
        self.register(execution_name, &input).await?;
        Ok(self.drive(execution_name, input).await)
    }

    async fn drive(&self, execution_name: &str, input: JsonValue) -> Execution {
        let span = info_span!("execution", execution_name = %execution_name);
        let (status, output, visited) = self.run_states(input).instrument(span).await;

        let mut executions = self.executions.write().await;
        let execution = executions
            .by_name
            .entry(execution_name.to_string())
            .or_insert_with(|| Execution {
                name: execution_name.to_string(),
                execution_arn: self.execution_arn(execution_name),
                status: ExecutionStatus::Running,
                input: JsonValue::Null,
                output: None,
                visited_states: Vec::new(),
                started_at: Utc::now(),
                stopped_at: None,
            });
        execution.status = status;
        execution.output = output;
        execution.visited_states = visited;
        execution.stopped_at = Some(Utc::now());
        let finished = execution.clone();

        executions.finished.push_back(execution_name.to_string());
        executions.evict(self.history_limit);
        finished
    }

    async fn run_states(
        &self,
        input: JsonValue,
    ) -> (ExecutionStatus, Option<JsonValue>, Vec<String>) {
        let mut visited = Vec::new();
        let mut data = input;
        let mut current = self.definition.start_at.clone();

        loop {
            visited.push(current.clone());
            let Some(state) = self.definition.states.get(&current) else {
                let cause = format!("State {} is not defined", current);
                error!("{}", cause);
                return (failed(STATE_RUNTIME, &cause), None, visited);
            };

            match state {
                State::Task {
                    class_name,
                    method_name,
                    next,
                } => {
                    info!("Entering task state {}", current);
                    let payload = invocation_payload(data, class_name, method_name);
                    match handle_invocation(&self.registry, payload).await {
                        Ok(output) => data = output,
                        Err(e) => {
                            error!("State {} failed: {}", current, e);
                            return (failed(e.error_name(), &e.to_string()), None, visited);
                        }
                    }
                    current = next.clone();
                }
                State::Pass { next } => current = next.clone(),
                State::Choice { variable, choices } => {
                    let value = data.get(variable).and_then(JsonValue::as_str);
                    let next = choices
                        .iter()
                        .find(|(expected, _)| Some(expected.as_str()) == value)
                        .map(|(_, next)| next.clone());
                    match next {
                        Some(next) => current = next,
                        None => {
                            let cause = format!(
                                "No Matches! Field {} has value {:?} in state {}",
                                variable, value, current
                            );
                            error!("{}", cause);
                            return (failed(NO_CHOICE_MATCHED, &cause), None, visited);
                        }
                    }
                }
                State::Succeed => {
                    info!("Execution succeeded");
                    return (ExecutionStatus::Succeeded, Some(data), visited);
                }
                State::Fail { error, cause } => {
                    return (failed(error, cause), None, visited);
                }
            }
        }
    }
}

fn failed(error: &str, cause: &str) -> ExecutionStatus {
    ExecutionStatus::Failed {
        error: error.to_string(),
        cause: cause.to_string(),
    }
}

#[async_trait]
impl ExecutionStarter for LocalStateMachine {
    async fn start_execution(&self, execution_name: &str, input: JsonValue) -> Result<String> {
        let execution_arn = self.register(execution_name, &input).await?;

        let machine = self.clone();
        let name = execution_name.to_string();
        tokio::spawn(async move {
            let execution = machine.drive(&name, input).await;
            info!("Execution {} finished: {:?}", name, execution.status);
        });

        Ok(execution_arn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{chatbot_registry, NOT_IMPLEMENTED_MESSAGE, VOICE_NOT_IMPLEMENTED_TEXT};
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use wpp_agent::ChatAgent;
    use wpp_meta::MessageSender;

    #[derive(Default)]
    struct EchoAgent {
        inputs: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatAgent for EchoAgent {
        async fn call_agent(&self, input_text: &str) -> wpp_agent::Result<String> {
            self.inputs.lock().unwrap().push(input_text.to_string());
            Ok(format!("echo: {}", input_text))
        }
    }

    struct FakeSender {
        response: JsonValue,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageSender for FakeSender {
        async fn post_message(
            &self,
            text_message: &str,
            _to_phone_number: &str,
            _original_message_id: Option<&str>,
        ) -> wpp_meta::Result<JsonValue> {
            self.sent.lock().unwrap().push(text_message.to_string());
            Ok(self.response.clone())
        }
    }

    struct Harness {
        machine: LocalStateMachine,
        agent: Arc<EchoAgent>,
        sender: Arc<FakeSender>,
    }

    fn harness(send_response: JsonValue) -> Harness {
        let agent = Arc::new(EchoAgent::default());
        let sender = Arc::new(FakeSender {
            response: send_response,
            sent: Mutex::new(Vec::new()),
        });
        let registry = chatbot_registry(agent.clone(), sender.clone());
        let machine = LocalStateMachine::new(
            "wpp-chatbot",
            StateMachineDefinition::chatbot(),
            Arc::new(registry),
        );
        Harness {
            machine,
            agent,
            sender,
        }
    }

    fn input(message_type: &str, text: Option<&str>) -> JsonValue {
        let mut new_image = json!({
            "PK": {"S": "NUMBER#12345678987"},
            "SK": {"S": "MESSAGE#2024-06-01T10:00:00.000000+00:00"},
            "type": {"S": message_type},
            "from_number": {"S": "12345678987"},
            "whatsapp_id": {"S": "wamid.1"},
            "correlation_id": {"S": "corr-1"}
        });
        if let Some(text) = text {
            new_image["text"] = json!({"S": text});
        }
        json!({"input": {"eventName": "INSERT", "dynamodb": {"NewImage": new_image}}})
    }

    fn ok_response() -> JsonValue {
        json!({"messages": [{"id": "wamid.2"}]})
    }

    #[tokio::test]
    async fn test_text_message_path() {
        let h = harness(ok_response());
        let execution = h.machine.execute("exec-1", input("text", Some("hello"))).await.unwrap();

        assert_eq!(execution.status, ExecutionStatus::Succeeded);
        assert_eq!(
            execution.visited_states,
            vec![
                "Validate Message",
                "Message Type?",
                "Text",
                "Process Text",
                "Send Message",
                "Process Success",
                "Succeed"
            ]
        );
        let output = execution.output.unwrap();
        assert_eq!(output["success"], true);
        assert_eq!(output["response_message"], "echo: hello");
        assert_eq!(output["correlation_id"], "corr-1");
        assert_eq!(output["ExceptionOcurred"], false);
        assert_eq!(*h.sender.sent.lock().unwrap(), vec!["echo: hello".to_string()]);
    }

    #[tokio::test]
    async fn test_voice_message_reenters_text() {
        let h = harness(ok_response());
        let execution = h.machine.execute("exec-voice", input("voice", None)).await.unwrap();

        assert_eq!(execution.status, ExecutionStatus::Succeeded);
        assert_eq!(
            &execution.visited_states[..5],
            &["Validate Message", "Message Type?", "Voice", "Process Voice", "Text"]
        );
        assert_eq!(
            *h.agent.inputs.lock().unwrap(),
            vec![VOICE_NOT_IMPLEMENTED_TEXT.to_string()]
        );
    }

    #[tokio::test]
    async fn test_image_message_sends_placeholder() {
        let h = harness(ok_response());
        let execution = h.machine.execute("exec-image", input("image", None)).await.unwrap();

        assert_eq!(execution.status, ExecutionStatus::Succeeded);
        assert!(execution.visited_states.contains(&"NotImplemented".to_string()));
        assert!(h.agent.inputs.lock().unwrap().is_empty());
        assert_eq!(
            *h.sender.sent.lock().unwrap(),
            vec![NOT_IMPLEMENTED_MESSAGE.to_string()]
        );
    }

    #[tokio::test]
    async fn test_unsupported_type_fails_execution() {
        let h = harness(ok_response());
        let execution = h.machine.execute("exec-bad", input("sticker", None)).await.unwrap();

        match execution.status {
            ExecutionStatus::Failed { error, cause } => {
                assert_eq!(error, "ValidationError");
                assert!(cause.contains("<sticker>"));
            }
            other => panic!("unexpected status {:?}", other),
        }
        assert_eq!(execution.visited_states, vec!["Validate Message"]);
        assert!(h.sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_error_fails_execution() {
        let h = harness(json!({"error": {"message": "Invalid OAuth access token"}}));
        let execution = h.machine.execute("exec-err", input("text", Some("hi"))).await.unwrap();

        assert!(matches!(
            execution.status,
            ExecutionStatus::Failed { ref error, .. } if error == "SendMessageError"
        ));
        assert_eq!(execution.visited_states.last().unwrap(), "Send Message");
    }

    #[tokio::test]
    async fn test_no_choice_matched() {
        let mut definition = StateMachineDefinition::chatbot();
        definition.states.insert(
            "Validate Message".to_string(),
            State::pass("Message Type?"),
        );
        let h = harness(ok_response());
        let machine = LocalStateMachine::new("m", definition, h.machine.registry.clone());

        let execution = machine.execute("exec-choice", input("text", Some("hi"))).await.unwrap();
        assert!(matches!(
            execution.status,
            ExecutionStatus::Failed { ref error, .. } if error == NO_CHOICE_MATCHED
        ));
    }

    #[tokio::test]
    async fn test_duplicate_execution_name_rejected() {
        let h = harness(ok_response());
        h.machine.execute("same", input("text", Some("a"))).await.unwrap();
        let err = h.machine.execute("same", input("text", Some("b"))).await.unwrap_err();
        assert!(matches!(err, WorkflowError::ExecutionAlreadyExists(_)));

        let err = h
            .machine
            .start_execution("same", input("text", Some("c")))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::ExecutionAlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_start_execution_runs_in_background() {
        let h = harness(ok_response());
        let arn = h
            .machine
            .start_execution("bg", input("text", Some("hello")))
            .await
            .unwrap();
        assert_eq!(arn, "local:execution:wpp-chatbot:bg");

        let mut status = ExecutionStatus::Running;
        for _ in 0..100 {
            status = h.machine.describe_execution("bg").await.unwrap().status;
            if status != ExecutionStatus::Running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, ExecutionStatus::Succeeded);
        assert_eq!(h.machine.list_executions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_finished_history_is_capped() {
        let h = harness(ok_response());
        let machine = h.machine.with_history_limit(10);

        for i in 0..200 {
            let execution = machine
                .execute(&format!("exec-{}", i), input("text", Some("hello")))
                .await
                .unwrap();
            assert_eq!(execution.status, ExecutionStatus::Succeeded);
        }

        let retained = machine.list_executions().await;
        assert_eq!(retained.len(), 10);
        assert!(machine.describe_execution("exec-0").await.is_none());
        assert!(machine.describe_execution("exec-199").await.is_some());
        let mut names: Vec<String> = retained.into_iter().map(|e| e.name).collect();
        names.sort();
        let expected: Vec<String> = (190..200).map(|i| format!("exec-{}", i)).collect();
        assert_eq!(names, expected);
        assert_eq!(h.sender.sent.lock().unwrap().len(), 200);
    }

    #[tokio::test]
    async fn test_running_executions_are_not_evicted() {
        let h = harness(ok_response());
        let machine = h.machine.with_history_limit(0);

        machine.register("running", &input("text", Some("a"))).await.unwrap();
        machine.execute("done", input("text", Some("b"))).await.unwrap();

        let running = machine.describe_execution("running").await.unwrap();
        assert_eq!(running.status, ExecutionStatus::Running);
        assert!(machine.describe_execution("done").await.is_none());
    }
}

//! Agent adapter
//!
//! Resolves the agent and alias ids from the parameter store, invokes the
//! runtime and joins the streamed chunks into one answer.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info};

use wpp_core::{Config, ParameterStore};

use crate::error::{AgentError, Result};
use crate::runtime::{AgentRuntime, InvokeAgentRequest};

/// Something that answers a user's text
#[async_trait]
pub trait ChatAgent: Send + Sync {
    async fn call_agent(&self, input_text: &str) -> Result<String>;
}

/// Adapter around the agent runtime
pub struct AgentAdapter {
    runtime: Arc<dyn AgentRuntime>,
    parameters: Arc<dyn ParameterStore>,
    agent_id_parameter: String,
    agent_alias_parameter: String,
    session_id: String,
}

impl AgentAdapter {
    pub fn new(
        runtime: Arc<dyn AgentRuntime>,
        parameters: Arc<dyn ParameterStore>,
        agent_id_parameter: &str,
        agent_alias_parameter: &str,
        session_id: &str,
    ) -> Self {
        Self {
            runtime,
            parameters,
            agent_id_parameter: agent_id_parameter.to_string(),
            agent_alias_parameter: agent_alias_parameter.to_string(),
            session_id: session_id.to_string(),
        }
    }

    /// Build an adapter using the parameter names of the configured environment
    pub fn from_config(
        config: &Config,
        runtime: Arc<dyn AgentRuntime>,
        parameters: Arc<dyn ParameterStore>,
    ) -> Self {
        Self::new(
            runtime,
            parameters,
            &config.agent_id_parameter(),
            &config.agent_alias_parameter(),
            &config.agent.session_id,
        )
    }

    async fn resolve_ids(&self) -> Result<(String, String)> {
        let agent_id = self.parameters.get_parameter(&self.agent_id_parameter).await?;
        let alias_full = self
            .parameters
            .get_parameter(&self.agent_alias_parameter)
            .await?;
        debug!("agent_id: {}, agent_alias_id full string: {}", agent_id, alias_full);

        Ok((agent_id, alias_id_from_full_string(&alias_full)))
    }
}

/// The alias parameter holds `<agent-id>|<alias-id>`; keep the last part
pub fn alias_id_from_full_string(value: &str) -> String {
    value.rsplit('|').next().unwrap_or(value).to_string()
}

#[async_trait]
impl ChatAgent for AgentAdapter {
    async fn call_agent(&self, input_text: &str) -> Result<String> {
        let (agent_id, agent_alias_id) = self.resolve_ids().await?;
        info!("Calling agent {} with alias {}", agent_id, agent_alias_id);

        let mut stream = self
            .runtime
            .invoke_agent(InvokeAgentRequest {
                agent_id,
                agent_alias_id,
                session_id: self.session_id.clone(),
                input_text: input_text.to_string(),
                enable_trace: false,
            })
            .await?;

        let mut completion = Vec::new();
        while let Some(event) = stream.next().await {
            match event?.chunk {
                Some(part) => completion.extend_from_slice(&part.bytes),
                None => debug!("Skipping agent event without chunk"),
            }
        }

        let completion = String::from_utf8(completion)
            .map_err(|e| AgentError::Stream(format!("completion is not valid UTF-8: {}", e)))?;
        info!("Agent completion: {}", completion);
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{CompletionStream, ResponseEvent};
    use futures::stream;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use wpp_core::LocalParameterStore;

    struct FakeRuntime {
        events: Vec<&'static str>,
        requests: Mutex<Vec<InvokeAgentRequest>>,
    }

    #[async_trait]
    impl AgentRuntime for FakeRuntime {
        async fn invoke_agent(&self, request: InvokeAgentRequest) -> Result<CompletionStream> {
            self.requests.lock().unwrap().push(request);
            let events: Vec<Result<ResponseEvent>> = self
                .events
                .iter()
                .map(|t| Ok(ResponseEvent::text(t)))
                .chain(std::iter::once(Ok(ResponseEvent::default())))
                .collect();
            Ok(stream::iter(events).boxed())
        }
    }

    fn parameters() -> Arc<LocalParameterStore> {
        Arc::new(LocalParameterStore::new(HashMap::from([
            ("/dev/aws-wpp/bedrock-agent-id".to_string(), "AGENT1".to_string()),
            (
                "/dev/aws-wpp/bedrock-agent-alias-id-full-string".to_string(),
                "AGENT1|ALIAS9".to_string(),
            ),
        ])))
    }

    #[test]
    fn test_alias_id_from_full_string() {
        assert_eq!(alias_id_from_full_string("AGENT1|ALIAS9"), "ALIAS9");
        assert_eq!(alias_id_from_full_string("ALIAS9"), "ALIAS9");
    }

    #[tokio::test]
    async fn test_call_agent_concatenates_chunks() {
        let runtime = Arc::new(FakeRuntime {
            events: vec!["You have ", "2 events ", "today"],
            requests: Mutex::new(Vec::new()),
        });
        let adapter = AgentAdapter::from_config(&Config::default(), runtime.clone(), parameters());

        let answer = adapter.call_agent("what is on my calendar?").await.unwrap();
        assert_eq!(answer, "You have 2 events today");

        let requests = runtime.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].agent_id, "AGENT1");
        assert_eq!(requests[0].agent_alias_id, "ALIAS9");
        assert_eq!(requests[0].session_id, "TempSessionBedrock");
        assert_eq!(requests[0].input_text, "what is on my calendar?");
        assert!(!requests[0].enable_trace);
    }

    #[tokio::test]
    async fn test_missing_parameter_fails() {
        let runtime = Arc::new(FakeRuntime {
            events: vec![],
            requests: Mutex::new(Vec::new()),
        });
        let adapter = AgentAdapter::from_config(
            &Config::default(),
            runtime,
            Arc::new(LocalParameterStore::default()),
        );

        let err = adapter.call_agent("hi").await.unwrap_err();
        assert!(matches!(err, AgentError::Core(_)));
    }
}

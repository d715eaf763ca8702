//! Agent runtime client
//!
//! The runtime answers an invocation with a stream of events; text arrives in
//! `chunk` events whose `bytes` are base64 encoded.

use async_trait::async_trait;
use base64::Engine;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info, warn};

use crate::error::{AgentError, Result};

/// One agent invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeAgentRequest {
    pub agent_id: String,
    pub agent_alias_id: String,
    pub session_id: String,
    pub input_text: String,
    pub enable_trace: bool,
}

/// A piece of the agent's answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadPart {
    pub bytes: Vec<u8>,
}

/// One event of the completion stream
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseEvent {
    /// Present on text events; absent on trace or other events
    pub chunk: Option<PayloadPart>,
}

impl ResponseEvent {
    pub fn text(text: &str) -> Self {
        Self {
            chunk: Some(PayloadPart {
                bytes: text.as_bytes().to_vec(),
            }),
        }
    }
}

/// Stream of completion events
pub type CompletionStream = BoxStream<'static, Result<ResponseEvent>>;

/// Generative-AI agent runtime
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn invoke_agent(&self, request: InvokeAgentRequest) -> Result<CompletionStream>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvokeAgentBody<'a> {
    input_text: &'a str,
    enable_trace: bool,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    chunk: Option<WireChunk>,
    #[serde(flatten)]
    other: Map<String, JsonValue>,
}

#[derive(Debug, Deserialize)]
struct WireChunk {
    bytes: String,
}

/// HTTP agent runtime client reading a newline-delimited JSON stream
#[derive(Clone)]
pub struct HttpAgentRuntime {
    client: Client,
    base_url: String,
}

impl HttpAgentRuntime {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn invoke_url(&self, request: &InvokeAgentRequest) -> String {
        format!(
            "{}/agents/{}/agentAliases/{}/sessions/{}/text",
            self.base_url, request.agent_id, request.agent_alias_id, request.session_id
        )
    }
}

#[async_trait]
impl AgentRuntime for HttpAgentRuntime {
    async fn invoke_agent(&self, request: InvokeAgentRequest) -> Result<CompletionStream> {
        let url = self.invoke_url(&request);
        info!("Invoking agent {} (alias {})", request.agent_id, request.agent_alias_id);
        debug!("Agent runtime url: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&InvokeAgentBody {
                input_text: &request.input_text,
                enable_trace: request.enable_trace,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Agent runtime error: {} - {}", status, body);
            return Err(AgentError::Runtime(format!("{} - {}", status, body)));
        }

        Ok(ndjson_events(Box::pin(response.bytes_stream())))
    }
}

/// Split a byte stream into lines and parse each line as one event
fn ndjson_events<S, B, E>(bytes: S) -> CompletionStream
where
    S: futures::Stream<Item = std::result::Result<B, E>> + Unpin + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<AgentError> + Send,
{
    let state = (bytes, Vec::<u8>::new(), false);

    stream::unfold(state, |(mut bytes, mut buffer, mut done)| async move {
        loop {
            if let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                return Some((parse_event(&line), (bytes, buffer, done)));
            }

            if done {
                if buffer.iter().all(u8::is_ascii_whitespace) {
                    return None;
                }
                let line = std::mem::take(&mut buffer);
                return Some((parse_event(&line), (bytes, buffer, done)));
            }

            match bytes.next().await {
                Some(Ok(chunk)) => buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    done = true;
                    buffer.clear();
                    return Some((Err(e.into()), (bytes, buffer, done)));
                }
                None => done = true,
            }
        }
    })
    .boxed()
}

fn parse_event(line: &[u8]) -> Result<ResponseEvent> {
    let event: WireEvent =
        serde_json::from_slice(line).map_err(|e| AgentError::Stream(e.to_string()))?;

    if let Some(chunk) = event.chunk {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(chunk.bytes.as_bytes())
            .map_err(|e| AgentError::Stream(format!("invalid chunk bytes: {}", e)))?;
        return Ok(ResponseEvent {
            chunk: Some(PayloadPart { bytes }),
        });
    }

    // Error events are keyed by their exception name
    if let Some((name, detail)) = event.other.iter().find(|(k, _)| k.ends_with("Exception")) {
        return Err(AgentError::Runtime(format!("{}: {}", name, detail)));
    }

    Ok(ResponseEvent::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn encoded(text: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(text)
    }

    fn request() -> InvokeAgentRequest {
        InvokeAgentRequest {
            agent_id: "AGENT1".to_string(),
            agent_alias_id: "ALIAS1".to_string(),
            session_id: "TempSessionBedrock".to_string(),
            input_text: "hello".to_string(),
            enable_trace: false,
        }
    }

    async fn collect(stream: CompletionStream) -> Vec<Result<ResponseEvent>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_ndjson_split_across_chunks() {
        let line_a = format!("{{\"chunk\":{{\"bytes\":\"{}\"}}}}\n", encoded("Hola "));
        let line_b = format!("{{\"chunk\":{{\"bytes\":\"{}\"}}}}", encoded("mundo"));
        let whole = format!("{}{}", line_a, line_b);
        let (first, second) = whole.split_at(10);

        let parts: Vec<std::result::Result<Vec<u8>, AgentError>> =
            vec![Ok(first.as_bytes().to_vec()), Ok(second.as_bytes().to_vec())];
        let events = collect(ndjson_events(stream::iter(parts))).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap(), &ResponseEvent::text("Hola "));
        assert_eq!(events[1].as_ref().unwrap(), &ResponseEvent::text("mundo"));
    }

    #[tokio::test]
    async fn test_exception_event_is_error() {
        let parts: Vec<std::result::Result<Vec<u8>, AgentError>> = vec![Ok(
            b"{\"throttlingException\":{\"message\":\"slow down\"}}\n".to_vec(),
        )];
        let events = collect(ndjson_events(stream::iter(parts))).await;
        assert!(matches!(events[0], Err(AgentError::Runtime(_))));
    }

    #[tokio::test]
    async fn test_trace_event_has_no_chunk() {
        let parts: Vec<std::result::Result<Vec<u8>, AgentError>> =
            vec![Ok(b"{\"trace\":{}}\n\n".to_vec())];
        let events = collect(ndjson_events(stream::iter(parts))).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap().chunk, None);
    }

    #[tokio::test]
    async fn test_http_runtime_invocation() {
        let server = MockServer::start().await;
        let body = format!(
            "{{\"chunk\":{{\"bytes\":\"{}\"}}}}\n{{\"chunk\":{{\"bytes\":\"{}\"}}}}\n",
            encoded("You have "),
            encoded("3 todos")
        );
        Mock::given(method("POST"))
            .and(path("/agents/AGENT1/agentAliases/ALIAS1/sessions/TempSessionBedrock/text"))
            .and(body_json(json!({"inputText": "hello", "enableTrace": false})))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let runtime = HttpAgentRuntime::new(&server.uri());
        let events = collect(runtime.invoke_agent(request()).await.unwrap()).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].as_ref().unwrap(), &ResponseEvent::text("3 todos"));
    }

    #[tokio::test]
    async fn test_http_runtime_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("agent not found"))
            .mount(&server)
            .await;

        let runtime = HttpAgentRuntime::new(&server.uri());
        let err = runtime.invoke_agent(request()).await.err().unwrap();
        assert!(matches!(err, AgentError::Runtime(_)));
    }
}

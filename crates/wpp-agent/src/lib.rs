//! wpp-agent: generative-AI agent integration
//!
//! The runtime client, the adapter the workflow calls to get a reply, and the
//! action-group skills the agent calls back into.

pub mod actions;
pub mod adapter;
pub mod error;
pub mod runtime;

pub use actions::{ActionGroupEvent, ActionGroupHandler, ActionGroupResponse, Skill};
pub use adapter::{AgentAdapter, ChatAgent};
pub use error::{AgentError, Result};
pub use runtime::{AgentRuntime, HttpAgentRuntime, InvokeAgentRequest, ResponseEvent};

//! wpp-workflow: message-processing workflow
//!
//! Steps registered by name, the invocation handler that runs them, a local
//! state machine executing the chatbot graph, and the dispatcher that starts
//! one execution per inserted message row.

pub mod error;
pub mod event;
pub mod handler;
pub mod machine;
pub mod registry;
pub mod step;
pub mod steps;
pub mod trigger;

pub use error::{Result, WorkflowError};
pub use event::WorkflowEvent;
pub use handler::handle_invocation;
pub use machine::{Execution, ExecutionStatus, LocalStateMachine, StateMachineDefinition};
pub use registry::StepRegistry;
pub use step::{Step, StepContext};
pub use steps::chatbot_registry;
pub use trigger::{execution_name, ExecutionStarter, StreamDispatcher};

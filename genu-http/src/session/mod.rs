mod lifecycle;
mod manager;

pub use lifecycle::InvocationLifecycle;
pub use manager::{InvocationManager, InvocationManagerConfig};

use genu_core::{AgentError, AgentStream};
use genu_llm::LlmError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("invalid invocation payload: {0}")]
    Payload(String),
    #[error("failed to prepare workspace: {0}")]
    Workspace(#[from] std::io::Error),
    #[error(transparent)]
    Model(#[from] LlmError),
    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// One running invocation: the agent's event stream plus the lifecycle that
/// owns the workspace. Dropping the session (stream finished, error, or client
/// gone) removes the workspace.
pub struct InvocationSession {
    pub events: AgentStream,
    pub lifecycle: InvocationLifecycle,
}

impl InvocationSession {
    pub fn new(events: AgentStream, lifecycle: InvocationLifecycle) -> Self {
        Self { events, lifecycle }
    }
}

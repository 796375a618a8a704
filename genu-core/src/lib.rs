pub mod agent;
pub mod prompt;
pub mod session;
pub mod storage;
pub mod tools;
pub mod workspace;

pub use agent::{Agent, AgentBuilder, AgentError, AgentEvent, AgentStream};
pub use session::{SessionId, SESSION_HEADER};
pub use storage::{MemoryObjectStore, ObjectBody, ObjectHead, ObjectStore, S3ObjectStore, StoreError};
pub use tools::{Tool, ToolError, ToolRegistry};
pub use workspace::Workspace;

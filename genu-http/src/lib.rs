pub mod apis;
pub mod error;
pub mod http;
pub mod session;
pub mod streaming;

pub use error::{ErrorKind, ErrorResponse};
pub use http::{
    agent_router, start_agent_server, start_static_server, static_router, ResponseMode,
    ServerConfig, ServerState, StaticState,
};
pub use session::{InvocationError, InvocationManager, InvocationManagerConfig, InvocationSession};
pub use streaming::{session_to_ndjson_stream, EventFormatter, RelayFormatter};

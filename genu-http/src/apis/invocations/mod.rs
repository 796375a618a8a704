pub mod handler;
pub mod types;

pub use handler::{handle_invocation, handle_ping};
pub use types::{
    error_text, InvocationRequest, InvocationResponse, ModelSelector, DEFAULT_MODEL_ID,
    EMPTY_RESPONSE_TEXT,
};

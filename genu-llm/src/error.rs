use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model request failed: {0}")]
    Request(String),
    #[error("model stream failed: {0}")]
    Stream(String),
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("invalid tool input for {0}")]
    InvalidToolInput(String),
}

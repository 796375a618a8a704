use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;

use crate::error::LlmError;
use crate::stream::StreamEvent;
use crate::types::Message;

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// Tool description handed to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool input
    pub input_schema: Value,
}

#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
}

/// Model identifier and the region it is invoked in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub model_id: String,
    pub region: String,
}

/// A streaming chat model
#[async_trait]
pub trait Model: Send + Sync {
    fn model_id(&self) -> &str;

    /// Start one model turn and return its raw event stream
    async fn stream(&self, request: ModelRequest) -> Result<EventStream, LlmError>;
}

/// Builds models for a request's model selection
#[async_trait]
pub trait ModelFactory: Send + Sync {
    async fn create(&self, info: &ModelInfo) -> Result<Arc<dyn Model>, LlmError>;
}

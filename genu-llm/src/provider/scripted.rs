use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::LlmError;
use crate::model::{EventStream, Model, ModelRequest};
use crate::stream::{BlockDelta, BlockStart, StopReason, StreamEvent, ToolUseDelta, ToolUseStart};
use crate::types::Role;

/// Replays pre-recorded turns instead of calling a model. One turn is consumed per call.
pub struct ScriptedModel {
    model_id: String,
    turns: Mutex<VecDeque<Vec<StreamEvent>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(turns: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            model_id: "scripted".to_string(),
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// A turn that answers with `text` and ends the conversation
    pub fn text_turn(text: &str) -> Vec<StreamEvent> {
        vec![
            StreamEvent::MessageStart {
                role: Role::Assistant,
            },
            StreamEvent::ContentBlockDelta {
                delta: BlockDelta::Text(text.to_string()),
                content_block_index: 0,
            },
            StreamEvent::ContentBlockStop {
                content_block_index: 0,
            },
            StreamEvent::MessageStop {
                stop_reason: StopReason::EndTurn,
            },
        ]
    }

    /// A turn that requests a single tool call
    pub fn tool_turn(tool_use_id: &str, name: &str, input: &Value) -> Vec<StreamEvent> {
        vec![
            StreamEvent::MessageStart {
                role: Role::Assistant,
            },
            StreamEvent::ContentBlockStart {
                start: BlockStart::ToolUse(ToolUseStart {
                    tool_use_id: tool_use_id.to_string(),
                    name: name.to_string(),
                }),
                content_block_index: 0,
            },
            StreamEvent::ContentBlockDelta {
                delta: BlockDelta::ToolUse(ToolUseDelta {
                    input: input.to_string(),
                }),
                content_block_index: 0,
            },
            StreamEvent::ContentBlockStop {
                content_block_index: 0,
            },
            StreamEvent::MessageStop {
                stop_reason: StopReason::ToolUse,
            },
        ]
    }
}

#[async_trait]
impl Model for ScriptedModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn stream(&self, request: ModelRequest) -> Result<EventStream, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let turn = self
            .turns
            .lock()
            .ok()
            .and_then(|mut turns| turns.pop_front())
            .ok_or_else(|| LlmError::Request("scripted model has no turns left".to_string()))?;

        Ok(Box::pin(futures::stream::iter(turn.into_iter().map(Ok))))
    }
}

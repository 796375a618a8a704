use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LlmError;
use crate::types::{ContentBlock, Message, ReasoningContent, ReasoningText, Role, ToolUse};

/// Raw model stream event, shaped like the Bedrock ConverseStream output
/// (`{"messageStart": {"role": "assistant"}}`, `{"contentBlockDelta": {...}}`, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    MessageStart {
        role: Role,
    },
    ContentBlockStart {
        start: BlockStart,
        content_block_index: i32,
    },
    ContentBlockDelta {
        delta: BlockDelta,
        content_block_index: i32,
    },
    ContentBlockStop {
        content_block_index: i32,
    },
    MessageStop {
        stop_reason: StopReason,
    },
    Metadata {
        usage: Usage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metrics: Option<Metrics>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockStart {
    ToolUse(ToolUseStart),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUseStart {
    pub tool_use_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockDelta {
    Text(String),
    ToolUse(ToolUseDelta),
    ReasoningContent(ReasoningDelta),
}

/// Fragment of the tool input JSON document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseDelta {
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReasoningDelta {
    Text(String),
    Signature(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    GuardrailIntervened,
    ContentFiltered,
    #[serde(other)]
    Unknown,
}

impl StopReason {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "end_turn" => StopReason::EndTurn,
            "tool_use" => StopReason::ToolUse,
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            "guardrail_intervened" => StopReason::GuardrailIntervened,
            "content_filtered" => StopReason::ContentFiltered,
            _ => StopReason::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: i32,
    pub output_tokens: i32,
    pub total_tokens: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_write_input_tokens: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub latency_ms: i64,
}

enum PartialBlock {
    Text(String),
    ToolUse {
        tool_use_id: String,
        name: String,
        input: String,
    },
    Reasoning {
        text: String,
        signature: Option<String>,
    },
}

/// The message a model stream produced once it reached `messageStop`
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledMessage {
    pub message: Message,
    pub stop_reason: StopReason,
    pub usage: Option<Usage>,
}

/// Rebuilds a complete message out of stream events
#[derive(Default)]
pub struct MessageAssembler {
    blocks: BTreeMap<i32, PartialBlock>,
    stop_reason: Option<StopReason>,
    usage: Option<Usage>,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::MessageStart { .. } => {
                self.blocks.clear();
                self.stop_reason = None;
            }
            StreamEvent::ContentBlockStart {
                start: BlockStart::ToolUse(start),
                content_block_index,
            } => {
                self.blocks.insert(
                    *content_block_index,
                    PartialBlock::ToolUse {
                        tool_use_id: start.tool_use_id.clone(),
                        name: start.name.clone(),
                        input: String::new(),
                    },
                );
            }
            StreamEvent::ContentBlockDelta {
                delta,
                content_block_index,
            } => self.apply_delta(*content_block_index, delta),
            StreamEvent::ContentBlockStop { .. } => {}
            StreamEvent::MessageStop { stop_reason } => {
                self.stop_reason = Some(*stop_reason);
            }
            StreamEvent::Metadata { usage, .. } => {
                self.usage = Some(usage.clone());
            }
        }
    }

    fn apply_delta(&mut self, index: i32, delta: &BlockDelta) {
        match delta {
            BlockDelta::Text(text) => {
                let block = self
                    .blocks
                    .entry(index)
                    .or_insert_with(|| PartialBlock::Text(String::new()));
                if let PartialBlock::Text(buffer) = block {
                    buffer.push_str(text);
                }
            }
            BlockDelta::ToolUse(ToolUseDelta { input: fragment }) => {
                if let Some(PartialBlock::ToolUse { input, .. }) = self.blocks.get_mut(&index) {
                    input.push_str(fragment);
                }
            }
            BlockDelta::ReasoningContent(reasoning) => {
                let block = self.blocks.entry(index).or_insert_with(|| PartialBlock::Reasoning {
                    text: String::new(),
                    signature: None,
                });
                if let PartialBlock::Reasoning { text, signature } = block {
                    match reasoning {
                        ReasoningDelta::Text(fragment) => text.push_str(fragment),
                        ReasoningDelta::Signature(value) => *signature = Some(value.clone()),
                    }
                }
            }
        }
    }

    /// Returns `None` until a `messageStop` event has been applied
    pub fn finish(self) -> Result<Option<AssembledMessage>, LlmError> {
        let Some(stop_reason) = self.stop_reason else {
            return Ok(None);
        };

        let mut content = Vec::with_capacity(self.blocks.len());
        for (_, block) in self.blocks {
            match block {
                PartialBlock::Text(text) if text.is_empty() => {}
                PartialBlock::Text(text) => content.push(ContentBlock::Text(text)),
                PartialBlock::ToolUse {
                    tool_use_id,
                    name,
                    input,
                } => {
                    let input = if input.trim().is_empty() {
                        Value::Object(Default::default())
                    } else {
                        serde_json::from_str(&input).map_err(|e| {
                            LlmError::InvalidToolInput(format!("{}: {}", name, e))
                        })?
                    };
                    content.push(ContentBlock::ToolUse(ToolUse {
                        tool_use_id,
                        name,
                        input,
                    }));
                }
                PartialBlock::Reasoning { text, signature } => {
                    content.push(ContentBlock::ReasoningContent(ReasoningContent {
                        reasoning_text: ReasoningText { text, signature },
                    }));
                }
            }
        }

        Ok(Some(AssembledMessage {
            message: Message::new(Role::Assistant, content),
            stop_reason,
            usage: self.usage,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_delta(index: i32, text: &str) -> StreamEvent {
        StreamEvent::ContentBlockDelta {
            delta: BlockDelta::Text(text.to_string()),
            content_block_index: index,
        }
    }

    #[test]
    fn events_serialize_like_converse_stream() {
        let value = serde_json::to_value(text_delta(0, "Hel")).unwrap();
        assert_eq!(
            value,
            json!({"contentBlockDelta": {"delta": {"text": "Hel"}, "contentBlockIndex": 0}})
        );

        let stop = StreamEvent::MessageStop {
            stop_reason: StopReason::ToolUse,
        };
        assert_eq!(
            serde_json::to_value(stop).unwrap(),
            json!({"messageStop": {"stopReason": "tool_use"}})
        );
    }

    #[test]
    fn assembles_text_and_tool_use() {
        let mut assembler = MessageAssembler::new();
        let events = vec![
            StreamEvent::MessageStart {
                role: Role::Assistant,
            },
            text_delta(0, "Let me "),
            text_delta(0, "check."),
            StreamEvent::ContentBlockStop {
                content_block_index: 0,
            },
            StreamEvent::ContentBlockStart {
                start: BlockStart::ToolUse(ToolUseStart {
                    tool_use_id: "tu-1".to_string(),
                    name: "lookup".to_string(),
                }),
                content_block_index: 1,
            },
            StreamEvent::ContentBlockDelta {
                delta: BlockDelta::ToolUse(ToolUseDelta {
                    input: "{\"q\":".to_string(),
                }),
                content_block_index: 1,
            },
            StreamEvent::ContentBlockDelta {
                delta: BlockDelta::ToolUse(ToolUseDelta {
                    input: "\"rust\"}".to_string(),
                }),
                content_block_index: 1,
            },
            StreamEvent::MessageStop {
                stop_reason: StopReason::ToolUse,
            },
        ];
        for event in &events {
            assembler.apply(event);
        }

        let assembled = assembler.finish().unwrap().unwrap();
        assert_eq!(assembled.stop_reason, StopReason::ToolUse);
        assert_eq!(assembled.message.text(), "Let me check.");
        let tool_uses: Vec<_> = assembled.message.tool_uses().collect();
        assert_eq!(tool_uses.len(), 1);
        assert_eq!(tool_uses[0].input, json!({"q": "rust"}));
    }

    #[test]
    fn unfinished_stream_yields_nothing() {
        let mut assembler = MessageAssembler::new();
        assembler.apply(&text_delta(0, "partial"));
        assert!(assembler.finish().unwrap().is_none());
    }

    #[test]
    fn malformed_tool_input_is_an_error() {
        let mut assembler = MessageAssembler::new();
        assembler.apply(&StreamEvent::ContentBlockStart {
            start: BlockStart::ToolUse(ToolUseStart {
                tool_use_id: "tu-1".to_string(),
                name: "lookup".to_string(),
            }),
            content_block_index: 0,
        });
        assembler.apply(&StreamEvent::ContentBlockDelta {
            delta: BlockDelta::ToolUse(ToolUseDelta {
                input: "{not json".to_string(),
            }),
            content_block_index: 0,
        });
        assembler.apply(&StreamEvent::MessageStop {
            stop_reason: StopReason::ToolUse,
        });
        assert!(matches!(
            assembler.finish(),
            Err(LlmError::InvalidToolInput(_))
        ));
    }

    #[test]
    fn unknown_stop_reason_deserializes() {
        let event: StreamEvent =
            serde_json::from_value(json!({"messageStop": {"stopReason": "model_context_window_exceeded"}}))
                .unwrap();
        assert_eq!(
            event,
            StreamEvent::MessageStop {
                stop_reason: StopReason::Unknown
            }
        );
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_bedrockruntime::config::Region;
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::types::{
    self as bedrock, CachePointBlock, CachePointType, ContentBlockDelta, ContentBlockStart,
    ConversationRole, ConverseStreamOutput, DocumentBlock, DocumentFormat, DocumentSource,
    ImageBlock, ImageFormat, ImageSource, ReasoningContentBlock, ReasoningContentBlockDelta,
    ReasoningTextBlock, SystemContentBlock, ToolConfiguration, ToolInputSchema, ToolResultBlock,
    ToolResultContentBlock, ToolSpecification, ToolUseBlock, VideoBlock, VideoFormat, VideoSource,
};
use aws_sdk_bedrockruntime::Client;
use aws_smithy_types::{Document, Number};
use base64::Engine;
use serde_json::Value;
use tracing::debug;

use crate::error::LlmError;
use crate::model::{EventStream, Model, ModelFactory, ModelInfo, ModelRequest, ToolSpec};
use crate::stream::{
    BlockDelta, BlockStart, Metrics, ReasoningDelta, StopReason, StreamEvent, ToolUseDelta,
    ToolUseStart, Usage,
};
use crate::types::{
    BinarySource, ContentBlock, Message, Role, ToolResultContent, ToolResultStatus,
};

/// Bedrock Converse streaming model
pub struct BedrockModel {
    client: Client,
    model_id: String,
    prompt_cache: bool,
}

impl BedrockModel {
    pub fn new(client: Client, model_id: impl Into<String>) -> Self {
        Self {
            client,
            model_id: model_id.into(),
            prompt_cache: false,
        }
    }

    /// Build a client for the model's region from the default credential chain
    pub async fn from_env(info: &ModelInfo) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(info.region.clone()))
            .load()
            .await;
        Self::new(Client::new(&config), info.model_id.clone())
    }

    /// Add cache points after the system prompt and the tool list
    pub fn with_prompt_cache(mut self, enabled: bool) -> Self {
        self.prompt_cache = enabled;
        self
    }

    fn cache_point(&self) -> Result<CachePointBlock, LlmError> {
        CachePointBlock::builder()
            .r#type(CachePointType::Default)
            .build()
            .map_err(|e| LlmError::InvalidMessage(e.to_string()))
    }
}

#[async_trait]
impl Model for BedrockModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn stream(&self, request: ModelRequest) -> Result<EventStream, LlmError> {
        let messages = request
            .messages
            .iter()
            .map(to_bedrock_message)
            .collect::<Result<Vec<_>, _>>()?;

        let mut call = self
            .client
            .converse_stream()
            .model_id(&self.model_id)
            .set_messages(Some(messages));

        if let Some(system_prompt) = request.system_prompt {
            call = call.system(SystemContentBlock::Text(system_prompt));
            if self.prompt_cache {
                call = call.system(SystemContentBlock::CachePoint(self.cache_point()?));
            }
        }

        if !request.tools.is_empty() {
            let mut tools = request
                .tools
                .iter()
                .map(to_bedrock_tool)
                .collect::<Result<Vec<_>, _>>()?;
            if self.prompt_cache {
                tools.push(bedrock::Tool::CachePoint(self.cache_point()?));
            }
            let config = ToolConfiguration::builder()
                .set_tools(Some(tools))
                .build()
                .map_err(|e| LlmError::InvalidMessage(e.to_string()))?;
            call = call.tool_config(config);
        }

        debug!("converse_stream model={}", self.model_id);
        let output = call
            .send()
            .await
            .map_err(|e| LlmError::Request(DisplayErrorContext(&e).to_string()))?;

        let mut receiver = output.stream;
        let stream = async_stream::try_stream! {
            loop {
                let next = receiver
                    .recv()
                    .await
                    .map_err(|e| LlmError::Stream(DisplayErrorContext(&e).to_string()))?;
                let Some(output) = next else {
                    break;
                };
                if let Some(event) = from_bedrock_event(output) {
                    yield event;
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Creates a `BedrockModel` per request, in the requested region
#[derive(Debug, Clone, Default)]
pub struct BedrockModelFactory {
    pub prompt_cache: bool,
}

#[async_trait]
impl ModelFactory for BedrockModelFactory {
    async fn create(&self, info: &ModelInfo) -> Result<Arc<dyn Model>, LlmError> {
        let model = BedrockModel::from_env(info)
            .await
            .with_prompt_cache(self.prompt_cache);
        Ok(Arc::new(model))
    }
}

const DEFAULT_DOCUMENT_NAME: &str = "document";

fn invalid(e: impl std::fmt::Display) -> LlmError {
    LlmError::InvalidMessage(e.to_string())
}

fn decode_source(source: &BinarySource) -> Result<Blob, LlmError> {
    base64::engine::general_purpose::STANDARD
        .decode(&source.bytes)
        .map(Blob::new)
        .map_err(invalid)
}

pub(crate) fn to_bedrock_message(message: &Message) -> Result<bedrock::Message, LlmError> {
    let role = match message.role {
        Role::User => ConversationRole::User,
        Role::Assistant => ConversationRole::Assistant,
    };

    let mut content = Vec::with_capacity(message.content.len());
    for block in &message.content {
        if let Some(converted) = to_bedrock_block(block)? {
            content.push(converted);
        }
    }

    bedrock::Message::builder()
        .role(role)
        .set_content(Some(content))
        .build()
        .map_err(invalid)
}

/// Media blocks without a format or payload carry nothing to send and are skipped
fn to_bedrock_block(block: &ContentBlock) -> Result<Option<bedrock::ContentBlock>, LlmError> {
    let converted = match block {
        ContentBlock::Text(text) => bedrock::ContentBlock::Text(text.clone()),
        ContentBlock::Image(image) => {
            let (Some(format), Some(source)) = (&image.format, &image.source) else {
                debug!("skipping image block without format or source");
                return Ok(None);
            };
            bedrock::ContentBlock::Image(
                ImageBlock::builder()
                    .format(ImageFormat::from(format.as_str()))
                    .source(ImageSource::Bytes(decode_source(source)?))
                    .build()
                    .map_err(invalid)?,
            )
        }
        ContentBlock::Document(document) => {
            let (Some(format), Some(source)) = (&document.format, &document.source) else {
                debug!("skipping document block without format or source");
                return Ok(None);
            };
            bedrock::ContentBlock::Document(
                DocumentBlock::builder()
                    .format(DocumentFormat::from(format.as_str()))
                    .name(document.name.as_deref().unwrap_or(DEFAULT_DOCUMENT_NAME))
                    .source(DocumentSource::Bytes(decode_source(source)?))
                    .build()
                    .map_err(invalid)?,
            )
        }
        ContentBlock::Video(video) => {
            let (Some(format), Some(source)) = (&video.format, &video.source) else {
                debug!("skipping video block without format or source");
                return Ok(None);
            };
            bedrock::ContentBlock::Video(
                VideoBlock::builder()
                    .format(VideoFormat::from(format.as_str()))
                    .source(VideoSource::Bytes(decode_source(source)?))
                    .build()
                    .map_err(invalid)?,
            )
        }
        ContentBlock::ToolUse(tool_use) => bedrock::ContentBlock::ToolUse(
            ToolUseBlock::builder()
                .tool_use_id(&tool_use.tool_use_id)
                .name(&tool_use.name)
                .input(json_to_document(&tool_use.input))
                .build()
                .map_err(invalid)?,
        ),
        ContentBlock::ToolResult(result) => {
            let content = result
                .content
                .iter()
                .map(|item| match item {
                    ToolResultContent::Text(text) => ToolResultContentBlock::Text(text.clone()),
                    ToolResultContent::Json(value) => {
                        ToolResultContentBlock::Json(json_to_document(value))
                    }
                })
                .collect();
            let status = match result.status {
                ToolResultStatus::Success => bedrock::ToolResultStatus::Success,
                ToolResultStatus::Error => bedrock::ToolResultStatus::Error,
            };
            bedrock::ContentBlock::ToolResult(
                ToolResultBlock::builder()
                    .tool_use_id(&result.tool_use_id)
                    .set_content(Some(content))
                    .status(status)
                    .build()
                    .map_err(invalid)?,
            )
        }
        ContentBlock::ReasoningContent(reasoning) => {
            let text = ReasoningTextBlock::builder()
                .text(&reasoning.reasoning_text.text)
                .set_signature(reasoning.reasoning_text.signature.clone())
                .build()
                .map_err(invalid)?;
            bedrock::ContentBlock::ReasoningContent(ReasoningContentBlock::ReasoningText(text))
        }
    };
    Ok(Some(converted))
}

fn to_bedrock_tool(spec: &ToolSpec) -> Result<bedrock::Tool, LlmError> {
    let specification = ToolSpecification::builder()
        .name(&spec.name)
        .description(&spec.description)
        .input_schema(ToolInputSchema::Json(json_to_document(&spec.input_schema)))
        .build()
        .map_err(invalid)?;
    Ok(bedrock::Tool::ToolSpec(specification))
}

pub(crate) fn json_to_document(value: &Value) -> Document {
    match value {
        Value::Null => Document::Null,
        Value::Bool(b) => Document::Bool(*b),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Document::Number(Number::PosInt(u))
            } else if let Some(i) = n.as_i64() {
                Document::Number(Number::NegInt(i))
            } else {
                Document::Number(Number::Float(n.as_f64().unwrap_or_default()))
            }
        }
        Value::String(s) => Document::String(s.clone()),
        Value::Array(items) => Document::Array(items.iter().map(json_to_document).collect()),
        Value::Object(map) => Document::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), json_to_document(value)))
                .collect(),
        ),
    }
}

fn from_bedrock_event(output: ConverseStreamOutput) -> Option<StreamEvent> {
    match output {
        ConverseStreamOutput::MessageStart(event) => {
            let role = match event.role() {
                ConversationRole::Assistant => Role::Assistant,
                _ => Role::User,
            };
            Some(StreamEvent::MessageStart { role })
        }
        ConverseStreamOutput::ContentBlockStart(event) => match event.start() {
            Some(ContentBlockStart::ToolUse(start)) => Some(StreamEvent::ContentBlockStart {
                start: BlockStart::ToolUse(ToolUseStart {
                    tool_use_id: start.tool_use_id().to_string(),
                    name: start.name().to_string(),
                }),
                content_block_index: event.content_block_index(),
            }),
            _ => None,
        },
        ConverseStreamOutput::ContentBlockDelta(event) => {
            let delta = match event.delta()? {
                ContentBlockDelta::Text(text) => BlockDelta::Text(text.clone()),
                ContentBlockDelta::ToolUse(tool_use) => BlockDelta::ToolUse(ToolUseDelta {
                    input: tool_use.input().to_string(),
                }),
                ContentBlockDelta::ReasoningContent(ReasoningContentBlockDelta::Text(text)) => {
                    BlockDelta::ReasoningContent(ReasoningDelta::Text(text.clone()))
                }
                ContentBlockDelta::ReasoningContent(ReasoningContentBlockDelta::Signature(
                    signature,
                )) => BlockDelta::ReasoningContent(ReasoningDelta::Signature(signature.clone())),
                _ => return None,
            };
            Some(StreamEvent::ContentBlockDelta {
                delta,
                content_block_index: event.content_block_index(),
            })
        }
        ConverseStreamOutput::ContentBlockStop(event) => Some(StreamEvent::ContentBlockStop {
            content_block_index: event.content_block_index(),
        }),
        ConverseStreamOutput::MessageStop(event) => Some(StreamEvent::MessageStop {
            stop_reason: StopReason::from_wire(event.stop_reason().as_str()),
        }),
        ConverseStreamOutput::Metadata(event) => {
            let usage = event
                .usage()
                .map(|usage| Usage {
                    input_tokens: usage.input_tokens(),
                    output_tokens: usage.output_tokens(),
                    total_tokens: usage.total_tokens(),
                    cache_read_input_tokens: usage.cache_read_input_tokens(),
                    cache_write_input_tokens: usage.cache_write_input_tokens(),
                })
                .unwrap_or_default();
            let metrics = event.metrics().map(|metrics| Metrics {
                latency_ms: metrics.latency_ms(),
            });
            Some(StreamEvent::Metadata { usage, metrics })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ToolResult, ToolUse};
    use serde_json::json;

    #[test]
    fn converts_text_history() {
        let message = to_bedrock_message(&Message::user_text("hello")).unwrap();
        assert_eq!(message.role(), &ConversationRole::User);
        assert_eq!(message.content().len(), 1);
        assert_eq!(message.content()[0].as_text().unwrap(), "hello");
    }

    #[test]
    fn converts_tool_round() {
        let assistant = Message::new(
            Role::Assistant,
            vec![ContentBlock::ToolUse(ToolUse {
                tool_use_id: "tu-1".to_string(),
                name: "lookup".to_string(),
                input: json!({"q": "rust"}),
            })],
        );
        let user = Message::new(
            Role::User,
            vec![ContentBlock::ToolResult(ToolResult::success("tu-1", "found"))],
        );

        let converted = to_bedrock_message(&assistant).unwrap();
        let tool_use = converted.content()[0].as_tool_use().unwrap();
        assert_eq!(tool_use.name(), "lookup");

        let converted = to_bedrock_message(&user).unwrap();
        let result = converted.content()[0].as_tool_result().unwrap();
        assert_eq!(result.tool_use_id(), "tu-1");
        assert_eq!(result.status(), Some(&bedrock::ToolResultStatus::Success));
    }

    #[test]
    fn rejects_invalid_base64_image() {
        let message = Message::new(
            Role::User,
            vec![ContentBlock::Image(crate::types::ImageBlock {
                format: Some("png".to_string()),
                source: Some(BinarySource {
                    bytes: "***".to_string(),
                }),
            })],
        );
        assert!(matches!(
            to_bedrock_message(&message),
            Err(LlmError::InvalidMessage(_))
        ));
    }

    #[test]
    fn skips_media_without_payload() {
        let message = Message::new(
            Role::User,
            vec![
                ContentBlock::Text("see attached".to_string()),
                ContentBlock::Image(crate::types::ImageBlock {
                    format: Some("png".to_string()),
                    source: None,
                }),
                ContentBlock::Video(crate::types::VideoBlock {
                    format: None,
                    source: Some(BinarySource {
                        bytes: "aGk=".to_string(),
                    }),
                }),
                ContentBlock::Document(crate::types::DocumentBlock {
                    format: Some("md".to_string()),
                    name: None,
                    source: Some(BinarySource {
                        bytes: "aGk=".to_string(),
                    }),
                }),
            ],
        );

        let converted = to_bedrock_message(&message).unwrap();
        assert_eq!(converted.content().len(), 2);
        assert_eq!(converted.content()[0].as_text().unwrap(), "see attached");
        let document = converted.content()[1].as_document().unwrap();
        assert_eq!(document.name(), "document");
    }

    #[test]
    fn json_numbers_keep_their_sign() {
        let doc = json_to_document(&json!({"a": 1, "b": -2, "c": 0.5, "d": [true, null]}));
        let Document::Object(map) = doc else {
            panic!("expected object");
        };
        assert_eq!(map["a"], Document::Number(Number::PosInt(1)));
        assert_eq!(map["b"], Document::Number(Number::NegInt(-2)));
        assert_eq!(map["c"], Document::Number(Number::Float(0.5)));
        assert_eq!(
            map["d"],
            Document::Array(vec![Document::Bool(true), Document::Null])
        );
    }
}

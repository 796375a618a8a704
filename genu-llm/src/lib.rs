pub mod error;
pub mod model;
pub mod provider;
pub mod stream;
pub mod types;

pub use error::LlmError;
pub use model::{EventStream, Model, ModelFactory, ModelInfo, ModelRequest, ToolSpec};
pub use provider::{BedrockModel, BedrockModelFactory, ScriptedModel};
pub use stream::{
    AssembledMessage, BlockDelta, BlockStart, MessageAssembler, Metrics, ReasoningDelta,
    StopReason, StreamEvent, ToolUseDelta, ToolUseStart, Usage,
};
pub use types::{
    BinarySource, ContentBlock, DocumentBlock, ImageBlock, Message, Prompt, ReasoningContent,
    ReasoningText, Role, ToolResult, ToolResultContent, ToolResultStatus, ToolUse, VideoBlock,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Conversation role. System prompts travel separately, so there is no system role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single conversation message in Converse format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        Self { role, content }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentBlock::Text(text.into())])
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentBlock::Text(text.into())])
    }

    /// Concatenated text of all text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool use requests carried by this message
    pub fn tool_uses(&self) -> impl Iterator<Item = &ToolUse> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse(tool_use) => Some(tool_use),
            _ => None,
        })
    }
}

/// Content block. Each block is an object with exactly one key naming its kind,
/// e.g. `{"text": "hi"}` or `{"toolUse": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentBlock {
    Text(String),
    Image(ImageBlock),
    Document(DocumentBlock),
    Video(VideoBlock),
    ToolUse(ToolUse),
    ToolResult(ToolResult),
    ReasoningContent(ReasoningContent),
}

/// Base64 encoded payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinarySource {
    pub bytes: String,
}

/// Media blocks from the web client may leave out format or payload.
/// Such blocks are accepted and skipped when the conversation is sent to a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBlock {
    /// png | jpeg | gif | webp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<BinarySource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentBlock {
    /// pdf | csv | doc | docx | xls | xlsx | html | txt | md
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<BinarySource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoBlock {
    /// flv | mkv | mov | mpeg | mpg | mp4 | three_gp | webm | wmv
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<BinarySource>,
}

/// What the user asks in one turn: plain text, or content blocks so files
/// can travel with the text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prompt {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Default for Prompt {
    fn default() -> Self {
        Prompt::Text(String::new())
    }
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Prompt::Text(text.to_string())
    }
}

impl From<String> for Prompt {
    fn from(text: String) -> Self {
        Prompt::Text(text)
    }
}

impl From<Vec<ContentBlock>> for Prompt {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        Prompt::Blocks(blocks)
    }
}

impl Prompt {
    /// True when there is nothing to send: empty text, or only empty text blocks
    pub fn is_empty(&self) -> bool {
        match self {
            Prompt::Text(text) => text.is_empty(),
            Prompt::Blocks(blocks) => blocks
                .iter()
                .all(|block| matches!(block, ContentBlock::Text(text) if text.is_empty())),
        }
    }

    /// Concatenated text, ignoring attachments
    pub fn text(&self) -> String {
        match self {
            Prompt::Text(text) => text.clone(),
            Prompt::Blocks(blocks) => Message::new(Role::User, blocks.clone()).text(),
        }
    }

    /// The user message carrying this prompt, None when it is empty
    pub fn into_message(self) -> Option<Message> {
        if self.is_empty() {
            return None;
        }
        Some(match self {
            Prompt::Text(text) => Message::user_text(text),
            Prompt::Blocks(blocks) => Message::new(Role::User, blocks),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUse {
    pub tool_use_id: String,
    pub name: String,
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolResultStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub tool_use_id: String,
    pub status: ToolResultStatus,
    pub content: Vec<ToolResultContent>,
}

impl ToolResult {
    pub fn success(tool_use_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            status: ToolResultStatus::Success,
            content: vec![ToolResultContent::Text(text.into())],
        }
    }

    pub fn error(tool_use_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            status: ToolResultStatus::Error,
            content: vec![ToolResultContent::Text(text.into())],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolResultContent {
    Text(String),
    Json(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningContent {
    pub reasoning_text: ReasoningText,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningText {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_blocks_use_single_key_objects() {
        let message = Message::new(
            Role::Assistant,
            vec![
                ContentBlock::Text("hello".to_string()),
                ContentBlock::ToolUse(ToolUse {
                    tool_use_id: "t1".to_string(),
                    name: "echo".to_string(),
                    input: json!({"x": 1}),
                }),
            ],
        );

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "assistant",
                "content": [
                    {"text": "hello"},
                    {"toolUse": {"toolUseId": "t1", "name": "echo", "input": {"x": 1}}}
                ]
            })
        );
    }

    #[test]
    fn parses_frontend_history() {
        let raw = json!([
            {"role": "user", "content": [{"text": "hi"}]},
            {"role": "assistant", "content": [{"text": "hello"}, {"text": " there"}]}
        ]);
        let messages: Vec<Message> = serde_json::from_value(raw).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text(), "hello there");
    }

    #[test]
    fn rejects_unknown_block_kind() {
        let raw = json!({"role": "user", "content": [{"hologram": {}}]});
        assert!(serde_json::from_value::<Message>(raw).is_err());
    }

    #[test]
    fn accepts_partial_media_blocks() {
        let raw = json!({"role": "user", "content": [
            {"text": "look"},
            {"image": {}},
            {"image": {"format": "png", "source": {"bytes": "aGk="}}},
            {"document": {"name": "notes.md"}},
            {"video": {"format": "mp4"}}
        ]});
        let message: Message = serde_json::from_value(raw).unwrap();
        assert_eq!(message.content.len(), 5);
        assert_eq!(
            message.content[1],
            ContentBlock::Image(ImageBlock {
                format: None,
                source: None
            })
        );
        assert!(matches!(&message.content[4], ContentBlock::Video(v) if v.format.as_deref() == Some("mp4")));
    }

    #[test]
    fn prompt_is_text_or_blocks() {
        let text: Prompt = serde_json::from_value(json!("hi")).unwrap();
        assert_eq!(text, Prompt::Text("hi".to_string()));

        let blocks: Prompt =
            serde_json::from_value(json!([{"text": "hi"}, {"image": {"format": "png"}}])).unwrap();
        assert_eq!(blocks.text(), "hi");
        let message = blocks.into_message().unwrap();
        assert_eq!(message.role, Role::User);
        assert_eq!(message.content.len(), 2);
    }

    #[test]
    fn empty_prompts_have_no_message() {
        assert!(Prompt::default().into_message().is_none());
        assert!(Prompt::Blocks(vec![]).into_message().is_none());
        assert!(Prompt::Blocks(vec![ContentBlock::Text(String::new())])
            .into_message()
            .is_none());
        assert!(Prompt::from("x").into_message().is_some());
    }

    #[test]
    fn tool_result_status_is_lowercase() {
        let value = serde_json::to_value(ToolResult::error("t1", "boom")).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["content"][0]["text"], "boom");
    }
}

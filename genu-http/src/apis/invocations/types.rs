use genu_llm::{Message, ModelInfo, Prompt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_MODEL_ID: &str = "us.anthropic.claude-3-5-sonnet-20241022-v2:0";

pub const EMPTY_RESPONSE_TEXT: &str =
    "I apologize, but I couldn't generate a response. Please try again.";

const ERROR_PREFIX: &str = "An error occurred while processing your request: ";

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

/// Model selection: either a bare model id or `{modelId, region}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ModelSelector {
    Id(String),
    Info {
        #[serde(rename = "modelId", default = "default_model_id")]
        model_id: String,
        #[serde(default)]
        region: Option<String>,
    },
}

impl Default for ModelSelector {
    fn default() -> Self {
        ModelSelector::Info {
            model_id: default_model_id(),
            region: None,
        }
    }
}

impl ModelSelector {
    /// Fill in the region from `default_region` when the request names none
    pub fn resolve(&self, default_region: &str) -> ModelInfo {
        match self {
            ModelSelector::Id(model_id) => ModelInfo {
                model_id: model_id.clone(),
                region: default_region.to_string(),
            },
            ModelSelector::Info { model_id, region } => ModelInfo {
                model_id: model_id.clone(),
                region: region.clone().unwrap_or_else(|| default_region.to_string()),
            },
        }
    }
}

/// Body of `POST /invocations`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvocationRequest {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, alias = "systemPrompt")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub prompt: Prompt,
    #[serde(default)]
    pub model: ModelSelector,
}

impl InvocationRequest {
    /// Parse a request body, unwrapping the `{"input": {...}}` envelope when present
    pub fn from_body(body: Value) -> Result<Self, serde_json::Error> {
        match body {
            Value::Object(mut map) if map.get("input").is_some_and(Value::is_object) => {
                let input = map.remove("input").unwrap_or_default();
                serde_json::from_value(input)
            }
            other => serde_json::from_value(other),
        }
    }
}

/// Final-message response: `{"message": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResponse {
    pub message: Message,
}

impl InvocationResponse {
    pub fn new(message: Message) -> Self {
        Self { message }
    }

    pub fn empty() -> Self {
        Self::new(Message::assistant_text(EMPTY_RESPONSE_TEXT))
    }

    pub fn error(error: &str) -> Self {
        Self::new(Message::assistant_text(error_text(error)))
    }
}

pub fn error_text(error: &str) -> String {
    format!("{}{}", ERROR_PREFIX, error)
}

pub mod mcp;
pub mod upload;

pub use mcp::{load_mcp_tools, McpConfig, McpServerConfig};
pub use upload::{UploadFileTool, UploadTarget, UPLOAD_TOOL_NAME};

use std::sync::Arc;

use async_trait::async_trait;
use genu_llm::{ToolResult, ToolResultContent, ToolResultStatus, ToolSpec, ToolUse};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0}")]
    Execution(String),
}

/// A callable exposed to the model
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> String;

    fn description(&self) -> String;

    /// JSON schema of the tool input
    fn input_schema(&self) -> Value;

    async fn invoke(&self, input: Value) -> Result<Vec<ToolResultContent>, ToolError>;
}

/// Tools available to one agent, keyed by name
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        if let Some(existing) = self.tools.iter_mut().find(|t| t.name() == name) {
            warn!("tool {} registered twice, keeping the latest", name);
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    pub fn extend(&mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) {
        for tool in tools {
            self.register(tool);
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|tool| ToolSpec {
                name: tool.name(),
                description: tool.description(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    /// Run a tool call. Failures are reported back to the model as error results.
    pub async fn run(&self, tool_use: &ToolUse) -> ToolResult {
        let Some(tool) = self.tools.iter().find(|t| t.name() == tool_use.name) else {
            warn!("model requested unknown tool {}", tool_use.name);
            return ToolResult::error(
                &tool_use.tool_use_id,
                format!("Unknown tool: {}", tool_use.name),
            );
        };

        debug!("invoking tool {} ({})", tool_use.name, tool_use.tool_use_id);
        match tool.invoke(tool_use.input.clone()).await {
            Ok(content) => ToolResult {
                tool_use_id: tool_use.tool_use_id.clone(),
                status: ToolResultStatus::Success,
                content,
            },
            Err(e) => {
                warn!("tool {} failed: {}", tool_use.name, e);
                ToolResult::error(&tool_use.tool_use_id, format!("Error: {}", e))
            }
        }
    }
}

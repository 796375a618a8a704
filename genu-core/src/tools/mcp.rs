use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use genu_llm::ToolResultContent;
use rmcp::model::{CallToolRequestParam, RawContent};
use rmcp::service::RunningService;
use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
use rmcp::{RoleClient, ServiceExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use tracing::{error, info, warn};

use super::{Tool, ToolError};

/// Contents of `mcp.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct McpConfig {
    #[serde(rename = "mcpServers")]
    pub mcp_servers: Option<BTreeMap<String, McpServerConfig>>,
}

/// A stdio MCP server
#[derive(Debug, Clone, Deserialize)]
pub struct McpServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl McpConfig {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Environment every MCP server process starts with: writable tool caches under /tmp
/// plus whatever AWS credentials the runtime itself holds.
pub fn server_base_env() -> HashMap<String, String> {
    let mut env: HashMap<String, String> = [
        ("UV_NO_CACHE", "1"),
        ("UV_PYTHON", "/usr/local/bin/python"),
        ("UV_TOOL_DIR", "/tmp/.uv/tool"),
        ("UV_TOOL_BIN_DIR", "/tmp/.uv/tool/bin"),
        ("UV_PROJECT_ENVIRONMENT", "/tmp/.venv"),
        ("npm_config_cache", "/tmp/.npm"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    for key in ["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY", "AWS_SESSION_TOKEN"] {
        if let Ok(value) = std::env::var(key) {
            env.insert(key.to_string(), value);
        }
    }
    env.insert(
        "AWS_REGION".to_string(),
        std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
    );
    env
}

type McpClient = RunningService<RoleClient, ()>;

/// One tool exposed by a running MCP server
struct McpTool {
    server: String,
    client: Arc<McpClient>,
    tool: rmcp::model::Tool,
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> String {
        self.tool.name.to_string()
    }

    fn description(&self) -> String {
        self.tool.description.as_deref().unwrap_or_default().to_string()
    }

    fn input_schema(&self) -> Value {
        Value::Object(self.tool.input_schema.as_ref().clone())
    }

    async fn invoke(&self, input: Value) -> Result<Vec<ToolResultContent>, ToolError> {
        let arguments = match input {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(ToolError::InvalidInput(format!(
                    "expected an object, got {}",
                    other
                )))
            }
        };

        let result = self
            .client
            .call_tool(CallToolRequestParam {
                name: self.tool.name.clone(),
                arguments,
            })
            .await
            .map_err(|e| ToolError::Execution(format!("{} ({}): {}", self.tool.name, self.server, e)))?;

        let content: Vec<ToolResultContent> = result
            .content
            .into_iter()
            .map(|item| match item.raw {
                RawContent::Text(text) => ToolResultContent::Text(text.text),
                other => ToolResultContent::Json(serde_json::to_value(&other).unwrap_or(Value::Null)),
            })
            .collect();

        if result.is_error.unwrap_or(false) {
            let message = content
                .iter()
                .filter_map(|c| match c {
                    ToolResultContent::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n");
            return Err(ToolError::Execution(message));
        }
        Ok(content)
    }
}

async fn start_server(
    name: &str,
    server: &McpServerConfig,
    base_env: &HashMap<String, String>,
) -> Result<Vec<Arc<dyn Tool>>, String> {
    let mut env = base_env.clone();
    env.extend(server.env.clone());

    let transport = TokioChildProcess::new(Command::new(&server.command).configure(|cmd| {
        cmd.args(&server.args).envs(&env);
    }))
    .map_err(|e| e.to_string())?;

    let client = ().serve(transport).await.map_err(|e| e.to_string())?;
    let tools = client.list_all_tools().await.map_err(|e| e.to_string())?;
    let client = Arc::new(client);

    Ok(tools
        .into_iter()
        .map(|tool| {
            Arc::new(McpTool {
                server: name.to_string(),
                client: client.clone(),
                tool,
            }) as Arc<dyn Tool>
        })
        .collect())
}

/// Start every server listed in the MCP config file and collect their tools.
/// Never fails: a missing file or a broken server is logged and skipped.
pub async fn load_mcp_tools(path: &Path) -> Vec<Arc<dyn Tool>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) => {
            error!("Error loading MCP tools from {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let config = match McpConfig::parse(&raw) {
        Ok(config) => config,
        Err(e) => {
            error!("Error loading MCP tools from {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let Some(servers) = config.mcp_servers else {
        warn!("mcpServers not defined in {}", path.display());
        return Vec::new();
    };

    let base_env = server_base_env();
    let mut tools = Vec::new();
    for (name, server) in &servers {
        match start_server(name, server, &base_env).await {
            Ok(server_tools) => {
                info!("MCP server {} exposes {} tools", name, server_tools.len());
                tools.extend(server_tools);
            }
            Err(e) => error!("Error creating MCP client for {}: {}", name, e),
        }
    }

    info!("Loaded {} MCP tools", tools.len());
    tools
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_list() {
        let config = McpConfig::parse(
            r#"{
                "mcpServers": {
                    "time": {"command": "uvx", "args": ["mcp-server-time"]},
                    "fetch": {"command": "uvx", "args": ["mcp-server-fetch"], "env": {"A": "1"}}
                }
            }"#,
        )
        .unwrap();

        let servers = config.mcp_servers.unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers["time"].args, vec!["mcp-server-time"]);
        assert_eq!(servers["fetch"].env["A"], "1");
    }

    #[test]
    fn missing_server_section_is_none() {
        let config = McpConfig::parse("{}").unwrap();
        assert!(config.mcp_servers.is_none());
    }

    #[test]
    fn base_env_points_caches_at_tmp() {
        let env = server_base_env();
        assert_eq!(env["UV_TOOL_DIR"], "/tmp/.uv/tool");
        assert_eq!(env["npm_config_cache"], "/tmp/.npm");
        assert!(env.contains_key("AWS_REGION"));
    }

    #[tokio::test]
    async fn unreadable_config_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_mcp_tools(&dir.path().join("mcp.json")).await.is_empty());

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_mcp_tools(&path).await.is_empty());

        let path = dir.path().join("empty.json");
        std::fs::write(&path, r#"{"other": 1}"#).unwrap();
        assert!(load_mcp_tools(&path).await.is_empty());
    }
}

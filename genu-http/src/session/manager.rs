use std::path::PathBuf;
use std::sync::Arc;

use genu_core::agent::DEFAULT_MAX_CYCLES;
use genu_core::prompt::compose_system_prompt;
use genu_core::tools::{load_mcp_tools, Tool, ToolRegistry, UploadFileTool, UploadTarget};
use genu_core::{Agent, ObjectStore, SessionId, Workspace};
use genu_llm::ModelFactory;
use tokio::sync::OnceCell;
use tracing::info;

use super::{InvocationError, InvocationLifecycle, InvocationSession};
use crate::apis::invocations::InvocationRequest;

/// Configuration for the invocation manager
#[derive(Clone, Debug)]
pub struct InvocationManagerConfig {
    /// Directory under which per-invocation workspaces are created
    pub workspace_root: PathBuf,
    /// Region used when the request's model selection names none
    pub default_region: String,
    /// `mcp.json` to load MCP tools from (None = no MCP tools)
    pub mcp_config: Option<PathBuf>,
    /// Upper bound on model calls per invocation
    pub max_cycles: usize,
}

impl Default for InvocationManagerConfig {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir().join("genu-ws"),
            default_region: "us-east-1".to_string(),
            mcp_config: None,
            max_cycles: DEFAULT_MAX_CYCLES,
        }
    }
}

/// Invocation manager - turns requests into running agents
/// Owns everything shared between invocations: the model factory, the upload bucket and the MCP tool set
pub struct InvocationManager {
    config: InvocationManagerConfig,
    model_factory: Arc<dyn ModelFactory>,
    file_store: Option<Arc<dyn ObjectStore>>,
    mcp_tools: OnceCell<Vec<Arc<dyn Tool>>>,
}

impl InvocationManager {
    pub fn new(
        config: InvocationManagerConfig,
        model_factory: Arc<dyn ModelFactory>,
        file_store: Option<Arc<dyn ObjectStore>>,
    ) -> Self {
        Self {
            config,
            model_factory,
            file_store,
            mcp_tools: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &InvocationManagerConfig {
        &self.config
    }

    /// MCP tools are loaded once, on the first invocation, and shared afterwards
    async fn mcp_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.mcp_tools
            .get_or_init(|| async {
                match &self.config.mcp_config {
                    Some(path) => load_mcp_tools(path).await,
                    None => Vec::new(),
                }
            })
            .await
            .clone()
    }

    /// Prepare the workspace and agent for one invocation and start it
    pub async fn start(
        &self,
        http_request_id: &str,
        session_id: &SessionId,
        request: InvocationRequest,
    ) -> Result<InvocationSession, InvocationError> {
        let workspace = Workspace::create(&self.config.workspace_root, session_id)?;

        let model_info = request.model.resolve(&self.config.default_region);
        let system_prompt =
            compose_system_prompt(request.system_prompt.as_deref(), workspace.path());

        info!(
            "[{}] - [{}] Using model: {} in region: {}",
            http_request_id, session_id, model_info.model_id, model_info.region
        );
        info!(
            "[{}] - [{}] User prompt: {}...",
            http_request_id,
            session_id,
            request.prompt.text().chars().take(100).collect::<String>()
        );
        info!(
            "[{}] - [{}] History messages count: {}",
            http_request_id,
            session_id,
            request.messages.len()
        );

        let mut tools = ToolRegistry::new();
        tools.extend(self.mcp_tools().await);
        let upload_target = self.file_store.clone().map(|store| UploadTarget {
            store,
            region: self.config.default_region.clone(),
        });
        tools.register(Arc::new(UploadFileTool::new(
            upload_target,
            session_id.clone(),
            workspace.path().to_path_buf(),
        )));

        let model = self.model_factory.create(&model_info).await?;

        let agent = Agent::builder(model)
            .system_prompt(system_prompt)
            .messages(request.messages)
            .tools(tools)
            .max_cycles(self.config.max_cycles)
            .build();

        info!("[{}] - [{}] Starting response generation", http_request_id, session_id);
        let events = agent.stream(request.prompt);
        let lifecycle =
            InvocationLifecycle::new(workspace, http_request_id.to_string(), session_id.clone());

        Ok(InvocationSession::new(events, lifecycle))
    }
}

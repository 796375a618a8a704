use axum::{
    routing::{get, post},
    Router,
};
use genu_core::ObjectStore;
use genu_llm::ModelFactory;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::apis;
use crate::session::{InvocationManager, InvocationManagerConfig};

/// How `/invocations` answers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResponseMode {
    /// One JSON body holding the last assistant message
    #[default]
    FinalMessage,
    /// Every model stream event as a JSON line
    EventStream,
}

/// Configuration for the agent runtime server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0:8080")
    pub address: String,
    pub mode: ResponseMode,
    /// Invocation manager configuration
    pub invocations: InvocationManagerConfig,
}

impl ServerConfig {
    /// Create a new server config with the given address and default invocation settings
    pub fn new(address: String) -> Self {
        Self {
            address,
            mode: ResponseMode::default(),
            invocations: InvocationManagerConfig::default(),
        }
    }

    pub fn with_mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    /// Region used when a request does not name one
    pub fn with_region(mut self, region: String) -> Self {
        self.invocations.default_region = region;
        self
    }

    pub fn with_mcp_config(mut self, path: Option<PathBuf>) -> Self {
        self.invocations.mcp_config = path;
        self
    }

    pub fn with_workspace_root(mut self, root: PathBuf) -> Self {
        self.invocations.workspace_root = root;
        self
    }

    pub fn with_max_cycles(mut self, max_cycles: usize) -> Self {
        self.invocations.max_cycles = max_cycles.max(1);
        self
    }
}

/// Agent runtime state holding the invocation manager
#[derive(Clone)]
pub struct ServerState {
    pub invocations: Arc<InvocationManager>,
    pub mode: ResponseMode,
}

/// Static proxy state holding the bucket
#[derive(Clone)]
pub struct StaticState {
    pub store: Arc<dyn ObjectStore>,
}

pub fn agent_router(state: ServerState) -> Router {
    Router::new()
        .route("/ping", get(apis::invocations::handle_ping))
        .route("/invocations", post(apis::invocations::handle_invocation))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn static_router(store: Arc<dyn ObjectStore>) -> Router {
    Router::new()
        .route("/healthcheck", get(apis::objects::handle_healthcheck))
        .route("/", get(apis::objects::handle_get_object))
        .route("/{*path}", get(apis::objects::handle_get_object))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(StaticState { store })
}

/// Start the agent runtime server
pub async fn start_agent_server(
    config: ServerConfig,
    model_factory: Arc<dyn ModelFactory>,
    file_store: Option<Arc<dyn ObjectStore>>,
) -> anyhow::Result<()> {
    println!("✓ Invocation manager initialized");
    println!("  Default region: \x1b[1m{}\x1b[0m", config.invocations.default_region);
    println!(
        "  Workspace root: \x1b[1m{}\x1b[0m",
        config.invocations.workspace_root.display()
    );
    match &file_store {
        Some(store) => println!("  File bucket: \x1b[1m{}\x1b[0m", store.bucket()),
        None => println!("  File bucket: \x1b[1mnone\x1b[0m (uploads skipped)"),
    }
    if let Some(path) = &config.invocations.mcp_config {
        println!("  MCP config: \x1b[1m{}\x1b[0m", path.display());
    }
    println!(
        "  Response mode: \x1b[1m{}\x1b[0m",
        match config.mode {
            ResponseMode::FinalMessage => "final message",
            ResponseMode::EventStream => "event stream",
        }
    );
    println!();

    let manager = InvocationManager::new(config.invocations.clone(), model_factory, file_store);
    let app = agent_router(ServerState {
        invocations: Arc::new(manager),
        mode: config.mode,
    });

    let listener = tokio::net::TcpListener::bind(&config.address).await?;

    println!("Server starting on \x1b[1mhttp://{}\x1b[0m", config.address);
    println!("\nAvailable endpoints:");
    println!("  \x1b[1mGET  /ping\x1b[0m          - Health check");
    println!("  \x1b[1mPOST /invocations\x1b[0m   - Run the agent on a prompt");
    println!("\nPress Ctrl+C to stop\n");

    info!("Agent runtime listening on {}", config.address);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Start the static object-store proxy
pub async fn start_static_server(
    address: String,
    store: Arc<dyn ObjectStore>,
) -> anyhow::Result<()> {
    let bucket = store.bucket().to_string();
    let app = static_router(store);

    let listener = tokio::net::TcpListener::bind(&address).await?;

    println!("Serving bucket \x1b[1m{}\x1b[0m on \x1b[1mhttp://{}\x1b[0m", bucket, address);
    println!("\nAvailable endpoints:");
    println!("  \x1b[1mGET /healthcheck\x1b[0m   - Health check");
    println!("  \x1b[1mGET /{{key}}\x1b[0m         - Object by key, falling back to index.html");
    println!("\nPress Ctrl+C to stop\n");

    info!("Static proxy listening on {}", address);

    axum::serve(listener, app).await?;
    Ok(())
}

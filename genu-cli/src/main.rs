mod locale;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use genu_core::{ObjectStore, S3ObjectStore};
use genu_http::{ResponseMode, ServerConfig};
use genu_llm::BedrockModelFactory;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "genu")]
#[command(version)]
#[command(about = "Generative AI use-case runtime: agent server, static proxy and locale tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent runtime (/ping, /invocations)
    ServeAgent {
        /// Address to bind to
        #[arg(long, default_value = "0.0.0.0:8080")]
        address: String,

        /// Relay every model stream event as a JSON line instead of returning the final message
        #[arg(long)]
        stream: bool,

        /// Bucket receiving files the agent uploads (uploads are skipped without it)
        #[arg(long, env = "FILE_BUCKET")]
        file_bucket: Option<String>,

        /// Region used when a request does not name one
        #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
        region: String,

        /// MCP server configuration
        #[arg(long, default_value = "mcp.json")]
        mcp_config: PathBuf,

        /// Directory holding per-invocation workspaces
        #[arg(long)]
        workspace_root: Option<PathBuf>,

        /// Upper bound on model calls per invocation
        #[arg(long, default_value_t = genu_core::agent::DEFAULT_MAX_CYCLES)]
        max_cycles: usize,

        /// Mark prompt cache points in Bedrock requests
        #[arg(long)]
        prompt_cache: bool,
    },
    /// Serve objects of a bucket, falling back to index.html
    ServeStatic {
        /// Bucket to serve
        #[arg(long, env = "BUCKET_NAME")]
        bucket: String,

        /// Address to bind to
        #[arg(long, default_value = "0.0.0.0:8080")]
        address: String,
    },
    /// Compare locale files
    Locale {
        #[command(subcommand)]
        command: LocaleCommand,
    },
}

#[derive(Subcommand)]
enum LocaleCommand {
    /// Report how much of the base locale the target translates
    Check { base: PathBuf, target: PathBuf },
    /// List keys only one of the two locales has
    Extra { base: PathBuf, target: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ServeAgent {
            address,
            stream,
            file_bucket,
            region,
            mcp_config,
            workspace_root,
            max_cycles,
            prompt_cache,
        } => {
            let mode = if stream {
                ResponseMode::EventStream
            } else {
                ResponseMode::FinalMessage
            };
            let mut config = ServerConfig::new(address)
                .with_mode(mode)
                .with_region(region.clone())
                .with_mcp_config(Some(mcp_config))
                .with_max_cycles(max_cycles);
            if let Some(root) = workspace_root {
                config = config.with_workspace_root(root);
            }

            let file_store = match file_bucket {
                Some(bucket) => {
                    let store = S3ObjectStore::from_env(bucket, Some(region)).await;
                    Some(Arc::new(store) as Arc<dyn ObjectStore>)
                }
                None => None,
            };
            let factory = Arc::new(BedrockModelFactory { prompt_cache });

            genu_http::start_agent_server(config, factory, file_store).await
        }
        Commands::ServeStatic { bucket, address } => {
            info!("Serving bucket {}", bucket);
            let store = S3ObjectStore::from_env(bucket, None).await;
            genu_http::start_static_server(address, Arc::new(store)).await
        }
        Commands::Locale { command } => {
            let mut stdout = std::io::stdout().lock();
            match command {
                LocaleCommand::Check { base, target } => {
                    let diff = locale::KeyDiff::between(&locale::load(&base)?, &locale::load(&target)?);
                    locale::write_check_report(&diff, &mut stdout)?;
                }
                LocaleCommand::Extra { base, target } => {
                    let diff = locale::KeyDiff::between(&locale::load(&base)?, &locale::load(&target)?);
                    locale::write_extra_report(&diff, &mut stdout)?;
                }
            }
            Ok(())
        }
    }
}

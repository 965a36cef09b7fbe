//! flowhub MCP server
//!
//! Usage:
//!   flowhub-mcp [--config <file>] [--store <hub.json>]
//!
//! The server communicates over stdio using JSON-RPC 2.0.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use flowhub_core::{Config, FlowNaming, JsonFileStore};
use flowhub_mcp::{build_dispatcher, McpServer};

#[derive(Parser)]
#[command(name = "flowhub-mcp")]
#[command(about = "MCP server exposing home automation flows as tools")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $FLOWHUB_CONFIG or the user config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Hub snapshot to serve, overriding the configured store
    #[arg(long)]
    store: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr (stdout is for MCP protocol)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::resolve(cli.config.as_deref())?.with_store_override(cli.store);

    tracing::info!(store = %config.store_path.display(), "Starting flowhub MCP server");

    let store = JsonFileStore::new(&config.store_path, &config.trigger_log)
        .with_naming(FlowNaming::new(config.flow_prefix.clone()));
    let dispatcher = build_dispatcher(Arc::new(store), &config)?;

    McpServer::new(Arc::new(dispatcher)).run().await?;

    Ok(())
}

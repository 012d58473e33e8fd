//! toolwire server
//!
//! Serves the sample tools over line-delimited JSON-RPC on stdio.

use clap::Parser;
use tracing::info;

use toolwire::config::Config;
use toolwire::error::Result;
use toolwire::logging::init_logging;
use toolwire::mcp::{Dispatcher, McpServer};
use toolwire::sample_tools;

/// toolwire server
#[derive(Parser)]
#[command(name = "toolwire-server")]
#[command(author, version, about = "Expose typed tools over MCP-style JSON-RPC on stdio")]
struct Cli {
    /// Server name reported to clients
    #[arg(long)]
    name: Option<String>,

    /// Server version reported to clients
    #[arg(long)]
    server_version: Option<String>,

    /// Protocol version reported during initialize
    #[arg(long)]
    protocol_version: Option<String>,

    /// Log filter for stderr diagnostics (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::new()?.with_overrides(
        cli.name,
        cli.server_version,
        cli.protocol_version,
        cli.log_level,
    )?;

    init_logging(&config.log_level);

    let registry = sample_tools::registry()?;
    let dispatcher = Dispatcher::new(config, registry).with_initializer(|params| async move {
        let client = params
            .as_ref()
            .and_then(|p| p.get("clientInfo"))
            .and_then(|c| c.get("name"))
            .and_then(|n| n.as_str())
            .unwrap_or("unknown")
            .to_string();
        info!(client = %client, "session ready");
        anyhow::Ok(())
    });

    let server = McpServer::new(dispatcher);
    server.run_stdio().await?;

    info!("server stopped");
    Ok(())
}

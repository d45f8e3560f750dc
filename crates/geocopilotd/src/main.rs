//! GeoCopilot Daemon - location and route narration over HTTP

use anyhow::{Context, Result};
use clap::Parser;
use geocopilot_common::Config;
use geocopilotd::server::{self, AppState};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "geocopilotd")]
#[command(about = "GeoCopilot travel assistant daemon", version)]
struct Args {
    /// JSON config with prompt rules (defaults to $CONFIG_FILE, then config/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, overrides GEOCOPILOT_HOST
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overrides GEOCOPILOT_PORT
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("GeoCopilot Daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(args.config.as_deref());
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    info!(
        "  Rules: {} base, {} chat, {} route; schema mode {}",
        config.prompts.base.len(),
        config.prompts.chat.len(),
        config.prompts.route.len(),
        if config.llm.schema_mode { "on" } else { "off" }
    );

    let state = AppState::from_config(&config).context("Failed to initialize services")?;
    server::run(state, &config.server.bind_addr()).await
}

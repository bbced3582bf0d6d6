//! Meridian server CLI
//!
//! Starts the HTTP server for multi-source fetching, fusion and lineage.

use anyhow::Context;
use clap::Parser;
use meridian_server::{config::ServerConfig, start_server};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Meridian multi-source data fusion server
#[derive(Debug, Parser)]
#[command(name = "meridian")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "MERIDIAN_CONFIG")]
    config: Option<PathBuf>,

    /// Override the bind address (host:port)
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the health refresh interval in seconds (0 disables it)
    #[arg(long)]
    health_interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => {
            tracing::warn!("No config file specified, using default test configuration");
            ServerConfig::default_test_config()
        }
    };

    if let Some(bind) = &cli.bind {
        config.server.set_bind(bind)?;
    }
    if let Some(secs) = cli.health_interval_secs {
        config.server.health_interval_secs = Some(secs);
    }

    start_server(config).await?;
    Ok(())
}

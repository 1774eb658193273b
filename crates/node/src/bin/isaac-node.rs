//! ISAAC validator node binary.
//!
//! # Usage
//!
//! ```bash
//! # Start with a configuration file
//! isaac-node --config node.toml
//!
//! # Override the data directory
//! isaac-node --config node.toml --data-dir /var/lib/isaac
//! ```
//!
//! See `NodeConfig` for the configuration file format.

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use clap::Parser;
use isaac_node::{metrics, Node, NodeConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// ISAAC validator node.
///
/// Runs a validator participating in ISAAC consensus.
#[derive(Parser, Debug)]
#[command(name = "isaac-node")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: PathBuf,

    /// Data directory for RocksDB (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Metrics listen address (overrides config)
    #[arg(long)]
    metrics_addr: Option<String>,

    /// Log level filter (overrides RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = NodeConfig::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if let Some(data_dir) = cli.data_dir {
        config.node.data_dir = data_dir;
    }
    if let Some(metrics_addr) = cli.metrics_addr {
        config.metrics.listen_addr = metrics_addr;
    }

    let node = Node::new(&config).context("building node")?;
    info!(address = %node.local_address(), "node initialized");

    if config.metrics.enabled {
        serve_metrics(&config.metrics.listen_addr).await?;
    }

    node.start().context("starting node")?;

    signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown signal received");
    node.stop().await;

    Ok(())
}

/// Expose `/metrics` in Prometheus text format.
async fn serve_metrics(listen_addr: &str) -> Result<()> {
    let addr: SocketAddr = listen_addr
        .parse()
        .with_context(|| format!("invalid metrics listen address {listen_addr}"))?;

    let app = Router::new().route("/metrics", get(|| async { metrics::render() }));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding metrics endpoint on {addr}"))?;
    info!(%addr, "metrics endpoint listening");

    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            warn!(%err, "metrics endpoint terminated");
        }
    });
    Ok(())
}

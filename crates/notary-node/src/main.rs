//! Notary node executable.

use anyhow::{Context, Result};
use notary_node::{NotaryConfig, NotaryNode};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = NotaryConfig::load().context("Failed to load notary configuration")?;
    let node = NotaryNode::start(config).context("Failed to start notary node")?;

    info!("Notary is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;

    let served = node.shutdown().await;
    info!(served, "Shutdown complete");
    Ok(())
}

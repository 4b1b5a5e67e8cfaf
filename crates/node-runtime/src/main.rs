//! # Shard-Ledger Node
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults + `SL_*` environment overrides)
//! 2. Install logging
//! 3. Validate configuration
//! 4. Build the shard node and start consensus and relay followers
//! 5. Report status periodically until Ctrl+C

use anyhow::{Context, Result};
use node_runtime::{logging, NodeConfig, ShardNode};
use sl_02_consensus::NoopBroadcaster;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const STATUS_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::from_env().context("Failed to load configuration")?;
    logging::init(&config.log)?;

    if let Err(e) = config.validate_for_production() {
        warn!(error = %e, "Running with development settings");
    }

    // Gossip transport is external; a standalone node only talks to itself.
    let node = ShardNode::new(config, Arc::new(NoopBroadcaster))
        .context("Failed to build shard node")?;
    node.start();

    info!(
        node = %node.config().node_id,
        shard = node.config().shard_id,
        consensus = %node.config().consensus.kind,
        "Node is running. Press Ctrl+C to stop."
    );

    let mut ticker = tokio::time::interval(STATUS_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let status = node.status().context("Failed to read node status")?;
                info!(status = %serde_json::to_string(&status)?, "Node status");
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                break;
            }
        }
    }

    info!("Initiating graceful shutdown...");
    node.stop().await;
    info!("Shutdown complete");
    Ok(())
}

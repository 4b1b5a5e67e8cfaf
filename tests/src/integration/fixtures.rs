//! Shared helpers for integration flows.

use node_runtime::NodeConfig;
use sl_01_ledger::ShardId;
use sl_02_consensus::ConsensusKind;
use std::time::Duration;

/// Poll `check` until it holds, failing after ten seconds.
pub async fn eventually<F: Fn() -> bool>(what: &str, check: F) {
    let waited = tokio::time::timeout(Duration::from_secs(10), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

/// Test configuration for `node` serving `shard` with `kind` consensus.
pub fn node_config(node: &str, shard: ShardId, kind: ConsensusKind) -> NodeConfig {
    NodeConfig::for_testing(node, shard, kind)
}

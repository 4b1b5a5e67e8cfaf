//! # Topology Configuration

use super::ShardError;
use serde::{Deserialize, Serialize};
use sl_01_ledger::{ChainConfig, ShardId};

/// Shape of the shard topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Shards per layer
    pub shard_count: u32,
    /// Number of layers
    pub layer_count: u32,
    /// Configuration of every shard's chain
    pub chain: ChainConfig,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            shard_count: 4,
            layer_count: 1,
            chain: ChainConfig::default(),
        }
    }
}

impl TopologyConfig {
    /// Two shards in one layer.
    pub fn for_testing() -> Self {
        Self {
            shard_count: 2,
            layer_count: 1,
            chain: ChainConfig::default(),
        }
    }

    /// Shards across all layers.
    pub fn total_shards(&self) -> u32 {
        self.shard_count.saturating_mul(self.layer_count)
    }

    /// `layer * shard_count + index`.
    pub fn shard_id(&self, layer: u32, index: u32) -> ShardId {
        layer * self.shard_count + index
    }

    /// Layer containing `shard`.
    pub fn layer_of(&self, shard: ShardId) -> u32 {
        shard / self.shard_count
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ShardError> {
        if self.shard_count == 0 {
            return Err(ShardError::Config("shard_count must be positive".into()));
        }
        if self.layer_count == 0 {
            return Err(ShardError::Config("layer_count must be positive".into()));
        }
        if self.shard_count.checked_mul(self.layer_count).is_none() {
            return Err(ShardError::Config("topology too large".into()));
        }
        Ok(())
    }
}

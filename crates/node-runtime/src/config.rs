//! # Node Configuration
//!
//! Unified configuration for all subsystems and runtime parameters.
//!
//! Every section deserializes with `#[serde(default)]`, so a partial
//! document keeps the reference constants for anything it omits.
//! Environment variables override the loaded values:
//!
//! | Variable         | Field                   |
//! |------------------|-------------------------|
//! | `SL_NODE_ID`     | `node_id`               |
//! | `SL_SHARD_ID`    | `shard_id`              |
//! | `SL_IS_RELAY`    | `is_relay`              |
//! | `SL_CONSENSUS`   | `consensus.kind`        |
//! | `SL_SHARD_COUNT` | `topology.shard_count`  |
//! | `SL_LAYER_COUNT` | `topology.layer_count`  |
//! | `SL_LOG_LEVEL`   | `log.level`             |
//! | `SL_LOG_JSON`    | `log.json`              |
//! | `SL_NODE_KEY`    | `node_key` (hex)        |

use serde::{Deserialize, Serialize};
use sl_01_ledger::{NodeId, ShardId};
use sl_02_consensus::{ConsensusConfig, ConsensusError, ConsensusKind};
use sl_03_relay::{RelayConfig, RelayError};
use sl_04_sharding::{ShardError, TopologyConfig};
use std::str::FromStr;
use thiserror::Error;

/// Key used when no `node_key` is configured. Development only.
pub const DEV_NODE_KEY: &[u8] = b"sl-development-node-key";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment override could not be parsed.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
    },

    /// Node-level setting out of range.
    #[error("Invalid node configuration: {0}")]
    Invalid(String),

    /// No node key configured.
    #[error("Node key is the development default. Set SL_NODE_KEY or provide node_key.")]
    InsecureNodeKey,

    /// Topology section rejected.
    #[error(transparent)]
    Topology(#[from] ShardError),

    /// Consensus section rejected.
    #[error(transparent)]
    Consensus(#[from] ConsensusError),

    /// Relay section rejected.
    #[error(transparent)]
    Relay(#[from] RelayError),
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// This node's id
    pub node_id: NodeId,
    /// Shard this node serves
    pub shard_id: ShardId,
    /// Whether this node validates relay blocks
    pub is_relay: bool,
    /// Hex-encoded HMAC key for signing injected transfers
    pub node_key: Option<String>,
    /// Logging
    pub log: LogConfig,
    /// Shard topology
    pub topology: TopologyConfig,
    /// Consensus engine
    pub consensus: ConsensusConfig,
    /// Cross-channel relay
    pub relay: RelayConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: "node-0".to_string(),
            shard_id: 0,
            is_relay: false,
            node_key: None,
            log: LogConfig::default(),
            topology: TopologyConfig::default(),
            consensus: ConsensusConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Fast settings for tests.
    pub fn for_testing(node_id: &str, shard_id: ShardId, kind: ConsensusKind) -> Self {
        Self {
            node_id: node_id.to_string(),
            shard_id,
            is_relay: true,
            node_key: None,
            log: LogConfig::default(),
            topology: TopologyConfig::for_testing(),
            consensus: ConsensusConfig::for_testing(kind),
            relay: RelayConfig::for_testing(),
        }
    }

    /// Defaults overridden from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `SL_*` overrides resolved through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup("SL_NODE_ID") {
            self.node_id = id;
        }
        if let Some(value) = lookup("SL_SHARD_ID") {
            self.shard_id = parse("SL_SHARD_ID", value)?;
        }
        if let Some(value) = lookup("SL_IS_RELAY") {
            self.is_relay = parse_flag("SL_IS_RELAY", value)?;
        }
        if let Some(value) = lookup("SL_CONSENSUS") {
            self.consensus.kind = ConsensusKind::from_str(&value)?;
        }
        if let Some(value) = lookup("SL_SHARD_COUNT") {
            self.topology.shard_count = parse("SL_SHARD_COUNT", value)?;
        }
        if let Some(value) = lookup("SL_LAYER_COUNT") {
            self.topology.layer_count = parse("SL_LAYER_COUNT", value)?;
        }
        if let Some(level) = lookup("SL_LOG_LEVEL") {
            self.log.level = level;
        }
        if let Some(value) = lookup("SL_LOG_JSON") {
            self.log.json = parse_flag("SL_LOG_JSON", value)?;
        }
        if let Some(key) = lookup("SL_NODE_KEY") {
            self.node_key = Some(key);
        }
        Ok(())
    }

    /// HMAC key bytes, falling back to [`DEV_NODE_KEY`].
    pub fn signing_key(&self) -> Result<Vec<u8>, ConfigError> {
        match &self.node_key {
            Some(encoded) => {
                let key = hex::decode(encoded.trim()).map_err(|_| ConfigError::InvalidEnv {
                    key: "SL_NODE_KEY",
                    value: encoded.clone(),
                })?;
                if key.is_empty() {
                    return Err(ConfigError::Invalid("node_key must not be empty".into()));
                }
                Ok(key)
            }
            None => Ok(DEV_NODE_KEY.to_vec()),
        }
    }

    /// Validate every section and the node's place in the topology.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_id.trim().is_empty() {
            return Err(ConfigError::Invalid("node_id must not be empty".into()));
        }
        self.topology.validate()?;
        self.consensus.validate()?;
        self.relay.validate()?;
        if self.shard_id >= self.topology.total_shards() {
            return Err(ConfigError::Invalid(format!(
                "shard {} outside topology of {} shards",
                self.shard_id,
                self.topology.total_shards()
            )));
        }
        self.signing_key()?;
        Ok(())
    }

    /// Stricter checks for a deployed node.
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.node_key.is_none() {
            return Err(ConfigError::InsecureNodeKey);
        }
        Ok(())
    }
}

fn parse<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}

fn parse_flag(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { key, value }),
    }
}

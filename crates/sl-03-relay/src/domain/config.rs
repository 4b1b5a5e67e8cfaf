//! # Relay Configuration

use super::errors::RelayError;
use serde::{Deserialize, Serialize};

/// Relay thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Queued transfers per target shard that trigger a relay block
    pub batch_threshold: usize,
    /// Distinct positive votes that finalize a relay block
    pub validation_threshold: usize,
    /// Pause before each registered node's vote in the validation worker
    pub vote_delay_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            batch_threshold: 5,
            validation_threshold: 2,
            vote_delay_ms: 100,
        }
    }
}

impl RelayConfig {
    /// Reference thresholds without vote delay.
    pub fn for_testing() -> Self {
        Self {
            vote_delay_ms: 0,
            ..Self::default()
        }
    }

    /// Reject thresholds that could never fire.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.batch_threshold == 0 {
            return Err(RelayError::Config("batch_threshold must be positive".into()));
        }
        if self.validation_threshold == 0 {
            return Err(RelayError::Config(
                "validation_threshold must be positive".into(),
            ));
        }
        Ok(())
    }
}

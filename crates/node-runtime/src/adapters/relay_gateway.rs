//! # Relay Gateway
//!
//! Connects sl-04 Sharding to sl-03 Relay without the sharding crate
//! depending on the relay.

use sl_01_ledger::Transaction;
use sl_03_relay::{CrossChannelRelay, RelayError};
use sl_04_sharding::{CrossShardGateway, ShardError, ShardResult};
use std::sync::Arc;

/// Forwards cross-shard transfers into the relay's target queues.
pub struct RelayGateway {
    relay: Arc<CrossChannelRelay>,
}

impl RelayGateway {
    /// Gateway over `relay`.
    pub fn new(relay: Arc<CrossChannelRelay>) -> Self {
        Self { relay }
    }
}

impl CrossShardGateway for RelayGateway {
    fn forward(&self, tx: Transaction) -> ShardResult<()> {
        self.relay
            .submit_cross_shard_transaction(tx)
            .map(|_| ())
            .map_err(|e| match e {
                RelayError::AlreadyExists(hash) => ShardError::AlreadyExists(hash),
                other => ShardError::Gateway(other.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sl_01_ledger::test_utils::signed_transfer;
    use sl_03_relay::RelayConfig;

    #[test]
    fn test_forward_queues_in_relay() {
        let relay = Arc::new(CrossChannelRelay::new(RelayConfig::for_testing()).unwrap());
        let gateway = RelayGateway::new(Arc::clone(&relay));
        let tx = signed_transfer("a", "b", 3, 0, 1);

        gateway.forward(tx.clone()).unwrap();
        assert_eq!(relay.queued_for(1), 1);
        let err = gateway.forward(tx.clone()).unwrap_err();
        assert_eq!(err, ShardError::AlreadyExists(tx.hash()));
        assert!(err.is_duplicate());
        assert_eq!(relay.queued_for(1), 1);
    }

    #[test]
    fn test_same_shard_refusal_stays_a_gateway_error() {
        let relay = Arc::new(CrossChannelRelay::new(RelayConfig::for_testing()).unwrap());
        let gateway = RelayGateway::new(relay);
        let err = gateway.forward(signed_transfer("a", "b", 3, 1, 1)).unwrap_err();
        assert!(matches!(err, ShardError::Gateway(_)));
    }
}

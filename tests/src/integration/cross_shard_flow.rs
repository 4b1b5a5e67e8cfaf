//! # Cross-Shard Flow
//!
//! Two nodes serving shards 0 and 1 share one relay (standing in for relay
//! gossip). A transfer submitted on shard 0 must be batched, validated by
//! both relay nodes, injected into shard 1's chain, committed there and end
//! up confirmed by both shards.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{eventually, node_config};
    use node_runtime::ShardNode;
    use sl_01_ledger::test_utils::signed_transfer;
    use sl_01_ledger::Transaction;
    use sl_02_consensus::{ConsensusKind, NoopBroadcaster};
    use sl_03_relay::{CrossChannelRelay, RelayConfig, TransferState};
    use std::sync::Arc;

    fn pair() -> (ShardNode, ShardNode, Arc<CrossChannelRelay>) {
        let relay = Arc::new(CrossChannelRelay::new(RelayConfig::for_testing()).unwrap());
        let source = ShardNode::with_relay(
            node_config("node-0", 0, ConsensusKind::Pow),
            Arc::clone(&relay),
            Arc::new(NoopBroadcaster),
        )
        .unwrap();
        let target = ShardNode::with_relay(
            node_config("node-1", 1, ConsensusKind::Pow),
            Arc::clone(&relay),
            Arc::new(NoopBroadcaster),
        )
        .unwrap();
        (source, target, relay)
    }

    fn transfers(count: u64) -> Vec<Transaction> {
        (0..count)
            .map(|n| signed_transfer("alice", "bob", 10 * (n + 1), 0, 1))
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_transfer_is_relayed_injected_and_dual_confirmed() {
        let (source, target, relay) = pair();
        assert_eq!(relay.relay_nodes().len(), 2);
        source.start();
        target.start();

        let batch = transfers(5);
        for tx in &batch {
            source.submit_transaction(tx.clone()).unwrap();
        }

        for tx in &batch {
            let hash = tx.hash();
            eventually("target confirmation", || target.is_transfer_confirmed(&hash)).await;
        }
        assert_eq!(relay.status().finalized_relay_blocks, 1);
        assert_eq!(relay.status().pending_relay_blocks, 0);
        assert!(matches!(
            relay.transfer_state(&batch[0].hash()),
            Some(TransferState::Finalized(_))
        ));

        // target chain carries the value; the source chain never saw it
        assert_eq!(target.chain().get_balance("bob"), 150);
        assert_eq!(target.chain().get_balance("alice"), -155);
        assert_eq!(source.chain().get_balance("bob"), 0);
        assert_eq!(source.shard_status().unwrap().outgoing_transfers, 5);

        // the source side waits for the target's acknowledgement
        let probe = batch[0].hash();
        eventually("source-side finalization", || {
            source.topology().confirmations().confirmations(&probe) == vec![0]
        })
        .await;
        assert!(!source.is_transfer_confirmed(&probe));
        assert!(source.on_shard_confirmation(&probe, 1).unwrap());
        assert!(source.is_transfer_confirmed(&probe));

        source.stop().await;
        target.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_partial_batch_waits_for_threshold() {
        let (source, target, relay) = pair();
        source.start();
        target.start();

        for tx in transfers(4) {
            source.submit_cross_shard_transaction(tx).unwrap();
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(relay.queued_for(1), 4);
        assert!(relay.pending_relay_blocks().is_empty());
        assert_eq!(target.chain_status().total_transactions, 0);

        // the operator flush pushes the partial batch through
        relay.force_create_relay_block(1).unwrap();
        eventually("flushed batch committed on target", || {
            target.chain_status().total_transactions == 4
        })
        .await;

        source.stop().await;
        target.stop().await;
    }

    #[tokio::test]
    async fn test_same_shard_transfer_rejected_by_relay_path() {
        let (source, _target, relay) = pair();
        let local = signed_transfer("alice", "bob", 1, 0, 0);
        assert!(source.submit_cross_shard_transaction(local).is_err());
        assert_eq!(relay.status().queued_transactions, 0);
    }

    #[tokio::test]
    async fn test_status_snapshots_serialize() {
        let (source, _target, _relay) = pair();
        source.submit_transaction(signed_transfer("alice", "bob", 5, 0, 1)).unwrap();

        let status = source.status().unwrap();
        assert_eq!(status.relay.queued_transactions, 1);
        assert_eq!(status.relay.relay_nodes, 2);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["shard_id"], 0);
        assert_eq!(json["consensus"]["kind"], "pow");
        assert_eq!(json["consensus"]["variant"]["type"], "work_based");
    }
}

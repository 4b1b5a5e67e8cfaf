//! # Consensus Variants
//!
//! Stake-weighted and work-based engines driving a node's chain through the
//! full runtime, plus block replay on a second replica via
//! `on_block_received`.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{eventually, node_config};
    use node_runtime::{NodeError, ShardNode};
    use rand::Rng;
    use sl_01_ledger::test_utils::signed_transfer;
    use sl_02_consensus::{
        meets_difficulty, ConsensusError, ConsensusKind, NoopBroadcaster, ValidatorConfig,
    };
    use std::sync::Arc;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stake_weighted_node_commits_pending_work() {
        let mut config = node_config("staker", 0, ConsensusKind::Pos);
        config.consensus.validators = vec![ValidatorConfig::new("staker", 5_000)];
        let node = ShardNode::new(config, Arc::new(NoopBroadcaster)).unwrap();
        node.start();

        let mut rng = rand::thread_rng();
        let batch: Vec<_> = (0..12)
            .map(|_| signed_transfer("alice", "bob", rng.gen_range(1..100), 0, 0))
            .collect();
        let total: i128 = batch.iter().map(|tx| i128::from(tx.amount())).sum();
        for tx in &batch {
            node.submit_transaction(tx.clone()).unwrap();
        }

        let chain = Arc::clone(node.chain());
        eventually("all transfers committed", || chain.pending_count() == 0).await;
        // at most ten transfers per block
        assert!(chain.get_height() >= 2);
        assert_eq!(node.balance("bob"), total);
        for height in 1..=chain.get_height() {
            assert_eq!(chain.get_block_by_height(height).unwrap().proposer(), "staker");
        }
        node.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_work_based_blocks_meet_difficulty_two() {
        let mut config = node_config("miner", 0, ConsensusKind::Pow);
        config.consensus.difficulty = 2;
        let node = ShardNode::new(config, Arc::new(NoopBroadcaster)).unwrap();
        node.start();

        let tx = signed_transfer("alice", "bob", 3, 0, 0);
        node.submit_transaction(tx.clone()).unwrap();
        let chain = Arc::clone(node.chain());
        eventually("mined block", || chain.is_committed(&tx.hash())).await;
        node.stop().await;

        for height in 1..=chain.get_height() {
            let block = chain.get_block_by_height(height).unwrap();
            assert!(meets_difficulty(&block.hash(), 2));
            assert!(block.hash().to_hex().starts_with("00"));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_replica_replays_mined_blocks_in_order() {
        let miner = ShardNode::new(node_config("miner", 0, ConsensusKind::Pow), Arc::new(NoopBroadcaster))
            .unwrap();
        let replica =
            ShardNode::new(node_config("replica", 0, ConsensusKind::Pow), Arc::new(NoopBroadcaster))
                .unwrap();
        miner.start();

        let first = signed_transfer("alice", "bob", 1, 0, 0);
        let second = signed_transfer("alice", "bob", 2, 0, 0);
        miner.submit_transaction(first.clone()).unwrap();
        let chain = Arc::clone(miner.chain());
        eventually("first block", || chain.is_committed(&first.hash())).await;
        miner.submit_transaction(second.clone()).unwrap();
        eventually("second block", || chain.is_committed(&second.hash())).await;
        miner.stop().await;

        let blocks: Vec<_> = (1..=chain.get_height())
            .map(|h| chain.get_block_by_height(h).unwrap())
            .collect();

        // out of order: the second block does not extend genesis
        let err = replica.on_block_received(blocks[blocks.len() - 1].clone());
        if blocks.len() > 1 {
            assert!(matches!(err, Err(NodeError::Consensus(_))));
        }

        for block in &blocks {
            replica.on_block_received(block.clone()).unwrap();
        }
        // replay of a known block is a no-op
        replica.on_block_received(blocks[0].clone()).unwrap();

        assert_eq!(
            replica.chain().get_latest_block().hash(),
            chain.get_latest_block().hash()
        );
        assert_eq!(replica.balance("bob"), 3);
    }

    #[tokio::test]
    async fn test_block_from_wrong_shard_rejected() {
        let node = ShardNode::new(node_config("n", 0, ConsensusKind::Pow), Arc::new(NoopBroadcaster))
            .unwrap();
        let foreign = sl_01_ledger::Block::genesis(1);
        let err = node.on_block_received(foreign).unwrap_err();
        assert!(matches!(
            err,
            NodeError::Consensus(ConsensusError::Rejected(_) | ConsensusError::Ledger(_))
        ));
    }
}

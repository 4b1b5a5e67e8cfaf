//! # Quorum Network
//!
//! Four PBFT replicas of shard 0, each with its own chain, exchange
//! pre-prepare/prepare/commit messages over the in-process gossip mesh and
//! must commit the same block exactly once.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{eventually, node_config};
    use node_runtime::{LocalNetwork, ShardNode};
    use sl_01_ledger::test_utils::signed_transfer;
    use sl_01_ledger::Transaction;
    use sl_02_consensus::{ConsensusKind, ValidatorConfig, VariantStatus};

    const REPLICAS: [&str; 4] = ["v0", "v1", "v2", "v3"];

    fn replicas(network: &std::sync::Arc<LocalNetwork>) -> Vec<ShardNode> {
        REPLICAS
            .iter()
            .map(|id| {
                let mut config = node_config(id, 0, ConsensusKind::Pbft);
                config.consensus.validators =
                    REPLICAS.iter().map(|v| ValidatorConfig::new(*v, 0)).collect();
                // keep view changes out of the way of a healthy round
                config.consensus.view_change_timeout_ms = 10_000;
                let (broadcaster, inbox) = network.join(*id);
                let node = ShardNode::new(config, broadcaster).unwrap();
                node.attach_inbox(inbox);
                node
            })
            .collect()
    }

    fn submit_everywhere(nodes: &[ShardNode], tx: &Transaction) {
        for node in nodes {
            node.submit_transaction(tx.clone()).unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_four_replicas_commit_the_same_block() {
        let network = LocalNetwork::new();
        let nodes = replicas(&network);
        for node in &nodes {
            node.start();
        }

        let tx = signed_transfer("alice", "bob", 42, 0, 0);
        submit_everywhere(&nodes, &tx);

        for node in &nodes {
            let chain = node.chain();
            eventually("quorum commit", || chain.is_committed(&tx.hash())).await;
        }

        let committed = nodes[0].chain().get_block_by_height(1).unwrap();
        assert_eq!(committed.proposer(), "v0");
        for node in &nodes {
            let block = node.chain().get_block_by_height(1).unwrap();
            assert_eq!(block.hash(), committed.hash());
            assert_eq!(node.chain().pending_count(), 0);
            assert_eq!(node.balance("bob"), 42);
        }

        for node in &nodes {
            node.stop().await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_consecutive_rounds_extend_every_replica() {
        let network = LocalNetwork::new();
        let nodes = replicas(&network);
        for node in &nodes {
            node.start();
        }

        let first = signed_transfer("alice", "bob", 1, 0, 0);
        submit_everywhere(&nodes, &first);
        for node in &nodes {
            let chain = node.chain();
            eventually("first round", || chain.is_committed(&first.hash())).await;
        }

        let second = signed_transfer("bob", "carol", 1, 0, 0);
        submit_everywhere(&nodes, &second);
        for node in &nodes {
            let chain = node.chain();
            eventually("second round", || chain.is_committed(&second.hash())).await;
        }

        let head = nodes[0].chain().get_latest_block().hash();
        for node in &nodes {
            assert_eq!(node.chain().get_latest_block().hash(), head);
            assert!(node.chain().is_valid());
            match node.consensus_status().variant {
                VariantStatus::QuorumVoting {
                    quorum, validators, ..
                } => {
                    assert_eq!(quorum, 3);
                    assert_eq!(validators, 4);
                }
                other => panic!("unexpected variant {other:?}"),
            }
        }

        for node in &nodes {
            node.stop().await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_quorum_survives_one_silent_replica() {
        let network = LocalNetwork::new();
        let nodes = replicas(&network);
        // v3 never starts and never reads its inbox
        network.leave("v3");
        for node in &nodes[..3] {
            node.start();
        }

        let tx = signed_transfer("alice", "bob", 9, 0, 0);
        submit_everywhere(&nodes, &tx);
        for node in &nodes[..3] {
            let chain = node.chain();
            eventually("commit without v3", || chain.is_committed(&tx.hash())).await;
        }
        assert!(!nodes[3].chain().is_committed(&tx.hash()));

        for node in &nodes[..3] {
            node.stop().await;
        }
    }
}

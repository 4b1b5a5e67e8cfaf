//! # Local Network
//!
//! In-process stand-in for the gossip transport. Each joined node gets an
//! unbounded inbox; broadcasting from one node enqueues the message for all
//! others. Delivery is asynchronous, so no engine re-enters another while
//! handling a message.

use parking_lot::RwLock;
use sl_01_ledger::NodeId;
use sl_02_consensus::{ConsensusMessage, MessageBroadcaster};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// Inbox of consensus messages addressed to one node.
pub type Inbox = mpsc::UnboundedReceiver<ConsensusMessage>;

/// Mesh of in-process nodes.
#[derive(Default)]
pub struct LocalNetwork {
    peers: RwLock<BTreeMap<NodeId, mpsc::UnboundedSender<ConsensusMessage>>>,
}

impl LocalNetwork {
    /// Empty mesh.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Join as `node`, replacing any earlier endpoint under the same id.
    pub fn join(self: &Arc<Self>, node: impl Into<NodeId>) -> (Arc<dyn MessageBroadcaster>, Inbox) {
        let node = node.into();
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers.write().insert(node.clone(), tx);
        let endpoint = LocalEndpoint {
            node,
            network: Arc::clone(self),
        };
        (Arc::new(endpoint), rx)
    }

    /// Remove `node`; its inbox closes.
    pub fn leave(&self, node: &str) -> bool {
        self.peers.write().remove(node).is_some()
    }

    /// Joined node ids, sorted.
    pub fn members(&self) -> Vec<NodeId> {
        self.peers.read().keys().cloned().collect()
    }
}

struct LocalEndpoint {
    node: NodeId,
    network: Arc<LocalNetwork>,
}

impl MessageBroadcaster for LocalEndpoint {
    fn broadcast(&self, message: ConsensusMessage) {
        let peers = self.network.peers.read();
        for (peer, inbox) in peers.iter().filter(|(peer, _)| **peer != self.node) {
            trace!(from = %self.node, to = %peer, kind = message.label(), "Delivering consensus message");
            // a closed inbox belongs to a stopped node
            let _ = inbox.send(message.clone());
        }
    }
}

//! # Outbound Ports
//!
//! Gossip is fire-and-forget: transport failures are the transport's concern.

use crate::domain::ConsensusMessage;
use parking_lot::Mutex;

/// Sends consensus messages to the shard's peers.
pub trait MessageBroadcaster: Send + Sync {
    /// Queue `message` for every peer.
    fn broadcast(&self, message: ConsensusMessage);
}

/// Broadcaster for single-node setups.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBroadcaster;

impl MessageBroadcaster for NoopBroadcaster {
    fn broadcast(&self, _message: ConsensusMessage) {}
}

/// Collects outgoing messages for a caller to route (tests, in-process networks).
#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    outbox: Mutex<Vec<ConsensusMessage>>,
}

impl RecordingBroadcaster {
    /// Empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain messages sent so far.
    pub fn take(&self) -> Vec<ConsensusMessage> {
        std::mem::take(&mut *self.outbox.lock())
    }

    /// Messages sent so far.
    pub fn len(&self) -> usize {
        self.outbox.lock().len()
    }

    /// True if nothing was sent.
    pub fn is_empty(&self) -> bool {
        self.outbox.lock().is_empty()
    }
}

impl MessageBroadcaster for RecordingBroadcaster {
    fn broadcast(&self, message: ConsensusMessage) {
        self.outbox.lock().push(message);
    }
}

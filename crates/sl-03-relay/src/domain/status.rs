//! # Relay Status

use super::channel::ChannelStatus;
use serde::Serialize;

/// Relay snapshot for monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayStatus {
    /// Registered relay nodes
    pub relay_nodes: usize,
    /// Channels seen so far
    pub active_channels: usize,
    /// Relay blocks collecting votes
    pub pending_relay_blocks: usize,
    /// Finalized relay blocks
    pub finalized_relay_blocks: usize,
    /// Transfers waiting in target queues
    pub queued_transactions: usize,
    /// Batch size trigger
    pub batch_threshold: usize,
    /// Votes needed to finalize
    pub validation_threshold: usize,
    /// Per-channel detail
    pub channels: Vec<ChannelStatus>,
}

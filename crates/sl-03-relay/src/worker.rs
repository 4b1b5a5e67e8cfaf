//! # Relay Worker
//!
//! Background validation driven by the relay's event channel. Each new
//! relay block gets its own task that polls registered relay nodes one at a
//! time until the block finalizes or is dropped.

use crate::domain::{RelayError, RelayEvent, RelayOutcome};
use crate::relay::CrossChannelRelay;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};

/// Asynchronous validator for relay blocks.
pub struct RelayWorker {
    relay: Arc<CrossChannelRelay>,
    vote_delay: Duration,
}

impl RelayWorker {
    /// Worker over `relay`, pacing votes by the relay's configured delay.
    pub fn new(relay: Arc<CrossChannelRelay>) -> Self {
        let vote_delay = Duration::from_millis(relay.config().vote_delay_ms);
        Self { relay, vote_delay }
    }

    /// Run until the relay's event channel closes. Abort the handle to stop
    /// earlier.
    pub fn spawn(self) -> JoinHandle<()> {
        let mut events = self.relay.subscribe();
        // blocks created before subscribing
        for id in self.relay.pending_relay_blocks() {
            self.validate_in_background(id);
        }

        let span = tracing::info_span!("relay_worker");
        tokio::spawn(
            async move {
                loop {
                    match events.recv().await {
                        Ok(RelayEvent::RelayBlockCreated { id, .. }) => {
                            self.validate_in_background(id)
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "[sl-03] Relay events lagged, sweeping pending blocks");
                            for id in self.relay.pending_relay_blocks() {
                                self.validate_in_background(id);
                            }
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            .instrument(span),
        )
    }

    fn validate_in_background(&self, id: String) {
        let relay = Arc::clone(&self.relay);
        let delay = self.vote_delay;
        tokio::spawn(async move {
            for node in relay.relay_nodes() {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                match relay.validate_relay_block(&id, std::slice::from_ref(&node)) {
                    Ok(RelayOutcome::Finalized | RelayOutcome::AlreadyFinalized) => return,
                    Ok(outcome) => debug!(%id, %node, ?outcome, "[sl-03] Relay vote cast"),
                    Err(RelayError::UnknownRelayBlock(_)) => return,
                    Err(err) => {
                        warn!(%id, error = %err, "[sl-03] Relay validation failed");
                        return;
                    }
                }
            }
        });
    }
}

//! Proposal loop.
//!
//! One tokio task per engine ticks at the block time and runs a proposal
//! step on the blocking pool (PoW mining is CPU-bound). `stop` clears the
//! running flag, raises the engine's cancel flag and waits for the task, so
//! an in-flight proposal either commits fully or not at all.

use super::{ConsensusEngine, ConsensusRules};
use crate::domain::{ConsensusError, ConsensusStatus};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

/// Drives a [`ConsensusEngine`] on a timer.
pub struct ConsensusDriver {
    engine: Arc<ConsensusEngine>,
    block_time: Duration,
    running: Arc<AtomicBool>,
    task: Mutex<Option<LoopHandle>>,
}

struct LoopHandle {
    shutdown: Arc<Notify>,
    join: JoinHandle<()>,
}

impl ConsensusDriver {
    /// Driver ticking every `block_time`.
    pub fn new(engine: Arc<ConsensusEngine>, block_time: Duration) -> Self {
        Self {
            engine,
            block_time,
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    /// Driven engine.
    pub fn engine(&self) -> &Arc<ConsensusEngine> {
        &self.engine
    }

    /// Proposal loop active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the proposal loop. Must be called inside a tokio runtime.
    /// Calling it while running does nothing.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.engine.resume();

        let engine = Arc::clone(&self.engine);
        let running = Arc::clone(&self.running);
        let shutdown = Arc::new(Notify::new());
        let signal = Arc::clone(&shutdown);
        let block_time = self.block_time;
        let span = engine.context().span.clone();
        info!(parent: &span, ?block_time, "[sl-02] Consensus loop started");

        let handle = tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval(block_time);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

                while running.load(Ordering::SeqCst) {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = signal.notified() => break,
                    }
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }

                    let step = Arc::clone(&engine);
                    match tokio::task::spawn_blocking(move || step.propose()).await {
                        Ok(Ok(hash)) => debug!(%hash, "[sl-02] Proposal step produced block"),
                        Ok(Err(ConsensusError::MiningCancelled)) => break,
                        Ok(Err(err)) if err.is_idle() => engine.on_idle(&err),
                        Ok(Err(err)) => warn!(error = %err, "[sl-02] Proposal failed"),
                        Err(join) => error!(error = %join, "[sl-02] Proposal task panicked"),
                    }
                }
            }
            .instrument(span),
        );
        *self.task.lock() = Some(LoopHandle {
            shutdown,
            join: handle,
        });
    }

    /// Stop the loop and wait for an in-flight step to finish.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.engine.cancel();

        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            handle.shutdown.notify_one();
            // a join error only means the loop panicked, which it already logged
            let _ = handle.join.await;
        }
        info!(parent: &self.engine.context().span, "[sl-02] Consensus loop stopped");
    }

    /// Engine snapshot with the loop state filled in.
    pub fn status(&self) -> ConsensusStatus {
        let mut status = self.engine.status();
        status.running = self.is_running();
        status
    }
}

impl Drop for ConsensusDriver {
    fn drop(&mut self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.engine.cancel();
        }
    }
}

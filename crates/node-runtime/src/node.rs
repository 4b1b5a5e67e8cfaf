//! # Shard Node
//!
//! One node's composition of topology, relay, shard chain and consensus
//! driver, plus the entry points a network front end calls.
//!
//! ## Cross-Shard Flow
//!
//! ```text
//! submit_cross_shard_transaction
//!   └─▶ TopologyManager (outgoing + dual registration) ─▶ RelayGateway ─▶ relay queue
//!           ... relay block finalized ...
//! RelayBlockFinalized
//!   ├─ source shard ──▶ confirm(source)
//!   └─ target shard ──▶ confirm(source), inject same-shard copy into target chain
//!           ... copy committed by target consensus ...
//! BlockCommitted (target chain) ──▶ confirm(target) ──▶ transfer confirmed
//! ```
//!
//! Confirmations are this node's view. A source-shard node learns about the
//! target acknowledgement only through [`ShardNode::on_shard_confirmation`].

use crate::adapters::{Inbox, RelayGateway};
use crate::config::NodeConfig;
use crate::error::NodeResult;
use parking_lot::Mutex;
use serde::Serialize;
use sl_01_ledger::{
    Block, Chain, ChainEvent, ChainStatus, Hash, HmacSigner, LedgerResult, NodeId, ShardId,
    Transaction, TransferRequest,
};
use sl_02_consensus::{
    ConsensusDriver, ConsensusEngine, ConsensusMessage, ConsensusRules, ConsensusStatus,
    EngineContext, MessageBroadcaster,
};
use sl_03_relay::{CrossChannelRelay, RelayEvent, RelayOutcome, RelayStatus, RelayWorker};
use sl_04_sharding::{ShardStatus, TopologyManager, TopologyStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument, Span};

/// Everything an external reporting layer needs about one node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeStatus {
    /// Node id
    pub node_id: NodeId,
    /// Served shard
    pub shard_id: ShardId,
    /// Relay validator flag
    pub is_relay: bool,
    /// Served shard's chain
    pub chain: ChainStatus,
    /// Served shard's membership
    pub shard: ShardStatus,
    /// Relay state
    pub relay: RelayStatus,
    /// Consensus engine
    pub consensus: ConsensusStatus,
}

/// State shared between the node facade and its background tasks.
struct NodeCore {
    config: NodeConfig,
    topology: Arc<TopologyManager>,
    relay: Arc<CrossChannelRelay>,
    chain: Arc<Chain>,
    engine: Arc<ConsensusEngine>,
    signer: HmacSigner,
    // injected copy -> original cross-shard transfer
    injected: Mutex<HashMap<Hash, Hash>>,
    span: Span,
}

impl NodeCore {
    fn shard_id(&self) -> ShardId {
        self.config.shard_id
    }

    fn on_relay_finalized(&self, id: &str) {
        let Some(block) = self.relay.get_relay_block(id) else {
            return;
        };
        for tx in block.transactions() {
            if tx.target_shard() == self.shard_id() {
                self.deliver(tx);
            } else if tx.source_shard() == self.shard_id() {
                self.confirm(tx, tx.source_shard());
            }
        }
    }

    /// Re-deliver every finalized transfer for this shard. Copies already in
    /// the chain are rejected as duplicates, so this is idempotent.
    fn resync_relay(&self) {
        for tx in self.relay.get_cross_shard_transactions(self.shard_id()) {
            self.deliver(&tx);
        }
    }

    fn confirm(&self, tx: &Transaction, shard: ShardId) {
        let confirmations = self.topology.confirmations();
        let hash = tx.hash();
        let result = confirmations
            .register(tx.clone())
            .and_then(|_| confirmations.confirm_transaction(&hash, shard));
        match result {
            Ok(true) => {
                info!(parent: &self.span, %hash, "[sl-04] Cross-shard transfer confirmed")
            }
            Ok(false) => {}
            Err(err) => {
                warn!(parent: &self.span, %hash, shard, error = %err, "[sl-04] Confirmation failed")
            }
        }
    }

    fn local_copy(&self, tx: &Transaction) -> LedgerResult<Transaction> {
        let target = tx.target_shard();
        let request = TransferRequest::new(tx.sender(), tx.recipient(), tx.amount(), target, target)
            .fee(tx.fee())
            .nonce(tx.nonce());
        let mut copy = Transaction::create(request, tx.timestamp())?;
        copy.sign(&self.signer);
        Ok(copy)
    }

    /// Source-side acknowledgement plus injection of a same-shard copy.
    fn deliver(&self, tx: &Transaction) {
        self.confirm(tx, tx.source_shard());

        let copy = match self.local_copy(tx) {
            Ok(copy) => copy,
            Err(err) => {
                warn!(parent: &self.span, hash = %tx.hash(), error = %err, "[sl-03] Cannot build local copy");
                return;
            }
        };
        let copy_hash = copy.hash();
        // map before inserting: the copy may commit before add_transaction returns
        self.injected.lock().insert(copy_hash, tx.hash());

        match self.chain.add_transaction(copy) {
            Ok(()) => {
                info!(parent: &self.span, original = %tx.hash(), copy = %copy_hash, "[sl-03] Cross-shard transfer injected");
            }
            Err(err) if err.is_duplicate() => {
                if self.chain.is_committed(&copy_hash) {
                    self.on_committed(&[copy_hash]);
                }
            }
            Err(err) => {
                self.injected.lock().remove(&copy_hash);
                warn!(parent: &self.span, original = %tx.hash(), error = %err, "[sl-03] Injection rejected");
            }
        }
    }

    fn on_committed(&self, hashes: &[Hash]) {
        for hash in hashes {
            let original = self.injected.lock().remove(hash);
            let Some(original) = original else {
                continue;
            };
            match self.topology.confirmations().confirm_transaction(&original, self.shard_id()) {
                Ok(done) => {
                    debug!(parent: &self.span, %original, done, "[sl-04] Target shard confirmed transfer")
                }
                Err(err) => {
                    warn!(parent: &self.span, %original, error = %err, "[sl-04] Target confirmation failed")
                }
            }
        }
    }

    fn sweep_injected(&self) {
        let committed: Vec<Hash> = self
            .injected
            .lock()
            .keys()
            .filter(|hash| self.chain.is_committed(hash))
            .copied()
            .collect();
        self.on_committed(&committed);
    }
}

async fn follow_relay(core: Arc<NodeCore>, mut events: broadcast::Receiver<RelayEvent>) {
    loop {
        match events.recv().await {
            Ok(RelayEvent::RelayBlockFinalized { id, .. }) => core.on_relay_finalized(&id),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "[sl-03] Relay events lagged, resynchronizing");
                core.resync_relay();
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Runs until `shutdown` fires or every sender is gone, then hands the
/// inbox back so a restarted node can resume reading it.
async fn pump_inbox(core: Arc<NodeCore>, mut inbox: Inbox, shutdown: Arc<Notify>) -> Inbox {
    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            message = inbox.recv() => {
                let Some(message) = message else { break };
                let label = message.label();
                if let Err(err) = core.engine.handle_message(message) {
                    debug!(kind = label, error = %err, "[sl-02] Consensus message rejected");
                }
            }
        }
    }
    inbox
}

struct InboxPump {
    shutdown: Arc<Notify>,
    join: JoinHandle<Inbox>,
}

async fn follow_chain(core: Arc<NodeCore>, mut events: broadcast::Receiver<ChainEvent>) {
    loop {
        match events.recv().await {
            Ok(ChainEvent::BlockCommitted {
                transaction_hashes, ..
            }) => core.on_committed(&transaction_hashes),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "[sl-01] Chain events lagged, sweeping injected transfers");
                core.sweep_injected();
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// A node serving one shard.
pub struct ShardNode {
    core: Arc<NodeCore>,
    driver: ConsensusDriver,
    followers: Mutex<Vec<JoinHandle<()>>>,
    pump: Mutex<Option<InboxPump>>,
    // inbox parked by `stop`, resumed by `start`
    parked_inbox: Mutex<Option<Inbox>>,
}

impl ShardNode {
    /// Standalone node with its own relay.
    pub fn new(config: NodeConfig, broadcaster: Arc<dyn MessageBroadcaster>) -> NodeResult<Self> {
        config.validate()?;
        let relay = CrossChannelRelay::new(config.relay.clone())?;
        Self::with_relay(config, Arc::new(relay), broadcaster)
    }

    /// Node sharing `relay` with other in-process nodes.
    pub fn with_relay(
        config: NodeConfig,
        relay: Arc<CrossChannelRelay>,
        broadcaster: Arc<dyn MessageBroadcaster>,
    ) -> NodeResult<Self> {
        config.validate()?;
        let span = tracing::info_span!("node", node = %config.node_id, shard = config.shard_id);

        let topology = TopologyManager::new(config.topology.clone())?
            .with_gateway(Arc::new(RelayGateway::new(Arc::clone(&relay))))
            .with_span(tracing::info_span!(parent: &span, "topology"));
        topology.assign_node_to_shard(config.node_id.clone(), config.shard_id, config.is_relay)?;
        if config.is_relay {
            relay.register_relay_node(config.node_id.clone());
        }

        let chain = topology.chain_for(config.shard_id)?;
        let ctx = EngineContext::new(config.node_id.clone(), Arc::clone(&chain), broadcaster)
            .with_span(tracing::info_span!(parent: &span, "consensus", kind = %config.consensus.kind));
        let engine = Arc::new(ConsensusEngine::from_config(&config.consensus, ctx)?);
        let driver = ConsensusDriver::new(Arc::clone(&engine), config.consensus.block_time());
        let signer = HmacSigner::with_id(config.node_id.clone(), &config.signing_key()?);

        info!(
            parent: &span,
            consensus = %config.consensus.kind,
            is_relay = config.is_relay,
            shards = config.topology.total_shards(),
            "[node] Shard node created"
        );
        Ok(Self {
            core: Arc::new(NodeCore {
                config,
                topology: Arc::new(topology),
                relay,
                chain,
                engine,
                signer,
                injected: Mutex::new(HashMap::new()),
                span,
            }),
            driver,
            followers: Mutex::new(Vec::new()),
            pump: Mutex::new(None),
            parked_inbox: Mutex::new(None),
        })
    }

    /// Start consensus, the relay/commit followers and a parked inbox pump.
    /// Must run inside a tokio runtime. Calling it while running does nothing.
    pub fn start(&self) {
        self.driver.start();
        if let Some(inbox) = self.parked_inbox.lock().take() {
            self.spawn_pump(inbox);
        }
        let mut followers = self.followers.lock();
        if !followers.is_empty() {
            return;
        }

        let core = &self.core;
        let span = core.span.clone();
        followers.push(tokio::spawn(
            follow_relay(Arc::clone(core), core.relay.subscribe()).instrument(span.clone()),
        ));
        followers.push(tokio::spawn(
            follow_chain(Arc::clone(core), core.chain.subscribe()).instrument(span.clone()),
        ));
        if core.config.is_relay {
            followers.push(RelayWorker::new(Arc::clone(&core.relay)).spawn());
        }
        // finalizations that happened before the followers subscribed
        core.resync_relay();
        core.sweep_injected();
        info!(parent: &span, "[node] Shard node started");
    }

    /// Feed consensus messages from `inbox` into this node's engine, before
    /// or after `start`. Replaces any previously attached inbox.
    pub fn attach_inbox(&self, inbox: Inbox) {
        self.parked_inbox.lock().take();
        self.spawn_pump(inbox);
    }

    fn spawn_pump(&self, inbox: Inbox) {
        let shutdown = Arc::new(Notify::new());
        let join = tokio::spawn(
            pump_inbox(Arc::clone(&self.core), inbox, Arc::clone(&shutdown))
                .instrument(self.core.span.clone()),
        );
        if let Some(previous) = self.pump.lock().replace(InboxPump { shutdown, join }) {
            previous.join.abort();
        }
    }

    /// Stop consensus and every background task. An attached inbox is
    /// parked and resumed by the next `start`.
    pub async fn stop(&self) {
        self.driver.stop().await;

        let pump = self.pump.lock().take();
        if let Some(pump) = pump {
            pump.shutdown.notify_one();
            match pump.join.await {
                Ok(inbox) => *self.parked_inbox.lock() = Some(inbox),
                Err(err) => warn!(parent: &self.core.span, error = %err, "[node] Inbox pump ended abnormally"),
            }
        }

        let followers = std::mem::take(&mut *self.followers.lock());
        for task in followers {
            task.abort();
        }
        info!(parent: &self.core.span, "[node] Shard node stopped");
    }

    /// Admit a transaction. Same-shard transfers enter their owning chain's
    /// mempool; cross-shard transfers go to the relay. Returns the shard the
    /// transaction was routed to.
    pub fn submit_transaction(&self, tx: Transaction) -> NodeResult<ShardId> {
        if tx.is_cross_shard() {
            let target = tx.target_shard();
            self.submit_cross_shard_transaction(tx)?;
            return Ok(target);
        }
        let shard = self.core.topology.route_transaction(&tx);
        self.core.topology.chain_for(shard)?.add_transaction(tx)?;
        Ok(shard)
    }

    /// Hand a cross-shard transfer to the relay.
    pub fn submit_cross_shard_transaction(&self, tx: Transaction) -> NodeResult<()> {
        self.core.topology.process_cross_shard_transaction(tx)?;
        Ok(())
    }

    /// A block announced by a peer.
    pub fn on_block_received(&self, block: Block) -> NodeResult<()> {
        self.core.engine.process_block(block)?;
        Ok(())
    }

    /// Any consensus message delivered by the transport.
    pub fn on_consensus_message(&self, message: ConsensusMessage) -> NodeResult<()> {
        self.core.engine.handle_message(message)?;
        Ok(())
    }

    /// A relay node's verdict on a relay block.
    pub fn on_relay_validation_vote(
        &self,
        relay_block: &str,
        node: &str,
        accept: bool,
    ) -> NodeResult<RelayOutcome> {
        Ok(self.core.relay.record_validation_vote(relay_block, node, accept)?)
    }

    /// A shard's acknowledgement of a cross-shard transfer, relayed by the
    /// transport. Returns true once both shards have confirmed.
    pub fn on_shard_confirmation(&self, hash: &Hash, shard: ShardId) -> NodeResult<bool> {
        Ok(self.core.topology.confirmations().confirm_transaction(hash, shard)?)
    }

    /// Whether both shards have confirmed `hash`.
    pub fn is_transfer_confirmed(&self, hash: &Hash) -> bool {
        self.core.topology.confirmations().is_transaction_confirmed(hash)
    }

    /// Balance of `address` summed over every shard chain this node holds.
    pub fn balance(&self, address: &str) -> i128 {
        self.core
            .topology
            .shard_ids()
            .into_iter()
            .filter_map(|shard| self.core.topology.chain_for(shard).ok())
            .map(|chain| chain.get_balance(address))
            .sum()
    }

    /// Served shard's chain snapshot.
    pub fn chain_status(&self) -> ChainStatus {
        self.core.chain.status()
    }

    /// Served shard's membership snapshot.
    pub fn shard_status(&self) -> NodeResult<ShardStatus> {
        Ok(self.core.topology.get_shard(self.core.shard_id())?)
    }

    /// Whole topology snapshot.
    pub fn topology_status(&self) -> TopologyStatus {
        self.core.topology.status()
    }

    /// Relay snapshot.
    pub fn relay_status(&self) -> RelayStatus {
        self.core.relay.status()
    }

    /// Consensus snapshot.
    pub fn consensus_status(&self) -> ConsensusStatus {
        self.driver.status()
    }

    /// All snapshots together.
    pub fn status(&self) -> NodeResult<NodeStatus> {
        Ok(NodeStatus {
            node_id: self.core.config.node_id.clone(),
            shard_id: self.core.shard_id(),
            is_relay: self.core.config.is_relay,
            chain: self.chain_status(),
            shard: self.shard_status()?,
            relay: self.relay_status(),
            consensus: self.consensus_status(),
        })
    }

    /// Node configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.core.config
    }

    /// Served shard's chain.
    pub fn chain(&self) -> &Arc<Chain> {
        &self.core.chain
    }

    /// Shard topology.
    pub fn topology(&self) -> &Arc<TopologyManager> {
        &self.core.topology
    }

    /// Cross-channel relay.
    pub fn relay(&self) -> &Arc<CrossChannelRelay> {
        &self.core.relay
    }

    /// Consensus engine.
    pub fn engine(&self) -> &Arc<ConsensusEngine> {
        &self.core.engine
    }
}

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use tessera_consensus::{Committer, HttpTransport, PeerRegistry, RoundClient};
use tessera_core::diagnostics::tracing_sink;
use tessera_core::{KeyPair, Peer, PublicKey, Transaction};
use tessera_mst::{Ed25519Validator, EntryStatus, MstAggregator, MstStateUpdate};
use tessera_ordering::{Batch, OrderingError, OrderingGateway, Proposal, ProposerSchedule, QuorumValidator};
use tessera_rpc::{AppState, EventBroadcaster, NodeEvent, RpcConfig, RpcServer};
use tessera_storage::{BlockStore, FileBackend};
use tokio::net::TcpListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::NodeConfig;

type Transport = HttpTransport;

/// The Tessera node
pub struct Node {
    config: NodeConfig,
    keypair: KeyPair,
    peers: Vec<Peer>,
    store: Arc<BlockStore>,
    mst: Arc<MstAggregator>,
    gateway: Arc<OrderingGateway>,
    client: Arc<RoundClient<Transport>>,
    registry: Arc<PeerRegistry<Transport>>,
    committer: Arc<Committer<Transport>>,
    broadcaster: Arc<EventBroadcaster>,
    /// In-flight peer fan-outs
    gossip: TaskTracker,
    cancel: CancellationToken,
}

impl Node {
    /// Create a new node from configuration
    pub fn new(config: NodeConfig) -> Result<Self> {
        Self::with_transport(config, HttpTransport::new())
    }

    /// Create a node that talks to peers through `transport`
    pub fn with_transport(config: NodeConfig, transport: HttpTransport) -> Result<Self> {
        let keypair = config.keypair()?;
        let mut validators = config.validator_keys()?;
        if validators.is_empty() {
            validators.push(keypair.public);
        }
        if !validators.contains(&keypair.public) {
            warn!("Local key {} is not in the validator set", keypair.public);
        }
        let peers = config.peer_list()?;
        let sink = tracing_sink();

        let store = if config.persist_blocks {
            std::fs::create_dir_all(&config.data_dir)?;
            let backend = FileBackend::new(config.data_dir.join("blocks.bin"));
            BlockStore::open(backend, Arc::clone(&sink))?
        } else {
            BlockStore::with_sink(Arc::clone(&sink))
        };
        let store = Arc::new(store);

        let mst = Arc::new(MstAggregator::with_parts(
            config.mst_config(),
            Arc::new(Ed25519Validator::new()),
            Arc::clone(&sink),
        ));

        let gateway = Arc::new(OrderingGateway::with_parts(
            config.ordering_config(),
            ProposerSchedule::new(keypair.public, validators.clone()),
            Arc::new(QuorumValidator),
            Arc::clone(&sink),
        ));

        let transport = Arc::new(transport);
        let client = Arc::new(RoundClient::with_sink(
            Arc::clone(&transport),
            config.gossip_timeout(),
            Arc::clone(&sink),
        ));
        let registry = Arc::new(PeerRegistry::with_sink(
            transport,
            config.probe_config(),
            sink,
        ));

        let committer = Arc::new(Committer::new(
            keypair.clone(),
            validators,
            Arc::clone(&store),
            Arc::clone(&client),
            Arc::clone(&registry),
            config.verify_timeout(),
        ));

        Ok(Node {
            config,
            keypair,
            peers,
            store,
            mst,
            gateway,
            client,
            registry,
            committer,
            broadcaster: Arc::new(EventBroadcaster::default()),
            gossip: TaskTracker::new(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public
    }

    pub fn store(&self) -> &Arc<BlockStore> {
        &self.store
    }

    pub fn mst(&self) -> &Arc<MstAggregator> {
        &self.mst
    }

    pub fn gateway(&self) -> &Arc<OrderingGateway> {
        &self.gateway
    }

    pub fn registry(&self) -> &Arc<PeerRegistry<Transport>> {
        &self.registry
    }

    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    pub fn app_state(&self) -> Arc<AppState<Transport>> {
        Arc::new(AppState {
            public_key: self.keypair.public,
            store: Arc::clone(&self.store),
            mst: Arc::clone(&self.mst),
            gateway: Arc::clone(&self.gateway),
            committer: Arc::clone(&self.committer),
            registry: Arc::clone(&self.registry),
            broadcaster: Arc::clone(&self.broadcaster),
        })
    }

    /// Stop every task started by [`Node::start`]. Queued transactions stay
    /// queued.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Serve RPC on `listener` and spawn the background loops. A node starts
    /// once; it owns the MST completion queue from then on.
    pub async fn start(&self, listener: TcpListener) -> Result<Vec<JoinHandle<()>>> {
        let completed = self
            .mst
            .take_completed()
            .ok_or_else(|| anyhow::anyhow!("node already started"))?;
        let height = self.store.height().await;
        self.gateway.schedule().advance_round(height + 1);
        info!(
            "Starting node {} at height {}, round {}",
            self.keypair.public,
            height,
            height + 1
        );

        let mut tasks = Vec::new();

        let rpc_config = RpcConfig {
            http_addr: listener.local_addr()?,
            enable_ws: self.config.enable_ws,
        };
        let server = RpcServer::new(rpc_config, self.app_state());
        let cancel = self.cancel.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = server.serve(listener, cancel).await {
                error!("RPC server error: {}", e);
            }
        }));

        let mst = Arc::clone(&self.mst);
        let cancel = self.cancel.clone();
        tasks.push(tokio::spawn(async move { mst.run_expiry(cancel).await }));

        let gateway = Arc::clone(&self.gateway);
        let cancel = self.cancel.clone();
        tasks.push(tokio::spawn(async move { gateway.run(cancel).await }));

        tasks.push(self.forward_completed(completed));
        tasks.push(self.gossip_mst_states());
        tasks.push(self.gossip_batches());
        tasks.push(self.commit_proposals());
        tasks.extend(self.register_peers());

        let gossip = self.gossip.clone();
        let cancel = self.cancel.clone();
        tasks.push(tokio::spawn(async move {
            cancel.cancelled().await;
            gossip.close();
            gossip.wait().await;
        }));

        Ok(tasks)
    }

    /// Run the node until Ctrl-C
    pub async fn run(self) -> Result<()> {
        info!("Starting Tessera node");

        let listener = TcpListener::bind(self.config.rpc_addr).await?;
        let tasks = self.start(listener).await?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                info!("Shutting down");
            }
            _ = self.cancel.cancelled() => {}
        }
        self.shutdown();

        for task in tasks {
            if let Err(e) = task.await {
                error!("Node task failed: {}", e);
            }
        }
        Ok(())
    }

    /// Completed multi-signature transactions go to ordering. The queue is
    /// drained in completion order and never drops a transaction.
    fn forward_completed(
        &self,
        mut completed: mpsc::UnboundedReceiver<Transaction>,
    ) -> JoinHandle<()> {
        let gateway = Arc::clone(&self.gateway);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                let tx = tokio::select! {
                    _ = cancel.cancelled() => break,
                    tx = completed.recv() => match tx {
                        Some(tx) => tx,
                        None => break,
                    },
                };
                match gateway.enqueue(tx).await {
                    Ok(_) => {}
                    Err(OrderingError::AlreadyQueued(fingerprint)) => {
                        debug!("Completed transaction {} already queued", fingerprint)
                    }
                    Err(e) => warn!("Completed transaction not ordered: {}", e),
                }
            }
        })
    }

    /// Pending MST entries are pushed to every registered peer. Completed and
    /// expired entries are only published locally.
    fn gossip_mst_states(&self) -> JoinHandle<()> {
        let client = Arc::clone(&self.client);
        let registry = Arc::clone(&self.registry);
        let broadcaster = Arc::clone(&self.broadcaster);
        let gossip = self.gossip.clone();
        let cancel = self.cancel.clone();
        listen(
            self.cancel.clone(),
            self.mst.subscribe_states(),
            "mst-state",
            move |update: MstStateUpdate| {
                let client = Arc::clone(&client);
                let registry = Arc::clone(&registry);
                let broadcaster = Arc::clone(&broadcaster);
                let gossip = gossip.clone();
                let cancel = cancel.clone();
                async move {
                    broadcaster.broadcast(NodeEvent::mst_state_changed(&update));
                    if update.status != EntryStatus::Pending {
                        return;
                    }
                    let peers = registry.peers().await;
                    if peers.is_empty() {
                        return;
                    }
                    spawn_fan_out(&gossip, &cancel, async move {
                        let report = client.broadcast_mst_state(&peers, &update.to_state()).await;
                        debug!(
                            "MST state {} gossiped to {}/{} peers",
                            update.fingerprint,
                            report.delivered.len(),
                            peers.len()
                        );
                    });
                }
            },
        )
    }

    fn gossip_batches(&self) -> JoinHandle<()> {
        let client = Arc::clone(&self.client);
        let registry = Arc::clone(&self.registry);
        let broadcaster = Arc::clone(&self.broadcaster);
        let gossip = self.gossip.clone();
        let cancel = self.cancel.clone();
        listen(
            self.cancel.clone(),
            self.gateway.subscribe_batches(),
            "ordering-batch",
            move |batch: Arc<Batch>| {
                let client = Arc::clone(&client);
                let registry = Arc::clone(&registry);
                let broadcaster = Arc::clone(&broadcaster);
                let gossip = gossip.clone();
                let cancel = cancel.clone();
                async move {
                    broadcaster.broadcast(NodeEvent::batch_produced(&batch));
                    let peers = registry.peers().await;
                    if !peers.is_empty() {
                        spawn_fan_out(&gossip, &cancel, async move {
                            client.broadcast_batch(&peers, &batch).await;
                        });
                    }
                }
            },
        )
    }

    /// Proposals are announced to peers in the background and committed one
    /// at a time, so blocks are built in proposal order.
    fn commit_proposals(&self) -> JoinHandle<()> {
        let client = Arc::clone(&self.client);
        let registry = Arc::clone(&self.registry);
        let committer = Arc::clone(&self.committer);
        let gateway = Arc::clone(&self.gateway);
        let broadcaster = Arc::clone(&self.broadcaster);
        let gossip = self.gossip.clone();
        let cancel = self.cancel.clone();
        listen(
            self.cancel.clone(),
            self.gateway.subscribe_proposals(),
            "ordering-proposal",
            move |proposal: Arc<Proposal>| {
                let client = Arc::clone(&client);
                let registry = Arc::clone(&registry);
                let committer = Arc::clone(&committer);
                let gateway = Arc::clone(&gateway);
                let broadcaster = Arc::clone(&broadcaster);
                let gossip = gossip.clone();
                let cancel = cancel.clone();
                async move {
                    broadcaster.broadcast(NodeEvent::proposal_produced(&proposal));
                    let peers = registry.peers().await;
                    if !peers.is_empty() {
                        let announced = Arc::clone(&proposal);
                        spawn_fan_out(&gossip, &cancel, async move {
                            client.broadcast_proposal(&peers, &announced).await;
                        });
                    }

                    match committer.commit_proposal(&proposal).await {
                        Ok(block) => {
                            gateway.schedule().advance_round(block.height() + 1);
                            broadcaster.broadcast(NodeEvent::block_committed(&block));
                        }
                        Err(e) => warn!("Proposal for round {} not committed: {}", proposal.round, e),
                    }
                }
            },
        )
    }

    /// Probe each configured peer in the background; a peer that answers is
    /// registered and sent the full MST state.
    fn register_peers(&self) -> Vec<JoinHandle<()>> {
        self.peers
            .iter()
            .cloned()
            .map(|peer| {
                let client = Arc::clone(&self.client);
                let registry = Arc::clone(&self.registry);
                let mst = Arc::clone(&self.mst);
                let cancel = self.cancel.clone();
                tokio::spawn(async move {
                    let registered = tokio::select! {
                        _ = cancel.cancelled() => return,
                        result = registry.add_peer(peer.clone()) => result,
                    };
                    if let Err(e) = registered {
                        warn!("Peer {} not registered: {}", peer, e);
                        return;
                    }

                    let state = mst.state().await;
                    if !state.entries.is_empty() {
                        client
                            .broadcast_mst_state(std::slice::from_ref(&peer), &state)
                            .await;
                    }
                })
            })
            .collect()
    }
}

/// Run a peer fan-out on its own task so a slow peer never holds up the
/// next message. Unfinished fan-outs are abandoned on shutdown.
fn spawn_fan_out<Fut>(tracker: &TaskTracker, cancel: &CancellationToken, fan_out: Fut)
where
    Fut: Future<Output = ()> + Send + 'static,
{
    let cancel = cancel.clone();
    tracker.spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = fan_out => {}
        }
    });
}

/// Drive `handle` with every message of `rx` until `cancel` fires or the
/// sender goes away.
fn listen<E, F, Fut>(
    cancel: CancellationToken,
    mut rx: broadcast::Receiver<E>,
    name: &'static str,
    handle: F,
) -> JoinHandle<()>
where
    E: Clone + Send + 'static,
    F: Fn(E) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = rx.recv() => received,
            };
            match received {
                Ok(message) => handle(message).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("{} listener lagged, {} messages skipped", name, skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

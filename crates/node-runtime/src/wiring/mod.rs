//! # Node Wiring
//!
//! Builds the subsystems and connects them.
//!
//! ```text
//!   FileStorage ──Storage──▶ LedgerRegistry ◀── GossipService ◀── GossipFrameHandler
//!        │                        │                   │                  ▲
//!        └──PeerDirectory─────────┼───────────────────┘                  │ frames
//!                                 │ BlockHook (webhook)          Registry (qc-03)
//!                                 ▼                                      ▲
//!                            POST hooks.block      fan-out task ─────────┘
//!                                                  (BroadcastEnvelope)
//! ```
//!
//! ## Background Tasks
//!
//! - accept loop on `server.host:server.port`
//! - fan-out: drains gossip re-broadcasts into `Registry::fanout`
//! - memo sweep: forgets broadcast ids older than `broadcast.memo_ttl_secs`
//! - one dial task per bootstrap or stored peer
//!
//! All of them stop when the shutdown signal fires.

mod bootstrap;
mod handler;

pub use bootstrap::{dial, dial_targets, dial_with_retry, BACKOFF_BASE, BACKOFF_MAX};
pub use handler::GossipFrameHandler;

use crate::adapters::{FileStorage, WebhookBlockHook};
use crate::config::NodeConfig;
use anyhow::{anyhow, bail, Context, Result};
use qc_01_ledger::{Block, BlockHook, LedgerRegistry, Storage};
use qc_02_gossip::{BroadcastEnvelope, BroadcastMemo, GossipService, PeerDirectory};
use qc_03_transport::{PeerInfo, Registry, RegistryHandle, TransportError};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// A running node. Construct inside a tokio runtime.
pub struct NodeRuntime {
    config: NodeConfig,
    ledger: Arc<LedgerRegistry>,
    peers: Arc<dyn PeerDirectory>,
    gossip: Arc<GossipService>,
    registry: RegistryHandle,
    shutdown: watch::Sender<bool>,
}

impl NodeRuntime {
    /// Open file storage under `data.dir` and build the node.
    pub fn open(config: NodeConfig) -> Result<Self> {
        let storage = Arc::new(
            FileStorage::open(&config.data.dir)
                .with_context(|| format!("failed to open storage at {}", config.data.dir.display()))?,
        );
        Self::with_storage(config, storage.clone(), storage)
    }

    /// Build the node over the given stores.
    pub fn with_storage(
        config: NodeConfig,
        storage: Arc<dyn Storage>,
        peers: Arc<dyn PeerDirectory>,
    ) -> Result<Self> {
        let mut ledger = LedgerRegistry::new(storage);
        if let Some(url) = &config.hooks.block {
            let hook = WebhookBlockHook::new(url, tokio::runtime::Handle::current())
                .context("invalid hooks.block")?;
            info!(url = %hook.url(), "[node] block webhook enabled");
            ledger = ledger.with_hook(Arc::new(hook) as Arc<dyn BlockHook>);
        }
        let ledger = Arc::new(ledger);
        let loaded = ledger.load_all().context("failed to load chains")?;

        let memo = Arc::new(BroadcastMemo::default());
        let (fanout_tx, fanout_rx) = mpsc::unbounded_channel();
        let gossip = Arc::new(GossipService::new(
            Arc::clone(&ledger),
            Arc::clone(&peers),
            Arc::clone(&memo),
            config.gossip_config(),
            fanout_tx,
        ));

        let (registry, _registry_task) =
            Registry::start(Arc::new(GossipFrameHandler::new(Arc::clone(&gossip))));
        let (shutdown, _) = watch::channel(false);

        tokio::spawn(forward_broadcasts(
            fanout_rx,
            registry.clone(),
            shutdown.subscribe(),
        ));
        tokio::spawn(sweep_memo(
            memo,
            config.memo_ttl(),
            config.sweep_interval(),
            shutdown.subscribe(),
        ));

        info!(chains = loaded, "[node] runtime initialized");

        Ok(Self {
            config,
            ledger,
            peers,
            gossip,
            registry,
            shutdown,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<LedgerRegistry> {
        &self.ledger
    }

    pub fn peers(&self) -> &Arc<dyn PeerDirectory> {
        &self.peers
    }

    pub fn gossip(&self) -> &Arc<GossipService> {
        &self.gossip
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    /// Bind `server.host:server.port` and start accepting peers.
    ///
    /// Returns the bound address (useful with port 0).
    pub async fn listen(&self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(self.config.listen_addr())
            .await
            .with_context(|| format!("failed to bind {}", self.config.listen_addr()))?;
        let address = listener.local_addr()?;

        let registry = self.registry.clone();
        let mut stop = self.shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = registry.serve(listener) => {}
                _ = stop.changed() => {}
            }
        });

        Ok(address)
    }

    /// Dial one peer and record it in the directory.
    pub async fn connect(&self, url: &str) -> Result<PeerInfo, TransportError> {
        dial(&self.registry, self.peers.as_ref(), url).await
    }

    /// Spawn a dial task for every bootstrap and stored peer.
    pub fn bootstrap(&self) -> Result<usize> {
        let known = self.peers.get_peers(0)?;
        let targets = dial_targets(&self.config.peers.bootstrap, &known);
        let attempts = self.config.peers.retry;

        for url in &targets {
            let registry = self.registry.clone();
            let peers = Arc::clone(&self.peers);
            let url = url.clone();
            let mut stop = self.shutdown.subscribe();
            tokio::spawn(async move {
                tokio::select! {
                    _ = dial_with_retry(&registry, peers.as_ref(), &url, attempts, BACKOFF_BASE) => {}
                    _ = stop.changed() => {}
                }
            });
        }

        debug!(targets = targets.len(), "[node] bootstrap dialing started");
        Ok(targets.len())
    }

    /// Sign a block on an owned chain, store it and broadcast it.
    pub fn create_block(&self, chain_id: &str, payload: Vec<u8>) -> Result<Block> {
        let handle = self
            .ledger
            .chain(chain_id)?
            .ok_or_else(|| anyhow!("unknown chain {chain_id}"))?;

        let block = {
            let mut chain = handle.lock();
            let block = chain.create_block(payload)?;
            if !chain.save_block(block.clone())? {
                bail!("block {} was not accepted by chain {chain_id}", block.height);
            }
            block
        };

        let id = self.gossip.broadcast_block(&block)?;
        info!(chain_id, height = block.height, broadcast = %id, "[node] block created");
        Ok(block)
    }

    /// Listen, dial peers and serve until interrupted or shut down.
    pub async fn run(self) -> Result<()> {
        let address = self.listen().await?;
        let dialing = self.bootstrap()?;
        info!(
            address = %address,
            chains = self.ledger.ids()?.len(),
            dialing,
            "[node] ✓ node running"
        );

        let mut stop = self.shutdown.subscribe();
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for interrupt")?;
                info!("[node] interrupt received");
            }
            _ = stop.changed() => {}
        }

        self.shutdown();
        Ok(())
    }

    /// Stop background tasks and close every connection.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        self.registry.shutdown();
        info!("[node] shutdown requested");
    }
}

async fn forward_broadcasts(
    mut broadcasts: mpsc::UnboundedReceiver<BroadcastEnvelope>,
    registry: RegistryHandle,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            envelope = broadcasts.recv() => match envelope {
                Some(BroadcastEnvelope { exclude, frame }) => {
                    if registry.fanout(exclude.as_deref(), frame).is_err() {
                        break;
                    }
                }
                None => break,
            },
            _ = stop.changed() => break,
        }
    }
    debug!("[node] fan-out task stopped");
}

async fn sweep_memo(
    memo: Arc<BroadcastMemo>,
    ttl: Duration,
    every: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = memo.sweep(ttl);
                if removed > 0 {
                    debug!(removed, remaining = memo.len(), "[node] broadcast memo swept");
                }
            }
            _ = stop.changed() => break,
        }
    }
}

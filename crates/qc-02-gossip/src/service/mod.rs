//! # Gossip Service
//!
//! Drives one inbound frame through decode, validate and react, and turns
//! the outcome into reply frames.
//!
//! ## Concurrency
//!
//! One handling task per connected peer calls [`GossipService::handle_message`]
//! in receive order. Several peers may reach the same chain at once; ledger
//! writes go through the per-chain lock held by `LedgerRegistry` handles.
//! Re-broadcasts leave through an unbounded channel drained by the node's
//! fan-out task.

mod react;
mod validate;

use crate::domain::behavior::{Behavior, BroadcastBlock, Info};
use crate::domain::errors::ProtocolError;
use crate::domain::memo::BroadcastMemo;
use crate::domain::message::{new_message_id, Message};
use crate::ports::outbound::PeerDirectory;
use crate::{DEFAULT_MAX_MESSAGE_SIZE, PROTOCOL_VERSION};
use qc_01_ledger::{Block, LedgerRegistry};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// A frame to flood to every live peer except `exclude`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastEnvelope {
    pub exclude: Option<String>,
    pub frame: Vec<u8>,
}

/// Protocol settings.
#[derive(Debug, Clone)]
pub struct GossipConfig {
    /// Ask peers for their peer lists after `info`.
    pub peer_sync: bool,
    /// Split `response:blocks` at `max_message_size`.
    pub division: bool,
    pub max_message_size: usize,
    /// Advertised in `info`.
    pub platform: BTreeMap<String, String>,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            peer_sync: false,
            division: true,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            platform: platform_info(),
        }
    }
}

/// Host description sent in `info`.
pub fn platform_info() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("system".to_string(), std::env::consts::OS.to_string()),
        ("machine".to_string(), std::env::consts::ARCH.to_string()),
        ("version".to_string(), env!("CARGO_PKG_VERSION").to_string()),
    ])
}

pub struct GossipService {
    ledger: Arc<LedgerRegistry>,
    peers: Arc<dyn PeerDirectory>,
    memo: Arc<BroadcastMemo>,
    config: GossipConfig,
    fanout: mpsc::UnboundedSender<BroadcastEnvelope>,
}

impl GossipService {
    pub fn new(
        ledger: Arc<LedgerRegistry>,
        peers: Arc<dyn PeerDirectory>,
        memo: Arc<BroadcastMemo>,
        config: GossipConfig,
        fanout: mpsc::UnboundedSender<BroadcastEnvelope>,
    ) -> Self {
        Self {
            ledger,
            peers,
            memo,
            config,
            fanout,
        }
    }

    pub fn ledger(&self) -> &Arc<LedgerRegistry> {
        &self.ledger
    }

    pub fn peers(&self) -> &Arc<dyn PeerDirectory> {
        &self.peers
    }

    pub fn memo(&self) -> &Arc<BroadcastMemo> {
        &self.memo
    }

    /// Process one inbound frame from `sender` and return the reply frames.
    pub fn handle_message(&self, sender: &str, frame: &[u8]) -> Vec<Vec<u8>> {
        let message = match Message::decode(frame) {
            Ok(message) => message,
            Err(e) => return self.reply_error(sender, &e),
        };
        let mut behavior = match message.behavior() {
            Ok(behavior) => behavior,
            Err(e) => return self.reply_error(sender, &e),
        };
        debug!(peer = %sender, id = %message.id, kind = %message.kind, "[qc-02] message received");

        if let Behavior::BroadcastBlock(broadcast) = &mut behavior {
            broadcast.id = message.id.clone();
            broadcast.sender = Some(sender.to_string());
        }

        match self.validate(&mut behavior) {
            Ok(()) => {}
            Err(ProtocolError::DuplicateBroadcast(id)) => {
                debug!(peer = %sender, id = %id, "[qc-02] duplicate broadcast dropped");
                return Vec::new();
            }
            Err(e) => return self.reply_error(sender, &e),
        }

        match self.react(behavior) {
            Ok(replies) => replies.iter().filter_map(|reply| self.encode(reply)).collect(),
            Err(e) => self.reply_error(sender, &e),
        }
    }

    fn reply_error(&self, sender: &str, err: &ProtocolError) -> Vec<Vec<u8>> {
        warn!(peer = %sender, code = %err.code(), error = %err, "[qc-02] replying with error");
        self.encode(&Behavior::Error(err.to_reply()))
            .into_iter()
            .collect()
    }

    fn encode(&self, behavior: &Behavior) -> Option<Vec<u8>> {
        match Message::new(behavior).and_then(|message| message.encode()) {
            Ok(frame) => Some(frame),
            Err(e) => {
                error!(kind = behavior.tag(), error = %e, "[qc-02] failed to encode reply");
                None
            }
        }
    }

    /// Local node summary.
    pub fn info(&self) -> Result<Info, ProtocolError> {
        Ok(Info {
            version: PROTOCOL_VERSION.to_string(),
            peers: i64::try_from(self.peers.count_of_peers()?).unwrap_or(i64::MAX),
            chains: self.ledger.summary()?,
            platform: self.config.platform.clone(),
            full_node: true,
        })
    }

    /// Encoded `info` message sent when a peer joins.
    pub fn greeting(&self) -> Result<Vec<u8>, ProtocolError> {
        Message::new(&Behavior::Info(self.info()?))?.encode()
    }

    /// Flood a locally created block to every peer. Returns the broadcast id.
    pub fn broadcast_block(&self, block: &Block) -> Result<String, ProtocolError> {
        let id = new_message_id();
        self.memo.mark_seen(&id);
        let broadcast = BroadcastBlock::new(id.clone(), block)?;
        self.publish(&broadcast)?;
        Ok(id)
    }

    fn publish(&self, broadcast: &BroadcastBlock) -> Result<(), ProtocolError> {
        let frame = Message::with_id(
            broadcast.id.clone(),
            &Behavior::BroadcastBlock(broadcast.clone()),
        )?
        .encode()?;
        self.fanout
            .send(BroadcastEnvelope {
                exclude: broadcast.sender.clone(),
                frame,
            })
            .map_err(|_| ProtocolError::Internal("broadcast channel closed".into()))
    }
}

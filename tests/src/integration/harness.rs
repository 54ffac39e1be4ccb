//! # Test Harness
//!
//! Nodes without sockets: frames go straight into
//! `GossipService::handle_message` and replies bounce back until both sides
//! fall silent.

use qc_01_ledger::{Block, InMemoryStorage, LedgerRegistry, Storage};
use qc_02_gossip::{
    Behavior, BroadcastEnvelope, BroadcastMemo, ErrorReply, GossipConfig, GossipService,
    InMemoryPeerDirectory, Message, PeerDirectory,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Upper bound on frames exchanged in one conversation.
const MAX_FRAMES: usize = 10_000;

pub struct TestNode {
    pub name: String,
    pub ledger: Arc<LedgerRegistry>,
    pub peers: Arc<dyn PeerDirectory>,
    pub gossip: GossipService,
    broadcasts: mpsc::UnboundedReceiver<BroadcastEnvelope>,
}

impl TestNode {
    pub fn new(name: &str) -> Self {
        Self::with_config(name, GossipConfig::default())
    }

    pub fn with_config(name: &str, config: GossipConfig) -> Self {
        Self::with_stores(
            name,
            Arc::new(InMemoryStorage::new()),
            Arc::new(InMemoryPeerDirectory::new()),
            config,
        )
    }

    pub fn with_stores(
        name: &str,
        storage: Arc<dyn Storage>,
        peers: Arc<dyn PeerDirectory>,
        config: GossipConfig,
    ) -> Self {
        let ledger = Arc::new(LedgerRegistry::new(storage));
        ledger.load_all().expect("load chains");
        let (fanout, broadcasts) = mpsc::unbounded_channel();
        let gossip = GossipService::new(
            Arc::clone(&ledger),
            Arc::clone(&peers),
            Arc::new(BroadcastMemo::default()),
            config,
            fanout,
        );
        Self {
            name: name.to_string(),
            ledger,
            peers,
            gossip,
            broadcasts,
        }
    }

    /// Create an owned chain and return its id.
    pub fn create_chain(&self, genesis: &[u8]) -> String {
        let handle = self.ledger.create_chain(genesis.to_vec()).expect("create chain");
        let id = handle.lock().id().to_string();
        id
    }

    /// Append `n` blocks to an owned chain.
    pub fn extend(&self, chain_id: &str, n: usize, payload_len: usize) -> Vec<Block> {
        let handle = self.ledger.chain(chain_id).unwrap().expect("known chain");
        let mut chain = handle.lock();
        (0..n)
            .map(|i| {
                let mut payload = format!("{chain_id}/{i}/").into_bytes();
                payload.resize(payload_len.max(payload.len()), b'.');
                let block = chain.create_block(payload).unwrap();
                assert!(chain.save_block(block.clone()).unwrap());
                block
            })
            .collect()
    }

    /// Create one block and publish it as a local broadcast.
    pub fn publish(&self, chain_id: &str, payload: &[u8]) -> Block {
        let handle = self.ledger.chain(chain_id).unwrap().expect("known chain");
        let block = {
            let mut chain = handle.lock();
            let block = chain.create_block(payload.to_vec()).unwrap();
            assert!(chain.save_block(block.clone()).unwrap());
            block
        };
        self.gossip.broadcast_block(&block).unwrap();
        block
    }

    pub fn track(&self, chain_id: &str) {
        self.ledger.track_chain(chain_id).expect("track chain");
    }

    pub fn count(&self, chain_id: &str) -> u64 {
        self.ledger
            .summary()
            .unwrap()
            .get(chain_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn block(&self, chain_id: &str, height: u64) -> Option<Block> {
        let handle = self.ledger.chain(chain_id).unwrap()?;
        let block = handle.lock().get_block(height).unwrap();
        block
    }

    pub fn greeting(&self) -> Vec<u8> {
        self.gossip.greeting().unwrap()
    }

    /// Broadcast frames queued since the last call.
    pub fn take_broadcasts(&mut self) -> Vec<BroadcastEnvelope> {
        let mut out = Vec::new();
        while let Ok(envelope) = self.broadcasts.try_recv() {
            out.push(envelope);
        }
        out
    }
}

/// Record of one conversation.
#[derive(Debug, Default)]
pub struct Transcript {
    pub frames: usize,
    /// `(receiver, behavior tag)` for every delivered frame.
    pub delivered: Vec<(String, String)>,
    /// Errors replied by either side.
    pub errors: Vec<ErrorReply>,
}

impl Transcript {
    pub fn count_of(&self, tag: &str) -> usize {
        self.delivered.iter().filter(|(_, t)| t == tag).count()
    }
}

/// Deliver `frame` from `from` to `to`, then route replies back and forth
/// until neither side has anything left to say.
pub fn converse(from: &TestNode, to: &TestNode, frame: Vec<u8>) -> Transcript {
    let mut transcript = Transcript::default();
    let mut queue = VecDeque::from([(false, frame)]);

    while let Some((to_sender, frame)) = queue.pop_front() {
        transcript.frames += 1;
        assert!(transcript.frames < MAX_FRAMES, "conversation does not terminate");

        let (receiver, sender) = if to_sender { (from, to) } else { (to, from) };
        if let Ok(Ok(behavior)) = Message::decode(&frame).map(|m| m.behavior()) {
            if let Behavior::Error(reply) = &behavior {
                transcript.errors.push(reply.clone());
            }
            transcript
                .delivered
                .push((receiver.name.clone(), behavior.tag().to_string()));
        }

        for reply in receiver.gossip.handle_message(&sender.name, &frame) {
            queue.push_back((!to_sender, reply));
        }
    }
    transcript
}

/// Both sides send `info`, as on connect.
pub fn handshake(a: &TestNode, b: &TestNode) -> Transcript {
    let mut first = converse(a, b, a.greeting());
    let second = converse(b, a, b.greeting());
    first.frames += second.frames;
    first.delivered.extend(second.delivered);
    first.errors.extend(second.errors);
    first
}

/// Behaviors decoded from reply frames.
pub fn decode_all(frames: &[Vec<u8>]) -> Vec<Behavior> {
    frames
        .iter()
        .map(|frame| Message::decode(frame).unwrap().behavior().unwrap())
        .collect()
}

/// The single error reply in `frames`.
pub fn single_error(frames: &[Vec<u8>]) -> ErrorReply {
    match decode_all(frames).as_slice() {
        [Behavior::Error(reply)] => reply.clone(),
        other => panic!("expected one error reply, got {other:?}"),
    }
}

//! # Gossip Protocol (qc-02)
//!
//! Request/response/broadcast message exchange between peers.
//!
//! ## Wire Format
//!
//! Every frame is one JSON envelope:
//!
//! ```text
//! {"id": "<base58 token>", "type": "<behavior tag>", "data": { ... }}
//! ```
//!
//! | Tag | Behavior | Reply |
//! |-----|----------|-------|
//! | `info` | Node summary sent on connect | `request:peers`, `request:blocks` |
//! | `request:peers` | Ask for known peers | `response:peers` |
//! | `request:blocks` | Ask for a height range | one or more `response:blocks` |
//! | `response:peers` | Peer URLs | - |
//! | `response:blocks` | Block batch (commits the pending cache) | - |
//! | `broadcast:block` | Newly created block, flooded to every peer | - |
//! | `error` | Failure report | - |
//!
//! ## Processing
//!
//! `GossipService::handle_message` decodes a frame, validates the behavior
//! (no state change on failure), reacts, and returns the encoded replies.
//! Failures become `error` replies. Duplicate broadcasts are dropped silently.
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Envelope, behaviors, tag registry, broadcast memo, errors
//! - `ports/` - `PeerDirectory`
//! - `adapters/` - In-memory peer directory
//! - `service/` - `GossipService`

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::InMemoryPeerDirectory;
pub use domain::behavior::{
    Behavior, BroadcastBlock, ErrorReply, Info, RequestBlocks, RequestPeers, ResponseBlocks,
    ResponsePeers,
};
pub use domain::errors::{PeerStoreError, ProtocolError};
pub use domain::memo::BroadcastMemo;
pub use domain::message::{new_message_id, Message};
pub use domain::peer::Peer;
pub use ports::outbound::PeerDirectory;
pub use service::{platform_info, BroadcastEnvelope, GossipConfig, GossipService};

/// Supported protocol version.
pub const PROTOCOL_VERSION: &str = "1.1";

/// Default soft cap on a single `response:blocks` message (1 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

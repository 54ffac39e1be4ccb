//! # Transport (qc-03)
//!
//! Persistent websocket connections between nodes. Frames are opaque bytes:
//! this crate never parses protocol messages.
//!
//! ## Tasks
//!
//! ```text
//!              ┌──────────── Registry (owns address → PeerConnection) ───────────┐
//!  accept/dial │ join ──────▶ register, start handler task (sends greeting)      │
//!              │ leave ─────▶ deregister (matching connection id only)           │
//!              │ fanout ────▶ push frame to every peer except the sender         │
//!              └─────────────────────────────────────────────────────────────────┘
//!
//!  per connection:  read task ──received──▶ handler task ──to-send──▶ write task
//! ```
//!
//! A read error or close handshake ends the read task, which stops the write
//! task, closes the received queue (ending the handler task) and reports the
//! departure to the registry. A failed or timed-out write ends the write task,
//! which in turn ends the read task the same way.

mod connection;
mod errors;
mod ports;
mod registry;
mod supervisor;

pub use connection::{ConnectionId, PeerConnection, PeerInfo, DEFAULT_PEER_RANK, WRITE_WAIT};
pub use errors::TransportError;
pub use ports::FrameHandler;
pub use registry::{Registry, RegistryHandle, ACCEPT_RETRY_DELAY};
pub use supervisor::HANDLER_RESTART_DELAY;

//! Peer directory adapters.

mod memory;

pub use memory::InMemoryPeerDirectory;

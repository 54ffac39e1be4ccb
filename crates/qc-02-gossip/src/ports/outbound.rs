//! # Outbound Ports (Driven Ports)
//!
//! Production: `FileStorage` (node-runtime/adapters/file_storage.rs)
//! Testing: `InMemoryPeerDirectory` (adapters/memory.rs)

use crate::domain::errors::PeerStoreError;
use crate::domain::peer::Peer;

/// Flat list of known peer addresses.
pub trait PeerDirectory: Send + Sync {
    fn count_of_peers(&self) -> Result<usize, PeerStoreError>;

    fn get_peer(&self, address: &str) -> Result<Option<Peer>, PeerStoreError>;

    /// Up to `limit` peers ordered by [`Peer::preference`]; 0 returns all.
    fn get_peers(&self, limit: usize) -> Result<Vec<Peer>, PeerStoreError>;

    /// Insert or replace by address.
    fn save_peer(&self, peer: &Peer) -> Result<(), PeerStoreError>;

    fn delete_peer(&self, address: &str) -> Result<(), PeerStoreError>;
}

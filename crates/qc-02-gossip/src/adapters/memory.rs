use crate::domain::errors::PeerStoreError;
use crate::domain::peer::Peer;
use crate::ports::outbound::PeerDirectory;
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory peer directory for tests and ephemeral nodes.
#[derive(Default)]
pub struct InMemoryPeerDirectory {
    peers: RwLock<HashMap<String, Peer>>,
}

impl InMemoryPeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PeerDirectory for InMemoryPeerDirectory {
    fn count_of_peers(&self) -> Result<usize, PeerStoreError> {
        Ok(self.peers.read().len())
    }

    fn get_peer(&self, address: &str) -> Result<Option<Peer>, PeerStoreError> {
        Ok(self.peers.read().get(address).cloned())
    }

    fn get_peers(&self, limit: usize) -> Result<Vec<Peer>, PeerStoreError> {
        let mut peers: Vec<Peer> = self.peers.read().values().cloned().collect();
        peers.sort_by(Peer::preference);
        if limit > 0 {
            peers.truncate(limit);
        }
        Ok(peers)
    }

    fn save_peer(&self, peer: &Peer) -> Result<(), PeerStoreError> {
        self.peers.write().insert(peer.address.clone(), peer.clone());
        Ok(())
    }

    fn delete_peer(&self, address: &str) -> Result<(), PeerStoreError> {
        self.peers.write().remove(address);
        Ok(())
    }
}

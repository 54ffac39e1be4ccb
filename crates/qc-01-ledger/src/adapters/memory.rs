use crate::domain::block::Block;
use crate::domain::errors::StorageError;
use crate::ports::outbound::{ChainRef, Storage, StoredChain};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Default)]
struct Inner {
    chains: BTreeMap<ChainRef, StoredChain>,
    blocks: HashMap<ChainRef, BTreeMap<u64, Block>>,
    next_ref: ChainRef,
}

/// In-memory storage for unit tests and ephemeral nodes.
#[derive(Default)]
pub struct InMemoryStorage {
    inner: RwLock<Inner>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blocks across all chains.
    pub fn block_count(&self) -> usize {
        self.inner.read().blocks.values().map(BTreeMap::len).sum()
    }
}

impl Storage for InMemoryStorage {
    fn get_chain(&self, id: &str) -> Result<Option<StoredChain>, StorageError> {
        Ok(self
            .inner
            .read()
            .chains
            .values()
            .find(|chain| chain.id == id)
            .cloned())
    }

    fn get_all_chains(&self) -> Result<Vec<StoredChain>, StorageError> {
        Ok(self.inner.read().chains.values().cloned().collect())
    }

    fn get_block(&self, chain: ChainRef, height: u64) -> Result<Option<Block>, StorageError> {
        Ok(self
            .inner
            .read()
            .blocks
            .get(&chain)
            .and_then(|blocks| blocks.get(&height))
            .cloned())
    }

    fn get_block_by_hash(
        &self,
        chain: ChainRef,
        hash: &str,
    ) -> Result<Option<Block>, StorageError> {
        Ok(self
            .inner
            .read()
            .blocks
            .get(&chain)
            .and_then(|blocks| blocks.values().find(|block| block.hash == hash))
            .cloned())
    }

    fn get_blocks(&self, chain: ChainRef, from: u64, to: u64) -> Result<Vec<Block>, StorageError> {
        if from > to {
            return Ok(Vec::new());
        }
        Ok(self
            .inner
            .read()
            .blocks
            .get(&chain)
            .map(|blocks| blocks.range(from..=to).map(|(_, b)| b.clone()).collect())
            .unwrap_or_default())
    }

    fn save_chain(&self, id: &str, wif: Option<&str>) -> Result<ChainRef, StorageError> {
        let mut inner = self.inner.write();
        if inner.chains.values().any(|chain| chain.id == id) {
            return Err(StorageError::ChainExists(id.to_string()));
        }
        inner.next_ref += 1;
        let reference = inner.next_ref;
        inner.chains.insert(
            reference,
            StoredChain {
                reference,
                id: id.to_string(),
                wif: wif.map(str::to_string),
                count: 0,
            },
        );
        Ok(reference)
    }

    fn increment_count(&self, chain: ChainRef) -> Result<u64, StorageError> {
        let mut inner = self.inner.write();
        let stored = inner
            .chains
            .get_mut(&chain)
            .ok_or(StorageError::UnknownReference(chain))?;
        stored.count += 1;
        Ok(stored.count)
    }

    fn save_block(&self, chain: ChainRef, block: &Block) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        if !inner.chains.contains_key(&chain) {
            return Err(StorageError::UnknownReference(chain));
        }
        inner
            .blocks
            .entry(chain)
            .or_default()
            .insert(block.height, block.clone());
        Ok(())
    }

    fn delete_chain(&self, chain: ChainRef) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        inner.chains.remove(&chain);
        inner.blocks.remove(&chain);
        Ok(())
    }
}

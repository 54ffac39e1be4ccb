//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the ledger requires the host application to implement.
//!
//! Production: `FileStorage` (node-runtime/adapters/file_storage.rs)
//! Testing: `InMemoryStorage` (adapters/memory.rs)

use crate::domain::block::Block;
use crate::domain::errors::StorageError;
use serde::{Deserialize, Serialize};

/// Storage-local chain reference assigned by `save_chain`.
pub type ChainRef = u64;

/// Chain record as persisted by storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChain {
    pub reference: ChainRef,
    pub id: String,
    /// Owner key; `None` for read-only chains.
    pub wif: Option<String>,
    pub count: u64,
}

/// Persistent chain and block store.
///
/// Implementations use interior mutability; a single instance is shared by
/// every chain handle.
pub trait Storage: Send + Sync {
    /// Look up a chain by id.
    fn get_chain(&self, id: &str) -> Result<Option<StoredChain>, StorageError>;

    /// Every stored chain.
    fn get_all_chains(&self) -> Result<Vec<StoredChain>, StorageError>;

    /// Block at `height`.
    fn get_block(&self, chain: ChainRef, height: u64) -> Result<Option<Block>, StorageError>;

    /// Block with the given hash.
    fn get_block_by_hash(&self, chain: ChainRef, hash: &str)
        -> Result<Option<Block>, StorageError>;

    /// Blocks in `[from, to]`, ascending. Missing heights are skipped.
    fn get_blocks(&self, chain: ChainRef, from: u64, to: u64) -> Result<Vec<Block>, StorageError>;

    /// Register a chain with count 0 and return its reference.
    ///
    /// Fails with `ChainExists` if the id is already stored.
    fn save_chain(&self, id: &str, wif: Option<&str>) -> Result<ChainRef, StorageError>;

    /// Increment the accepted-block count and return the new value.
    fn increment_count(&self, chain: ChainRef) -> Result<u64, StorageError>;

    /// Persist a block.
    fn save_block(&self, chain: ChainRef, block: &Block) -> Result<(), StorageError>;

    /// Remove a chain and all of its blocks.
    fn delete_chain(&self, chain: ChainRef) -> Result<(), StorageError>;
}

/// Notified after every newly accepted block.
pub trait BlockHook: Send + Sync {
    fn on_block_saved(&self, chain_id: &str, block: &Block);
}

//! # Pending Blocks
//!
//! Per-chain holding area for validated blocks awaiting commit, keyed by
//! height. Commit drains it in ascending height order so ancestors always land
//! before their descendants.

use crate::domain::block::Block;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
pub struct PendingBlocks {
    blocks: BTreeMap<u64, Block>,
}

impl PendingBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the block at its height.
    pub fn insert(&mut self, block: Block) {
        self.blocks.insert(block.height, block);
    }

    pub fn get(&self, height: u64) -> Option<&Block> {
        self.blocks.get(&height)
    }

    /// Remove and return the lowest block.
    pub fn pop_lowest(&mut self) -> Option<Block> {
        self.blocks.pop_first().map(|(_, block)| block)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Drop the block at `height`, if any.
    pub fn remove(&mut self, height: u64) -> Option<Block> {
        self.blocks.remove(&height)
    }
}

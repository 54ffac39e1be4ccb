use crate::domain::block::Block;
use crate::domain::cache::PendingBlocks;
use crate::domain::errors::{BlockValidationError, LedgerError};
use crate::ports::outbound::{BlockHook, ChainRef, Storage, StoredChain};
use shared_crypto::KeyPair;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info};

/// A single-writer chain bound to storage.
///
/// Obtain instances through [`LedgerRegistry`](crate::LedgerRegistry); two
/// `Chain` values for the same id would defeat per-chain locking.
pub struct Chain {
    id: String,
    count: u64,
    key: Option<KeyPair>,
    reference: ChainRef,
    pending: PendingBlocks,
    storage: Arc<dyn Storage>,
    hook: Option<Arc<dyn BlockHook>>,
}

impl Chain {
    pub(crate) fn from_stored(
        stored: StoredChain,
        storage: Arc<dyn Storage>,
        hook: Option<Arc<dyn BlockHook>>,
    ) -> Result<Self, LedgerError> {
        let key = stored
            .wif
            .as_deref()
            .filter(|wif| !wif.is_empty())
            .map(KeyPair::from_wif)
            .transpose()?;

        if let Some(key) = &key {
            if key.address() != stored.id {
                return Err(LedgerError::CorruptedState {
                    chain_id: stored.id,
                    reason: format!("stored key belongs to {}", key.address()),
                });
            }
        }

        Ok(Self {
            id: stored.id,
            count: stored.count,
            key,
            reference: stored.reference,
            pending: PendingBlocks::new(),
            storage,
            hook,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of accepted blocks; also the next expected height.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn reference(&self) -> ChainRef {
        self.reference
    }

    /// Holds the private key.
    pub fn is_owner(&self) -> bool {
        self.key.is_some()
    }

    /// Owner key as WIF, for owned chains.
    pub fn wif(&self) -> Option<String> {
        self.key.as_ref().map(KeyPair::to_wif)
    }

    /// Blocks validated but not yet committed.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Committed block at `height`.
    pub fn get_block(&self, height: u64) -> Result<Option<Block>, LedgerError> {
        Ok(self.storage.get_block(self.reference, height)?)
    }

    /// Committed blocks in `[from, to]`.
    pub fn get_blocks(&self, from: u64, to: u64) -> Result<Vec<Block>, LedgerError> {
        Ok(self.storage.get_blocks(self.reference, from, to)?)
    }

    fn lookup(&self, height: u64, include_pending: bool) -> Result<Option<Block>, LedgerError> {
        if include_pending {
            if let Some(block) = self.pending.get(height) {
                return Ok(Some(block.clone()));
            }
        }
        self.get_block(height)
    }

    /// Sign a new block at `height = count` on top of the current tip.
    ///
    /// Fails with `NotOwner` for read-only chains and `CorruptedState` when the
    /// tip block is missing locally.
    pub fn create_block(&self, payload: Vec<u8>) -> Result<Block, LedgerError> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| LedgerError::NotOwner(self.id.clone()))?;

        let prev_hash = match self.count.checked_sub(1) {
            None => String::new(),
            Some(tip) => match self.lookup(tip, true)? {
                Some(block) => block.hash,
                None => {
                    error!(
                        chain_id = %self.id,
                        height = tip,
                        "[qc-01] owned chain is missing its tip block"
                    );
                    return Err(LedgerError::CorruptedState {
                        chain_id: self.id.clone(),
                        reason: format!("block {tip} missing from owned chain"),
                    });
                }
            },
        };

        Ok(Block::sign_new(key, self.count, now(), prev_hash, payload)?)
    }

    /// Validate against committed blocks only.
    pub fn validate_block(&self, block: &Block) -> Result<(), LedgerError> {
        self.check(block, false)
    }

    /// Validate against pending then committed blocks, and hold the block in
    /// the pending cache on success.
    pub fn cache_block(&mut self, block: Block) -> Result<(), LedgerError> {
        self.check(&block, true)?;
        debug!(
            chain_id = %self.id,
            height = block.height,
            "[qc-01] block cached"
        );
        self.pending.insert(block);
        Ok(())
    }

    /// Undo a [`cache_block`](Self::cache_block) at `height`.
    pub fn discard_pending(&mut self, height: u64) -> bool {
        self.pending.remove(height).is_some()
    }

    fn check(&self, block: &Block, include_pending: bool) -> Result<(), LedgerError> {
        let recovered = block.verify()?;
        if recovered != self.id {
            return Err(BlockValidationError::MismatchedIdentity {
                height: block.height,
                expected: self.id.clone(),
                recovered,
            }
            .into());
        }

        if let Some(existing) = self.lookup(block.height, include_pending)? {
            if existing.same_content(block) {
                return Err(BlockValidationError::ExistBlock {
                    height: block.height,
                    hash: block.hash.clone(),
                }
                .into());
            }
            return Err(BlockValidationError::Fork {
                height: block.height,
                local_hash: existing.hash,
                local_prev_hash: existing.prev_hash,
                incoming_hash: block.hash.clone(),
                incoming_prev_hash: block.prev_hash.clone(),
            }
            .into());
        }

        if let Some(parent) = block.height.checked_sub(1) {
            match self.lookup(parent, include_pending)? {
                Some(prev) if prev.hash == block.prev_hash => {}
                _ => {
                    return Err(BlockValidationError::DangledBlock {
                        height: block.height,
                        prev_hash: block.prev_hash.clone(),
                    }
                    .into())
                }
            }
        }

        Ok(())
    }

    /// Re-validate and commit a block.
    ///
    /// Returns `Ok(true)` for a newly accepted block and `Ok(false)` for a
    /// duplicate or fork, which leave the chain unchanged.
    pub fn save_block(&mut self, block: Block) -> Result<bool, LedgerError> {
        match self.validate_block(&block) {
            Ok(()) => {}
            Err(LedgerError::Validation(e)) if e.is_benign() => {
                debug!(chain_id = %self.id, error = %e, "[qc-01] block not saved");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        self.commit(block)?;
        Ok(true)
    }

    fn commit(&mut self, block: Block) -> Result<(), LedgerError> {
        self.storage.save_block(self.reference, &block)?;
        self.count = self.storage.increment_count(self.reference)?;
        info!(
            chain_id = %self.id,
            height = block.height,
            hash = %block.hash,
            "[qc-01] ✓ block accepted"
        );

        if let Some(hook) = &self.hook {
            hook.on_block_saved(&self.id, &block);
        }
        Ok(())
    }

    /// Replay pending blocks in ascending height.
    ///
    /// Blocks whose ancestor is still missing stay cached; every other entry is
    /// evicted whether it committed or not. Returns the number committed.
    pub fn commit_cache(&mut self) -> Result<usize, LedgerError> {
        let mut committed = 0;
        let mut dangled = Vec::new();

        while let Some(block) = self.pending.pop_lowest() {
            match self.validate_block(&block) {
                Ok(()) => {
                    self.commit(block)?;
                    committed += 1;
                }
                Err(LedgerError::Validation(BlockValidationError::DangledBlock { .. })) => {
                    dangled.push(block);
                }
                Err(LedgerError::Validation(e)) => {
                    debug!(chain_id = %self.id, error = %e, "[qc-01] evicting cached block");
                }
                Err(e) => {
                    self.pending.insert(block);
                    for block in dangled {
                        self.pending.insert(block);
                    }
                    return Err(e);
                }
            }
        }

        for block in dangled {
            self.pending.insert(block);
        }

        if committed > 0 {
            debug!(
                chain_id = %self.id,
                committed,
                count = self.count,
                "[qc-01] pending cache committed"
            );
        }
        Ok(committed)
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("id", &self.id)
            .field("count", &self.count)
            .field("owner", &self.is_owner())
            .field("reference", &self.reference)
            .field("pending", &self.pending.len())
            .finish()
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

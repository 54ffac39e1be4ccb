//! # Ledger (qc-01)
//!
//! Signed, append-only chains with exactly one authorized writer each.
//!
//! ## Model
//!
//! - A [`Block`] commits to `height ++ time ++ prev_hash ++ payload` through a
//!   SHA-256 hash and carries a recoverable signature over the same preimage.
//! - A block never names its chain: the chain id is the address recovered from
//!   the signature.
//! - A [`Chain`] is owned when it holds the private key (it can create blocks)
//!   and read-only otherwise (it only validates and accepts blocks).
//!
//! ## Validation Order
//!
//! | Step | Check | Failure |
//! |------|-------|---------|
//! | 1 | Hash matches and identity recoverable | `InvalidBlockError` |
//! | 2 | Recovered identity equals chain id | `MismatchedIdentityError` |
//! | 3 | Height already occupied by different content | `ForkError` |
//! | 3 | Height already occupied by the same block | `ExistBlockError` |
//! | 4 | Ancestor at `height - 1` missing or different | `DangledBlockError` |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Blocks, pending cache and error taxonomy (pure)
//! - `ports/` - `Storage` and `BlockHook` traits
//! - `adapters/` - In-memory storage
//! - `service/` - `Chain` and the `LedgerRegistry` that hands out one locked
//!   handle per chain id
//!
//! ## Usage
//!
//! ```ignore
//! use qc_01_ledger::{InMemoryStorage, LedgerRegistry};
//! use std::sync::Arc;
//!
//! let ledger = LedgerRegistry::new(Arc::new(InMemoryStorage::new()));
//! let chain = ledger.create_chain(b"genesis".to_vec())?;
//! let mut chain = chain.lock();
//! let block = chain.create_block(b"hello".to_vec())?;
//! assert!(chain.save_block(block)?);
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::InMemoryStorage;
pub use domain::block::Block;
pub use domain::cache::PendingBlocks;
pub use domain::errors::{BlockValidationError, LedgerError, StorageError};
pub use ports::outbound::{BlockHook, ChainRef, Storage, StoredChain};
pub use service::{Chain, ChainHandle, LedgerRegistry};

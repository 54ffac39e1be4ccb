//! # Domain Errors
//!
//! Error taxonomy for block validation, chain operations and storage.
//!
//! Every error exposes a stable `code()` that peers receive verbatim in
//! protocol error replies.

use shared_crypto::KeyError;
use thiserror::Error;

/// Reasons a block is rejected by a chain.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BlockValidationError {
    /// Hash does not match the content, or no identity is recoverable.
    #[error("invalid block at height {height}: {reason}")]
    InvalidBlock { height: u64, reason: String },

    /// A different block already occupies this height.
    #[error("fork at height {height}: local block {local_hash} (prev {local_prev_hash}) differs from incoming {incoming_hash} (prev {incoming_prev_hash})")]
    Fork {
        height: u64,
        local_hash: String,
        local_prev_hash: String,
        incoming_hash: String,
        incoming_prev_hash: String,
    },

    /// The exact block is already stored.
    #[error("block {hash} already exists at height {height}")]
    ExistBlock { height: u64, hash: String },

    /// The block was signed by a key other than the chain owner.
    #[error("block at height {height} recovers to {recovered}, expected chain {expected}")]
    MismatchedIdentity {
        height: u64,
        expected: String,
        recovered: String,
    },

    /// The ancestor at `height - 1` is missing or has a different hash.
    #[error("block at height {height} references ancestor {prev_hash} which is not present")]
    DangledBlock { height: u64, prev_hash: String },
}

impl BlockValidationError {
    /// Stable identifier sent to peers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidBlock { .. } => "InvalidBlockError",
            Self::Fork { .. } => "ForkError",
            Self::ExistBlock { .. } => "ExistBlockError",
            Self::MismatchedIdentity { .. } => "MismatchedIdentityError",
            Self::DangledBlock { .. } => "DangledBlockError",
        }
    }

    /// Fork and duplicate are rejections that leave the chain unchanged and
    /// are not failures from the caller's point of view.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::Fork { .. } | Self::ExistBlock { .. })
    }
}

/// Errors raised by storage adapters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// A chain with this id is already stored.
    #[error("chain {0} already exists")]
    ChainExists(String),

    /// No chain with this storage reference.
    #[error("unknown chain reference {0}")]
    UnknownReference(u64),

    /// Underlying I/O failure.
    #[error("storage I/O error: {0}")]
    Io(String),

    /// Stored record could not be encoded or decoded.
    #[error("storage serialization error: {0}")]
    Serialization(String),

    /// The store is held by another process.
    #[error("storage locked: {0}")]
    Locked(String),
}

/// Errors raised by chain and registry operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Block rejected by validation.
    #[error(transparent)]
    Validation(#[from] BlockValidationError),

    /// Block creation requested on a chain without its private key.
    #[error("chain {0} is read-only")]
    NotOwner(String),

    /// Local state contradicts itself; the chain cannot continue safely.
    #[error("corrupted state for chain {chain_id}: {reason}")]
    CorruptedState { chain_id: String, reason: String },

    /// Chain is not tracked locally.
    #[error("unknown chain {0}")]
    UnknownChain(String),

    /// Chain id is not a valid address.
    #[error("invalid chain id {id}: {reason}")]
    InvalidChainId { id: String, reason: String },

    /// Storage adapter failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Key decoding or signing failure.
    #[error(transparent)]
    Key(#[from] KeyError),
}

impl LedgerError {
    /// Stable identifier sent to peers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.code(),
            Self::NotOwner(_) => "NotOwnerError",
            Self::CorruptedState { .. } => "CorruptedStateError",
            Self::UnknownChain(_) => "UnknownChainError",
            Self::InvalidChainId { .. } => "InvalidChainIdError",
            Self::Storage(_) => "StorageError",
            Self::Key(e) => e.code(),
        }
    }

    /// The validation error inside, if any.
    pub fn as_validation(&self) -> Option<&BlockValidationError> {
        match self {
            Self::Validation(e) => Some(e),
            _ => None,
        }
    }
}

//! # Protocol Errors
//!
//! Every variant converts into an `error` behavior sent back to the peer.
//! Ledger failures pass through with their own code and description.

use crate::domain::behavior::ErrorReply;
use qc_01_ledger::LedgerError;
use thiserror::Error;

/// Gossip protocol failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Envelope undecodable or message type unknown.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Behavior data does not match the variant's fields.
    #[error("invalid behavior: {0}")]
    InvalidBehavior(String),

    #[error("incompatible protocol version: {0}")]
    IncompatibleProtocolVersion(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Embedded block JSON could not be decoded.
    #[error("JSON decode error: {0}")]
    JsonDecode(String),

    /// The chain is not tracked by this node.
    #[error("chain not accepted: {0}")]
    ChainNotAccepted(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Broadcast id already processed.
    #[error("duplicate broadcast: {0}")]
    DuplicateBroadcast(String),

    /// Ledger error carried verbatim.
    #[error("{code}: {desc}")]
    Ledger { code: String, desc: String },

    /// Local failure unrelated to the request.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProtocolError {
    /// Stable identifier sent to peers.
    pub fn code(&self) -> &str {
        match self {
            Self::InvalidMessage(_) => "InvalidMessageError",
            Self::InvalidBehavior(_) => "InvalidBehaviorError",
            Self::IncompatibleProtocolVersion(_) => "IncompatibleProtocolVersionError",
            Self::BadRequest(_) => "BadRequestError",
            Self::JsonDecode(_) => "JSONDecodeError",
            Self::ChainNotAccepted(_) => "ChainNotAcceptedError",
            Self::InvalidUrl(_) => "InvalidURLError",
            Self::DuplicateBroadcast(_) => "DuplicateBroadcastError",
            Self::Ledger { code, .. } => code,
            Self::Internal(_) => "InternalError",
        }
    }

    /// The `error` behavior reporting this failure.
    pub fn to_reply(&self) -> ErrorReply {
        let desc = match self {
            Self::Ledger { desc, .. } => desc.clone(),
            other => other.to_string(),
        };
        ErrorReply {
            code: self.code().to_string(),
            desc,
        }
    }
}

impl From<LedgerError> for ProtocolError {
    fn from(err: LedgerError) -> Self {
        Self::Ledger {
            code: err.code().to_string(),
            desc: err.to_string(),
        }
    }
}

impl From<qc_01_ledger::BlockValidationError> for ProtocolError {
    fn from(err: qc_01_ledger::BlockValidationError) -> Self {
        LedgerError::from(err).into()
    }
}

impl From<PeerStoreError> for ProtocolError {
    fn from(err: PeerStoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Peer directory failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PeerStoreError {
    #[error("peer store I/O error: {0}")]
    Io(String),

    #[error("peer store serialization error: {0}")]
    Serialization(String),
}

//! # Adapters
//!
//! Production implementations of the ledger and gossip ports.
//!
//! - `file_storage` - `Storage` + `PeerDirectory` over plain files
//! - `lock` - exclusive lock on the data directory
//! - `webhook` - `BlockHook` that POSTs accepted blocks

pub mod file_storage;
pub mod lock;
pub mod webhook;

pub use file_storage::{FileStorage, SPILL_THRESHOLD};
pub use lock::{DataDirLock, LockError};
pub use webhook::{WebhookBlockHook, WebhookError};

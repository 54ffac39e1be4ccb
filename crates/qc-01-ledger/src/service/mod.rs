//! # Ledger Service
//!
//! `Chain` applies the validation rules against storage and the pending
//! cache. `LedgerRegistry` owns the set of loaded chains and hands out one
//! `Arc<Mutex<Chain>>` per chain id, so validate and commit of the same chain
//! always run inside one critical section.

mod chain;
mod registry;

pub use chain::Chain;
pub use registry::{ChainHandle, LedgerRegistry};

//! Domain layer: blocks, the pending-block cache and ledger errors.

pub mod block;
pub mod cache;
pub mod errors;

//! # Shared Crypto - Key Management
//!
//! Keys, addresses and signatures behind chain identity.
//!
//! ## Components
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `ecdsa` | secp256k1 keypairs, recoverable signing, address recovery |
//! | `encoding` | base58check, WIF and address encodings |
//! | `hashing` | SHA-256, double SHA-256, HASH160 |
//!
//! A chain is identified by the address of its owner key. Blocks carry no
//! explicit owner: the address is recovered from the block signature.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod encoding;
pub mod errors;
pub mod hashing;

// Re-exports
pub use ecdsa::{recover_address, verify, KeyPair, RecoverableSignature};
pub use encoding::{from_base58, to_base58, validate_address};
pub use errors::KeyError;
pub use hashing::{sha256, Hash};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}

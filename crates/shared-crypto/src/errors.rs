//! Key management error types.

use thiserror::Error;

/// Errors raised while decoding keys, addresses or signatures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    /// Bytes do not form a valid secp256k1 scalar.
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    /// Base58check checksum does not match its payload.
    #[error("checksum mismatch: expected {expected:02x?}, got {actual:02x?}")]
    Checksum {
        /// First 4 bytes of the double SHA-256 of the payload.
        expected: [u8; 4],
        /// Trailing 4 bytes found in the encoded string.
        actual: [u8; 4],
    },

    /// Text is not valid base58.
    #[error("invalid base58 string: {0}")]
    Base58(String),

    /// Decoded data has an unexpected length or version byte.
    #[error("malformed encoding: {0}")]
    Malformed(String),

    /// Public key could not be recovered from a signature.
    #[error("signature recovery failed: {0}")]
    Recovery(String),
}

impl KeyError {
    /// Stable identifier used in diagnostics.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidKey(_) => "InvalidKeyError",
            Self::Checksum { .. } => "ChecksumError",
            Self::Base58(_) | Self::Malformed(_) => "MalformedEncodingError",
            Self::Recovery(_) => "RecoveryError",
        }
    }
}

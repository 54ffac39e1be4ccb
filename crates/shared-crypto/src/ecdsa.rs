//! # ECDSA Keys (secp256k1)
//!
//! Chain-owner keypairs and recoverable signatures.
//!
//! ## Signature Layout
//!
//! Signatures are 65 bytes: `(recovery_id + 31) ++ r ++ s`. The recovery byte
//! leads and carries the `+31` offset that marks recovery of a compressed
//! public key. Signing is RFC 6979 deterministic over `SHA256(message)` and
//! produces low-S signatures.

use crate::encoding::{address_from_public_key, decode_wif, encode_wif};
use crate::errors::KeyError;
use crate::hashing::sha256;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use zeroize::Zeroize;

/// Offset added to the recovery id in the leading signature byte.
pub const RECOVERY_OFFSET: u8 = 31;

/// Length of an encoded recoverable signature.
pub const SIGNATURE_LEN: usize = 65;

/// Recoverable signature in `(recid + 31) ++ r ++ s` layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoverableSignature([u8; SIGNATURE_LEN]);

impl RecoverableSignature {
    /// Wrap already-encoded bytes. Fails on a wrong length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let array: [u8; SIGNATURE_LEN] = bytes.try_into().map_err(|_| {
            KeyError::Recovery(format!(
                "signature must be {SIGNATURE_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Raw encoded bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    fn split(&self) -> Result<(Signature, RecoveryId), KeyError> {
        let recovery_byte = self.0[0]
            .checked_sub(RECOVERY_OFFSET)
            .ok_or_else(|| KeyError::Recovery(format!("bad recovery byte {}", self.0[0])))?;
        let recovery_id = RecoveryId::from_byte(recovery_byte)
            .ok_or_else(|| KeyError::Recovery(format!("bad recovery id {recovery_byte}")))?;
        let signature = Signature::from_slice(&self.0[1..])
            .map_err(|e| KeyError::Recovery(e.to_string()))?;
        Ok((signature, recovery_id))
    }
}

/// secp256k1 keypair owning a chain.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a random keypair.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut rand::thread_rng()),
        }
    }

    /// Create from a raw 32-byte secret.
    pub fn from_raw(bytes: &[u8]) -> Result<Self, KeyError> {
        let signing_key =
            SigningKey::from_slice(bytes).map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        Ok(Self { signing_key })
    }

    /// Import a WIF-encoded private key.
    pub fn from_wif(wif: &str) -> Result<Self, KeyError> {
        let mut secret = decode_wif(wif)?;
        let result = Self::from_raw(&secret);
        secret.zeroize();
        result
    }

    /// Export the private key as compressed WIF.
    pub fn to_wif(&self) -> String {
        let mut secret = self.to_raw();
        let wif = encode_wif(&secret);
        secret.zeroize();
        wif
    }

    /// Raw 32-byte secret.
    pub fn to_raw(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }

    /// Compressed SEC1 public key (33 bytes).
    pub fn public_key(&self) -> [u8; 33] {
        compress(self.signing_key.verifying_key())
    }

    /// Address of this key; also the identity of the chain it owns.
    pub fn address(&self) -> String {
        address_from_public_key(&self.public_key())
    }

    /// Sign `SHA256(message)` with a recoverable signature.
    pub fn sign(&self, message: &[u8]) -> Result<RecoverableSignature, KeyError> {
        let digest = sha256(message);
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;

        let mut bytes = [0u8; SIGNATURE_LEN];
        bytes[0] = recovery_id.to_byte() + RECOVERY_OFFSET;
        bytes[1..].copy_from_slice(&signature.to_bytes());
        Ok(RecoverableSignature(bytes))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

fn compress(key: &VerifyingKey) -> [u8; 33] {
    let point = key.to_encoded_point(true);
    let mut out = [0u8; 33];
    out.copy_from_slice(point.as_bytes());
    out
}

/// Recover the signer's address from a signature over `message`.
pub fn recover_address(signature: &RecoverableSignature, message: &[u8]) -> Result<String, KeyError> {
    let (signature, recovery_id) = signature.split()?;
    let digest = sha256(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
        .map_err(|e| KeyError::Recovery(e.to_string()))?;
    Ok(address_from_public_key(&compress(&key)))
}

/// True iff `signature` over `message` recovers to `address`.
pub fn verify(address: &str, signature: &RecoverableSignature, message: &[u8]) -> bool {
    matches!(recover_address(signature, message), Ok(recovered) if recovered == address)
}

//! # Base58check encodings
//!
//! Version-prefixed, checksummed base58 for addresses and WIF private keys.
//!
//! | Form | Layout |
//! |------|--------|
//! | Address | `0x00 ++ HASH160(pubkey) ++ checksum4` |
//! | WIF (compressed) | `0x80 ++ secret ++ 0x01 ++ checksum4` |
//! | WIF (uncompressed) | `0x80 ++ secret ++ checksum4` |
//!
//! `checksum4` is the first 4 bytes of `SHA256(SHA256(payload))`.

use crate::errors::KeyError;
use crate::hashing::{double_sha256, hash160};

/// Version byte of a pay-to-pubkey-hash address.
pub const ADDRESS_VERSION: u8 = 0x00;

/// Version byte of a WIF private key.
pub const WIF_VERSION: u8 = 0x80;

/// Suffix marking a WIF key whose public key is used in compressed form.
pub const WIF_COMPRESSED_MARKER: u8 = 0x01;

const CHECKSUM_LEN: usize = 4;

/// Encode raw bytes as plain base58.
pub fn to_base58(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

/// Decode plain base58 text.
pub fn from_base58(text: &str) -> Result<Vec<u8>, KeyError> {
    bs58::decode(text)
        .into_vec()
        .map_err(|e| KeyError::Base58(e.to_string()))
}

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = double_sha256(payload);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

/// Append the 4-byte checksum and base58-encode.
pub fn encode_check(payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(payload.len() + CHECKSUM_LEN);
    data.extend_from_slice(payload);
    data.extend_from_slice(&checksum(payload));
    to_base58(&data)
}

/// Decode base58check text, verify and strip the checksum.
pub fn decode_check(text: &str) -> Result<Vec<u8>, KeyError> {
    let mut data = from_base58(text)?;
    if data.len() <= CHECKSUM_LEN {
        return Err(KeyError::Malformed(format!(
            "{} bytes is too short for a checksummed payload",
            data.len()
        )));
    }

    let split = data.len() - CHECKSUM_LEN;
    let mut actual = [0u8; CHECKSUM_LEN];
    actual.copy_from_slice(&data[split..]);
    let expected = checksum(&data[..split]);
    if expected != actual {
        return Err(KeyError::Checksum { expected, actual });
    }

    data.truncate(split);
    Ok(data)
}

/// Derive the address of a compressed public key.
pub fn address_from_public_key(compressed: &[u8]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(ADDRESS_VERSION);
    payload.extend_from_slice(&hash160(compressed));
    encode_check(&payload)
}

/// Check that `address` is a well-formed base58check address.
pub fn validate_address(address: &str) -> Result<[u8; 20], KeyError> {
    let payload = decode_check(address)?;
    match payload.split_first() {
        Some((&ADDRESS_VERSION, hash)) if hash.len() == 20 => {
            let mut out = [0u8; 20];
            out.copy_from_slice(hash);
            Ok(out)
        }
        Some((version, hash)) => Err(KeyError::Malformed(format!(
            "address version {version:#04x} with {} byte hash",
            hash.len()
        ))),
        None => Err(KeyError::Malformed("empty address payload".into())),
    }
}

/// Encode a 32-byte secret as compressed WIF.
pub fn encode_wif(secret: &[u8; 32]) -> String {
    let mut payload = Vec::with_capacity(34);
    payload.push(WIF_VERSION);
    payload.extend_from_slice(secret);
    payload.push(WIF_COMPRESSED_MARKER);
    encode_check(&payload)
}

/// Decode a WIF string into the raw 32-byte secret.
pub fn decode_wif(wif: &str) -> Result<[u8; 32], KeyError> {
    let payload = decode_check(wif)?;
    let body = match payload.as_slice() {
        [WIF_VERSION, body @ .., WIF_COMPRESSED_MARKER] if body.len() == 32 => body,
        [WIF_VERSION, body @ ..] if body.len() == 32 => body,
        _ => {
            return Err(KeyError::Malformed(format!(
                "unexpected WIF payload of {} bytes",
                payload.len()
            )))
        }
    };

    let mut secret = [0u8; 32];
    secret.copy_from_slice(body);
    Ok(secret)
}

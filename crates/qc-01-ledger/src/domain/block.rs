//! # Block
//!
//! Hash preimage: `height (decimal) ++ time (decimal) ++ base58decode(prev_hash) ++ payload`.
//! The genesis block has an empty `prev_hash` and contributes nothing for it.
//!
//! Wire and storage form is JSON with the payload as base58 text:
//!
//! ```text
//! {"height":0,"time":1546300800,"prev_hash":"","hash":"...","signature":"...","payload":"..."}
//! ```

use crate::domain::errors::BlockValidationError;
use serde::{Deserialize, Serialize};
use shared_crypto::{
    from_base58, recover_address, sha256, to_base58, KeyError, KeyPair, RecoverableSignature,
};

/// A signed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    /// Unix seconds at creation.
    pub time: u64,
    /// Base58 hash of the previous block; empty for genesis.
    #[serde(default)]
    pub prev_hash: String,
    /// Base58 SHA-256 of the preimage.
    pub hash: String,
    /// Base58 recoverable signature over the preimage.
    pub signature: String,
    #[serde(with = "base58_payload")]
    pub payload: Vec<u8>,
}

impl Block {
    /// Build and sign a block with `key`.
    pub fn sign_new(
        key: &KeyPair,
        height: u64,
        time: u64,
        prev_hash: String,
        payload: Vec<u8>,
    ) -> Result<Self, KeyError> {
        let mut block = Self {
            height,
            time,
            prev_hash,
            hash: String::new(),
            signature: String::new(),
            payload,
        };
        let preimage = block.preimage()?;
        block.hash = to_base58(&sha256(&preimage));
        block.signature = to_base58(key.sign(&preimage)?.as_bytes());
        Ok(block)
    }

    /// Bytes covered by both the hash and the signature.
    pub fn preimage(&self) -> Result<Vec<u8>, KeyError> {
        let mut data = format!("{}{}", self.height, self.time).into_bytes();
        if !self.prev_hash.is_empty() {
            data.extend_from_slice(&from_base58(&self.prev_hash)?);
        }
        data.extend_from_slice(&self.payload);
        Ok(data)
    }

    /// Base58 hash of the current content.
    pub fn compute_hash(&self) -> Result<String, KeyError> {
        Ok(to_base58(&sha256(&self.preimage()?)))
    }

    /// Address recovered from the signature; empty when nothing is recoverable.
    pub fn recover_chain_id(&self) -> String {
        self.try_recover_chain_id().unwrap_or_default()
    }

    fn try_recover_chain_id(&self) -> Result<String, KeyError> {
        let signature = RecoverableSignature::from_slice(&from_base58(&self.signature)?)?;
        recover_address(&signature, &self.preimage()?)
    }

    /// Check the hash and recover the chain id in one pass.
    pub fn verify(&self) -> Result<String, BlockValidationError> {
        let invalid = |reason: String| BlockValidationError::InvalidBlock {
            height: self.height,
            reason,
        };

        let preimage = self
            .preimage()
            .map_err(|e| invalid(format!("prev_hash is not decodable: {e}")))?;
        let expected = to_base58(&sha256(&preimage));
        if expected != self.hash {
            return Err(invalid(format!(
                "hash mismatch: computed {expected}, block claims {}",
                self.hash
            )));
        }

        self.try_recover_chain_id()
            .map_err(|e| invalid(format!("cannot recover chain id: {e}")))
    }

    /// Hash matches and a chain id is recoverable.
    pub fn is_well_formed(&self) -> Result<(), BlockValidationError> {
        self.verify().map(|_| ())
    }

    /// Serialized JSON form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse the JSON form.
    pub fn from_json(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Length of the JSON form, used for message size budgeting.
    pub fn size(&self) -> usize {
        self.to_json().map(|json| json.len()).unwrap_or(0)
    }

    /// Same height, hash and parent.
    pub fn same_content(&self, other: &Block) -> bool {
        self.height == other.height && self.hash == other.hash && self.prev_hash == other.prev_hash
    }
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} {} (prev {}, {} bytes)",
            self.height,
            self.hash,
            if self.prev_hash.is_empty() { "-" } else { &self.prev_hash },
            self.payload.len()
        )
    }
}

mod base58_payload {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(payload: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&shared_crypto::to_base58(payload))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        shared_crypto::from_base58(&text).map_err(serde::de::Error::custom)
    }
}

//! # Message Envelope

use crate::domain::behavior::Behavior;
use crate::domain::errors::ProtocolError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire envelope: `{"id", "type", "data"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

/// Fresh message id: base58 of 8 random printable bytes.
pub fn new_message_id() -> String {
    let mut rng = rand::thread_rng();
    let raw: [u8; 8] = std::array::from_fn(|_| rng.gen_range(32..122));
    shared_crypto::to_base58(&raw)
}

impl Message {
    /// Wrap a behavior under a fresh id.
    pub fn new(behavior: &Behavior) -> Result<Self, ProtocolError> {
        Self::with_id(new_message_id(), behavior)
    }

    /// Wrap a behavior under a given id; used for re-broadcasts.
    pub fn with_id(id: String, behavior: &Behavior) -> Result<Self, ProtocolError> {
        let data = behavior
            .to_data()
            .map_err(|e| ProtocolError::Internal(format!("encoding {}: {e}", behavior.tag())))?;
        Ok(Self {
            id,
            kind: behavior.tag().to_string(),
            data,
        })
    }

    /// Parse a frame. Anything that is not an envelope is `InvalidMessage`.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(frame).map_err(|e| ProtocolError::InvalidMessage(e.to_string()))
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::Internal(e.to_string()))
    }

    /// Resolve the payload through the tag registry.
    pub fn behavior(&self) -> Result<Behavior, ProtocolError> {
        Behavior::decode(&self.kind, self.data.clone())
    }
}

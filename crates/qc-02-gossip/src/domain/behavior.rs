//! # Behaviors
//!
//! Closed set of message payloads. Decoding goes through an explicit tag
//! registry; encoding matches exhaustively on the variant.

use crate::domain::errors::ProtocolError;
use qc_01_ledger::Block;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Node summary exchanged on connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub version: String,
    /// Number of peers known to the sender.
    pub peers: i64,
    /// Chain id to accepted-block count.
    #[serde(default)]
    pub chains: BTreeMap<String, u64>,
    #[serde(default)]
    pub platform: BTreeMap<String, String>,
    #[serde(default)]
    pub full_node: bool,
}

/// Ask for up to `count` peers; 0 asks for all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPeers {
    pub count: i64,
}

/// Ask for blocks `[from, to]` of a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBlocks {
    pub chain_id: String,
    pub from: u64,
    pub to: u64,
}

/// Peer websocket URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePeers {
    #[serde(default)]
    pub peers: Vec<String>,
}

/// A batch of blocks in their JSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseBlocks {
    #[serde(default)]
    pub blocks: Vec<Value>,
    /// Filled by validation.
    #[serde(skip)]
    pub decoded: Vec<Block>,
}

impl ResponseBlocks {
    pub fn from_blocks(blocks: &[Block]) -> Result<Self, ProtocolError> {
        let blocks = blocks
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProtocolError::Internal(e.to_string()))?;
        Ok(Self {
            blocks,
            decoded: Vec::new(),
        })
    }
}

/// A block flooded to every peer.
///
/// `id` and `sender` are not part of the payload: the id is the envelope id,
/// preserved on every hop, and the sender is the connection it arrived on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastBlock {
    pub block: Value,
    #[serde(skip)]
    pub id: String,
    #[serde(skip)]
    pub sender: Option<String>,
    /// Filled by validation.
    #[serde(skip)]
    pub decoded: Option<Block>,
}

impl BroadcastBlock {
    pub fn new(id: String, block: &Block) -> Result<Self, ProtocolError> {
        Ok(Self {
            block: serde_json::to_value(block).map_err(|e| ProtocolError::Internal(e.to_string()))?,
            id,
            sender: None,
            decoded: Some(block.clone()),
        })
    }
}

/// Failure report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub code: String,
    pub desc: String,
}

/// Every message payload the protocol understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    Info(Info),
    RequestPeers(RequestPeers),
    RequestBlocks(RequestBlocks),
    ResponsePeers(ResponsePeers),
    ResponseBlocks(ResponseBlocks),
    BroadcastBlock(BroadcastBlock),
    Error(ErrorReply),
}

type Decoder = fn(Value) -> Result<Behavior, serde_json::Error>;

fn decode_as<T>(data: Value) -> Result<Behavior, serde_json::Error>
where
    T: DeserializeOwned + Into<Behavior>,
{
    serde_json::from_value::<T>(data).map(Into::into)
}

/// Tag to decoder table.
const REGISTRY: [(&str, Decoder); 7] = [
    ("info", decode_as::<Info>),
    ("request:peers", decode_as::<RequestPeers>),
    ("request:blocks", decode_as::<RequestBlocks>),
    ("response:peers", decode_as::<ResponsePeers>),
    ("response:blocks", decode_as::<ResponseBlocks>),
    ("broadcast:block", decode_as::<BroadcastBlock>),
    ("error", decode_as::<ErrorReply>),
];

impl Behavior {
    /// Wire tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Info(_) => "info",
            Self::RequestPeers(_) => "request:peers",
            Self::RequestBlocks(_) => "request:blocks",
            Self::ResponsePeers(_) => "response:peers",
            Self::ResponseBlocks(_) => "response:blocks",
            Self::BroadcastBlock(_) => "broadcast:block",
            Self::Error(_) => "error",
        }
    }

    /// Decode the payload of a message tagged `tag`.
    ///
    /// Unknown tags are `InvalidMessage`; payloads that do not fit the
    /// variant are `InvalidBehavior`.
    pub fn decode(tag: &str, data: Value) -> Result<Self, ProtocolError> {
        let (_, decoder) = REGISTRY
            .iter()
            .find(|(known, _)| *known == tag)
            .ok_or_else(|| ProtocolError::InvalidMessage(format!("unknown message type '{tag}'")))?;
        decoder(data).map_err(|e| ProtocolError::InvalidBehavior(format!("{tag}: {e}")))
    }

    /// Payload as JSON.
    pub fn to_data(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Info(b) => serde_json::to_value(b),
            Self::RequestPeers(b) => serde_json::to_value(b),
            Self::RequestBlocks(b) => serde_json::to_value(b),
            Self::ResponsePeers(b) => serde_json::to_value(b),
            Self::ResponseBlocks(b) => serde_json::to_value(b),
            Self::BroadcastBlock(b) => serde_json::to_value(b),
            Self::Error(b) => serde_json::to_value(b),
        }
    }
}

macro_rules! impl_into_behavior {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Behavior {
                fn from(inner: $ty) -> Self {
                    Behavior::$variant(inner)
                }
            }
        )*
    };
}

impl_into_behavior! {
    Info => Info,
    RequestPeers => RequestPeers,
    RequestBlocks => RequestBlocks,
    ResponsePeers => ResponsePeers,
    ResponseBlocks => ResponseBlocks,
    BroadcastBlock => BroadcastBlock,
    Error => ErrorReply,
}

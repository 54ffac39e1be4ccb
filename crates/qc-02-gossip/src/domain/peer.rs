use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Rank given to peers on first sight.
pub const DEFAULT_RANK: i32 = 100;

/// A known peer address. Lower rank is preferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub address: String,
    pub rank: i32,
    /// Unix seconds of the last successful connection; 0 if never connected.
    pub last_seen: u64,
}

impl Peer {
    /// A peer seen just now.
    pub fn connected(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            rank: DEFAULT_RANK,
            last_seen: now(),
        }
    }

    /// A peer learned from another node, never connected.
    pub fn discovered(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            rank: DEFAULT_RANK,
            last_seen: 0,
        }
    }

    /// Ordering used when sharing peers: rank, then most recently seen.
    pub fn preference(a: &Peer, b: &Peer) -> std::cmp::Ordering {
        a.rank
            .cmp(&b.rank)
            .then(b.last_seen.cmp(&a.last_seen))
            .then_with(|| a.address.cmp(&b.address))
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

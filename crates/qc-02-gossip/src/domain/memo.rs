//! # Broadcast Memo
//!
//! Ids of broadcasts already processed. Created at node startup, shared by
//! all handling tasks, swept periodically to bound memory.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default upper bound on remembered ids.
pub const DEFAULT_MEMO_CAPACITY: usize = 100_000;

pub struct BroadcastMemo {
    seen: RwLock<HashMap<String, Instant>>,
    capacity: usize,
}

impl Default for BroadcastMemo {
    fn default() -> Self {
        Self::new(DEFAULT_MEMO_CAPACITY)
    }
}

impl BroadcastMemo {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.read().contains_key(id)
    }

    /// Record `id`. Returns true if it was not already present.
    ///
    /// At capacity the oldest id is forgotten first.
    pub fn mark_seen(&self, id: &str) -> bool {
        let mut seen = self.seen.write();
        if seen.contains_key(id) {
            return false;
        }
        if seen.len() >= self.capacity {
            let oldest = seen
                .iter()
                .min_by_key(|(_, at)| **at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                seen.remove(&oldest);
            }
        }
        seen.insert(id.to_string(), Instant::now());
        true
    }

    /// Forget ids older than `max_age`. Returns how many were dropped.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let mut seen = self.seen.write();
        let before = seen.len();
        seen.retain(|_, at| at.elapsed() <= max_age);
        before - seen.len()
    }

    pub fn len(&self) -> usize {
        self.seen.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.read().is_empty()
    }
}

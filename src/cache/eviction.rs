//! Eviction policies.
//!
//! Each policy is a pure function over the entry map returning the key to
//! evict, so the ranking can be tested without a store.

use super::entry::CacheEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently used.
    #[default]
    Lru,
    /// Least frequently used.
    Lfu,
    /// First in, first out.
    Fifo,
}

impl EvictionPolicy {
    pub fn select_victim(&self, entries: &HashMap<String, CacheEntry>) -> Option<String> {
        match self {
            EvictionPolicy::Lru => lru_victim(entries),
            EvictionPolicy::Lfu => lfu_victim(entries),
            EvictionPolicy::Fifo => fifo_victim(entries),
        }
    }

    /// Whether a hit refreshes recency.
    pub fn tracks_recency(&self) -> bool {
        matches!(self, EvictionPolicy::Lru)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionPolicy::Lru => "lru",
            EvictionPolicy::Lfu => "lfu",
            EvictionPolicy::Fifo => "fifo",
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lru" => Ok(EvictionPolicy::Lru),
            "lfu" => Ok(EvictionPolicy::Lfu),
            "fifo" => Ok(EvictionPolicy::Fifo),
            other => Err(format!("unknown eviction policy: {other}")),
        }
    }
}

pub fn lru_victim(entries: &HashMap<String, CacheEntry>) -> Option<String> {
    entries
        .iter()
        .min_by_key(|(_, e)| e.access_seq)
        .map(|(k, _)| k.clone())
}

/// Ties on hit count go to the entry touched longest ago.
pub fn lfu_victim(entries: &HashMap<String, CacheEntry>) -> Option<String> {
    entries
        .iter()
        .min_by_key(|(_, e)| (e.hits, e.access_seq))
        .map(|(k, _)| k.clone())
}

pub fn fifo_victim(entries: &HashMap<String, CacheEntry>) -> Option<String> {
    entries
        .iter()
        .min_by_key(|(_, e)| e.insert_seq)
        .map(|(k, _)| k.clone())
}

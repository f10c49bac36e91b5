//! Cached entry bookkeeping.

use crate::types::FetchResponse;
use std::time::Duration;
use tokio::time::Instant;

/// One cached response plus the metadata eviction and expiry rank on.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub response: FetchResponse,
    pub inserted_at: Instant,
    pub last_accessed: Instant,
    pub hits: u64,
    pub size_bytes: usize,
    /// Position in insertion order (FIFO).
    pub insert_seq: u64,
    /// Logical recency clock (LRU); bumped on insert and on LRU hits.
    pub access_seq: u64,
}

impl CacheEntry {
    pub(crate) fn new(
        key: String,
        response: FetchResponse,
        now: Instant,
        seq: u64,
        size_bytes: usize,
    ) -> Self {
        Self {
            key,
            response,
            inserted_at: now,
            last_accessed: now,
            hits: 1,
            size_bytes,
            insert_seq: seq,
            access_seq: seq,
        }
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.inserted_at)
    }

    pub fn is_expired(&self, now: Instant, freshness_window: Duration) -> bool {
        self.age(now) > freshness_window
    }

    pub(crate) fn touch(&mut self, now: Instant, seq: u64) {
        self.last_accessed = now;
        self.access_seq = seq;
    }

    pub fn response(&self) -> &FetchResponse {
        &self.response
    }

    pub fn into_response(self) -> FetchResponse {
        self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_expiry_is_strictly_after_window() {
        let start = Instant::now();
        let entry = CacheEntry::new("k".into(), FetchResponse::ok(json!(1)), start, 0, 8);
        let window = Duration::from_millis(1000);

        assert!(!entry.is_expired(start + Duration::from_millis(500), window));
        assert!(!entry.is_expired(start + window, window));
        assert!(entry.is_expired(start + Duration::from_millis(1500), window));
        assert_eq!(entry.hits, 1);
    }
}

//! 响应缓存模块：内存缓存、请求合并与淘汰策略。
//!
//! # Response Cache Module
//!
//! In-memory cache for read requests: serves fresh responses without a
//! network round trip, merges concurrent identical requests into one call,
//! and evicts under LRU, LFU or FIFO when full.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheStore`] | Entries, in-flight records, freshness and capacity |
//! | [`CacheConfig`] | Freshness window, capacity, policy, URL filters |
//! | [`EvictionPolicy`] | LRU / LFU / FIFO victim selection |
//! | [`CacheKey`] | Method + canonical URL + identity fingerprint |
//! | [`UrlPattern`] | Substring or `re:` regex filter |
//! | [`Waiter`] | Shared handle on an in-flight request's outcome |
//! | [`CacheStats`] | Snapshot of entries and lifetime counters |
//!
//! ## Example
//!
//! ```rust
//! use fetch_cache::cache::{CacheConfig, CacheStore, EvictionPolicy};
//! use fetch_cache::types::{FetchRequest, FetchResponse};
//! use std::time::Duration;
//!
//! let store = CacheStore::new(
//!     CacheConfig::new()
//!         .with_freshness_window(Duration::from_secs(60))
//!         .with_max_entries(500)
//!         .with_policy(EvictionPolicy::Lru)
//!         .with_exclude("/api/auth"),
//! );
//!
//! let request = FetchRequest::get("/api/cases/5").with_auth_token("token");
//! store.store(&request, FetchResponse::ok(serde_json::json!({"id": 5})));
//! assert!(store.lookup(&request).is_some());
//! ```
//!
//! ## Cache Keys
//!
//! Keys combine the method, the canonical URL (query parameters merged and
//! sorted) and a fingerprint of the caller's credential, so one user's data
//! is never served to another.

mod config;
mod entry;
mod eviction;
mod key;
mod pattern;
mod pending;
mod size;
mod stats;
mod store;

pub use config::CacheConfig;
pub use entry::CacheEntry;
pub use eviction::{fifo_victim, lfu_victim, lru_victim, EvictionPolicy};
pub use key::{canonical_url, identity_fingerprint, CacheKey, ANONYMOUS_FINGERPRINT};
pub use pattern::UrlPattern;
pub use pending::{Outcome, Registration, Waiter};
pub use size::{estimate_size, DEFAULT_ENTRY_SIZE};
pub use stats::CacheStats;
pub use store::CacheStore;

//! # fetch-cache
//!
//! 客户端 HTTP 响应缓存：新鲜度控制、并发请求合并与可配置的淘汰策略。
//!
//! Client-side HTTP response cache with request coalescing.
//!
//! ## Overview
//!
//! Read requests issued through a [`CachedClient`] are answered from an
//! in-memory store while their entry is fresh. Concurrent identical reads
//! share a single network call, and the store evicts under LRU, LFU or FIFO
//! once it reaches capacity. Writes and excluded URLs always go to the
//! network.
//!
//! ## Core Guarantees
//!
//! - **Transparent**: a cached response is the exact value the network returned
//! - **Isolated**: keys include a fingerprint of the caller's credential
//! - **No negative caching**: failures are never stored, the next call retries
//! - **Never in the way**: cache bookkeeping never fails a request
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fetch_cache::cache::{CacheConfig, EvictionPolicy};
//! use fetch_cache::{CachedClient, Method};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> fetch_cache::Result<()> {
//!     let client = CachedClient::builder()
//!         .base_url("https://crm.example.com")
//!         .config(
//!             CacheConfig::new()
//!                 .with_freshness_window(Duration::from_secs(30))
//!                 .with_policy(EvictionPolicy::Lru)
//!                 .with_exclude("/api/auth"),
//!         )
//!         .build()?;
//!
//!     let case = client
//!         .fetch(Method::Get, "/api/cases/5", &[("expand", "notes")], Some("token"))
//!         .await?;
//!     println!("{}", case.body);
//!     println!("{:?}", client.stats());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Store, keys, eviction policies, pending records |
//! | [`interceptors`] | Cache-or-fetch protocol with coalescing |
//! | [`transport`] | `Network` trait and the reqwest transport |
//! | [`client`] | Client facade and builder |
//! | [`types`] | Request and response types |

pub mod cache;
pub mod client;
pub mod interceptors;
pub mod transport;
pub mod types;

pub use cache::{CacheConfig, CacheStats, CacheStore, EvictionPolicy, UrlPattern};
pub use client::{CachedClient, CachedClientBuilder};
pub use interceptors::CacheInterceptor;
pub use transport::{HttpTransport, Network};
pub use types::{FetchRequest, FetchResponse, Method};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};

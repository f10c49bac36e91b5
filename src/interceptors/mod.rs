//! Request interceptor applying the cache-or-fetch protocol.
//!
//! Per key the interceptor moves between three states:
//!
//! - idle: no entry, no in-flight record
//! - in flight: a pending record exists; later callers attach to it
//! - cached: an entry exists and answers lookups until it expires
//!
//! A failed fetch returns the key to idle, so the next call starts over.

use crate::cache::{CacheStore, Registration};
use crate::transport::Network;
use crate::types::{FetchRequest, FetchResponse};
use crate::Result;
use std::sync::Arc;

/// Sits between callers and the network for every outbound request.
#[derive(Clone)]
pub struct CacheInterceptor {
    store: CacheStore,
    network: Arc<dyn Network>,
}

impl CacheInterceptor {
    pub fn new(store: CacheStore, network: Arc<dyn Network>) -> Self {
        Self { store, network }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Serve from cache, join an identical in-flight request, or go to the
    /// network. Network and timeout errors are returned unchanged.
    pub async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        if !self.store.is_cacheable(&request) {
            tracing::debug!(
                target: "fetch_cache::interceptor",
                method = %request.method,
                url = %request.url,
                "bypassing cache"
            );
            return self.network.send(&request).await;
        }

        if let Some(entry) = self.store.lookup(&request) {
            tracing::debug!(target: "fetch_cache::interceptor", key = %entry.key, hits = entry.hits, "cache hit");
            return Ok(entry.into_response());
        }

        let waiter = match self.store.register_pending(&request) {
            Registration::Cached(entry) => {
                tracing::debug!(
                    target: "fetch_cache::interceptor",
                    key = %entry.key,
                    "cache hit after in-flight request finished"
                );
                return Ok(entry.into_response());
            }
            Registration::Joined(waiter) => {
                tracing::debug!(target: "fetch_cache::interceptor", key = %waiter.key(), "joined in-flight request");
                waiter
            }
            Registration::Leader(waiter) => {
                tracing::debug!(target: "fetch_cache::interceptor", key = %waiter.key(), "cache miss, fetching");
                self.spawn_fetch(request);
                waiter
            }
        };
        waiter.wait().await
    }

    /// The network call runs detached so a caller giving up does not cancel
    /// it for the others attached to the same record.
    fn spawn_fetch(&self, request: FetchRequest) {
        let store = self.store.clone();
        let network = Arc::clone(&self.network);
        tokio::spawn(async move {
            let outcome = network.send(&request).await;
            match &outcome {
                Ok(response) => store.store(&request, response.clone()),
                Err(e) => {
                    tracing::debug!(
                        target: "fetch_cache::interceptor",
                        url = %request.url,
                        error = %e,
                        "fetch failed, nothing cached"
                    );
                }
            }
            if !store.resolve_pending(&request, outcome) {
                tracing::debug!(
                    target: "fetch_cache::interceptor",
                    url = %request.url,
                    "fetch finished after its pending record was released"
                );
            }
        });
    }
}

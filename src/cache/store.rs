//! The cache store: entries, in-flight records, freshness and capacity.

use super::config::CacheConfig;
use super::entry::CacheEntry;
use super::key::CacheKey;
use super::pattern::UrlPattern;
use super::pending::{Outcome, PendingRequest, Registration, Waiter};
use super::size::estimate_size;
use super::stats::{AtomicStats, CacheStats};
use crate::types::{FetchRequest, FetchResponse};
use crate::Error;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Floor for the sweep period so a tiny configured interval cannot spin.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Default)]
struct State {
    entries: HashMap<String, CacheEntry>,
    pending: HashMap<String, PendingRequest>,
    /// Logical clock feeding insert/access sequence numbers.
    clock: u64,
    next_pending_id: u64,
}

impl State {
    fn tick(&mut self) -> u64 {
        let t = self.clock;
        self.clock += 1;
        t
    }
}

struct Inner {
    config: ArcSwap<CacheConfig>,
    state: Mutex<State>,
    stats: AtomicStats,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory response cache shared by every clone of the handle.
///
/// The store exclusively owns entries and pending records; callers only go
/// through the operations below, none of which fail. Each operation runs
/// under one short lock and never awaits while holding it.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<Inner>,
}

impl CacheStore {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: ArcSwap::from_pointee(config),
                state: Mutex::new(State::default()),
                stats: AtomicStats::new(),
                sweeper: Mutex::new(None),
            }),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> Arc<CacheConfig> {
        self.inner.config.load_full()
    }

    /// Replace the configuration for subsequent operations.
    pub fn configure(&self, config: CacheConfig) {
        tracing::debug!(
            target: "fetch_cache::store",
            max_entries = config.max_entries,
            policy = %config.policy,
            freshness_ms = config.freshness_window.as_millis() as u64,
            "cache reconfigured"
        );
        self.inner.config.store(Arc::new(config));
    }

    /// Update selected fields of the current configuration.
    pub fn reconfigure<F: FnOnce(&mut CacheConfig)>(&self, f: F) {
        let mut next = (*self.config()).clone();
        f(&mut next);
        self.configure(next);
    }

    pub fn key_for(&self, request: &FetchRequest) -> CacheKey {
        CacheKey::derive(request)
    }

    pub fn is_cacheable(&self, request: &FetchRequest) -> bool {
        let config = self.inner.config.load();
        Self::cacheable_with(&config, request, &CacheKey::derive(request))
    }

    fn cacheable_with(config: &CacheConfig, request: &FetchRequest, key: &CacheKey) -> bool {
        config.enabled && request.method.is_read() && config.allows_url(&key.url)
    }

    /// Fresh entry for `request`, if any. Expired entries are dropped here.
    pub fn lookup(&self, request: &FetchRequest) -> Option<CacheEntry> {
        let config = self.inner.config.load();
        let key = CacheKey::derive(request);
        if !Self::cacheable_with(&config, request, &key) {
            return None;
        }
        let rendered = key.render();
        let mut state = self.inner.state();
        let hit = self.take_hit(&mut state, &config, &rendered);
        let counter = if hit.is_some() {
            &self.inner.stats.hits
        } else {
            &self.inner.stats.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        hit
    }

    /// Fresh entry under `rendered` with its hit count bumped. Drops it if expired.
    /// Caller holds the state lock.
    fn take_hit(
        &self,
        state: &mut State,
        config: &CacheConfig,
        rendered: &str,
    ) -> Option<CacheEntry> {
        let now = Instant::now();
        let expired = state
            .entries
            .get(rendered)?
            .is_expired(now, config.freshness_window);
        if expired {
            state.entries.remove(rendered);
            self.inner.stats.expirations.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(target: "fetch_cache::store", key = %rendered, "expired on lookup");
            return None;
        }

        let seq = state.tick();
        let entry = state.entries.get_mut(rendered)?;
        entry.hits += 1;
        if config.policy.tracks_recency() {
            entry.touch(now, seq);
        }
        Some(entry.clone())
    }

    /// Insert a successful response, evicting one entry first when full.
    pub fn store(&self, request: &FetchRequest, response: FetchResponse) {
        let config = self.inner.config.load();
        let key = CacheKey::derive(request);
        if !Self::cacheable_with(&config, request, &key) || config.max_entries == 0 {
            return;
        }
        let rendered = key.render();
        let size = estimate_size(&response);
        let now = Instant::now();

        let mut state = self.inner.state();
        if !state.entries.contains_key(&rendered) && state.entries.len() >= config.max_entries {
            if let Some(victim) = config.policy.select_victim(&state.entries) {
                state.entries.remove(&victim);
                self.inner.stats.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    target: "fetch_cache::store",
                    victim = %victim,
                    policy = %config.policy,
                    "evicted entry"
                );
            }
        }
        let seq = state.tick();
        state
            .entries
            .insert(rendered.clone(), CacheEntry::new(rendered, response, now, seq, size));
        self.inner.stats.stores.fetch_add(1, Ordering::Relaxed);
    }

    /// Return the existing in-flight record for this key, or create one and
    /// arm its timeout. A fresh entry that landed after the caller's lookup
    /// is returned as `Cached` instead, so a finished fetch is never repeated.
    pub fn register_pending(&self, request: &FetchRequest) -> Registration {
        let config = self.inner.config.load();
        let timeout = config.pending_timeout;
        let key = CacheKey::derive(request);
        let cacheable = Self::cacheable_with(&config, request, &key);
        let rendered = key.render();

        let mut state = self.inner.state();
        if let Some(existing) = state.pending.get(&rendered) {
            self.inner.stats.coalesced.fetch_add(1, Ordering::Relaxed);
            return Registration::Joined(existing.subscribe());
        }
        if cacheable {
            if let Some(entry) = self.take_hit(&mut state, &config, &rendered) {
                self.inner.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Registration::Cached(entry);
            }
        }

        let id = state.next_pending_id;
        state.next_pending_id += 1;
        let (mut record, waiter) = PendingRequest::new(rendered.clone(), id);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let weak = Arc::downgrade(&self.inner);
                let key = rendered.clone();
                let task = handle.spawn(async move {
                    tokio::time::sleep(timeout).await;
                    expire_pending(weak, key, id, timeout);
                });
                record.arm(task.abort_handle());
            }
            Err(_) => {
                tracing::warn!(
                    target: "fetch_cache::store",
                    key = %rendered,
                    "no async runtime; pending request has no timeout"
                );
            }
        }
        state.pending.insert(rendered, record);
        Registration::Leader(waiter)
    }

    pub fn pending(&self, request: &FetchRequest) -> Option<Waiter> {
        let rendered = CacheKey::derive(request).render();
        self.inner.state().pending.get(&rendered).map(PendingRequest::subscribe)
    }

    /// Deliver `outcome` to every waiter on this key and drop the record.
    /// Returns false when no record existed (already resolved or timed out).
    pub fn resolve_pending(&self, request: &FetchRequest, outcome: Outcome) -> bool {
        let rendered = CacheKey::derive(request).render();
        let record = self.inner.state().pending.remove(&rendered);
        match record {
            Some(record) => {
                record.resolve(outcome);
                true
            }
            None => false,
        }
    }

    /// Remove entries whose key matches `pattern`, or every entry.
    /// In-flight records are untouched.
    pub fn clear(&self, pattern: Option<&UrlPattern>) -> usize {
        let mut state = self.inner.state();
        let before = state.entries.len();
        match pattern {
            Some(p) => state.entries.retain(|key, _| !p.is_match(key)),
            None => state.entries.clear(),
        }
        let removed = before - state.entries.len();
        tracing::debug!(target: "fetch_cache::store", removed, "cleared entries");
        removed
    }

    /// Drop every entry older than the freshness window.
    pub fn sweep_expired(&self) -> usize {
        let window = self.inner.config.load().freshness_window;
        let now = Instant::now();
        let mut state = self.inner.state();
        let before = state.entries.len();
        state.entries.retain(|_, e| !e.is_expired(now, window));
        let removed = before - state.entries.len();
        if removed > 0 {
            self.inner
                .stats
                .expirations
                .fetch_add(removed as u64, Ordering::Relaxed);
            tracing::debug!(target: "fetch_cache::store", removed, "swept expired entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.inner.state();
        let mut stats = self.inner.stats.to_stats();
        stats.entry_count = state.entries.len();
        stats.pending_count = state.pending.len();
        for entry in state.entries.values() {
            stats.total_hits += entry.hits;
            stats.total_size_bytes += entry.size_bytes;
            stats.oldest = Some(stats.oldest.map_or(entry.inserted_at, |t| t.min(entry.inserted_at)));
            stats.newest = Some(stats.newest.map_or(entry.inserted_at, |t| t.max(entry.inserted_at)));
        }
        stats
    }

    /// Start the periodic expiry sweep. Requires a tokio runtime; returns
    /// false when none is available or a sweeper is already running.
    pub fn start_sweeper(&self) -> bool {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(h) => h,
            Err(_) => {
                tracing::warn!(target: "fetch_cache::store", "no async runtime; expiry sweep disabled");
                return false;
            }
        };
        let mut slot = self.inner.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|t| !t.is_finished()) {
            return false;
        }
        let weak = Arc::downgrade(&self.inner);
        *slot = Some(handle.spawn(async move {
            loop {
                let interval = match weak.upgrade() {
                    Some(inner) => inner.config.load().sweep_interval.max(MIN_SWEEP_INTERVAL),
                    None => return,
                };
                tokio::time::sleep(interval).await;
                match weak.upgrade() {
                    Some(inner) => {
                        CacheStore { inner }.sweep_expired();
                    }
                    None => return,
                }
            }
        }));
        true
    }

    /// Stop the expiry sweep. Entries and in-flight records are kept.
    pub fn shutdown(&self) {
        let task = self
            .inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }

    pub fn is_sweeping(&self) -> bool {
        self.inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Timer body: force-resolve the record it was armed for, if still present.
fn expire_pending(inner: Weak<Inner>, key: String, id: u64, timeout: Duration) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let record = {
        let mut state = inner.state();
        match state.pending.get(&key) {
            Some(record) if record.id == id => state.pending.remove(&key),
            _ => None,
        }
    };
    if let Some(mut record) = record {
        record.disarm();
        inner.stats.timeouts.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            target: "fetch_cache::store",
            key = %key,
            timeout_ms = timeout.as_millis() as u64,
            "pending request timed out"
        );
        record.resolve(Err(Error::CoalescingTimeout { key, timeout }));
    }
}

//! Cache configuration.

use super::eviction::EvictionPolicy;
use super::pattern::UrlPattern;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Runtime cache options. Swapped as a whole; entries already stored are
/// never rewritten when it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum age of an entry, measured from insertion.
    #[serde(rename = "freshness_window_ms", with = "duration_ms")]
    pub freshness_window: Duration,
    pub max_entries: usize,
    pub policy: EvictionPolicy,
    /// When non-empty, only URLs matching one of these are cached.
    pub include_patterns: Vec<UrlPattern>,
    pub exclude_patterns: Vec<UrlPattern>,
    /// How long a coalesced in-flight request may stay unresolved.
    #[serde(rename = "pending_timeout_ms", with = "duration_ms")]
    pub pending_timeout: Duration,
    #[serde(rename = "sweep_interval_ms", with = "duration_ms")]
    pub sweep_interval: Duration,
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freshness_window: Duration::from_secs(300),
            max_entries: 100,
            policy: EvictionPolicy::Lru,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            pending_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(60),
            enabled: true,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    pub fn with_policy(mut self, policy: EvictionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_include(mut self, pattern: impl Into<UrlPattern>) -> Self {
        self.include_patterns.push(pattern.into());
        self
    }

    pub fn with_exclude(mut self, pattern: impl Into<UrlPattern>) -> Self {
        self.exclude_patterns.push(pattern.into());
        self
    }

    pub fn with_pending_timeout(mut self, timeout: Duration) -> Self {
        self.pending_timeout = timeout;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Disabled configuration: every request goes to the network.
    pub fn no_cache() -> Self {
        Self::default().with_enabled(false).with_max_entries(0)
    }

    /// Include/exclude filter over a canonical URL.
    pub fn allows_url(&self, url: &str) -> bool {
        if self.exclude_patterns.iter().any(|p| p.is_match(url)) {
            return false;
        }
        self.include_patterns.is_empty() || self.include_patterns.iter().any(|p| p.is_match(url))
    }

    pub fn validate(&self) -> Result<()> {
        if self.pending_timeout.is_zero() {
            return Err(Error::configuration_with_context(
                "pending timeout must be greater than zero",
                ErrorContext::new()
                    .with_field_path("pending_timeout_ms")
                    .with_source("cache_config"),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(Error::configuration_with_context(
                "sweep interval must be greater than zero",
                ErrorContext::new()
                    .with_field_path("sweep_interval_ms")
                    .with_source("cache_config"),
            ));
        }
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                "failed to parse cache configuration",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("config_loader"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                "failed to read cache configuration",
                ErrorContext::new()
                    .with_field_path(path.display().to_string())
                    .with_details(e.to_string())
                    .with_source("config_loader"),
            )
        })?;
        Self::from_yaml_str(&content)
    }

    /// Apply `FETCH_CACHE_*` environment overrides. Unparsable values are
    /// logged and ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(ms) = env_parse::<u64>("FETCH_CACHE_FRESHNESS_MS") {
            self.freshness_window = Duration::from_millis(ms);
        }
        if let Some(max) = env_parse::<usize>("FETCH_CACHE_MAX_ENTRIES") {
            self.max_entries = max;
        }
        if let Some(policy) = env_parse::<EvictionPolicy>("FETCH_CACHE_POLICY") {
            self.policy = policy;
        }
        if let Some(enabled) = env_parse::<bool>("FETCH_CACHE_ENABLED") {
            self.enabled = enabled;
        }
        if let Some(ms) = env_parse::<u64>("FETCH_CACHE_PENDING_TIMEOUT_MS").filter(|ms| *ms > 0) {
            self.pending_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("FETCH_CACHE_SWEEP_INTERVAL_MS").filter(|ms| *ms > 0) {
            self.sweep_interval = Duration::from_millis(ms);
        }
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(target: "fetch_cache::config", var = name, value = %raw, "ignoring unparsable override");
            None
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

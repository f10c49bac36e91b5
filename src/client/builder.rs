use crate::cache::{CacheConfig, CacheStore};
use crate::client::core::CachedClient;
use crate::interceptors::CacheInterceptor;
use crate::transport::{HttpTransport, Network};
use crate::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`CachedClient`].
///
/// Keep this surface area small and predictable (developer-friendly).
pub struct CachedClientBuilder {
    base_url: Option<String>,
    config: Option<CacheConfig>,
    config_path: Option<PathBuf>,
    env_overrides: bool,
    network: Option<Arc<dyn Network>>,
    store: Option<CacheStore>,
    timeout: Option<Duration>,
    sweep: bool,
}

impl CachedClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            config: None,
            config_path: None,
            env_overrides: false,
            network: None,
            store: None,
            timeout: None,
            sweep: true,
        }
    }

    /// Base URL that relative request URLs are joined onto.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load the cache configuration from a YAML file at build time.
    /// Takes precedence over [`config`](Self::config).
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Apply `FETCH_CACHE_*` environment overrides on top of the configuration.
    pub fn env_overrides(mut self, enable: bool) -> Self {
        self.env_overrides = enable;
        self
    }

    /// Use a custom network instead of the reqwest transport.
    pub fn network(mut self, network: Arc<dyn Network>) -> Self {
        self.network = Some(network);
        self
    }

    /// Share an existing store (e.g. between several clients).
    /// The store keeps its own configuration.
    pub fn store(mut self, store: CacheStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Request timeout of the default transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run the periodic expiry sweep (default on).
    pub fn sweep(mut self, enable: bool) -> Self {
        self.sweep = enable;
        self
    }

    pub fn build(self) -> Result<CachedClient> {
        let store = match self.store {
            Some(store) => store,
            None => {
                let mut config = match &self.config_path {
                    Some(path) => CacheConfig::from_path(path)?,
                    None => self.config.unwrap_or_default(),
                };
                if self.env_overrides {
                    config = config.with_env_overrides();
                }
                config.validate()?;
                CacheStore::new(config)
            }
        };

        let network: Arc<dyn Network> = match self.network {
            Some(n) => n,
            None => {
                let transport = match self.timeout {
                    Some(t) => HttpTransport::with_timeout(self.base_url.as_deref(), t)?,
                    None => HttpTransport::new(self.base_url.as_deref())?,
                };
                Arc::new(transport)
            }
        };

        if self.sweep {
            store.start_sweeper();
        }

        tracing::debug!(
            target: "fetch_cache::client",
            base_url = self.base_url.as_deref().unwrap_or("-"),
            policy = %store.config().policy,
            max_entries = store.config().max_entries,
            "cached client built"
        );

        Ok(CachedClient {
            interceptor: CacheInterceptor::new(store, network),
        })
    }
}

impl Default for CachedClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EvictionPolicy;

    #[test]
    fn test_build_without_runtime_skips_sweeper() {
        let client = CachedClientBuilder::new()
            .base_url("https://crm.example.com")
            .config(CacheConfig::new().with_policy(EvictionPolicy::Fifo))
            .build()
            .unwrap();
        assert_eq!(client.store().config().policy, EvictionPolicy::Fifo);
        assert!(!client.store().is_sweeping());
    }

    #[tokio::test]
    async fn test_build_starts_sweeper() {
        let client = CachedClientBuilder::new().build().unwrap();
        assert!(client.store().is_sweeping());
        client.shutdown();
        assert!(!client.store().is_sweeping());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = CachedClientBuilder::new()
            .config(CacheConfig::new().with_pending_timeout(Duration::ZERO))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_base_url_is_rejected() {
        assert!(CachedClientBuilder::new().base_url("not a url").build().is_err());
    }
}

use crate::cache::{CacheConfig, CacheStats, CacheStore, UrlPattern};
use crate::interceptors::CacheInterceptor;
use crate::types::{FetchRequest, FetchResponse, Method};
use crate::Result;

/// HTTP client whose reads go through the response cache.
///
/// Cloning is cheap; clones share the same store.
#[derive(Clone)]
pub struct CachedClient {
    pub(crate) interceptor: CacheInterceptor,
}

impl CachedClient {
    pub fn builder() -> super::CachedClientBuilder {
        super::CachedClientBuilder::new()
    }

    /// Issue a request; reads are answered from cache when fresh and merged
    /// with identical in-flight reads.
    pub async fn fetch(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, &str)],
        auth_token: Option<&str>,
    ) -> Result<FetchResponse> {
        let mut request = FetchRequest::new(method, url)
            .with_params(params.iter().map(|(k, v)| (*k, *v)));
        if let Some(token) = auth_token {
            request = request.with_auth_token(token);
        }
        self.execute(request).await
    }

    pub async fn get(&self, url: &str) -> Result<FetchResponse> {
        self.execute(FetchRequest::get(url)).await
    }

    pub async fn execute(&self, request: FetchRequest) -> Result<FetchResponse> {
        self.interceptor.fetch(request).await
    }

    pub fn store(&self) -> &CacheStore {
        self.interceptor.store()
    }

    pub fn configure(&self, config: CacheConfig) {
        self.store().configure(config);
    }

    pub fn reconfigure<F: FnOnce(&mut CacheConfig)>(&self, f: F) {
        self.store().reconfigure(f);
    }

    /// Drop cached entries matching `pattern`, or all of them.
    pub fn clear(&self, pattern: Option<&UrlPattern>) -> usize {
        self.store().clear(pattern)
    }

    pub fn stats(&self) -> CacheStats {
        self.store().stats()
    }

    /// Stop background maintenance. The cache stays usable.
    pub fn shutdown(&self) {
        self.store().shutdown();
    }
}

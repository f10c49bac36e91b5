//! Network seam and the default HTTP transport.

mod http;

pub use http::HttpTransport;

use crate::types::{FetchRequest, FetchResponse};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Anything that can perform a request against the network.
///
/// Implementations return `Ok` only for successful responses; failures
/// (including non-2xx statuses) come back as `Err` and are never cached.
#[async_trait]
pub trait Network: Send + Sync {
    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse>;
}

#[async_trait]
impl<N: Network + ?Sized> Network for Arc<N> {
    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse> {
        (**self).send(request).await
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[source] Arc<reqwest::Error>),

    #[error("Invalid URL `{url}`: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Transport error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Http(Arc::new(e))
    }
}

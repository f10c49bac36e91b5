use super::{Network, TransportError};
use crate::types::{FetchRequest, FetchResponse};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Proxy;
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;
use url::Url;

/// reqwest-backed [`Network`].
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Option<Url>,
}

impl HttpTransport {
    /// Build with env-overridable defaults (`FETCH_CACHE_HTTP_TIMEOUT_SECS`,
    /// `FETCH_CACHE_HTTP_POOL_MAX_IDLE_PER_HOST`, `FETCH_CACHE_PROXY_URL`).
    pub fn new(base_url: Option<&str>) -> Result<Self> {
        let timeout_secs = env::var("FETCH_CACHE_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);
        Self::with_timeout(base_url, Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.map(parse_base_url).transpose()?;

        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(
                env::var("FETCH_CACHE_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Ok(proxy_url) = env::var("FETCH_CACHE_PROXY_URL") {
            match Proxy::all(&proxy_url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(e) => tracing::warn!(target: "fetch_cache::transport", error = %e, "ignoring invalid proxy URL"),
            }
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::from(e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Absolute URLs pass through; relative ones are joined onto the base URL.
    pub fn resolve_url(&self, raw: &str) -> Result<Url> {
        match Url::parse(raw) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
                Some(base) => base.join(raw.trim_start_matches('/')).map_err(|e| invalid_url(raw, e)),
                None => Err(Error::Transport(TransportError::InvalidUrl {
                    url: raw.to_string(),
                    message: "relative URL without a base URL".into(),
                })),
            },
            Err(e) => Err(invalid_url(raw, e)),
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    // A trailing slash makes `join` append instead of replacing the last segment.
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|e| invalid_url(raw, e))
}

fn invalid_url(raw: &str, e: url::ParseError) -> Error {
    Error::Transport(TransportError::InvalidUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })
}

/// Map an HTTP status onto the error classes used in `Error::Remote`.
pub(crate) fn classify_status(status: u16) -> (&'static str, bool) {
    match status {
        400 => ("invalid_request", false),
        401 => ("authentication", false),
        403 => ("permission_denied", false),
        404 => ("not_found", false),
        408 => ("timeout", true),
        409 => ("conflict", true),
        413 => ("request_too_large", false),
        429 => ("rate_limited", true),
        503 | 529 => ("overloaded", true),
        500..=599 => ("server_error", true),
        _ => ("http_error", false),
    }
}

fn parse_body(bytes: &[u8]) -> serde_json::Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[async_trait]
impl Network for HttpTransport {
    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let url = self.resolve_url(&request.url)?;
        let mut req = self.client.request(request.method.into(), url);

        if !request.params.is_empty() {
            req = req.query(&request.params);
        }
        if let Some(token) = &request.auth_token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let response = req
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::from(e)))?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(TransportError::from(e)))?;

        if !(200..300).contains(&status) {
            let (class, retryable) = classify_status(status);
            let text = String::from_utf8_lossy(&bytes).trim().to_string();
            tracing::debug!(target: "fetch_cache::transport", status, class, "remote error");
            return Err(Error::Remote {
                status,
                class: class.to_string(),
                message: if text.is_empty() {
                    format!("HTTP {status}")
                } else {
                    text
                },
                retryable,
            });
        }

        Ok(FetchResponse {
            status,
            headers,
            body: parse_body(&bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_relative_against_base() {
        let t = HttpTransport::with_timeout(Some("https://crm.example.com/v1"), Duration::from_secs(5))
            .unwrap();
        assert_eq!(
            t.resolve_url("/api/cases/5").unwrap().as_str(),
            "https://crm.example.com/v1/api/cases/5"
        );
        assert_eq!(
            t.resolve_url("https://other.example.com/x").unwrap().as_str(),
            "https://other.example.com/x"
        );
    }

    #[test]
    fn test_relative_without_base_is_error() {
        let t = HttpTransport::with_timeout(None, Duration::from_secs(5)).unwrap();
        let err = t.resolve_url("/api/cases").unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::InvalidUrl { .. })));
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(404), ("not_found", false));
        assert_eq!(classify_status(429), ("rate_limited", true));
        assert_eq!(classify_status(503), ("overloaded", true));
        assert_eq!(classify_status(502), ("server_error", true));
        assert_eq!(classify_status(418), ("http_error", false));
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(b""), serde_json::Value::Null);
        assert_eq!(parse_body(b" \n"), serde_json::Value::Null);
        assert_eq!(parse_body(br#"{"id":1}"#), json!({"id": 1}));
        assert_eq!(parse_body(b"plain text"), json!("plain text"));
    }
}

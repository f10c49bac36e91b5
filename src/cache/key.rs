//! Cache key derivation.

use crate::types::{FetchRequest, Method};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::{Position, Url};

/// Fingerprint used when a request carries neither an identity nor a credential.
pub const ANONYMOUS_FINGERPRINT: &str = "anonymous";

const IDENTITY_PREFIX: &str = "id:";
const TOKEN_PREFIX: &str = "tok:";

const RELATIVE_BASE: &str = "http://relative.invalid/";

/// Key of a cached response: method, canonical URL and caller identity.
///
/// Rendered as `"{METHOD} {url} @{fingerprint}"`, which is the string
/// `clear` patterns are matched against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub method: Method,
    pub url: String,
    pub fingerprint: String,
}

impl CacheKey {
    pub fn derive(request: &FetchRequest) -> Self {
        Self {
            method: request.method,
            url: canonical_url(&request.url, &request.params),
            fingerprint: identity_fingerprint(request),
        }
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} @{}", self.method, self.url, self.fingerprint)
    }
}

/// Explicit identity wins (`id:{identity}`); otherwise the SHA-256 of the
/// credential (`tok:{hex}`), so raw tokens never appear in keys or logs.
/// The prefixes keep the three sources from colliding with each other.
pub fn identity_fingerprint(request: &FetchRequest) -> String {
    if let Some(id) = request.identity.as_deref().filter(|s| !s.is_empty()) {
        return format!("{IDENTITY_PREFIX}{id}");
    }
    match request.auth_token.as_deref().filter(|s| !s.is_empty()) {
        Some(token) => {
            let mut hasher = Sha256::new();
            hasher.update(token.as_bytes());
            let hex: String = hasher
                .finalize()
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect();
            format!("{TOKEN_PREFIX}{hex}")
        }
        None => ANONYMOUS_FINGERPRINT.to_string(),
    }
}

/// Normalise a URL and merge `params` into its query, sorted by name then value.
///
/// Relative URLs keep their relative form (path + query). Anything the URL
/// parser rejects falls back to the trimmed input; this never fails.
pub fn canonical_url(raw: &str, params: &[(String, String)]) -> String {
    let trimmed = raw.trim();
    let (mut parsed, relative) = match Url::parse(trimmed) {
        Ok(u) => (u, false),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            match Url::parse(RELATIVE_BASE).and_then(|base| base.join(trimmed)) {
                Ok(u) => (u, true),
                Err(_) => return fallback_url(trimmed, params),
            }
        }
        Err(_) => return fallback_url(trimmed, params),
    };

    let mut pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
    pairs.extend(params.iter().cloned());
    pairs.sort();

    parsed.set_fragment(None);
    if pairs.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(pairs.iter());
    }

    if relative {
        parsed[Position::BeforePath..].to_string()
    } else {
        parsed.to_string()
    }
}

fn fallback_url(raw: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return raw.to_string();
    }
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();
    let query = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    let sep = if raw.contains('?') { '&' } else { '?' };
    format!("{raw}{sep}{query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_order_does_not_matter() {
        let a = FetchRequest::get("https://crm.example.com/api/leads?status=open&page=2");
        let b = FetchRequest::get("https://CRM.example.com/api/leads")
            .with_param("page", "2")
            .with_param("status", "open");
        assert_eq!(CacheKey::derive(&a), CacheKey::derive(&b));
        assert_eq!(
            CacheKey::derive(&a).url,
            "https://crm.example.com/api/leads?page=2&status=open"
        );
    }

    #[test]
    fn test_relative_url_keeps_path_form() {
        let req = FetchRequest::get("/api/cases/5#details").with_param("expand", "notes");
        assert_eq!(canonical_url(&req.url, &req.params), "/api/cases/5?expand=notes");
        assert_eq!(canonical_url("/api/cases?", &[]), "/api/cases");
    }

    #[test]
    fn test_identity_isolation() {
        let alice = FetchRequest::get("/api/invoices").with_auth_token("token-alice");
        let bob = FetchRequest::get("/api/invoices").with_auth_token("token-bob");
        let anon = FetchRequest::get("/api/invoices");

        let ka = CacheKey::derive(&alice);
        let kb = CacheKey::derive(&bob);
        let kn = CacheKey::derive(&anon);
        assert_ne!(ka, kb);
        assert_ne!(ka, kn);
        assert_eq!(kn.fingerprint, ANONYMOUS_FINGERPRINT);
        assert!(ka.fingerprint.starts_with("tok:"));
        assert_eq!(ka.fingerprint.len(), 4 + 64);
        assert!(!ka.render().contains("token-alice"));

        // Same credential, same key.
        let again = FetchRequest::get("/api/invoices").with_auth_token("token-alice");
        assert_eq!(ka, CacheKey::derive(&again));
    }

    #[test]
    fn test_explicit_identity_overrides_token() {
        let req = FetchRequest::get("/api/cases/5")
            .with_auth_token("token")
            .with_identity("alice");
        assert_eq!(CacheKey::derive(&req).render(), "GET /api/cases/5 @id:alice");
    }

    #[test]
    fn test_identity_sources_do_not_collide() {
        let anon = CacheKey::derive(&FetchRequest::get("/api/cases/5"));
        let named_anon =
            CacheKey::derive(&FetchRequest::get("/api/cases/5").with_identity("anonymous"));
        assert_ne!(anon, named_anon);
        assert_ne!(anon.render(), named_anon.render());

        // An identity spelled like some token's hash still gets its own key.
        let tokened = CacheKey::derive(&FetchRequest::get("/api/cases/5").with_auth_token("secret"));
        let hex = tokened.fingerprint.trim_start_matches("tok:").to_string();
        let spoofed = CacheKey::derive(&FetchRequest::get("/api/cases/5").with_identity(hex));
        assert_ne!(tokened, spoofed);
    }

    #[test]
    fn test_render_matches_display() {
        let key = CacheKey::derive(&FetchRequest::get("/api/cases?b=2&a=1"));
        assert_eq!(key.render(), key.to_string());
        assert_eq!(key.render(), "GET /api/cases?a=1&b=2 @anonymous");
    }

    #[test]
    fn test_method_is_part_of_key() {
        let get = CacheKey::derive(&FetchRequest::get("/api/cases"));
        let head = CacheKey::derive(&FetchRequest::new(Method::Head, "/api/cases"));
        assert_ne!(get, head);
    }

    #[test]
    fn test_unparsable_url_falls_back() {
        let url = canonical_url("http://[broken", &[("b".into(), "2".into()), ("a".into(), "1".into())]);
        assert_eq!(url, "http://[broken?a=1&b=2");
    }
}

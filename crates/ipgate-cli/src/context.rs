//! Per-request gateway context

use axum::http::{header, HeaderMap};
use ipgate_core::{parse_host, parse_path, ParsedAddress, Result};
use tokio_util::sync::CancellationToken;

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Everything the router knows about one gateway request
#[derive(Clone, Debug)]
pub struct GatewayRequestContext {
    pub parsed: ParsedAddress,
    /// Cancelled when the client goes away or the response finishes
    pub cancel: CancellationToken,
    /// `Host` the request arrived on, port included
    pub origin_host: String,
    pub is_subdomain_request: bool,
    /// Scheme the client used, as reported by a proxy
    pub scheme: String,
    trailing_slash: bool,
}

impl GatewayRequestContext {
    /// Context for a path-style request (`/{ipfs|ipns}/{address}/...`)
    pub fn from_path(path: &str, headers: &HeaderMap) -> Result<Self> {
        Ok(Self {
            parsed: parse_path(path)?,
            cancel: CancellationToken::new(),
            origin_host: request_host(headers).to_string(),
            is_subdomain_request: false,
            scheme: request_scheme(headers).to_string(),
            trailing_slash: path.ends_with('/'),
        })
    }

    /// Context for a request on a content subdomain (`{address}.{ipfs|ipns}.{host}`)
    pub fn from_subdomain(path: &str, headers: &HeaderMap) -> Result<Self> {
        let host = request_host(headers);
        Ok(Self {
            parsed: parse_host(host)?.join(path),
            cancel: CancellationToken::new(),
            origin_host: host.to_string(),
            is_subdomain_request: true,
            scheme: request_scheme(headers).to_string(),
            trailing_slash: path.ends_with('/'),
        })
    }

    /// URI handed to the content fetcher
    ///
    /// The trailing slash is kept: it decides between a directory redirect
    /// and serving the directory index.
    pub fn fetch_uri(&self) -> String {
        let mut uri = self.parsed.to_uri();
        if self.trailing_slash && !uri.ends_with('/') {
            uri.push('/');
        }
        uri
    }
}

/// Whether the request arrived on a content subdomain
pub fn is_subdomain_host(headers: &HeaderMap) -> bool {
    parse_host(request_host(headers)).is_ok()
}

/// The `Host` header, empty when missing or not text
pub fn request_host(headers: &HeaderMap) -> &str {
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// Client scheme from `X-Forwarded-Proto`, `http` by default
pub fn request_scheme(headers: &HeaderMap) -> &str {
    headers
        .get(X_FORWARDED_PROTO)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("http")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use ipgate_core::Namespace;

    const CID: &str = "bafkqaddimvwgy3zao5xxe3debi";

    fn headers(host: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_str(host).unwrap());
        headers
    }

    #[test]
    fn test_path_request() {
        let ctx = GatewayRequestContext::from_path(&format!("/ipfs/{}/a//b/", CID), &headers("localhost:8080"))
            .unwrap();
        assert_eq!(ctx.parsed.namespace, Namespace::Ipfs);
        assert_eq!(ctx.parsed.relative_path, "/a/b");
        assert_eq!(ctx.origin_host, "localhost:8080");
        assert_eq!(ctx.scheme, "http");
        assert!(!ctx.is_subdomain_request);
        assert_eq!(ctx.fetch_uri(), format!("ipfs://{}/a/b/", CID));
    }

    #[test]
    fn test_subdomain_request() {
        let ctx = GatewayRequestContext::from_subdomain(
            "/docs/page.html",
            &headers(&format!("{}.ipfs.localhost:8080", CID)),
        )
        .unwrap();
        assert!(ctx.is_subdomain_request);
        assert_eq!(ctx.fetch_uri(), format!("ipfs://{}/docs/page.html", CID));
    }

    #[test]
    fn test_subdomain_root_keeps_slash() {
        let ctx = GatewayRequestContext::from_subdomain("/", &headers("docs-ipfs-tech.ipns.localhost")).unwrap();
        assert_eq!(ctx.fetch_uri(), "ipns://docs-ipfs-tech/");
    }

    #[test]
    fn test_forwarded_scheme() {
        let mut headers = headers("gateway.example");
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("https, http"));
        assert_eq!(request_scheme(&headers), "https");
        assert!(!is_subdomain_host(&headers));
    }
}

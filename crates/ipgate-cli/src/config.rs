//! Gateway configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gateway server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port of the gateway listener
    pub http_port: u16,
    /// Port of a dedicated `/api/v0` listener, if any
    pub rpc_port: Option<u16>,
    /// Kubo RPC API URL
    pub ipfs_url: String,
    /// Redirect path-style requests to subdomain origins
    pub use_subdomains: bool,
    /// Log request headers at debug level
    pub echo_headers: bool,
    /// DNS-over-HTTPS endpoints for DNSLink lookups (empty: built-in list)
    pub dns_resolvers: Vec<String>,
    /// Kubo-compatible `name/resolve` API used as the last resolution step
    pub delegated_resolver_url: Option<String>,
    /// Probe domains for redirects before DNSLink lookups
    pub probe_redirects: bool,
    /// Maximum number of cached name resolutions
    pub name_cache_size: usize,
    /// Lifetime of a cached name resolution (seconds)
    pub name_cache_ttl_secs: u64,
    /// Serve from an in-memory node instead of Kubo
    pub use_memory_node: bool,
    /// Upper bound for repository garbage collection (milliseconds)
    pub gc_timeout_ms: u64,
    /// Upper bound for the health probe (milliseconds)
    pub healthcheck_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
            rpc_port: None,
            ipfs_url: "http://localhost:5001".to_string(),
            use_subdomains: true,
            echo_headers: false,
            dns_resolvers: Vec::new(),
            delegated_resolver_url: None,
            probe_redirects: true,
            name_cache_size: 1000,
            name_cache_ttl_secs: 24 * 60 * 60, // 24 hours
            use_memory_node: false,
            gc_timeout_ms: 20_000,
            healthcheck_timeout_ms: 1_000,
        }
    }
}

impl GatewayConfig {
    /// Get the gateway bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    /// Get the RPC bind address, when a dedicated RPC listener is configured
    pub fn rpc_bind_addr(&self) -> Option<String> {
        self.rpc_port.map(|port| format!("{}:{}", self.host, port))
    }

    pub fn name_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.name_cache_ttl_secs)
    }

    pub fn gc_timeout(&self) -> Duration {
        Duration::from_millis(self.gc_timeout_ms)
    }

    pub fn healthcheck_timeout(&self) -> Duration {
        Duration::from_millis(self.healthcheck_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.rpc_bind_addr(), None);
        assert!(config.use_subdomains);
        assert_eq!(config.gc_timeout(), Duration::from_secs(20));
        assert_eq!(config.healthcheck_timeout(), Duration::from_secs(1));
        assert_eq!(config.name_cache_ttl(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_rpc_listener() {
        let config = GatewayConfig {
            host: "127.0.0.1".to_string(),
            rpc_port: Some(5002),
            ..Default::default()
        };
        assert_eq!(config.rpc_bind_addr().as_deref(), Some("127.0.0.1:5002"));
    }
}

//! Gateway construction and application state
//!
//! Building the gateway is split in two phases. [`Gateway::construct`]
//! assembles the resolution stack from configuration without touching the
//! network; [`Gateway::start`] connects the content node and yields the
//! [`AppState`] that routes are built from.

use crate::config::GatewayConfig;
use ipgate_core::{
    ContentFetcher, DelegatedStrategy, DnsLinkStrategy, HttpRedirectProbe, LruTtlCache,
    NameResolver, NameStrategy, RedirectMode, RedirectPolicy, RedirectProbe, ResolutionCache,
};
use ipgate_node::{
    ContentNode, FlexibleNode, KuboConfig, MemoryNode, NodeFetcher, NodeVersion, PeerIdStrategy,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Timeout of DNS-over-HTTPS and delegated resolver requests
const RESOLVER_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A gateway whose content node is not connected yet
pub struct Gateway {
    config: GatewayConfig,
    cache: Arc<dyn ResolutionCache>,
    strategies: Vec<Arc<dyn NameStrategy>>,
    probe: Option<Arc<dyn RedirectProbe>>,
}

impl Gateway {
    /// Assemble the name resolution stack from `config`
    pub fn construct(config: GatewayConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(RESOLVER_REQUEST_TIMEOUT)
            .user_agent(concat!("ipgate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let dnslink = if config.dns_resolvers.is_empty() {
            DnsLinkStrategy::with_defaults(client.clone())
        } else {
            DnsLinkStrategy::new(client.clone(), config.dns_resolvers.clone())
        };

        let mut strategies: Vec<Arc<dyn NameStrategy>> = vec![Arc::new(dnslink)];
        if let Some(url) = &config.delegated_resolver_url {
            strategies.push(Arc::new(DelegatedStrategy::new(client, url.clone())));
        }

        let probe: Option<Arc<dyn RedirectProbe>> = if config.probe_redirects {
            Some(Arc::new(HttpRedirectProbe::new()?))
        } else {
            None
        };

        let cache = Arc::new(LruTtlCache::new(config.name_cache_size, config.name_cache_ttl()));

        Ok(Self {
            config,
            cache,
            strategies,
            probe,
        })
    }

    /// Connect the content node and build the application state
    ///
    /// An unreachable Kubo node is not fatal: the gateway falls back to an
    /// in-memory node.
    pub async fn start(self) -> anyhow::Result<AppState> {
        let node = if self.config.use_memory_node {
            info!("Using in-memory content node (content will not persist)");
            FlexibleNode::Memory(MemoryNode::new())
        } else {
            FlexibleNode::connect_or_memory(KuboConfig::with_url(&self.config.ipfs_url)).await
        };

        if node.is_persistent() {
            info!(node = node.kind(), "Content node ready");
        } else {
            warn!(node = node.kind(), "Serving from an in-memory node, for development only");
        }

        Ok(self.attach(node))
    }

    /// Build the application state on an already connected node
    pub fn attach(self, node: FlexibleNode) -> AppState {
        let node = Arc::new(node);

        // node-identity resolution goes first in the chain
        let mut resolver = NameResolver::new(self.cache)
            .with_strategy(Arc::new(PeerIdStrategy::new(Arc::clone(&node))));
        for strategy in self.strategies {
            resolver = resolver.with_strategy(strategy);
        }
        if let Some(probe) = self.probe {
            resolver = resolver.with_probe(probe);
        }
        let resolver = Arc::new(resolver);
        info!(strategies = ?resolver.strategy_names(), "Name resolution chain ready");

        let fetcher: Arc<dyn ContentFetcher> =
            Arc::new(NodeFetcher::new(Arc::clone(&node), Arc::clone(&resolver)));

        AppState {
            redirects: RedirectPolicy::new(self.config.use_subdomains),
            config: self.config,
            node,
            resolver,
            fetcher,
            version: OnceCell::new(),
        }
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Gateway configuration
    pub config: GatewayConfig,
    /// Content node (Kubo or memory fallback)
    pub node: Arc<FlexibleNode>,
    /// Name resolution engine
    pub resolver: Arc<NameResolver>,
    /// Content fetcher serving gateway URIs
    pub fetcher: Arc<dyn ContentFetcher>,
    /// Subdomain redirect policy
    pub redirects: RedirectPolicy,
    version: OnceCell<NodeVersion>,
}

impl AppState {
    /// Create the state for `config`, connecting the content node
    pub async fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        Gateway::construct(config)?.start().await
    }

    /// Node version, looked up once and memoized
    pub async fn version(&self, cancel: &CancellationToken) -> ipgate_node::Result<NodeVersion> {
        self.version
            .get_or_try_init(|| async { self.node.version(cancel).await })
            .await
            .cloned()
    }

    /// Redirect handling for directory requests
    ///
    /// With subdomains the gateway decides on redirects itself; without
    /// them directory indexes are served directly.
    pub fn redirect_mode(&self) -> RedirectMode {
        if self.config.use_subdomains {
            RedirectMode::Manual
        } else {
            RedirectMode::Follow
        }
    }
}

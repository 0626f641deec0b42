//! Mutable name resolution
//!
//! [`NameResolver`] turns an `ipns` name into a canonical `/ipfs/...` path.
//! Per name it moves through `unresolved -> resolving -> {resolved,
//! negative, failed}`:
//!
//! 1. a cached resolution is returned immediately; a cached negative fails
//!    fast without touching the network until the entry expires;
//! 2. otherwise an optional [`RedirectProbe`] checks whether the domain
//!    redirects elsewhere, and the ordered [`NameStrategy`] chain is tried
//!    against the redirect target, then the name itself, until one produces
//!    a path;
//! 3. the produced path is validated by the address parser and cached, as
//!    is any failure. `ipns` results are followed until an `ipfs` path is
//!    reached.
//!
//! Concurrent resolutions of the same cold name are not deduplicated.

mod delegated;
mod dnslink;
mod probe;

pub use delegated::DelegatedStrategy;
pub use dnslink::{DnsLinkStrategy, DEFAULT_DOH_RESOLVERS, DNSLINK_PREFIX};
pub use probe::{HttpRedirectProbe, DEFAULT_PROBE_TIMEOUT};

use crate::address::{parse_path, sanitize_path, Namespace, ParsedAddress};
use crate::cache::{CachedResolution, ResolutionCache};
use crate::dnslink::{decode_label, is_inlined_label};
use crate::identity::is_cid;
use crate::{GatewayError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How many `ipns` indirections are followed before giving up
pub const MAX_RESOLVE_DEPTH: usize = 32;

/// One way of resolving a name to a gateway path
#[async_trait]
pub trait NameStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Resolve `name` to a gateway path such as `/ipfs/{cid}/sub`
    ///
    /// `Ok(None)` means the strategy does not apply to this name or found
    /// no record for it.
    async fn resolve(&self, name: &str, cancel: &CancellationToken) -> Result<Option<String>>;
}

/// Detects domains that HTTP-redirect to another domain
#[async_trait]
pub trait RedirectProbe: Send + Sync {
    /// Return the host `domain` redirects to, if any
    async fn probe(&self, domain: &str, cancel: &CancellationToken) -> Result<Option<String>>;
}

/// Per-call resolution options
#[derive(Clone, Debug, Default)]
pub struct ResolveOptions {
    /// Request cancellation
    pub cancel: CancellationToken,
    /// Sub-path appended to the resolved path
    pub relative_path: String,
}

impl ResolveOptions {
    pub fn new(cancel: CancellationToken, relative_path: impl Into<String>) -> Self {
        Self {
            cancel,
            relative_path: relative_path.into(),
        }
    }
}

/// Cached, fallback-chained name resolver
pub struct NameResolver {
    cache: Arc<dyn ResolutionCache>,
    strategies: Vec<Arc<dyn NameStrategy>>,
    probe: Option<Arc<dyn RedirectProbe>>,
}

impl NameResolver {
    /// Create a resolver with no strategies
    pub fn new(cache: Arc<dyn ResolutionCache>) -> Self {
        Self {
            cache,
            strategies: Vec::new(),
            probe: None,
        }
    }

    /// Append a strategy to the fallback chain
    pub fn with_strategy(mut self, strategy: Arc<dyn NameStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Probe domains for HTTP redirects before resolving them
    pub fn with_probe(mut self, probe: Arc<dyn RedirectProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Names of the configured strategies, in order
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Resolve `name` to a canonical `/ipfs/{cid}{path}` gateway path
    pub async fn resolve(&self, name: &str, options: ResolveOptions) -> Result<String> {
        let mut current = normalize_name(name);
        let mut suffix = String::new();

        for _ in 0..MAX_RESOLVE_DEPTH {
            let path = self.resolve_once(&current, &options.cancel).await?;
            let parsed = parse_path(&path)?;
            suffix = format!("{}{}", parsed.relative_path, suffix);

            match parsed.namespace {
                Namespace::Ipfs => {
                    let relative = sanitize_path(&format!("{}{}", suffix, options.relative_path));
                    let resolved = ParsedAddress::new(Namespace::Ipfs, &parsed.address, &relative)?;
                    debug!(name = %name, resolved = %resolved, "name resolved");
                    return Ok(resolved.to_path());
                }
                Namespace::Ipns => {
                    debug!(name = %current, next = %parsed.address, "following ipns indirection");
                    current = normalize_name(&parsed.address);
                }
            }
        }

        Err(GatewayError::Resolution(format!(
            "too many levels of indirection resolving {}",
            name
        )))
    }

    /// Resolve a single level, consulting and filling the cache
    async fn resolve_once(&self, name: &str, cancel: &CancellationToken) -> Result<String> {
        if let Some(hit) = self.cache.get(name) {
            debug!(name = %name, "name cache hit");
            return match hit {
                CachedResolution::Resolved(path) => Ok(path),
                CachedResolution::NotFound => Err(GatewayError::NameNotFound(name.to_string())),
            };
        }

        debug!(name = %name, "name cache miss");
        match self.resolve_uncached(name, cancel).await {
            Ok((path, alias)) => {
                self.cache.set(name, CachedResolution::Resolved(path.clone()));
                if let Some(alias) = alias {
                    self.cache.set(&alias, CachedResolution::Resolved(path.clone()));
                }
                Ok(path)
            }
            Err(e) if e.is_cacheable() => {
                warn!(name = %name, error = %e, "name resolution failed");
                self.cache.set(name, CachedResolution::NotFound);
                Err(GatewayError::NameNotFound(name.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Probe for redirects, then run the strategy chain
    ///
    /// A redirect target is resolved first; when it yields nothing the chain
    /// runs against `name` itself. Returns the path and, when the target
    /// resolved, the target name that must be cached alongside `name`.
    async fn resolve_uncached(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(String, Option<String>)> {
        if let Some(target) = self.probe_target(name, cancel).await? {
            match self.cache.get(&target) {
                Some(CachedResolution::Resolved(path)) => return Ok((path, None)),
                Some(CachedResolution::NotFound) => {
                    debug!(name = %name, target = %target, "redirect target cached as not found");
                }
                None => match self.run_chain(&target, cancel).await {
                    Ok(path) => return Ok((path, Some(target))),
                    Err(GatewayError::Cancelled) => return Err(GatewayError::Cancelled),
                    Err(e) => {
                        debug!(name = %name, target = %target, error = %e, "redirect target did not resolve");
                        if e.is_cacheable() {
                            self.cache.set(&target, CachedResolution::NotFound);
                        }
                    }
                },
            }
        }

        let path = self.run_chain(name, cancel).await?;
        Ok((path, None))
    }

    /// Host a domain name redirects to, when the probe finds one
    async fn probe_target(&self, name: &str, cancel: &CancellationToken) -> Result<Option<String>> {
        let Some(probe) = self.probe.as_ref().filter(|_| is_domain(name)) else {
            return Ok(None);
        };

        match probe.probe(name, cancel).await {
            Ok(Some(redirected)) if redirected != name => {
                debug!(name = %name, target = %redirected, "domain redirects, resolving target");
                Ok(Some(redirected))
            }
            Ok(_) => Ok(None),
            Err(GatewayError::Cancelled) => Err(GatewayError::Cancelled),
            Err(e) => {
                debug!(name = %name, error = %e, "redirect probe failed, ignoring");
                Ok(None)
            }
        }
    }

    /// Try each strategy in order; the first valid path wins
    async fn run_chain(&self, name: &str, cancel: &CancellationToken) -> Result<String> {
        let mut last_error = None;

        for strategy in &self.strategies {
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }

            match strategy.resolve(name, cancel).await {
                Ok(Some(path)) => match parse_path(&path) {
                    Ok(parsed) => {
                        debug!(name = %name, strategy = strategy.name(), path = %parsed, "strategy resolved name");
                        return Ok(parsed.to_path());
                    }
                    Err(e) => {
                        warn!(name = %name, strategy = strategy.name(), path = %path, "strategy returned an invalid path");
                        last_error = Some(e);
                    }
                },
                Ok(None) => debug!(name = %name, strategy = strategy.name(), "no record"),
                Err(GatewayError::Cancelled) => return Err(GatewayError::Cancelled),
                Err(e) => {
                    debug!(name = %name, strategy = strategy.name(), error = %e, "strategy failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| GatewayError::NameNotFound(name.to_string())))
    }
}

/// Decode inlined DNS labels and lowercase domain names
fn normalize_name(name: &str) -> String {
    let name = if is_inlined_label(name) && !is_cid(name) {
        decode_label(name)
    } else {
        name.to_string()
    };

    if is_domain(&name) {
        name.to_ascii_lowercase()
    } else {
        name
    }
}

/// Whether a name looks like a DNS domain rather than a key
pub(crate) fn is_domain(name: &str) -> bool {
    name.contains('.')
}

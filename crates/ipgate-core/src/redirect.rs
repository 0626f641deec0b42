//! Origin-isolation redirects from path-style to subdomain-style requests

use crate::address::{Namespace, ParsedAddress};
use crate::dnslink::{encode_label, is_inlined_label};
use crate::identity::{is_case_sensitive_peer_id, normalize_cid};
use tracing::debug;

/// Outcome of the redirect policy for a path-style request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RedirectDecision {
    /// Answer with `301 Moved Permanently` and this `Location`
    Redirect(String),
    /// Serve the request from the current origin
    Continue,
}

/// Decides whether a path-style request moves to its own subdomain origin
#[derive(Clone, Copy, Debug)]
pub struct RedirectPolicy {
    use_subdomains: bool,
}

impl RedirectPolicy {
    /// Create a policy; with `use_subdomains` off every request continues
    pub fn new(use_subdomains: bool) -> Self {
        Self { use_subdomains }
    }

    /// Whether subdomain origin isolation is enabled
    pub fn use_subdomains(&self) -> bool {
        self.use_subdomains
    }

    /// Decide for a path-style request that arrived on `request_host`
    ///
    /// A request query string is carried over to the subdomain location.
    pub fn decide(
        &self,
        parsed: &ParsedAddress,
        request_host: &str,
        scheme: &str,
        query: Option<&str>,
    ) -> RedirectDecision {
        if !self.use_subdomains {
            return RedirectDecision::Continue;
        }

        // Base58 identities do not survive hostname lowercasing
        if parsed.namespace == Namespace::Ipns && is_case_sensitive_peer_id(&parsed.address) {
            debug!(address = %parsed.address, "node identity, serving without subdomain");
            return RedirectDecision::Continue;
        }

        let label = subdomain_label(parsed);

        let mut location = format!(
            "{}://{}.{}.{}/{}",
            scheme,
            label,
            parsed.namespace,
            request_host,
            parsed.relative_path.trim_start_matches('/'),
        );
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            location.push('?');
            location.push_str(query);
        }

        debug!(location = %location, "redirecting to subdomain origin");
        RedirectDecision::Redirect(location)
    }
}

/// The single DNS label an address occupies in a subdomain host
pub fn subdomain_label(parsed: &ParsedAddress) -> String {
    if let Some(cid) = normalize_cid(&parsed.address, parsed.namespace) {
        return cid;
    }

    if is_inlined_label(&parsed.address) {
        parsed.address.clone()
    } else {
        encode_label(&parsed.address.to_ascii_lowercase())
    }
}

//! Gateway address parsing
//!
//! Requests reach the gateway either path-style
//! (`/{ipfs|ipns}/{address}/{relative path}`) or subdomain-style
//! (`{address}.{ipfs|ipns}.{gateway host}`). Both are parsed into a
//! [`ParsedAddress`]; the content fetch layer addresses content with the
//! equivalent `ipfs://` / `ipns://` URIs.

use crate::{GatewayError, Result};
use cid::Cid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Gateway address family
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Immutable content identifiers
    Ipfs,
    /// Mutable names (node identities and DNSLink domains)
    Ipns,
}

impl Namespace {
    /// Get the namespace token
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Ipfs => "ipfs",
            Namespace::Ipns => "ipns",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ipfs" => Ok(Namespace::Ipfs),
            "ipns" => Ok(Namespace::Ipns),
            other => Err(GatewayError::InvalidAddress(format!(
                "unknown namespace '{}', expected ipfs or ipns",
                other
            ))),
        }
    }
}

/// A parsed gateway address
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParsedAddress {
    pub namespace: Namespace,
    pub address: String,
    /// Sanitized sub-path, either empty or `/segment[/segment...]`
    pub relative_path: String,
}

impl ParsedAddress {
    /// Validate the parts and build an address
    pub fn new(namespace: Namespace, address: &str, relative_path: &str) -> Result<Self> {
        if address.is_empty() {
            return Err(GatewayError::InvalidAddress("address is empty".to_string()));
        }

        match namespace {
            Namespace::Ipfs => {
                Cid::try_from(address).map_err(|e| {
                    GatewayError::InvalidAddress(format!("'{}' is not a valid CID: {}", address, e))
                })?;
            }
            Namespace::Ipns => {
                let valid = address
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
                if !valid {
                    return Err(GatewayError::InvalidAddress(format!(
                        "'{}' is not a valid name",
                        address
                    )));
                }
            }
        }

        Ok(Self {
            namespace,
            address: address.to_string(),
            relative_path: sanitize_path(relative_path),
        })
    }

    /// Gateway path form: `/{namespace}/{address}{relative_path}`
    pub fn to_path(&self) -> String {
        format!("/{}/{}{}", self.namespace, self.address, self.relative_path)
    }

    /// Fetch URI form: `{namespace}://{address}{relative_path}`
    pub fn to_uri(&self) -> String {
        format!("{}://{}{}", self.namespace, self.address, self.relative_path)
    }

    /// The CID, for `ipfs` addresses
    pub fn cid(&self) -> Option<Cid> {
        match self.namespace {
            Namespace::Ipfs => Cid::try_from(self.address.as_str()).ok(),
            Namespace::Ipns => None,
        }
    }

    /// Return a copy with `suffix` appended to the relative path
    pub fn join(&self, suffix: &str) -> Self {
        Self {
            namespace: self.namespace,
            address: self.address.clone(),
            relative_path: sanitize_path(&format!("{}/{}", self.relative_path, suffix)),
        }
    }
}

impl fmt::Display for ParsedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path())
    }
}

/// Collapse repeated slashes and drop the trailing slash
///
/// The result is either empty or starts with a single `/` followed by
/// content.
pub fn sanitize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    out
}

/// Parse a path-style request path (`/ipfs/{cid}/...`, `/ipns/{name}/...`)
pub fn parse_path(raw: &str) -> Result<ParsedAddress> {
    let rest = raw.strip_prefix('/').ok_or_else(|| {
        GatewayError::InvalidAddress(format!(
            "'{}' is not valid, provide path as /ipfs/<cid> or /ipns/<name>",
            raw
        ))
    })?;
    let (namespace, rest) = rest.split_once('/').ok_or_else(|| {
        GatewayError::InvalidAddress(format!("'{}' has no address segment", raw))
    })?;
    let namespace: Namespace = namespace.parse()?;

    let (address, relative_path) = match rest.find('/') {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };

    ParsedAddress::new(namespace, address, relative_path)
}

/// Parse a subdomain gateway host (`{address}.{ipfs|ipns}.{suffix}`)
///
/// Any port is ignored. The namespace label closest to the suffix wins, so
/// addresses may themselves contain dots.
pub fn parse_host(host: &str) -> Result<ParsedAddress> {
    let hostname = strip_port(host);
    let labels: Vec<&str> = hostname.split('.').collect();

    let position = (1..labels.len().saturating_sub(1))
        .rev()
        .find(|&i| matches!(labels[i], "ipfs" | "ipns"))
        .ok_or_else(|| {
            GatewayError::InvalidAddress(format!("subdomain '{}' is not valid", host))
        })?;

    let namespace: Namespace = labels[position].parse()?;
    let address = labels[..position].join(".");
    ParsedAddress::new(namespace, &address, "")
}

/// Parse a fetch URI (`ipfs://{cid}/...`, `ipns://{name}/...`)
pub fn parse_uri(uri: &str) -> Result<ParsedAddress> {
    let (scheme, rest) = uri.split_once("://").ok_or_else(|| {
        GatewayError::InvalidAddress(format!("'{}' is not an ipfs:// or ipns:// URI", uri))
    })?;
    let namespace: Namespace = scheme.parse()?;
    let rest = rest.split(['?', '#']).next().unwrap_or_default();

    let (address, relative_path) = match rest.find('/') {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };

    ParsedAddress::new(namespace, address, relative_path)
}

/// Hostname without any `:port` suffix
pub fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::test_support::cid_v1;
    use proptest::prelude::*;
    use rstest::rstest;

    const CID: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";

    #[test]
    fn test_parse_path_with_relative_path() {
        let parsed = parse_path(&format!("/ipfs/{}/wiki/index.html", CID)).unwrap();
        assert_eq!(parsed.namespace, Namespace::Ipfs);
        assert_eq!(parsed.address, CID);
        assert_eq!(parsed.relative_path, "/wiki/index.html");
    }

    #[test]
    fn test_parse_path_without_relative_path() {
        let parsed = parse_path("/ipns/en.wikipedia-on-ipfs.org").unwrap();
        assert_eq!(parsed.namespace, Namespace::Ipns);
        assert_eq!(parsed.address, "en.wikipedia-on-ipfs.org");
        assert_eq!(parsed.relative_path, "");
    }

    #[rstest]
    #[case("/a//b///c/", "/a/b/c")]
    #[case("/", "")]
    #[case("", "")]
    #[case("//", "")]
    #[case("dir/file", "/dir/file")]
    #[case("/dir/", "/dir")]
    fn test_sanitize_path(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_path(input), expected);
    }

    #[rstest]
    #[case("")]
    #[case("/")]
    #[case("/ipfs")]
    #[case("/ipfs/")]
    #[case("/ipfz/bafy")]
    #[case("/IPFS/bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi")]
    #[case("/ipfs/INVALIDCID!!")]
    #[case("/ipns/bad name")]
    #[case("ipfs/bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi")]
    fn test_parse_path_rejects(#[case] input: &str) {
        assert!(matches!(parse_path(input), Err(GatewayError::InvalidAddress(_))));
    }

    #[rstest]
    #[case("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi.ipfs.localhost:8080", Namespace::Ipfs, CID)]
    #[case("en-wikipedia--on--ipfs-org.ipns.dweb.link", Namespace::Ipns, "en-wikipedia--on--ipfs-org")]
    #[case("docs.ipfs.tech.ipns.localhost", Namespace::Ipns, "docs.ipfs.tech")]
    fn test_parse_host(#[case] host: &str, #[case] namespace: Namespace, #[case] address: &str) {
        let parsed = parse_host(host).unwrap();
        assert_eq!(parsed.namespace, namespace);
        assert_eq!(parsed.address, address);
        assert_eq!(parsed.relative_path, "");
    }

    #[rstest]
    #[case("localhost:8080")]
    #[case("ipfs.localhost")]
    #[case("example.com")]
    #[case("bafy.ipfs")]
    fn test_parse_host_rejects(#[case] host: &str) {
        assert!(parse_host(host).is_err());
    }

    #[test]
    fn test_parse_uri() {
        let parsed = parse_uri(&format!("ipfs://{}/a//b/?format=raw", CID)).unwrap();
        assert_eq!(parsed.address, CID);
        assert_eq!(parsed.relative_path, "/a/b");
        assert_eq!(parsed.to_uri(), format!("ipfs://{}/a/b", CID));

        let parsed = parse_uri("ipns://docs.ipfs.tech").unwrap();
        assert_eq!(parsed.namespace, Namespace::Ipns);
        assert!(parse_uri("https://docs.ipfs.tech").is_err());
    }

    #[test]
    fn test_join() {
        let parsed = parse_path(&format!("/ipfs/{}/dir", CID)).unwrap();
        assert_eq!(parsed.join("index.html").relative_path, "/dir/index.html");
        assert_eq!(parsed.join("/").relative_path, "/dir");
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("localhost:8080"), "localhost");
        assert_eq!(strip_port("localhost"), "localhost");
        assert_eq!(strip_port("localhost:"), "localhost:");
    }

    proptest! {
        #[test]
        fn prop_parse_then_serialize_is_idempotent(
            name in "[a-z0-9][a-z0-9-]{0,20}(\\.[a-z0-9]{1,10}){0,3}",
            segments in proptest::collection::vec("[A-Za-z0-9._~-]{1,12}", 0..4),
            use_cid in any::<bool>(),
            seed in any::<u64>(),
        ) {
            let (namespace, address) = if use_cid {
                ("ipfs", cid_v1(&seed.to_le_bytes()))
            } else {
                ("ipns", name)
            };
            let raw = format!("/{}/{}/{}", namespace, address, segments.join("/"));

            let parsed = parse_path(&raw).unwrap();
            prop_assert_eq!(parsed.namespace.as_str(), namespace);
            prop_assert_eq!(&parsed.address, &address);

            let reparsed = parse_path(&parsed.to_path()).unwrap();
            prop_assert_eq!(reparsed, parsed);
        }
    }
}

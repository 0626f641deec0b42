//! DNSLink resolution over DNS-over-HTTPS

use super::NameStrategy;
use crate::cancel::cancellable;
use crate::{GatewayError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// DNS-over-HTTPS JSON endpoints queried in order
pub const DEFAULT_DOH_RESOLVERS: &[&str] = &[
    "https://cloudflare-dns.com/dns-query",
    "https://dns.google/resolve",
];

/// Subdomain holding DNSLink TXT records
pub const DNSLINK_PREFIX: &str = "_dnslink.";

const TXT_RECORD: u16 = 16;
const DNSLINK_KEY: &str = "dnslink=";

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

/// Resolves `dnslink=` TXT records on `_dnslink.{domain}`
#[derive(Clone)]
pub struct DnsLinkStrategy {
    client: Client,
    endpoints: Vec<String>,
}

impl DnsLinkStrategy {
    /// Query the given DoH JSON endpoints in order
    pub fn new(client: Client, endpoints: Vec<String>) -> Self {
        Self { client, endpoints }
    }

    /// Query the public default endpoints
    pub fn with_defaults(client: Client) -> Self {
        Self::new(
            client,
            DEFAULT_DOH_RESOLVERS.iter().map(|s| s.to_string()).collect(),
        )
    }


    #[instrument(skip(self, cancel))]
    async fn query(&self, endpoint: &str, domain: &str, cancel: &CancellationToken) -> Result<Option<String>> {
        let name = format!("{}{}", DNSLINK_PREFIX, domain);
        let request = self
            .client
            .get(endpoint)
            .query(&[("name", name.as_str()), ("type", "TXT")])
            .header(reqwest::header::ACCEPT, "application/dns-json");

        let response = cancellable(cancel, async { request.send().await.map_err(GatewayError::from) }).await?;
        if !response.status().is_success() {
            return Err(GatewayError::Resolution(format!(
                "DNS resolver {} returned {}",
                endpoint,
                response.status()
            )));
        }

        let body = cancellable(cancel, async { response.bytes().await.map_err(GatewayError::from) }).await?;
        let parsed: DohResponse = serde_json::from_slice(&body)?;
        Ok(dnslink_from_response(&parsed))
    }
}

/// Pick the DNSLink path out of a DoH answer
///
/// NXDOMAIN and answers without a `dnslink=` record yield `None`. With
/// several records the lexically smallest path wins so results are stable.
fn dnslink_from_response(response: &DohResponse) -> Option<String> {
    if response.status != 0 {
        return None;
    }

    let mut links: Vec<String> = response
        .answer
        .iter()
        .filter(|a| a.record_type == TXT_RECORD)
        .map(|a| join_txt_chunks(&a.data))
        .filter_map(|txt| txt.strip_prefix(DNSLINK_KEY).map(|v| v.trim().to_string()))
        .filter(|v| !v.is_empty())
        .collect();
    links.sort();
    links.into_iter().next()
}

/// TXT data arrives as one or more quoted strings
fn join_txt_chunks(data: &str) -> String {
    let trimmed = data.trim();
    if !trimmed.starts_with('"') {
        return trimmed.to_string();
    }
    trimmed
        .split('"')
        .enumerate()
        .filter(|(i, _)| i % 2 == 1)
        .map(|(_, chunk)| chunk)
        .collect()
}

#[async_trait]
impl NameStrategy for DnsLinkStrategy {
    fn name(&self) -> &'static str {
        "dnslink"
    }

    async fn resolve(&self, name: &str, cancel: &CancellationToken) -> Result<Option<String>> {
        if !super::is_domain(name) {
            return Ok(None);
        }

        let mut answered = false;
        let mut last_error = None;

        for endpoint in &self.endpoints {
            match self.query(endpoint, name, cancel).await {
                Ok(Some(path)) => return Ok(Some(path)),
                Ok(None) => answered = true,
                Err(GatewayError::Cancelled) => return Err(GatewayError::Cancelled),
                Err(e) => {
                    debug!(endpoint = %endpoint, error = %e, "DNS resolver failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !answered => Err(e),
            _ => Ok(None),
        }
    }
}

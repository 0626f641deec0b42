//! HTTP redirect probing for DNSLink domains

use super::RedirectProbe;
use crate::cancel::cancellable;
use crate::{GatewayError, Result};
use async_trait::async_trait;
use reqwest::{redirect, Client};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// Default bound on a single probe request
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends `HEAD {scheme}://{domain}/` and reports a cross-host redirect
#[derive(Clone)]
pub struct HttpRedirectProbe {
    client: Client,
    scheme: String,
}

impl HttpRedirectProbe {
    /// Probe over HTTPS with the default timeout
    pub fn new() -> Result<Self> {
        Self::with_options("https", DEFAULT_PROBE_TIMEOUT)
    }

    pub fn with_options(scheme: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Resolution(format!("failed to build probe client: {}", e)))?;

        Ok(Self {
            client,
            scheme: scheme.into(),
        })
    }
}

#[async_trait]
impl RedirectProbe for HttpRedirectProbe {
    async fn probe(&self, domain: &str, cancel: &CancellationToken) -> Result<Option<String>> {
        let base = Url::parse(&format!("{}://{}/", self.scheme, domain))
            .map_err(|e| GatewayError::InvalidAddress(format!("{}: {}", domain, e)))?;

        let request = self.client.head(base.clone());
        let response = cancellable(cancel, async { request.send().await.map_err(GatewayError::from) }).await?;

        if !response.status().is_redirection() {
            return Ok(None);
        }

        let Some(location) = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
        else {
            return Ok(None);
        };

        let target = base
            .join(location)
            .map_err(|e| GatewayError::Resolution(format!("bad redirect location '{}': {}", location, e)))?;

        let Some(host) = target.host_str() else {
            return Ok(None);
        };
        let host = match target.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        if host.eq_ignore_ascii_case(domain) {
            return Ok(None);
        }

        debug!(domain = %domain, target = %host, "domain redirects to another host");
        Ok(Some(host.to_ascii_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn probe() -> HttpRedirectProbe {
        HttpRedirectProbe::with_options("http", Duration::from_secs(2)).unwrap()
    }

    fn authority(server: &MockServer) -> String {
        server.address().to_string()
    }

    #[tokio::test]
    async fn test_cross_host_redirect_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "https://new.example/path"))
            .mount(&server)
            .await;

        let target = probe().probe(&authority(&server), &CancellationToken::new()).await.unwrap();
        assert_eq!(target.as_deref(), Some("new.example"));
    }

    #[tokio::test]
    async fn test_same_host_redirect_is_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/index.html"))
            .mount(&server)
            .await;

        let target = probe().probe(&authority(&server), &CancellationToken::new()).await.unwrap();
        assert_eq!(target, None);
    }

    #[tokio::test]
    async fn test_plain_response_has_no_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let target = probe().probe(&authority(&server), &CancellationToken::new()).await.unwrap();
        assert_eq!(target, None);
    }
}

//! Delegated resolution through a remote name API

use super::NameStrategy;
use crate::cancel::cancellable;
use crate::{GatewayError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

#[derive(Debug, Deserialize)]
struct NameResolveResponse {
    #[serde(rename = "Path")]
    path: String,
}

/// Asks a remote node's `/api/v0/name/resolve` endpoint to resolve names
#[derive(Clone)]
pub struct DelegatedStrategy {
    client: Client,
    endpoint: String,
}

impl DelegatedStrategy {
    /// `endpoint` is the base URL of the remote API, e.g. `https://node0.delegate.ipfs.io`
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl NameStrategy for DelegatedStrategy {
    fn name(&self) -> &'static str {
        "delegated"
    }

    #[instrument(skip(self, cancel), fields(endpoint = %self.endpoint))]
    async fn resolve(&self, name: &str, cancel: &CancellationToken) -> Result<Option<String>> {
        let url = format!("{}/api/v0/name/resolve", self.endpoint);
        let arg = format!("/ipns/{}", name);
        let request = self
            .client
            .post(&url)
            .query(&[("arg", arg.as_str()), ("recursive", "true")]);

        let response = cancellable(cancel, async { request.send().await.map_err(GatewayError::from) }).await?;
        if !response.status().is_success() {
            return Err(GatewayError::Resolution(format!(
                "delegated resolver returned {} for {}",
                response.status(),
                name
            )));
        }

        let body = cancellable(cancel, async { response.bytes().await.map_err(GatewayError::from) }).await?;
        let parsed: NameResolveResponse = serde_json::from_slice(&body)?;
        Ok(Some(parsed.path).filter(|p| !p.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_resolves_through_remote_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/name/resolve"))
            .and(query_param("arg", "/ipns/docs.ipfs.tech"))
            .and(query_param("recursive", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Path": "/ipfs/bafydocs" })))
            .mount(&server)
            .await;

        let strategy = DelegatedStrategy::new(Client::new(), format!("{}/", server.uri()));
        let resolved = strategy.resolve("docs.ipfs.tech", &CancellationToken::new()).await.unwrap();

        assert_eq!(resolved.as_deref(), Some("/ipfs/bafydocs"));
    }

    #[tokio::test]
    async fn test_remote_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v0/name/resolve"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "Message": "could not resolve name" })))
            .mount(&server)
            .await;

        let strategy = DelegatedStrategy::new(Client::new(), server.uri());
        let err = strategy.resolve("missing.example", &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, GatewayError::Resolution(_)));
    }
}

//! Kubo RPC HTTP API client

use crate::{ContentNode, NodeError, NodeVersion, Result};
use async_trait::async_trait;
use cid::Cid;
use futures::{StreamExt, TryStreamExt};
use ipgate_core::{ByteStream, EntryKind, EntryStat};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

const RAW_CODEC: u64 = 0x55;

/// Configuration for the Kubo connection
#[derive(Clone, Debug)]
pub struct KuboConfig {
    /// RPC API URL (e.g., "http://localhost:5001")
    pub api_url: String,
    /// Bound on establishing a connection; reads are bounded by cancellation
    pub connect_timeout: Duration,
}

impl Default for KuboConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5001".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl KuboConfig {
    /// Create with a custom API URL
    pub fn with_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "Message")]
    message: String,
}

#[derive(Debug, Deserialize)]
struct FilesStat {
    #[serde(rename = "Hash")]
    hash: String,
    #[serde(rename = "Size", default)]
    size: u64,
    #[serde(rename = "CumulativeSize", default)]
    cumulative_size: u64,
    #[serde(rename = "Type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct NameResolve {
    #[serde(rename = "Path")]
    path: String,
}

#[derive(Debug, Deserialize)]
struct GcLine {
    #[serde(rename = "Error", default)]
    error: Option<String>,
}

/// Content node backed by a Kubo daemon
#[derive(Clone)]
pub struct KuboNode {
    client: Client,
    config: KuboConfig,
}

impl KuboNode {
    /// Connect to Kubo, failing if the node does not answer
    pub async fn new(config: KuboConfig) -> Result<Self> {
        let node = Self::unchecked(config)?;
        node.verify_connection().await?;
        Ok(node)
    }

    /// Build a client without contacting the node
    pub fn unchecked(config: KuboConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| NodeError::Configuration(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Create from URL string
    pub async fn from_url(url: &str) -> Result<Self> {
        Self::new(KuboConfig::with_url(url)).await
    }

    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }

    /// Verify the node answers `/api/v0/id`
    pub async fn verify_connection(&self) -> Result<()> {
        self.call("id", &[], &CancellationToken::new())
            .await
            .map_err(|e| NodeError::Connection(format!("failed to reach Kubo at {}: {}", self.config.api_url, e)))?;
        Ok(())
    }

    async fn call(&self, endpoint: &str, args: &[(&str, &str)], cancel: &CancellationToken) -> Result<Response> {
        let url = format!("{}/api/v0/{}", self.config.api_url, endpoint);
        let request = self.client.post(&url).query(args);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(NodeError::Cancelled),
            response = request.send() => response?,
        };

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(api_error(status, &body))
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        args: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<T> {
        let response = self.call(endpoint, args, cancel).await?;
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(NodeError::Cancelled),
            body = response.bytes() => body?,
        };
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Turn a Kubo error answer into a `NodeError`
///
/// Kubo reports missing links and unresolvable content as 500s with a
/// JSON `Message`, so not-found is recognised by message as well as status.
fn api_error(status: StatusCode, body: &str) -> NodeError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.trim().to_string());

    let lower = message.to_ascii_lowercase();
    let not_found = status == StatusCode::NOT_FOUND
        || ["no link named", "not found", "does not exist", "no such"]
            .iter()
            .any(|needle| lower.contains(needle));

    if not_found {
        NodeError::NotFound(message)
    } else {
        NodeError::Api(format!("{}: {}", status, message))
    }
}

fn ipfs_arg(cid: &Cid, path: &str) -> String {
    format!("/ipfs/{}{}", cid, path)
}

#[async_trait]
impl ContentNode for KuboNode {
    #[instrument(skip(self, cancel))]
    async fn stat(&self, cid: &Cid, path: &str, cancel: &CancellationToken) -> Result<EntryStat> {
        let arg = ipfs_arg(cid, path);
        let stat: FilesStat = self.call_json("files/stat", &[("arg", arg.as_str())], cancel).await?;

        let hash = Cid::try_from(stat.hash.as_str())?;
        let kind = match stat.kind.as_str() {
            "directory" => EntryKind::Directory,
            _ if hash.codec() == RAW_CODEC => EntryKind::Raw,
            _ => EntryKind::File,
        };
        let size = if kind == EntryKind::Directory {
            stat.cumulative_size
        } else {
            stat.size
        };

        debug!(arg = %arg, kind = ?kind, size, "stat");
        Ok(EntryStat { cid: hash, kind, size })
    }

    #[instrument(skip(self, cancel))]
    async fn cat(&self, cid: &Cid, path: &str, cancel: &CancellationToken) -> Result<ByteStream> {
        let arg = ipfs_arg(cid, path);
        let response = self.call("cat", &[("arg", arg.as_str())], cancel).await?;

        Ok(response
            .bytes_stream()
            .map_err(io::Error::other)
            .boxed())
    }

    #[instrument(skip(self, cancel))]
    async fn resolve_peer(&self, name: &str, cancel: &CancellationToken) -> Result<Option<String>> {
        let arg = format!("/ipns/{}", name);
        let args = [("arg", arg.as_str()), ("recursive", "true")];

        match self.call_json::<NameResolve>("name/resolve", &args, cancel).await {
            Ok(resolved) => Ok(Some(resolved.path)),
            Err(NodeError::NotFound(_)) => Ok(None),
            Err(NodeError::Api(msg)) if msg.contains("could not resolve name") => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, cancel))]
    async fn gc(&self, cancel: &CancellationToken) -> Result<()> {
        let response = self.call("repo/gc", &[], cancel).await?;
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(NodeError::Cancelled),
            body = response.text() => body?,
        };

        // one JSON object per collected block
        let mut removed = 0usize;
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            let parsed: GcLine = serde_json::from_str(line)?;
            match parsed.error {
                Some(error) if !error.is_empty() => return Err(NodeError::Api(error)),
                _ => removed += 1,
            }
        }

        debug!(removed, "garbage collection finished");
        Ok(())
    }

    async fn version(&self, cancel: &CancellationToken) -> Result<NodeVersion> {
        self.call_json("version", &[], cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DIR_CID: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";
    const FILE_CID: &str = "bafkreifzjut3te2nhyekklss27nh3k72ysco7y32koao5eei66wof36n5e";

    async fn node(server: &MockServer) -> KuboNode {
        KuboNode::unchecked(KuboConfig::with_url(server.uri())).unwrap()
    }

    fn dir() -> Cid {
        Cid::try_from(DIR_CID).unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = KuboConfig::default();
        assert_eq!(config.api_url, "http://localhost:5001");
        assert_eq!(KuboConfig::with_url("http://node:5001/").api_url, "http://node:5001");
    }

    #[tokio::test]
    async fn test_new_fails_without_node() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v0/id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ID": "12D3Koo" })))
            .mount(&server)
            .await;
        assert!(KuboNode::from_url(&server.uri()).await.is_ok());

        let err = KuboNode::from_url("http://127.0.0.1:1").await.err().unwrap();
        assert!(matches!(err, NodeError::Connection(_)));
    }

    #[tokio::test]
    async fn test_stat_file_and_directory() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/files/stat"))
            .and(query_param("arg", format!("/ipfs/{}", DIR_CID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Hash": DIR_CID, "Size": 0, "CumulativeSize": 2048, "Blocks": 2, "Type": "directory"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v0/files/stat"))
            .and(query_param("arg", format!("/ipfs/{}/a b.txt", DIR_CID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Hash": FILE_CID, "Size": 12, "CumulativeSize": 12, "Blocks": 0, "Type": "file"
            })))
            .mount(&server)
            .await;

        let node = node(&server).await;
        let cancel = CancellationToken::new();

        let entry = node.stat(&dir(), "", &cancel).await.unwrap();
        assert_eq!(entry.kind, EntryKind::Directory);
        assert_eq!(entry.size, 2048);

        let entry = node.stat(&dir(), "/a b.txt", &cancel).await.unwrap();
        assert_eq!(entry.kind, EntryKind::Raw);
        assert_eq!(entry.size, 12);
        assert_eq!(entry.cid.to_string(), FILE_CID);
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_link_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v0/files/stat"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "Message": format!("no link named \"index.html\" under {}", DIR_CID),
                "Code": 0,
                "Type": "error"
            })))
            .mount(&server)
            .await;

        let err = node(&server)
            .await
            .stat(&dir(), "/index.html", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cat_streams_body() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v0/cat"))
            .and(query_param("arg", format!("/ipfs/{}/index.html", DIR_CID)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<html></html>".to_vec()))
            .mount(&server)
            .await;

        let mut stream = node(&server)
            .await
            .cat(&dir(), "/index.html", &CancellationToken::new())
            .await
            .unwrap();

        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(body, b"<html></html>");
    }

    #[tokio::test]
    async fn test_version_and_gc() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v0/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Version": "0.29.0", "Commit": "3f0947b", "Repo": "15", "System": "amd64/linux"
            })))
            .mount(&server)
            .await;
        Mock::given(path("/api/v0/repo/gc"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "{{\"Key\":{{\"/\":\"{}\"}}}}\n{{\"Key\":{{\"/\":\"{}\"}}}}\n",
                DIR_CID, FILE_CID
            )))
            .mount(&server)
            .await;

        let node = node(&server).await;
        let cancel = CancellationToken::new();

        let version = node.version(&cancel).await.unwrap();
        assert_eq!(version.version, "0.29.0");
        assert_eq!(version.commit, "3f0947b");
        node.gc(&cancel).await.unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn test_gc_reports_error_lines() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v0/repo/gc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"Error\":\"repo is locked\"}\n"))
            .mount(&server)
            .await;

        let err = node(&server).await.gc(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, NodeError::Api(msg) if msg == "repo is locked"));
    }

    #[tokio::test]
    async fn test_resolve_peer() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v0/name/resolve"))
            .and(query_param("arg", "/ipns/k51known"))
            .and(query_param("recursive", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Path": format!("/ipfs/{}", DIR_CID) })))
            .mount(&server)
            .await;
        Mock::given(path("/api/v0/name/resolve"))
            .and(query_param("arg", "/ipns/k51unknown"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "Message": "could not resolve name", "Code": 0, "Type": "error"
            })))
            .mount(&server)
            .await;

        let node = node(&server).await;
        let cancel = CancellationToken::new();

        assert_eq!(
            node.resolve_peer("k51known", &cancel).await.unwrap(),
            Some(format!("/ipfs/{}", DIR_CID))
        );
        assert_eq!(node.resolve_peer("k51unknown", &cancel).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cancelled_call() {
        let server = MockServer::start().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = node(&server).await.version(&cancel).await.unwrap_err();
        assert!(matches!(err, NodeError::Cancelled));
    }
}

//! # ipgate node
//!
//! Content nodes backing the gateway, and the fetcher built on them.
//!
//! This crate provides:
//! - **ContentNode**: stat / cat / name / gc / version operations
//! - **KuboNode**: a client for the Kubo RPC HTTP API
//! - **MemoryNode**: an in-memory node for development and tests
//! - **FlexibleNode**: Kubo when reachable, memory otherwise
//! - **NodeFetcher**: the gateway's `ContentFetcher` on top of any node
//!
//! ## Example
//!
//! ```rust,ignore
//! use ipgate_node::{KuboConfig, KuboNode, NodeFetcher};
//!
//! let node = Arc::new(KuboNode::new(KuboConfig::with_url("http://localhost:5001")).await?);
//! let fetcher = NodeFetcher::new(node, resolver);
//! let response = fetcher.fetch("ipfs://bafy.../index.html", FetchOptions::default()).await?;
//! ```

pub mod error;
pub mod fetcher;
pub mod flexible;
pub mod kubo;
pub mod memory;
pub mod peer;

pub use error::{NodeError, Result};
pub use fetcher::NodeFetcher;
pub use flexible::FlexibleNode;
pub use kubo::{KuboConfig, KuboNode};
pub use memory::MemoryNode;
pub use peer::PeerIdStrategy;

use async_trait::async_trait;
use cid::Cid;
use ipgate_core::{ByteStream, EntryStat};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Version reported by a content node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeVersion {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Commit", default)]
    pub commit: String,
}

/// Operations the gateway needs from a content node
#[async_trait]
pub trait ContentNode: Send + Sync {
    /// Stat `path` under `cid`; missing entries are [`NodeError::NotFound`]
    async fn stat(&self, cid: &Cid, path: &str, cancel: &CancellationToken) -> Result<EntryStat>;

    /// Stream the file at `path` under `cid`
    async fn cat(&self, cid: &Cid, path: &str, cancel: &CancellationToken) -> Result<ByteStream>;

    /// Resolve an IPNS key to a gateway path, `None` when there is no record
    async fn resolve_peer(&self, name: &str, cancel: &CancellationToken) -> Result<Option<String>>;

    /// Run garbage collection over the node's repository
    async fn gc(&self, cancel: &CancellationToken) -> Result<()>;

    /// Node version
    async fn version(&self, cancel: &CancellationToken) -> Result<NodeVersion>;
}

//! Node selection with an in-memory fallback

use crate::{ContentNode, KuboConfig, KuboNode, MemoryNode, NodeVersion, Result};
use async_trait::async_trait;
use cid::Cid;
use ipgate_core::{ByteStream, EntryStat};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Kubo when reachable, in-memory otherwise
#[derive(Clone)]
pub enum FlexibleNode {
    /// Kubo daemon over its RPC API
    Kubo(KuboNode),
    /// In-memory node (fallback)
    Memory(MemoryNode),
}

impl FlexibleNode {
    /// Connect to Kubo, falling back to memory if it is unavailable
    pub async fn connect_or_memory(config: KuboConfig) -> Self {
        match KuboNode::new(config).await {
            Ok(node) => {
                info!(api_url = %node.api_url(), "Using Kubo content node");
                Self::Kubo(node)
            }
            Err(e) => {
                warn!(error = %e, "Failed to connect to Kubo, using in-memory node");
                Self::Memory(MemoryNode::new())
            }
        }
    }

    /// Check if using a real node or the memory fallback
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Kubo(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Kubo(_) => "kubo",
            Self::Memory(_) => "memory",
        }
    }
}

#[async_trait]
impl ContentNode for FlexibleNode {
    async fn stat(&self, cid: &Cid, path: &str, cancel: &CancellationToken) -> Result<EntryStat> {
        match self {
            Self::Kubo(node) => node.stat(cid, path, cancel).await,
            Self::Memory(node) => node.stat(cid, path, cancel).await,
        }
    }

    async fn cat(&self, cid: &Cid, path: &str, cancel: &CancellationToken) -> Result<ByteStream> {
        match self {
            Self::Kubo(node) => node.cat(cid, path, cancel).await,
            Self::Memory(node) => node.cat(cid, path, cancel).await,
        }
    }

    async fn resolve_peer(&self, name: &str, cancel: &CancellationToken) -> Result<Option<String>> {
        match self {
            Self::Kubo(node) => node.resolve_peer(name, cancel).await,
            Self::Memory(node) => node.resolve_peer(name, cancel).await,
        }
    }

    async fn gc(&self, cancel: &CancellationToken) -> Result<()> {
        match self {
            Self::Kubo(node) => node.gc(cancel).await,
            Self::Memory(node) => node.gc(cancel).await,
        }
    }

    async fn version(&self, cancel: &CancellationToken) -> Result<NodeVersion> {
        match self {
            Self::Kubo(node) => node.version(cancel).await,
            Self::Memory(node) => node.version(cancel).await,
        }
    }
}

//! IPNS key resolution through the content node

use crate::ContentNode;
use async_trait::async_trait;
use ipgate_core::identity::is_peer_id;
use ipgate_core::{NameStrategy, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Resolves IPNS keys (peer IDs) with the node's name system
pub struct PeerIdStrategy<N> {
    node: Arc<N>,
}

impl<N> PeerIdStrategy<N> {
    pub fn new(node: Arc<N>) -> Self {
        Self { node }
    }
}

#[async_trait]
impl<N: ContentNode + 'static> NameStrategy for PeerIdStrategy<N> {
    fn name(&self) -> &'static str {
        "peer-id"
    }

    async fn resolve(&self, name: &str, cancel: &CancellationToken) -> Result<Option<String>> {
        if !is_peer_id(name) {
            return Ok(None);
        }
        Ok(self.node.resolve_peer(name, cancel).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryNode;

    // ed25519 identity-multihash peer ID, base36 libp2p-key CID form
    const PEER: &str = "k51qzi5uqu5dlvj2baxnqndepeb86cbk3ng7n3i46uzyxzyqj2xjonzllnv0v8";

    #[tokio::test]
    async fn test_resolves_published_key() {
        let node = Arc::new(MemoryNode::new());
        node.publish(PEER, "/ipfs/bafkqaddimvwgy3zao5xxe3debi");
        let strategy = PeerIdStrategy::new(node);

        let path = strategy.resolve(PEER, &CancellationToken::new()).await.unwrap();
        assert_eq!(path.as_deref(), Some("/ipfs/bafkqaddimvwgy3zao5xxe3debi"));
    }

    #[tokio::test]
    async fn test_ignores_domains() {
        let node = Arc::new(MemoryNode::new());
        node.publish("docs.ipfs.tech", "/ipfs/bafkqaddimvwgy3zao5xxe3debi");
        let strategy = PeerIdStrategy::new(node);

        let path = strategy.resolve("docs.ipfs.tech", &CancellationToken::new()).await.unwrap();
        assert_eq!(path, None);
    }
}

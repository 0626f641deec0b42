//! In-memory content node for development and testing

use crate::{ContentNode, NodeError, NodeVersion, Result};
use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use ipgate_core::{ByteStream, EntryKind, EntryStat};
use multihash_codetable::{Code, MultihashDigest};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const RAW_CODEC: u64 = 0x55;
const DAG_PB_CODEC: u64 = 0x70;

/// Chunk size of streamed file bodies (256KB)
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

#[derive(Clone, Debug)]
enum Entry {
    File(Bytes),
    Directory(BTreeMap<String, Cid>),
}

/// A content node holding files and directories in memory
#[derive(Clone)]
pub struct MemoryNode {
    entries: Arc<DashMap<Cid, Entry>>,
    names: Arc<DashMap<String, String>>,
    chunk_size: usize,
}

impl Default for MemoryNode {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNode {
    /// Create a new empty node
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Create a node streaming files in `chunk_size` pieces
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            names: Arc::new(DashMap::new()),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Store a file as a raw block
    pub fn add_file(&self, data: impl Into<Bytes>) -> Cid {
        let data = data.into();
        let cid = Cid::new_v1(RAW_CODEC, Code::Sha2_256.digest(&data));
        self.entries.insert(cid, Entry::File(data));
        cid
    }

    /// Store a directory linking `links` by name
    pub fn add_directory<I, S>(&self, links: I) -> Cid
    where
        I: IntoIterator<Item = (S, Cid)>,
        S: Into<String>,
    {
        let links: BTreeMap<String, Cid> = links.into_iter().map(|(name, cid)| (name.into(), cid)).collect();

        let mut encoded = Vec::new();
        for (name, cid) in &links {
            encoded.extend_from_slice(name.as_bytes());
            encoded.push(0);
            encoded.extend_from_slice(&cid.to_bytes());
        }

        let cid = Cid::new_v1(DAG_PB_CODEC, Code::Sha2_256.digest(&encoded));
        self.entries.insert(cid, Entry::Directory(links));
        cid
    }

    /// Point an IPNS name at a gateway path
    pub fn publish(&self, name: impl Into<String>, path: impl Into<String>) {
        self.names.insert(name.into(), path.into());
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }

    /// Follow `path` from `root` through directory links
    fn walk(&self, root: &Cid, path: &str) -> Result<(Cid, Entry)> {
        let mut cid = *root;
        let mut entry = self.get(&cid)?;

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let next = match &entry {
                Entry::Directory(links) => links.get(segment).copied(),
                Entry::File(_) => None,
            };
            cid = next.ok_or_else(|| {
                NodeError::NotFound(format!("no link named \"{}\" under {}", segment, cid))
            })?;
            entry = self.get(&cid)?;
        }

        Ok((cid, entry))
    }

    fn get(&self, cid: &Cid) -> Result<Entry> {
        self.entries
            .get(cid)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| NodeError::NotFound(format!("block {} not found", cid)))
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(NodeError::Cancelled)
    } else {
        Ok(())
    }
}

#[async_trait]
impl ContentNode for MemoryNode {
    async fn stat(&self, cid: &Cid, path: &str, cancel: &CancellationToken) -> Result<EntryStat> {
        check_cancelled(cancel)?;
        let (cid, entry) = self.walk(cid, path)?;

        Ok(match entry {
            Entry::Directory(links) => EntryStat {
                cid,
                kind: EntryKind::Directory,
                size: links.len() as u64,
            },
            Entry::File(data) => EntryStat {
                cid,
                kind: if cid.codec() == RAW_CODEC {
                    EntryKind::Raw
                } else {
                    EntryKind::File
                },
                size: data.len() as u64,
            },
        })
    }

    async fn cat(&self, cid: &Cid, path: &str, cancel: &CancellationToken) -> Result<ByteStream> {
        check_cancelled(cancel)?;
        let (cid, entry) = self.walk(cid, path)?;

        let Entry::File(data) = entry else {
            return Err(NodeError::Api(format!("{} is a directory", cid)));
        };

        let chunk_size = self.chunk_size;
        let chunks: Vec<std::io::Result<Bytes>> = (0..data.len())
            .step_by(chunk_size)
            .map(|start| Ok(data.slice(start..(start + chunk_size).min(data.len()))))
            .collect();

        Ok(stream::iter(chunks).boxed())
    }

    async fn resolve_peer(&self, name: &str, cancel: &CancellationToken) -> Result<Option<String>> {
        check_cancelled(cancel)?;
        Ok(self.names.get(name).map(|entry| entry.value().clone()))
    }

    async fn gc(&self, cancel: &CancellationToken) -> Result<()> {
        check_cancelled(cancel)?;
        debug!(entries = self.entries.len(), "memory node keeps all entries, nothing to collect");
        Ok(())
    }

    async fn version(&self, cancel: &CancellationToken) -> Result<NodeVersion> {
        check_cancelled(cancel)?;
        Ok(NodeVersion {
            version: env!("CARGO_PKG_VERSION").to_string(),
            commit: "memory".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(node: &MemoryNode) -> (Cid, Cid) {
        let page = node.add_file(&b"<h1>hi</h1>"[..]);
        let css = node.add_file(&b"body {}"[..]);
        let assets = node.add_directory([("style.css", css)]);
        let root = node.add_directory([("index.html", page), ("assets", assets)]);
        (root, page)
    }

    #[tokio::test]
    async fn test_stat_walks_directories() {
        let node = MemoryNode::new();
        let (root, page) = site(&node);
        let cancel = CancellationToken::new();

        let entry = node.stat(&root, "", &cancel).await.unwrap();
        assert_eq!(entry.kind, EntryKind::Directory);

        let entry = node.stat(&root, "/index.html", &cancel).await.unwrap();
        assert_eq!(entry.cid, page);
        assert_eq!(entry.kind, EntryKind::Raw);
        assert_eq!(entry.size, 11);

        let entry = node.stat(&root, "/assets/style.css", &cancel).await.unwrap();
        assert_eq!(entry.size, 7);

        let err = node.stat(&root, "/missing", &cancel).await.unwrap_err();
        assert!(matches!(err, NodeError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cat_streams_in_chunks() {
        let node = MemoryNode::with_chunk_size(4);
        let cid = node.add_file(&b"0123456789"[..]);

        let chunks: Vec<Bytes> = node
            .cat(&cid, "", &CancellationToken::new())
            .await
            .unwrap()
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;

        assert_eq!(chunks, vec![Bytes::from("0123"), Bytes::from("4567"), Bytes::from("89")]);
    }

    #[tokio::test]
    async fn test_cat_directory_fails() {
        let node = MemoryNode::new();
        let (root, _) = site(&node);
        assert!(node.cat(&root, "", &CancellationToken::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_same_content_same_cid() {
        let node = MemoryNode::new();
        assert_eq!(node.add_file(&b"same"[..]), node.add_file(&b"same"[..]));
        assert_eq!(node.len(), 1);
    }

    #[tokio::test]
    async fn test_published_names() {
        let node = MemoryNode::new();
        let (root, _) = site(&node);
        node.publish("k51site", format!("/ipfs/{}", root));
        let cancel = CancellationToken::new();

        assert_eq!(
            node.resolve_peer("k51site", &cancel).await.unwrap(),
            Some(format!("/ipfs/{}", root))
        );
        assert_eq!(node.resolve_peer("k51other", &cancel).await.unwrap(), None);
    }

    proptest::proptest! {
        #[test]
        fn test_chunks_reassemble(data in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..512), chunk_size in 1usize..64) {
            let node = MemoryNode::with_chunk_size(chunk_size);
            let cid = node.add_file(data.clone());

            let chunks: Vec<Bytes> = futures::executor::block_on(async {
                node.cat(&cid, "", &CancellationToken::new())
                    .await
                    .unwrap()
                    .map(|chunk| chunk.unwrap())
                    .collect()
                    .await
            });

            proptest::prop_assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= chunk_size));
            proptest::prop_assert_eq!(chunks.concat(), data);
        }
    }

    #[tokio::test]
    async fn test_cancelled_calls_fail() {
        let node = MemoryNode::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(node.version(&cancel).await, Err(NodeError::Cancelled)));
    }
}

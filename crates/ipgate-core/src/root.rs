//! Directory index resolution

use crate::{GatewayError, Result};
use async_trait::async_trait;
use cid::Cid;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Index files tried, in order, when a directory is requested
pub const DEFAULT_ROOT_CANDIDATES: &[&str] = &["index.html", "index.htm", "index.shtml"];

/// Kind of a content node entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    /// Raw leaf block without UnixFS framing
    Raw,
}

/// Result of statting a path under a CID
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryStat {
    pub cid: Cid,
    pub kind: EntryKind,
    pub size: u64,
}

impl EntryStat {
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Looks up entries by CID and relative path
#[async_trait]
pub trait DirectoryStat: Send + Sync {
    /// Stat `path` (sanitized, possibly empty) under `cid`
    ///
    /// A missing entry is reported as [`GatewayError::NotFound`].
    async fn stat(&self, cid: &Cid, path: &str, cancel: &CancellationToken) -> Result<EntryStat>;
}

/// Index file chosen for a directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryRoot {
    /// Path of the file relative to the statted root
    pub path: String,
    pub entry: EntryStat,
}

/// Picks the index file served for a directory
#[derive(Clone, Debug)]
pub struct RootResolver {
    candidates: Vec<String>,
}

impl Default for RootResolver {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT_CANDIDATES.iter().map(|s| s.to_string()).collect())
    }
}

impl RootResolver {
    pub fn new(candidates: Vec<String>) -> Self {
        Self { candidates }
    }

    /// Return the first candidate that exists as a file
    ///
    /// `dir_path` is the directory's sanitized relative path under `root`;
    /// the returned path is relative to `root` as well.
    pub async fn resolve_root(
        &self,
        stat: &dyn DirectoryStat,
        root: &Cid,
        dir_path: &str,
        cancel: &CancellationToken,
    ) -> Result<DirectoryRoot> {
        for candidate in &self.candidates {
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }

            let path = format!("{}/{}", dir_path.trim_end_matches('/'), candidate);
            match stat.stat(root, &path, cancel).await {
                Ok(entry) if !entry.is_directory() => {
                    debug!(root = %root, path = %path, cid = %entry.cid, "directory index found");
                    return Ok(DirectoryRoot { path, entry });
                }
                Ok(_) | Err(GatewayError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(GatewayError::NoRootFound(format!("{}{}", root, dir_path)))
    }
}

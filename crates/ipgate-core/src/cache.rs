//! Name resolution cache
//!
//! Resolutions are cached behind the [`ResolutionCache`] trait so the engine
//! can be given a test double or a separate instance. [`LruTtlCache`] bounds
//! entries both by count (least recently used first) and by age.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::time::Instant;

/// Default number of cached names
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Default lifetime of a cached resolution (24 hours)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A cached resolution outcome
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CachedResolution {
    /// The name resolved to this gateway path
    Resolved(String),
    /// Resolution failed; do not retry until the entry expires
    NotFound,
}

/// Single-key cache operations used by the name resolver
pub trait ResolutionCache: Send + Sync {
    /// Get an unexpired entry
    fn get(&self, key: &str) -> Option<CachedResolution>;

    /// Insert or refresh an entry
    fn set(&self, key: &str, value: CachedResolution);

    /// Check for an unexpired entry
    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

struct Entry {
    value: CachedResolution,
    expires_at: Instant,
}

/// Bounded LRU cache whose entries also expire after a fixed TTL
pub struct LruTtlCache {
    entries: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
}

impl LruTtlCache {
    /// Create a cache holding at most `capacity` entries for `ttl` each
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Number of entries currently held (expired ones included until touched)
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for LruTtlCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL)
    }
}

impl ResolutionCache for LruTtlCache {
    fn get(&self, key: &str) -> Option<CachedResolution> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    fn set(&self, key: &str, value: CachedResolution) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.lock().put(key.to_string(), entry);
    }
}

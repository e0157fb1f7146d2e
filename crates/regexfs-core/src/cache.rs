//! Virtual path resolution cache.
//!
//! Maps a virtual path to the real path it last resolved to. The cache is a
//! pure optimization: every hit is revalidated by the resolver, stale entries
//! are evicted, and clearing or disabling the cache never changes results.

use crate::path::VirtualPath;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Thread-safe map from virtual path to resolved real path.
///
/// # Thread Safety
///
/// One reader/writer lock guards the whole map. Lookups share the lock;
/// inserts and evictions take it exclusively. No method performs I/O, so the
/// lock is never held across a filesystem call. Share via `Arc<PathCache>`.
#[derive(Debug, Default)]
pub struct PathCache {
    entries: RwLock<HashMap<VirtualPath, PathBuf>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the cached real path, if any.
    ///
    /// The lock is released before returning.
    pub fn get(&self, path: &VirtualPath) -> Option<PathBuf> {
        let found = self.entries.read().get(path).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Records a resolution, replacing any previous one for the same path.
    pub fn insert(&self, path: VirtualPath, real: PathBuf) {
        debug!(path = %path, real = %real.display(), "Caching resolution");
        self.entries.write().insert(path, real);
    }

    /// Evicts `path` only if it still maps to `stale`.
    ///
    /// A concurrent resolver may already have replaced the stale entry with a
    /// fresh one; that entry is kept. Returns true if something was removed.
    pub fn remove_if(&self, path: &VirtualPath, stale: &Path) -> bool {
        let mut entries = self.entries.write();
        if entries.get(path).is_some_and(|current| current == stale) {
            entries.remove(path);
            drop(entries);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(path = %path, stale = %stale.display(), "Evicted stale resolution");
            true
        } else {
            false
        }
    }

    /// Evicts `path` unconditionally.
    pub fn remove(&self, path: &VirtualPath) -> Option<PathBuf> {
        let removed = self.entries.write().remove(path);
        if removed.is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Get cache statistics for monitoring and debugging.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached resolutions
    pub entries: usize,
    /// Lookups that found an entry (before revalidation)
    pub hits: u64,
    pub misses: u64,
    /// Entries removed because their target went away
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, 0.0 when nothing was looked up.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

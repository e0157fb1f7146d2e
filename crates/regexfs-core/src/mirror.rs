//! The mirrored tree as a whole.

use crate::cache::{CacheStats, PathCache};
use crate::error::ResolveResult;
use crate::lister::{ListEntry, Lister, Listing};
use crate::path::VirtualPath;
use crate::resolver::Resolver;
use crate::rules::RuleTable;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A real root directory seen through a rule table.
///
/// Owns the shared rule table and path cache and hands out a [`Resolver`]
/// and a [`Lister`] over the same root. `Mirror` is `Send + Sync`; share it
/// across threads with `Arc`.
#[derive(Debug, Clone)]
pub struct Mirror {
    resolver: Resolver,
    lister: Lister,
    rules: Arc<RuleTable>,
}

impl Mirror {
    /// Creates a mirror with a fresh path cache.
    pub fn new(root: impl Into<PathBuf>, rules: RuleTable) -> Self {
        Self::with_cache(root, rules, Some(Arc::new(PathCache::new())))
    }

    /// Creates a mirror with the given cache, or none at all.
    pub fn with_cache(
        root: impl Into<PathBuf>,
        rules: RuleTable,
        cache: Option<Arc<PathCache>>,
    ) -> Self {
        let root = root.into();
        let rules = Arc::new(rules);
        debug!(
            root = %root.display(),
            rules = rules.len(),
            cached = cache.is_some(),
            "Creating mirror"
        );
        Self {
            resolver: Resolver::new(root.clone(), Arc::clone(&rules), cache),
            lister: Lister::new(root, Arc::clone(&rules)),
            rules,
        }
    }

    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn lister(&self) -> &Lister {
        &self.lister
    }

    pub fn cache(&self) -> Option<&Arc<PathCache>> {
        self.resolver.cache()
    }

    /// Cache statistics, or `None` when caching is disabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache().map(|c| c.stats())
    }

    /// See [`Resolver::resolve`].
    pub fn resolve(&self, path: &VirtualPath) -> ResolveResult<PathBuf> {
        self.resolver.resolve(path)
    }

    /// See [`Lister::list`].
    pub fn list(&self, dir: &VirtualPath) -> ResolveResult<Listing> {
        self.lister.list(dir)
    }

    /// See [`Lister::collect`].
    pub fn list_all(&self, dir: &VirtualPath) -> ResolveResult<Vec<ListEntry>> {
        self.lister.collect(dir)
    }
}

//! Virtual path to real path.

use crate::cache::PathCache;
use crate::error::{ResolveError, ResolveResult};
use crate::matcher::PATH_MAX;
use crate::path::VirtualPath;
use crate::rules::RuleTable;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Finds the unique real entry behind a virtual path.
///
/// Directories resolve to themselves. Any other virtual name is looked up by
/// scanning the real parent directory for the first entry whose
/// [`Expansion`](crate::Expansion) yields that name. Successful scans are
/// memoized in the optional [`PathCache`].
///
/// Cheap to clone; the rule table and cache are shared.
#[derive(Debug, Clone)]
pub struct Resolver {
    root: PathBuf,
    rules: Arc<RuleTable>,
    cache: Option<Arc<PathCache>>,
}

impl Resolver {
    pub fn new(
        root: impl Into<PathBuf>,
        rules: Arc<RuleTable>,
        cache: Option<Arc<PathCache>>,
    ) -> Self {
        Self {
            root: root.into(),
            rules,
            cache,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> Option<&Arc<PathCache>> {
        self.cache.as_ref()
    }

    /// Resolves a virtual path to the real path it exposes.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::NotFound`] if no real entry appears under this name
    /// - [`ResolveError::Io`] if the real parent directory cannot be read
    /// - [`ResolveError::NameTooLong`] if the path exceeds [`PATH_MAX`]
    pub fn resolve(&self, path: &VirtualPath) -> ResolveResult<PathBuf> {
        let direct = path.to_real(&self.root);
        let len = direct.as_os_str().len();
        if len > PATH_MAX {
            return Err(ResolveError::NameTooLong {
                path: path.clone(),
                len,
            });
        }

        // Directories are never renamed.
        if fs::symlink_metadata(&direct).is_ok_and(|m| m.is_dir()) {
            trace!(path = %path, "Resolved directory");
            return Ok(direct);
        }

        let Some((parent, name)) = path.split() else {
            return Err(ResolveError::NotFound { path: path.clone() });
        };

        if let Some(cache) = &self.cache
            && let Some(cached) = cache.get(path)
        {
            if fs::metadata(&cached).is_ok_and(|m| m.is_file()) {
                trace!(path = %path, real = %cached.display(), "Cache hit");
                return Ok(cached);
            }
            cache.remove_if(path, &cached);
        }

        let dir = parent.to_real(&self.root);
        match self.find_entry(&dir, name)? {
            Some(real) => {
                debug!(path = %path, real = %real.display(), "Resolved by scan");
                if let Some(cache) = &self.cache {
                    cache.insert(path.clone(), real.clone());
                }
                Ok(real)
            }
            None => {
                trace!(path = %path, "No entry yields this name");
                Err(ResolveError::NotFound { path: path.clone() })
            }
        }
    }

    /// Scans `dir` for the first non-directory entry exposed as `name`.
    fn find_entry(&self, dir: &Path, name: &OsStr) -> ResolveResult<Option<PathBuf>> {
        let entries = fs::read_dir(dir).map_err(|e| ResolveError::io(dir, e))?;

        for entry in entries {
            let entry = entry.map_err(|e| ResolveError::io(dir, e))?;
            let file_type = entry.file_type().map_err(|e| ResolveError::io(entry.path(), e))?;
            if file_type.is_dir() {
                continue;
            }

            let entry_name = entry.file_name();
            if !self.rules.expand(&entry_name).yields(&entry_name, name) {
                continue;
            }

            let real = entry.path();
            if real.as_os_str().len() > PATH_MAX {
                continue;
            }
            return Ok(Some(real));
        }
        Ok(None)
    }
}

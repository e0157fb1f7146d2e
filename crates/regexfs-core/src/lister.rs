//! Directory listing under virtual names.

use crate::error::{ResolveError, ResolveResult};
use crate::matcher::PATH_MAX;
use crate::path::VirtualPath;
use crate::rules::RuleTable;
use std::collections::{HashSet, VecDeque};
use std::ffi::{OsStr, OsString};
use std::fs::{self, FileType, ReadDir};
use std::os::unix::fs::{DirEntryExt, MetadataExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{trace, warn};

/// Type of a listed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Directory,
    File,
    Symlink,
    Other,
}

impl From<FileType> for EntryKind {
    fn from(file_type: FileType) -> Self {
        if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::Other
        }
    }
}

/// One name in a virtual directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Name as it appears in the mounted view.
    pub name: OsString,
    pub kind: EntryKind,
    /// Inode number of the real entry.
    pub inode_hint: u64,
    /// Name of the real entry that produced this one.
    pub real_name: OsString,
}

impl ListEntry {
    /// True for the `.` and `..` pseudo-entries.
    pub fn is_dot(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

/// Enumerates real directories under their virtual names.
#[derive(Debug, Clone)]
pub struct Lister {
    root: PathBuf,
    rules: Arc<RuleTable>,
}

impl Lister {
    pub fn new(root: impl Into<PathBuf>, rules: Arc<RuleTable>) -> Self {
        Self {
            root: root.into(),
            rules,
        }
    }

    /// Opens a virtual directory for listing.
    ///
    /// `.` and `..` come first. Real subdirectories are listed under their
    /// own names; every other entry is listed once per name its
    /// [`Expansion`](crate::Expansion) exposes. Aliases hidden by a real
    /// subdirectory or by an earlier entry producing the same name are
    /// skipped, as are names whose real or virtual path would exceed
    /// [`PATH_MAX`], so every listed name resolves back to the entry that
    /// produced it.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Io`] if the real directory cannot be opened.
    /// Errors reading individual entries are yielded by the iterator.
    pub fn list(&self, dir: &VirtualPath) -> ResolveResult<Listing> {
        let real = dir.to_real(&self.root);
        let entries = fs::read_dir(&real).map_err(|e| ResolveError::io(&real, e))?;

        let inode_of = |p: &Path| fs::metadata(p).map(|m| m.ino()).unwrap_or_default();
        let dots = [(".", inode_of(&real)), ("..", inode_of(&real.join("..")))]
            .into_iter()
            .map(|(name, inode_hint)| ListEntry {
                name: OsString::from(name),
                kind: EntryKind::Directory,
                inode_hint,
                real_name: OsString::from(name),
            })
            .collect();

        trace!(dir = %dir, "Listing directory");
        Ok(Listing {
            dir: real,
            entries,
            rules: Arc::clone(&self.rules),
            pending: dots,
            seen: HashSet::new(),
        })
    }

    /// Reads a whole virtual directory into memory.
    pub fn collect(&self, dir: &VirtualPath) -> ResolveResult<Vec<ListEntry>> {
        self.list(dir)?.collect()
    }
}

/// Lazy iterator over a virtual directory, see [`Lister::list`].
#[derive(Debug)]
pub struct Listing {
    dir: PathBuf,
    entries: ReadDir,
    rules: Arc<RuleTable>,
    pending: VecDeque<ListEntry>,
    /// Non-directory names already emitted
    seen: HashSet<OsString>,
}

impl Listing {
    /// Queues every virtual name of one real entry.
    fn push_entry(&mut self, entry: &fs::DirEntry) -> ResolveResult<()> {
        let file_type = entry
            .file_type()
            .map_err(|e| ResolveError::io(entry.path(), e))?;
        let real_name = entry.file_name();
        let kind = EntryKind::from(file_type);
        let inode_hint = entry.ino();

        if entry.path().as_os_str().len() > PATH_MAX {
            warn!(dir = %self.dir.display(), name = ?real_name, "Skipping entry beyond path limit");
            return Ok(());
        }

        if kind == EntryKind::Directory {
            self.pending.push_back(ListEntry {
                name: real_name.clone(),
                kind,
                inode_hint,
                real_name,
            });
            return Ok(());
        }

        let expansion = self.rules.expand(&real_name);
        for name in expansion.virtual_names(&real_name) {
            if self.seen.contains(name) {
                trace!(name = ?name, real_name = ?real_name, "Alias already listed");
                continue;
            }
            if !self.fits_path_limit(name) {
                warn!(
                    dir = %self.dir.display(),
                    entry = ?real_name,
                    name = ?name,
                    "Dropping generated name beyond path limit"
                );
                continue;
            }
            if name != real_name.as_os_str()
                && fs::symlink_metadata(self.dir.join(name)).is_ok_and(|m| m.is_dir())
            {
                trace!(name = ?name, real_name = ?real_name, "Alias hidden by directory");
                continue;
            }
            self.seen.insert(name.to_os_string());
            self.pending.push_back(ListEntry {
                name: name.to_os_string(),
                kind,
                inode_hint,
                real_name: real_name.clone(),
            });
        }
        Ok(())
    }

    /// Whether `dir/name` stays within [`PATH_MAX`], as the resolver requires.
    fn fits_path_limit(&self, name: &OsStr) -> bool {
        self.dir.join(name).as_os_str().len() <= PATH_MAX
    }
}

impl Iterator for Listing {
    type Item = ResolveResult<ListEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Some(Ok(entry));
            }
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(ResolveError::io(&self.dir, e))),
            };
            if let Err(e) = self.push_entry(&entry) {
                return Some(Err(e));
            }
        }
    }
}

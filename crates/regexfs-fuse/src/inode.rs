//! Inode management for the FUSE filesystem.
//!
//! This module provides the mapping between FUSE inodes and virtual paths.
//! The real path behind an inode is not stored: it is resolved again on every
//! operation, so renames in the source tree are picked up.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use regexfs_core::{EntryKind, VirtualPath};
use std::fs::FileType;
use std::sync::atomic::{AtomicU64, Ordering};

/// The root inode number (FUSE convention).
pub const ROOT_INODE: u64 = 1;

/// Represents the kind of inode entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    /// The mount root.
    Root,
    Directory,
    /// A regular file.
    File,
    /// A symbolic link.
    Symlink,
    /// Device, FIFO or socket.
    Special,
}

impl InodeKind {
    pub fn is_dir(self) -> bool {
        matches!(self, InodeKind::Root | InodeKind::Directory)
    }
}

impl From<FileType> for InodeKind {
    fn from(file_type: FileType) -> Self {
        EntryKind::from(file_type).into()
    }
}

impl From<EntryKind> for InodeKind {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Directory => InodeKind::Directory,
            EntryKind::File => InodeKind::File,
            EntryKind::Symlink => InodeKind::Symlink,
            EntryKind::Other => InodeKind::Special,
        }
    }
}

/// An entry in the inode table.
#[derive(Debug)]
pub struct InodeEntry {
    /// The path within the mounted view.
    pub path: VirtualPath,
    pub kind: InodeKind,
    /// Lookup count for proper `forget()` handling.
    /// FUSE calls forget() when the kernel drops references.
    nlookup: AtomicU64,
}

impl InodeEntry {
    /// Creates a new inode entry.
    pub fn new(path: VirtualPath, kind: InodeKind) -> Self {
        Self::with_nlookup(path, kind, 1)
    }

    /// Creates an entry with an explicit starting lookup count.
    ///
    /// `readdir` hands out inode numbers without a kernel lookup, so those
    /// entries start at zero.
    pub fn with_nlookup(path: VirtualPath, kind: InodeKind, nlookup: u64) -> Self {
        Self {
            path,
            kind,
            nlookup: AtomicU64::new(nlookup),
        }
    }

    /// Increments the lookup count and returns the new value.
    pub fn inc_nlookup(&self) -> u64 {
        self.nlookup.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Decrements the lookup count by the given amount and returns the new value.
    /// Returns `None` if the count would go negative (shouldn't happen in normal operation).
    pub fn dec_nlookup(&self, count: u64) -> Option<u64> {
        let old = self.nlookup.fetch_sub(count, Ordering::SeqCst);
        if old < count {
            self.nlookup.fetch_add(count, Ordering::SeqCst);
            None
        } else {
            Some(old - count)
        }
    }

    /// Returns the current lookup count.
    pub fn nlookup(&self) -> u64 {
        self.nlookup.load(Ordering::SeqCst)
    }
}

/// Thread-safe table mapping between inodes and virtual paths.
///
/// This table maintains a bidirectional mapping:
/// - `path_to_inode`: VirtualPath -> inode number
/// - `inode_to_entry`: inode number -> InodeEntry
pub struct InodeTable {
    path_to_inode: DashMap<VirtualPath, u64>,
    inode_to_entry: DashMap<u64, InodeEntry>,
    /// Next available inode number.
    next_inode: AtomicU64,
}

impl InodeTable {
    /// Creates a new inode table with the root directory pre-allocated.
    pub fn new() -> Self {
        let table = Self {
            path_to_inode: DashMap::new(),
            inode_to_entry: DashMap::new(),
            // Start at 2 since inode 1 is reserved for root
            next_inode: AtomicU64::new(2),
        };

        let root_path = VirtualPath::root();
        table.path_to_inode.insert(root_path.clone(), ROOT_INODE);
        table
            .inode_to_entry
            .insert(ROOT_INODE, InodeEntry::new(root_path, InodeKind::Root));

        table
    }

    /// Returns the inode for `path`, allocating one if needed, and counts
    /// one kernel lookup against it.
    ///
    /// An existing entry whose kind changed (a file replaced by a directory
    /// in the source tree) is updated to `kind`.
    pub fn get_or_insert(&self, path: VirtualPath, kind: InodeKind) -> u64 {
        // Entry API avoids racing allocations for the same path
        match self.path_to_inode.entry(path.clone()) {
            Entry::Occupied(mut occupied) => {
                let ino = *occupied.get();
                if let Some(mut entry) = self.inode_to_entry.get_mut(&ino) {
                    entry.inc_nlookup();
                    if entry.kind != InodeKind::Root {
                        entry.kind = kind;
                    }
                    return ino;
                }
                // Evicted concurrently; the path gets a fresh inode
                let ino = self.next_inode.fetch_add(1, Ordering::SeqCst);
                self.inode_to_entry.insert(ino, InodeEntry::new(path, kind));
                occupied.insert(ino);
                ino
            }
            Entry::Vacant(vacant) => {
                let ino = self.next_inode.fetch_add(1, Ordering::SeqCst);
                self.inode_to_entry.insert(ino, InodeEntry::new(path, kind));
                vacant.insert(ino);
                ino
            }
        }
    }

    /// Returns the inode for `path` without counting a kernel lookup.
    ///
    /// Used by `readdir`, so the numbers it reports are the ones a later
    /// `lookup` of the same name returns.
    pub fn get_or_allocate(&self, path: VirtualPath, kind: InodeKind) -> u64 {
        match self.path_to_inode.entry(path.clone()) {
            Entry::Occupied(mut occupied) => {
                let ino = *occupied.get();
                if self.inode_to_entry.contains_key(&ino) {
                    return ino;
                }
                let ino = self.next_inode.fetch_add(1, Ordering::SeqCst);
                self.inode_to_entry
                    .insert(ino, InodeEntry::with_nlookup(path, kind, 0));
                occupied.insert(ino);
                ino
            }
            Entry::Vacant(vacant) => {
                let ino = self.next_inode.fetch_add(1, Ordering::SeqCst);
                self.inode_to_entry
                    .insert(ino, InodeEntry::with_nlookup(path, kind, 0));
                vacant.insert(ino);
                ino
            }
        }
    }

    /// Looks up an entry by inode number.
    pub fn get(&self, inode: u64) -> Option<dashmap::mapref::one::Ref<'_, u64, InodeEntry>> {
        self.inode_to_entry.get(&inode)
    }

    /// The virtual path and kind behind an inode.
    pub fn path_of(&self, inode: u64) -> Option<(VirtualPath, InodeKind)> {
        self.inode_to_entry
            .get(&inode)
            .map(|e| (e.path.clone(), e.kind))
    }

    /// Looks up an inode by virtual path.
    pub fn get_inode(&self, path: &VirtualPath) -> Option<u64> {
        self.path_to_inode.get(path).map(|r| *r)
    }

    /// Decrements the lookup count for an inode.
    /// If the count reaches zero, the inode is evicted.
    /// Returns `true` if the inode was evicted.
    pub fn forget(&self, inode: u64, nlookup: u64) -> bool {
        if inode == ROOT_INODE {
            return false;
        }

        if let Some(entry) = self.inode_to_entry.get(&inode)
            && let Some(remaining) = entry.dec_nlookup(nlookup)
            && remaining == 0
        {
            drop(entry);
            return self.evict(inode);
        }
        false
    }

    fn evict(&self, inode: u64) -> bool {
        if let Some((_, entry)) = self.inode_to_entry.remove(&inode) {
            // The path may already point at a newer inode
            self.path_to_inode
                .remove_if(&entry.path, |_, ino| *ino == inode);
            true
        } else {
            false
        }
    }

    /// Returns the number of inodes currently in the table.
    pub fn len(&self) -> usize {
        self.inode_to_entry.len()
    }

    /// Returns true if the table only contains the root inode.
    pub fn is_empty(&self) -> bool {
        self.inode_to_entry.len() <= 1
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

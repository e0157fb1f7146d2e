//! Attribute and listing caches for the FUSE filesystem.
//!
//! Attributes mirror the real entry's `lstat` with write permission bits
//! cleared. Both caches are TTL based; the kernel is told the remaining TTL
//! so it never keeps an answer longer than we do.

use dashmap::DashMap;
use fuser::{FileAttr, FileType};
use std::ffi::{OsStr, OsString};
use std::fs::Metadata;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Default time-to-live for cached attributes (1 second).
pub const DEFAULT_ATTR_TTL: Duration = Duration::from_secs(1);

/// Default time-to-live for negative cache entries (ENOENT).
pub const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_millis(500);

/// Write bits for user, group and other.
const WRITE_BITS: u32 = 0o222;

/// Expired entries are swept once every this many inserts.
pub const SWEEP_INTERVAL: usize = 1024;

/// Counts inserts and says when a sweep is due.
#[derive(Debug, Default)]
struct SweepCounter(AtomicUsize);

impl SweepCounter {
    fn tick(&self) -> bool {
        (self.0.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0
    }
}

/// A cached value with expiration time.
#[derive(Debug, Clone)]
pub struct Expiring<T> {
    pub value: T,
    expires: Instant,
}

impl<T> Expiring<T> {
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires: Instant::now() + ttl,
        }
    }

    /// Returns true if this cache entry has expired.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires
    }

    /// Returns the remaining time until expiration.
    pub fn time_remaining(&self) -> Duration {
        self.expires.saturating_duration_since(Instant::now())
    }
}

/// A cached file attribute.
pub type CachedAttr = Expiring<FileAttr>;

/// Maps a real file type to the FUSE file type.
pub fn fuse_file_type(file_type: std::fs::FileType) -> FileType {
    if file_type.is_dir() {
        FileType::Directory
    } else if file_type.is_symlink() {
        FileType::Symlink
    } else if file_type.is_block_device() {
        FileType::BlockDevice
    } else if file_type.is_char_device() {
        FileType::CharDevice
    } else if file_type.is_fifo() {
        FileType::NamedPipe
    } else if file_type.is_socket() {
        FileType::Socket
    } else {
        FileType::RegularFile
    }
}

fn system_time(secs: i64, nsecs: i64) -> SystemTime {
    let nanos = u32::try_from(nsecs).unwrap_or(0);
    match u64::try_from(secs) {
        Ok(secs) => UNIX_EPOCH + Duration::new(secs, nanos),
        Err(_) => UNIX_EPOCH - Duration::new(secs.unsigned_abs(), 0),
    }
}

/// Builds the attributes of inode `ino` from real metadata.
///
/// Everything is copied from the real entry except the inode number and the
/// write permission bits, which are cleared.
#[allow(clippy::cast_possible_truncation)]
pub fn file_attr(ino: u64, meta: &Metadata) -> FileAttr {
    FileAttr {
        ino,
        size: meta.size(),
        blocks: meta.blocks(),
        atime: system_time(meta.atime(), meta.atime_nsec()),
        mtime: system_time(meta.mtime(), meta.mtime_nsec()),
        ctime: system_time(meta.ctime(), meta.ctime_nsec()),
        crtime: meta.created().unwrap_or(UNIX_EPOCH),
        kind: fuse_file_type(meta.file_type()),
        perm: (meta.mode() & 0o7777 & !WRITE_BITS) as u16,
        nlink: meta.nlink() as u32,
        uid: meta.uid(),
        gid: meta.gid(),
        rdev: meta.rdev() as u32,
        blksize: meta.blksize() as u32,
        flags: 0,
    }
}

/// Thread-safe cache for file attributes and negative lookups.
pub struct AttrCache {
    /// inode -> attributes
    entries: DashMap<u64, CachedAttr>,
    /// (parent_inode, name) -> ENOENT
    negative: DashMap<(u64, OsString), Expiring<()>>,
    attr_ttl: Duration,
    negative_ttl: Duration,
    inserts: SweepCounter,
}

impl AttrCache {
    /// Creates a new attribute cache with the given TTLs.
    pub fn new(attr_ttl: Duration, negative_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            negative: DashMap::new(),
            attr_ttl,
            negative_ttl,
            inserts: SweepCounter::default(),
        }
    }

    /// Gets a cached attribute if it exists and hasn't expired.
    pub fn get(&self, inode: u64) -> Option<CachedAttr> {
        if let Some(entry) = self.entries.get(&inode) {
            if !entry.is_expired() {
                return Some(entry.clone());
            }
            drop(entry);
            self.entries.remove(&inode);
        }
        None
    }

    /// Inserts or updates a cached attribute.
    pub fn insert(&self, inode: u64, attr: FileAttr) {
        self.entries.insert(inode, Expiring::new(attr, self.attr_ttl));
        if self.inserts.tick() {
            self.cleanup_expired();
        }
    }

    pub fn invalidate(&self, inode: u64) {
        self.entries.remove(&inode);
    }

    /// Checks if a name is in the negative cache (known to not exist).
    pub fn is_negative(&self, parent: u64, name: &OsStr) -> bool {
        let key = (parent, name.to_os_string());
        if let Some(entry) = self.negative.get(&key) {
            if !entry.is_expired() {
                return true;
            }
            drop(entry);
            self.negative.remove(&key);
        }
        false
    }

    /// Records that `name` does not exist under `parent`.
    ///
    /// Does nothing when the negative TTL is zero.
    /// Expired entries of both maps are swept every [`SWEEP_INTERVAL`]
    /// inserts, so names looked up once do not pile up.
    pub fn insert_negative(&self, parent: u64, name: OsString) {
        if self.negative_ttl.is_zero() {
            return;
        }
        self.negative
            .insert((parent, name), Expiring::new((), self.negative_ttl));
        if self.inserts.tick() {
            self.cleanup_expired();
        }
    }

    /// Clears all expired entries from the cache.
    pub fn cleanup_expired(&self) {
        self.entries.retain(|_, v| !v.is_expired());
        self.negative.retain(|_, v| !v.is_expired());
    }

    /// Returns the number of entries in the positive cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn negative_len(&self) -> usize {
        self.negative.len()
    }

    pub fn attr_ttl(&self) -> Duration {
        self.attr_ttl
    }

    pub fn negative_ttl(&self) -> Duration {
        self.negative_ttl
    }
}

impl Default for AttrCache {
    fn default() -> Self {
        Self::new(DEFAULT_ATTR_TTL, DEFAULT_NEGATIVE_TTL)
    }
}

/// One entry of a cached directory listing.
#[derive(Debug, Clone)]
pub struct DirListingEntry {
    /// Inode number reported to `readdir`.
    pub inode: u64,
    pub file_type: FileType,
    /// Name in the mounted view.
    pub name: OsString,
}

/// Cache for full directory listings.
///
/// FUSE calls `readdir` repeatedly with increasing offsets; one listing is
/// computed per directory and served from here until it expires.
pub struct DirCache {
    /// directory inode -> entries
    listings: DashMap<u64, Expiring<Vec<DirListingEntry>>>,
    ttl: Duration,
    inserts: SweepCounter,
}

impl DirCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            listings: DashMap::new(),
            ttl,
            inserts: SweepCounter::default(),
        }
    }

    /// Gets a cached directory listing if it exists and hasn't expired.
    pub fn get(&self, dir: u64) -> Option<Vec<DirListingEntry>> {
        if let Some(entry) = self.listings.get(&dir) {
            if !entry.is_expired() {
                return Some(entry.value.clone());
            }
            drop(entry);
            self.listings.remove(&dir);
        }
        None
    }

    pub fn insert(&self, dir: u64, entries: Vec<DirListingEntry>) {
        self.listings.insert(dir, Expiring::new(entries, self.ttl));
        if self.inserts.tick() {
            self.cleanup_expired();
        }
    }

    pub fn invalidate(&self, dir: u64) {
        self.listings.remove(&dir);
    }

    pub fn cleanup_expired(&self) {
        self.listings.retain(|_, v| !v.is_expired());
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}

impl Default for DirCache {
    fn default() -> Self {
        Self::new(DEFAULT_ATTR_TTL)
    }
}

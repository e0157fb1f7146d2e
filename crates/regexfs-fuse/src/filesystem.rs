//! FUSE filesystem implementation for the regex mirror.
//!
//! This module implements the fuser `Filesystem` trait on top of a
//! [`Mirror`]. Every inode is a virtual path; the real path behind it is
//! resolved on each operation. The mount is strictly read-only: every
//! mutating operation answers `EROFS`.

use crate::attr::{AttrCache, DirCache, DirListingEntry, file_attr, fuse_file_type};
use crate::config::MountConfig;
use crate::error::{FuseError, FuseResult};
use crate::handles::{FuseHandle, FuseHandleTable};
use crate::inode::{InodeKind, InodeTable, ROOT_INODE};
use crate::xattr::{self, XattrReply};

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use libc::c_int;
use nix::unistd::AccessFlags;
use regexfs_core::{EntryKind, ListEntry, Mirror, VirtualPath};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, trace};

/// Block size reported when the real filesystem cannot be queried.
const BLOCK_SIZE: u32 = 4096;

/// Open flags that would modify the file.
const WRITE_FLAGS: i32 = libc::O_CREAT | libc::O_EXCL | libc::O_TRUNC | libc::O_APPEND;

/// Read-only FUSE filesystem presenting a [`Mirror`].
pub struct RegexFS {
    mirror: Mirror,
    /// Inode table for path/inode mapping.
    inodes: InodeTable,
    attr_cache: AttrCache,
    dir_cache: DirCache,
    /// Open files.
    handle_table: FuseHandleTable,
}

impl RegexFS {
    pub fn new(mirror: Mirror, config: &MountConfig) -> Self {
        info!(
            root = %mirror.root().display(),
            rules = mirror.rules().len(),
            path_cache = mirror.cache().is_some(),
            "RegexFS initialized"
        );
        Self {
            mirror,
            inodes: InodeTable::new(),
            attr_cache: AttrCache::new(config.attr_ttl, config.negative_ttl),
            dir_cache: DirCache::new(config.attr_ttl),
            handle_table: FuseHandleTable::new(),
        }
    }

    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    pub fn inodes(&self) -> &InodeTable {
        &self.inodes
    }

    /// Resolves an inode to its virtual path, kind and current real path.
    fn resolve_inode(&self, ino: u64) -> FuseResult<(VirtualPath, InodeKind, PathBuf)> {
        let (path, kind) = self.inodes.path_of(ino).ok_or(FuseError::InvalidInode(ino))?;
        let real = self.mirror.resolve(&path)?;
        Ok((path, kind, real))
    }

    /// Looks up `name` under directory `parent` and counts a kernel lookup.
    pub fn lookup_child(&self, parent: u64, name: &OsStr) -> FuseResult<FileAttr> {
        let (parent_path, parent_kind) = self
            .inodes
            .path_of(parent)
            .ok_or(FuseError::InvalidInode(parent))?;
        if !parent_kind.is_dir() {
            return Err(io::Error::from_raw_os_error(libc::ENOTDIR).into());
        }

        let path = parent_path.join(name);
        let real = self.mirror.resolve(&path)?;
        let meta = fs::symlink_metadata(&real)?;

        let ino = self.inodes.get_or_insert(path, InodeKind::from(meta.file_type()));
        let attr = file_attr(ino, &meta);
        self.attr_cache.insert(ino, attr);
        Ok(attr)
    }

    /// Current attributes of an inode.
    pub fn attr_of(&self, ino: u64) -> FuseResult<FileAttr> {
        let (_, _, real) = self.resolve_inode(ino)?;
        let meta = fs::symlink_metadata(&real)?;
        let attr = file_attr(ino, &meta);
        self.attr_cache.insert(ino, attr);
        Ok(attr)
    }

    /// Full listing of a directory inode, `.` and `..` included.
    pub fn list_directory(&self, ino: u64) -> FuseResult<Vec<DirListingEntry>> {
        let (path, kind) = self.inodes.path_of(ino).ok_or(FuseError::InvalidInode(ino))?;
        if !kind.is_dir() {
            return Err(io::Error::from_raw_os_error(libc::ENOTDIR).into());
        }

        let parent_inode = path
            .parent()
            .and_then(|parent| self.inodes.get_inode(&parent))
            .unwrap_or(ROOT_INODE);
        let real_dir = path.to_real(self.mirror.root());

        let mut entries = Vec::new();
        for entry in self.mirror.list(&path)? {
            let entry = entry?;
            let inode = if entry.name == "." {
                ino
            } else if entry.name == ".." {
                parent_inode
            } else {
                self.inodes
                    .get_or_allocate(path.join(&entry.name), InodeKind::from(entry.kind))
            };
            entries.push(DirListingEntry {
                inode,
                file_type: listing_file_type(&real_dir, &entry),
                name: entry.name,
            });
        }
        Ok(entries)
    }

    /// Opens a file read-only and returns its handle id.
    pub fn open_file(&self, ino: u64, flags: i32) -> FuseResult<u64> {
        if flags & libc::O_ACCMODE != libc::O_RDONLY || flags & WRITE_FLAGS != 0 {
            return Err(FuseError::ReadOnly);
        }
        let (_, kind, real) = self.resolve_inode(ino)?;
        if kind.is_dir() {
            return Err(io::Error::from_raw_os_error(libc::EISDIR).into());
        }
        let handle = FuseHandle::open(&real)?;
        Ok(self.handle_table.insert(handle))
    }

    /// Reads from an open handle.
    pub fn read_handle(&self, fh: u64, offset: i64, size: u32) -> FuseResult<Vec<u8>> {
        let offset =
            u64::try_from(offset).map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?;
        let handle = self.handle_table.get(fh).ok_or(FuseError::InvalidHandle(fh))?;
        Ok(handle.read_at(offset, size as usize)?)
    }

    /// Closes an open handle. Unknown handles are ignored.
    pub fn release_handle(&self, fh: u64) {
        if let Some(handle) = self.handle_table.remove(fh) {
            debug!(fh, path = %handle.path().display(), "Handle released");
        }
    }

    /// Target of a symlink inode.
    pub fn read_link(&self, ino: u64) -> FuseResult<PathBuf> {
        let (_, _, real) = self.resolve_inode(ino)?;
        Ok(fs::read_link(real)?)
    }

    /// Permission check. Write access is always refused.
    pub fn check_access(&self, ino: u64, mask: i32) -> FuseResult<()> {
        if mask & libc::W_OK != 0 {
            return Err(FuseError::ReadOnly);
        }
        let (_, _, real) = self.resolve_inode(ino)?;
        nix::unistd::access(&real, AccessFlags::from_bits_truncate(mask))
            .map_err(|e| FuseError::Io(e.into()))
    }

    pub fn get_xattr(&self, ino: u64, name: &OsStr, size: u32) -> FuseResult<XattrReply> {
        let (_, _, real) = self.resolve_inode(ino)?;
        Ok(xattr::get(&real, name, size)?)
    }

    pub fn list_xattr(&self, ino: u64, size: u32) -> FuseResult<XattrReply> {
        let (_, _, real) = self.resolve_inode(ino)?;
        Ok(xattr::list(&real, size)?)
    }
}

/// FUSE type of a listed entry; special files need an `lstat` to tell them apart.
fn listing_file_type(real_dir: &Path, entry: &ListEntry) -> FileType {
    match entry.kind {
        EntryKind::Directory => FileType::Directory,
        EntryKind::File => FileType::RegularFile,
        EntryKind::Symlink => FileType::Symlink,
        EntryKind::Other => fs::symlink_metadata(real_dir.join(&entry.real_name))
            .map_or(FileType::RegularFile, |m| fuse_file_type(m.file_type())),
    }
}

fn reply_xattr(result: FuseResult<XattrReply>, reply: fuser::ReplyXattr) {
    match result {
        Ok(XattrReply::Size(size)) => reply.size(size),
        Ok(XattrReply::Data(data)) => reply.data(&data),
        Err(e) => reply.error(e.to_errno()),
    }
}

impl Filesystem for RegexFS {
    fn init(&mut self, _req: &Request<'_>, config: &mut KernelConfig) -> Result<(), c_int> {
        info!("FUSE filesystem initialized");
        // Enable async reads
        config.add_capabilities(fuser::consts::FUSE_ASYNC_READ).ok();
        Ok(())
    }

    fn destroy(&mut self) {
        if let Some(stats) = self.mirror.cache_stats() {
            info!(
                entries = stats.entries,
                hits = stats.hits,
                misses = stats.misses,
                evictions = stats.evictions,
                "Path cache statistics"
            );
        }
        info!("FUSE filesystem destroyed");
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        trace!(parent = parent, name = ?name, "lookup");

        if self.attr_cache.is_negative(parent, name) {
            reply.error(libc::ENOENT);
            return;
        }

        match self.lookup_child(parent, name) {
            Ok(attr) => reply.entry(&self.attr_cache.attr_ttl(), &attr, 0),
            Err(e) => {
                let errno = e.to_errno();
                if errno == libc::ENOENT {
                    self.attr_cache.insert_negative(parent, name.to_os_string());
                }
                reply.error(errno);
            }
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        trace!(inode = ino, nlookup = nlookup, "forget");
        if self.inodes.forget(ino, nlookup) {
            self.attr_cache.invalidate(ino);
            self.dir_cache.invalidate(ino);
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        trace!(inode = ino, "getattr");

        if let Some(cached) = self.attr_cache.get(ino) {
            reply.attr(&cached.time_remaining(), &cached.value);
            return;
        }

        match self.attr_of(ino) {
            Ok(attr) => reply.attr(&self.attr_cache.attr_ttl(), &attr),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        trace!(inode = ino, "readlink");
        match self.read_link(ino) {
            Ok(target) => reply.data(target.as_os_str().as_bytes()),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        trace!(inode = ino, flags = flags, "open");
        match self.open_file(ino, flags) {
            Ok(fh) => reply.opened(fh, 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        trace!(inode = ino, fh = fh, offset = offset, size = size, "read");
        match self.read_handle(fh, offset, size) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        trace!(fh = fh, "release");
        self.release_handle(fh);
        reply.ok();
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        trace!(inode = ino, "opendir");
        match self.inodes.path_of(ino) {
            Some((_, kind)) if kind.is_dir() => reply.opened(0, 0),
            Some(_) => reply.error(libc::ENOTDIR),
            None => reply.error(libc::ENOENT),
        }
    }

    #[allow(clippy::cast_possible_wrap)]
    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        trace!(inode = ino, offset = offset, "readdir");

        // Offset 0 starts a new listing
        let cached = if offset == 0 {
            None
        } else {
            self.dir_cache.get(ino)
        };
        let entries = match cached {
            Some(entries) => entries,
            None => match self.list_directory(ino) {
                Ok(entries) => {
                    self.dir_cache.insert(ino, entries.clone());
                    entries
                }
                Err(e) => {
                    reply.error(e.to_errno());
                    return;
                }
            },
        };

        let skip = usize::try_from(offset).unwrap_or(0);
        for (i, entry) in entries.iter().enumerate().skip(skip) {
            // buffer.add returns true if buffer is full
            if reply.add(entry.inode, (i + 1) as i64, entry.file_type, &entry.name) {
                break;
            }
        }
        reply.ok();
    }

    fn releasedir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, _flags: i32, reply: ReplyEmpty) {
        trace!(inode = ino, "releasedir");
        reply.ok();
    }

    #[allow(clippy::unnecessary_cast, clippy::cast_possible_truncation)]
    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: fuser::ReplyStatfs) {
        // Query real filesystem statistics from underlying storage
        match nix::sys::statvfs::statvfs(self.mirror.root()) {
            Ok(stat) => {
                reply.statfs(
                    stat.blocks() as u64,
                    stat.blocks_free() as u64,
                    stat.blocks_available() as u64,
                    stat.files() as u64,
                    stat.files_free() as u64,
                    stat.block_size() as u32,
                    stat.name_max() as u32,
                    stat.fragment_size() as u32,
                );
            }
            Err(e) => {
                debug!(error = %e, "Failed to get statfs, using defaults");
                reply.statfs(0, 0, 0, 0, 0, BLOCK_SIZE, 255, BLOCK_SIZE);
            }
        }
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        trace!(inode = ino, mask = mask, "access");
        match self.check_access(ino, mask) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn getxattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        name: &OsStr,
        size: u32,
        reply: fuser::ReplyXattr,
    ) {
        trace!(inode = ino, name = ?name, size = size, "getxattr");
        reply_xattr(self.get_xattr(ino, name, size), reply);
    }

    fn listxattr(&mut self, _req: &Request<'_>, ino: u64, size: u32, reply: fuser::ReplyXattr) {
        trace!(inode = ino, size = size, "listxattr");
        reply_xattr(self.list_xattr(ino, size), reply);
    }

    // ==================== Write Operations (all EROFS) ====================

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        _size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        trace!(inode = ino, "setattr");
        reply.error(libc::EROFS);
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        trace!(parent = parent, name = ?name, "mknod");
        reply.error(libc::EROFS);
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        trace!(parent = parent, name = ?name, "mkdir");
        reply.error(libc::EROFS);
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        trace!(parent = parent, name = ?name, "unlink");
        reply.error(libc::EROFS);
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        trace!(parent = parent, name = ?name, "rmdir");
        reply.error(libc::EROFS);
    }

    fn symlink(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        _target: &Path,
        reply: ReplyEntry,
    ) {
        trace!(parent = parent, name = ?link_name, "symlink");
        reply.error(libc::EROFS);
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        trace!(
            parent = parent,
            name = ?name,
            newparent = newparent,
            newname = ?newname,
            "rename"
        );
        reply.error(libc::EROFS);
    }

    fn link(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        trace!(inode = ino, newparent = newparent, newname = ?newname, "link");
        reply.error(libc::EROFS);
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: fuser::ReplyCreate,
    ) {
        trace!(parent = parent, name = ?name, "create");
        reply.error(libc::EROFS);
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        trace!(inode = ino, fh = fh, offset = offset, len = data.len(), "write");
        reply.error(libc::EROFS);
    }

    fn setxattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        name: &OsStr,
        _value: &[u8],
        _flags: i32,
        _position: u32,
        reply: ReplyEmpty,
    ) {
        trace!(inode = ino, name = ?name, "setxattr");
        reply.error(libc::EROFS);
    }

    fn removexattr(&mut self, _req: &Request<'_>, ino: u64, name: &OsStr, reply: ReplyEmpty) {
        trace!(inode = ino, name = ?name, "removexattr");
        reply.error(libc::EROFS);
    }
}

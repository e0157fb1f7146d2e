//! Open file handles.
//!
//! Every handle is a real file opened read-only. Reads are positional, so one
//! handle can serve concurrent reads at different offsets without a seek
//! position to protect.

use dashmap::DashMap;
use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// A real file opened on behalf of the kernel.
#[derive(Debug)]
pub struct FuseHandle {
    file: File,
    /// Real path at open time, for diagnostics.
    path: PathBuf,
}

impl FuseHandle {
    /// Opens `path` read-only.
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            file: File::open(path)?,
            path: path.to_path_buf(),
        })
    }

    /// Reads up to `size` bytes at `offset`.
    ///
    /// Returns fewer bytes only at end of file.
    pub fn read_at(&self, offset: u64, size: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; size];
        let mut filled = 0;
        while filled < size {
            match self.file.read_at(&mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Table of open handles, keyed by the `fh` handed to the kernel.
pub struct FuseHandleTable {
    handles: DashMap<u64, FuseHandle>,
    next_id: AtomicU64,
}

impl Default for FuseHandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FuseHandleTable {
    /// Create a new handle table. Ids start at 1; 0 means "no handle".
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Stores a handle and returns its id.
    pub fn insert(&self, handle: FuseHandle) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.handles.insert(id, handle);
        id
    }

    pub fn get(&self, id: u64) -> Option<dashmap::mapref::one::Ref<'_, u64, FuseHandle>> {
        self.handles.get(&id)
    }

    pub fn remove(&self, id: u64) -> Option<FuseHandle> {
        self.handles.remove(&id).map(|(_, h)| h)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

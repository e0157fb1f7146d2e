//! Error handling and mapping for the FUSE filesystem.
//!
//! This module converts resolver and I/O errors to the POSIX error codes
//! FUSE returns to the kernel.

use regexfs_core::ResolveError;
use std::io;
use thiserror::Error;

/// FUSE-specific errors that can occur during filesystem operations.
#[derive(Debug, Error)]
pub enum FuseError {
    /// Name resolution or listing failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Invalid inode.
    #[error("Invalid inode: {0}")]
    InvalidInode(u64),

    /// Invalid file handle.
    #[error("Invalid file handle: {0}")]
    InvalidHandle(u64),

    /// Any attempt to modify the mirror.
    #[error("Filesystem is read-only")]
    ReadOnly,
}

impl FuseError {
    /// Converts this error to a libc error code for FUSE.
    pub fn to_errno(&self) -> i32 {
        match self {
            FuseError::Resolve(e) => resolve_error_to_errno(e),
            FuseError::Io(e) => io_error_to_errno(e),
            FuseError::InvalidInode(_) => libc::ENOENT,
            FuseError::InvalidHandle(_) => libc::EBADF,
            FuseError::ReadOnly => libc::EROFS,
        }
    }
}

/// Converts a resolver error to a libc error code.
pub fn resolve_error_to_errno(e: &ResolveError) -> i32 {
    match e {
        ResolveError::NotFound { .. } => libc::ENOENT,
        ResolveError::Io { source, .. } => io_error_to_errno(source),
        ResolveError::NameTooLong { .. } => libc::ENAMETOOLONG,
    }
}

/// Converts an IO error to a libc error code.
pub fn io_error_to_errno(e: &io::Error) -> i32 {
    e.raw_os_error().unwrap_or(libc::EIO)
}

/// Result type for FUSE operations.
pub type FuseResult<T> = Result<T, FuseError>;

/// Extension trait to convert errors to errno.
pub trait ToErrno {
    /// Converts this error to a libc error code.
    fn to_errno(&self) -> i32;
}

impl ToErrno for ResolveError {
    fn to_errno(&self) -> i32 {
        resolve_error_to_errno(self)
    }
}

impl ToErrno for io::Error {
    fn to_errno(&self) -> i32 {
        io_error_to_errno(self)
    }
}

impl ToErrno for FuseError {
    fn to_errno(&self) -> i32 {
        FuseError::to_errno(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regexfs_core::VirtualPath;

    #[test]
    fn test_io_error_mapping() {
        let e = io::Error::from_raw_os_error(libc::ENOENT);
        assert_eq!(io_error_to_errno(&e), libc::ENOENT);

        let e = io::Error::from_raw_os_error(libc::EACCES);
        assert_eq!(io_error_to_errno(&e), libc::EACCES);
    }

    #[test]
    fn test_io_error_mapping_without_os_error() {
        let e = io::Error::other("custom error");
        // Should return EIO when no raw OS error
        assert_eq!(io_error_to_errno(&e), libc::EIO);
    }

    #[test]
    fn test_resolve_error_mapping() {
        let e = ResolveError::NotFound {
            path: VirtualPath::new("a.md"),
        };
        assert_eq!(e.to_errno(), libc::ENOENT);

        let e = ResolveError::NameTooLong {
            path: VirtualPath::new("a.md"),
            len: 5000,
        };
        assert_eq!(e.to_errno(), libc::ENAMETOOLONG);

        let e = ResolveError::Io {
            path: "/srv".into(),
            source: io::Error::from_raw_os_error(libc::EACCES),
        };
        assert_eq!(e.to_errno(), libc::EACCES);
    }

    #[test]
    fn test_fuse_error_all_variants() {
        assert_eq!(
            FuseError::InvalidInode(1).to_errno(),
            libc::ENOENT,
            "InvalidInode should map to ENOENT"
        );

        assert_eq!(
            FuseError::InvalidHandle(1).to_errno(),
            libc::EBADF,
            "InvalidHandle should map to EBADF"
        );

        assert_eq!(
            FuseError::ReadOnly.to_errno(),
            libc::EROFS,
            "ReadOnly should map to EROFS"
        );
    }

    #[test]
    fn test_fuse_error_io_passthrough() {
        let e = FuseError::Io(io::Error::from_raw_os_error(libc::EPERM));
        assert_eq!(e.to_errno(), libc::EPERM);
    }

    #[test]
    fn test_from_resolve_error() {
        let e: FuseError = ResolveError::NotFound {
            path: VirtualPath::new("x"),
        }
        .into();
        assert_eq!(e.to_errno(), libc::ENOENT);
        assert!(e.to_string().contains("/x"));
    }

    #[test]
    fn test_fuse_error_display() {
        let e = FuseError::InvalidInode(42);
        assert!(e.to_string().contains("42"));
        assert!(FuseError::ReadOnly.to_string().contains("read-only"));
    }
}

//! Read-only FUSE mirror with regex-renamed entries.
//!
//! This crate mounts a real directory tree through [`regexfs_core::Mirror`]:
//! directories keep their names, other entries appear under the names the
//! configured rules produce. Nothing can be written through the mount.
//!
//! # Features
//!
//! - Lookup, getattr, readdir and read backed by the real files
//! - Symlinks and extended attributes passed through
//! - Attribute, negative-lookup and listing caches with short TTLs
//! - `EROFS` for every mutating operation
//!
//! # Usage
//!
//! ```ignore
//! use regexfs_core::{Mirror, RuleTable};
//! use regexfs_fuse::{MountConfig, RegexFS};
//!
//! let mirror = Mirror::new(source, RuleTable::parse(r"(.*)\.txt$:$1.md")?);
//! let fs = RegexFS::new(mirror, &MountConfig::default());
//! fuser::mount2(fs, mountpoint, &[fuser::MountOption::RO])?;
//! ```

pub mod attr;
pub mod config;
pub mod error;
pub mod filesystem;
pub mod handles;
pub mod inode;
pub mod xattr;

pub use attr::{AttrCache, CachedAttr, DirCache, DirListingEntry};
pub use config::MountConfig;
pub use error::{FuseError, FuseResult, ToErrno};
pub use filesystem::RegexFS;
pub use handles::{FuseHandle, FuseHandleTable};
pub use inode::{InodeEntry, InodeKind, InodeTable, ROOT_INODE};
pub use xattr::XattrReply;

//! Error types for rule compilation and name resolution.

use crate::matcher::{NAME_MAX, PATH_MAX};
use crate::path::VirtualPath;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while compiling rule configuration.
///
/// Every variant is fatal: a rule set either compiles completely or the
/// filesystem never mounts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Rule configuration is empty")]
    Empty,

    #[error("Rule #{index} is empty")]
    EmptyRule { index: usize },

    #[error("Rule `{rule}` has no `:` between pattern and templates")]
    MissingSeparator { rule: String },

    #[error("Rule `{rule}` has more than one `:`; write `::` for a literal colon")]
    UnexpectedSeparator { rule: String },

    #[error("Pattern `{pattern}` has no templates")]
    NoTemplates { pattern: String },

    #[error("Rule `{rule}` has an empty pattern")]
    EmptyPattern { rule: String },

    #[error("Invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Template `{template}` references unknown group `{group}` of pattern `{pattern}`")]
    UnknownGroup {
        pattern: String,
        template: String,
        group: String,
    },

    #[error("Error reading rules file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A generated name that cannot be used as a directory entry.
///
/// The offending candidate is dropped; the entry that produced it still
/// counts as matched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("Generated name is empty")]
    Empty,

    #[error("Generated name `{0}` is reserved")]
    Reserved(String),

    #[error("Generated name {0:?} contains `/` or NUL")]
    InvalidCharacter(String),

    #[error("Generated name is {len} bytes, limit is {NAME_MAX}")]
    TooLong { len: usize },
}

/// Errors returned by [`Resolver`](crate::Resolver) and [`Lister`](crate::Lister).
#[derive(Error, Debug)]
pub enum ResolveError {
    /// No real entry produces the requested virtual name.
    #[error("No entry is exposed as {path}")]
    NotFound { path: VirtualPath },

    /// Directory open/read or existence check failed.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The real counterpart of a virtual path would exceed the platform limit.
    #[error("Path {path} maps to {len} bytes, limit is {PATH_MAX}")]
    NameTooLong { path: VirtualPath, len: usize },
}

impl ResolveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ResolveError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if this is a [`ResolveError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound { .. })
    }
}

/// Result type for resolution and listing.
pub type ResolveResult<T> = Result<T, ResolveError>;

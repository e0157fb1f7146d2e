//! Common test infrastructure for FUSE mount tests.
//!
//! Provides the `TestMount` harness for exercising the mirror through an
//! actual kernel mount.

pub mod harness;

pub use harness::TestMount;

// Macros (skip_if_no_fuse!, require_mount!) are #[macro_export] so they're
// available at the crate root.

//! Name virtualization for a read-only mirror filesystem.
//!
//! A real directory tree is presented under names produced by an ordered set
//! of regular-expression rules. Directories keep their names; every other
//! entry is either exposed unchanged (no rule matches it) or exposed only
//! under the names its matching rules generate.
//!
//! # Components
//!
//! - [`RuleTable`] - compiled `pattern:template[;template...]` rules
//! - [`matcher`] - maps one entry name to the virtual names it appears under
//! - [`PathCache`] - self-healing memo of virtual path to real path
//! - [`Resolver`] - virtual path to the unique real path, or absence
//! - [`Lister`] - every virtual name of every entry of a real directory
//! - [`Mirror`] - owns the real root and wires the pieces together
//!
//! # Example
//!
//! ```no_run
//! use regexfs_core::{Mirror, RuleTable, VirtualPath};
//!
//! let rules = RuleTable::parse(r"(.*)\.txt$:$1.md")?;
//! let mirror = Mirror::new("/srv/notes", rules);
//!
//! for entry in mirror.list(&VirtualPath::root())? {
//!     let entry = entry?;
//!     println!("{:?} <- {:?}", entry.name, entry.real_name);
//! }
//!
//! let real = mirror.resolve(&VirtualPath::new("todo.md"))?;
//! assert!(real.ends_with("todo.txt"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cache;
pub mod error;
pub mod lister;
pub mod matcher;
pub mod mirror;
pub mod path;
pub mod resolver;
pub mod rules;

pub use cache::{CacheStats, PathCache};
pub use error::{ConfigError, NameError, ResolveError, ResolveResult};
pub use lister::{EntryKind, ListEntry, Lister, Listing};
pub use matcher::{Expansion, NAME_MAX, PATH_MAX, validate_name};
pub use mirror::Mirror;
pub use path::VirtualPath;
pub use resolver::Resolver;
pub use rules::{Rule, RuleTable};

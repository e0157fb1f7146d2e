//! Entry name to virtual names.
//!
//! The matching engine is a pure function of the rule table and one
//! directory-entry name. The resolver and the lister both go through
//! [`expand`], which is what keeps listing and lookup consistent.

use crate::error::NameError;
use crate::rules::RuleTable;
use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use tracing::warn;

/// Longest single name, in bytes, a directory entry may have.
pub const NAME_MAX: usize = 255;

/// Longest real path, in bytes, the resolver will hand out.
pub const PATH_MAX: usize = 4096;

/// The virtual names one real entry appears under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    matched: bool,
    candidates: Vec<OsString>,
}

impl Expansion {
    /// True if at least one rule's pattern matched the entry name.
    ///
    /// A matched entry is visible only under its candidates, even when every
    /// candidate was dropped as invalid.
    pub fn matched(&self) -> bool {
        self.matched
    }

    /// Generated names in rule order, then template order.
    pub fn candidates(&self) -> &[OsString] {
        &self.candidates
    }

    /// Every name the entry is exposed under.
    ///
    /// The candidates if matched, otherwise the entry name itself.
    pub fn virtual_names<'a>(
        &'a self,
        entry_name: &'a OsStr,
    ) -> impl Iterator<Item = &'a OsStr> {
        self.candidates
            .iter()
            .map(OsString::as_os_str)
            .chain((!self.matched).then_some(entry_name))
    }

    /// Whether the entry named `entry_name` appears as `requested`.
    pub fn yields(&self, entry_name: impl AsRef<OsStr>, requested: impl AsRef<OsStr>) -> bool {
        let requested = requested.as_ref();
        if self.matched {
            self.candidates.iter().any(|c| c.as_os_str() == requested)
        } else {
            entry_name.as_ref() == requested
        }
    }
}

/// Checks that a generated name can be used as a directory entry.
pub fn validate_name(name: impl AsRef<OsStr>) -> Result<(), NameError> {
    let bytes = name.as_ref().as_bytes();
    if bytes.is_empty() {
        return Err(NameError::Empty);
    }
    if bytes == b"." || bytes == b".." {
        return Err(NameError::Reserved(name.as_ref().to_string_lossy().into_owned()));
    }
    if bytes.iter().any(|b| matches!(b, b'/' | 0)) {
        return Err(NameError::InvalidCharacter(
            name.as_ref().to_string_lossy().into_owned(),
        ));
    }
    if bytes.len() > NAME_MAX {
        return Err(NameError::TooLong { len: bytes.len() });
    }
    Ok(())
}

/// Applies every rule, in order, to one entry name.
///
/// Each matching rule contributes one candidate per template. Candidates that
/// fail [`validate_name`] are dropped with a warning.
pub fn expand(rules: &RuleTable, entry_name: &OsStr) -> Expansion {
    let mut raw = Vec::new();
    let mut matched = false;
    for rule in rules.iter() {
        matched |= rule.apply(entry_name, &mut raw);
    }

    let candidates = raw
        .into_iter()
        .filter(|candidate| match validate_name(candidate) {
            Ok(()) => true,
            Err(e) => {
                warn!(entry = ?entry_name, error = %e, "Dropping generated name");
                false
            }
        })
        .collect();

    Expansion {
        matched,
        candidates,
    }
}

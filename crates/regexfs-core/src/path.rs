//! Paths as seen through the mounted view.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A path inside the mounted view, relative to the mount root.
///
/// Virtual paths use `/` as the separator and carry names as raw bytes, so
/// entries whose names are not UTF-8 are addressable too. They are
/// normalized on construction: leading slashes and `.` components are
/// dropped and `..` pops the previous component, so a virtual path can never
/// climb above the mount root.
///
/// # Examples
///
/// ```
/// use regexfs_core::VirtualPath;
///
/// let path = VirtualPath::new("/docs/notes.md");
/// assert_eq!(path.file_name().unwrap(), "notes.md");
/// assert_eq!(path.parent().unwrap(), VirtualPath::new("docs"));
///
/// let escaped = VirtualPath::new("../../etc/passwd");
/// assert_eq!(escaped.as_os_str(), "etc/passwd");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualPath(PathBuf);

impl VirtualPath {
    /// The mount root (empty path).
    #[inline]
    pub fn root() -> Self {
        VirtualPath(PathBuf::new())
    }

    /// Create a normalized virtual path.
    pub fn new(path: impl AsRef<OsStr>) -> Self {
        let mut normalized = PathBuf::new();
        for component in Path::new(path.as_ref()).components() {
            match component {
                Component::Normal(name) => normalized.push(name),
                Component::ParentDir => {
                    normalized.pop();
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
        VirtualPath(normalized)
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.as_os_str().is_empty()
    }

    #[inline]
    pub fn as_os_str(&self) -> &OsStr {
        self.0.as_os_str()
    }

    /// The path as UTF-8, if it is.
    pub fn to_str(&self) -> Option<&str> {
        self.0.to_str()
    }

    /// Join this path with a child name.
    ///
    /// `name` is always taken as relative, so a leading `/` does not reset
    /// the path.
    ///
    /// ```
    /// use regexfs_core::VirtualPath;
    ///
    /// let docs = VirtualPath::new("docs");
    /// assert_eq!(docs.join("notes.md").as_os_str(), "docs/notes.md");
    /// assert_eq!(VirtualPath::root().join("top").as_os_str(), "top");
    /// ```
    pub fn join(&self, name: impl AsRef<OsStr>) -> Self {
        let mut joined = OsString::from(self.0.as_os_str());
        joined.push("/");
        joined.push(name.as_ref());
        VirtualPath::new(joined)
    }

    /// Parent path; `None` for the root.
    pub fn parent(&self) -> Option<VirtualPath> {
        if self.is_root() {
            return None;
        }
        self.0.parent().map(|p| VirtualPath(p.to_path_buf()))
    }

    /// Final component; `None` for the root.
    pub fn file_name(&self) -> Option<&OsStr> {
        self.0.file_name()
    }

    pub fn components(&self) -> impl Iterator<Item = &OsStr> {
        self.0.components().map(Component::as_os_str)
    }

    /// Split into parent path and final component.
    ///
    /// Returns `None` for the root.
    pub fn split(&self) -> Option<(VirtualPath, &OsStr)> {
        let parent = self.parent()?;
        let name = self.file_name()?;
        Some((parent, name))
    }

    /// The same relative path underneath a real root directory.
    pub fn to_real(&self, root: &Path) -> PathBuf {
        let mut real = root.to_path_buf();
        for component in self.components() {
            real.push(component);
        }
        real
    }
}

impl AsRef<OsStr> for VirtualPath {
    fn as_ref(&self) -> &OsStr {
        self.as_os_str()
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0.display())
    }
}

impl From<&str> for VirtualPath {
    fn from(s: &str) -> Self {
        VirtualPath::new(s)
    }
}

impl From<String> for VirtualPath {
    fn from(s: String) -> Self {
        VirtualPath::new(s)
    }
}

impl From<&OsStr> for VirtualPath {
    fn from(s: &OsStr) -> Self {
        VirtualPath::new(s)
    }
}

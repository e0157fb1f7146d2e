//! Test mount harness for FUSE mount tests.
//!
//! Provides `TestMount`, which builds a temporary source tree, mounts it
//! through `RegexFS` and unmounts on drop.

// Not all tests use all TestMount methods
#![allow(dead_code)]

use fuser::{BackgroundSession, MountOption};
use regexfs_core::{Mirror, RuleTable};
use regexfs_fuse::{MountConfig, RegexFS};
use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// How long to wait for mount to become ready.
const MOUNT_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait between mount readiness checks.
const MOUNT_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// A mounted mirror of a temporary source tree.
///
/// # Example
///
/// ```ignore
/// use common::TestMount;
///
/// #[test]
/// fn test_renamed_read() {
///     let mount = TestMount::new(r"(.*)\.txt$:$1.md", |src| {
///         std::fs::write(src.join("a.txt"), b"hello").unwrap();
///     })
///     .unwrap();
///     assert_eq!(mount.read("a.md").unwrap(), b"hello");
/// }
/// ```
pub struct TestMount {
    /// The FUSE session (unmounts on drop).
    _session: BackgroundSession,
    /// Path where the mirror is mounted.
    pub mount_path: PathBuf,
    /// Real tree behind the mount.
    pub source_path: PathBuf,
    _temp: TempDir,
}

impl TestMount {
    /// Populates a fresh source tree with `setup` and mounts it with `rules`.
    pub fn new(rules: &str, setup: impl FnOnce(&Path)) -> Result<Self, String> {
        Self::with_config(rules, MountConfig::default(), setup)
    }

    pub fn with_config(
        rules: &str,
        config: MountConfig,
        setup: impl FnOnce(&Path),
    ) -> Result<Self, String> {
        let temp = TempDir::new().map_err(|e| format!("Failed to create temp dir: {e}"))?;
        let source_path = temp.path().join("src");
        let mount_path = temp.path().join("mnt");
        fs::create_dir(&source_path).map_err(|e| format!("Failed to create source: {e}"))?;
        fs::create_dir(&mount_path).map_err(|e| format!("Failed to create mount point: {e}"))?;

        setup(&source_path);

        let rules = RuleTable::parse(rules).map_err(|e| format!("Invalid rules: {e}"))?;
        let mirror = Mirror::new(&source_path, rules);
        let fs = RegexFS::new(mirror, &config);

        let options = vec![
            MountOption::FSName("regexfs-test".to_string()),
            MountOption::RO,
            MountOption::AutoUnmount,
        ];

        let session = fuser::spawn_mount2(fs, &mount_path, &options)
            .map_err(|e| format!("Failed to mount: {e}"))?;

        Self::wait_for_mount(&mount_path)?;

        Ok(Self {
            _session: session,
            mount_path,
            source_path,
            _temp: temp,
        })
    }

    /// Wait for the mount to answer a directory listing.
    fn wait_for_mount(mount_path: &Path) -> Result<(), String> {
        let deadline = Instant::now() + MOUNT_READY_TIMEOUT;
        while Instant::now() < deadline {
            if fs::read_dir(mount_path).is_ok() {
                return Ok(());
            }
            thread::sleep(MOUNT_CHECK_INTERVAL);
        }
        Err("Mount did not become ready in time".to_string())
    }

    // =========================================================================
    // Filesystem convenience methods
    // =========================================================================

    /// Build a full path inside the mount.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.mount_path.join(relative.trim_start_matches('/'))
    }

    /// Build a full path inside the source tree.
    pub fn source(&self, relative: &str) -> PathBuf {
        self.source_path.join(relative.trim_start_matches('/'))
    }

    /// Read a file's contents.
    pub fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        let mut content = Vec::new();
        File::open(self.path(path))?.read_to_end(&mut content)?;
        Ok(content)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.path(path).exists()
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.path(path).is_dir()
    }

    pub fn symlink_metadata(&self, path: &str) -> io::Result<Metadata> {
        fs::symlink_metadata(self.path(path))
    }

    /// List directory entries (names only, sorted).
    pub fn list(&self, path: &str) -> io::Result<Vec<String>> {
        let mut names: Vec<String> = fs::read_dir(self.path(path))?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn read_link(&self, path: &str) -> io::Result<PathBuf> {
        fs::read_link(self.path(path))
    }
}

/// Check if FUSE is available on this system.
pub fn fuse_available() -> bool {
    #[cfg(target_os = "linux")]
    {
        Path::new("/dev/fuse").exists()
    }
    #[cfg(target_os = "macos")]
    {
        Path::new("/Library/Filesystems/macfuse.fs").exists()
            || Path::new("/Library/Filesystems/osxfuse.fs").exists()
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        false
    }
}

/// Skip test if FUSE is not available.
#[macro_export]
macro_rules! skip_if_no_fuse {
    () => {
        if !$crate::common::harness::fuse_available() {
            eprintln!("Skipping test: FUSE not available on this system");
            return;
        }
    };
}

/// Skip test if mounting fails (common in CI environments).
#[macro_export]
macro_rules! require_mount {
    ($mount_result:expr) => {
        match $mount_result {
            Ok(m) => m,
            Err(e) => {
                eprintln!("Skipping test: {}", e);
                return;
            }
        }
    };
}

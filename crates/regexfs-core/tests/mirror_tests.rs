//! Listing/lookup consistency against real temporary trees.
//!
//! Every name a listing produces must resolve back to the entry that produced
//! it, and nothing else may resolve to a renamed entry.

use regexfs_core::{EntryKind, Mirror, PathCache, ResolveError, RuleTable, VirtualPath};
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn touch(root: &Path, rel: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    File::create(path).expect("create file");
}

fn mirror(root: &Path, config: &str) -> Mirror {
    Mirror::new(root, RuleTable::parse(config).expect("rules compile"))
}

fn sorted_names(mirror: &Mirror, dir: &str) -> Vec<String> {
    let mut names: Vec<_> = mirror
        .list_all(&VirtualPath::new(dir))
        .expect("list")
        .into_iter()
        .filter(|e| !e.is_dot())
        .map(|e| e.name.to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Asserts the round-trip property for every non-directory entry of `dir`.
fn assert_round_trip(mirror: &Mirror, dir: &str) {
    let vdir = VirtualPath::new(dir);
    let real_dir = vdir.to_real(mirror.root());
    for entry in mirror.list_all(&vdir).expect("list") {
        if entry.kind == EntryKind::Directory {
            continue;
        }
        let resolved = mirror
            .resolve(&vdir.join(&entry.name))
            .unwrap_or_else(|e| panic!("{:?} did not resolve: {e}", entry.name));
        assert_eq!(resolved, real_dir.join(&entry.real_name), "alias {:?}", entry.name);
    }
}

// Scenario A: one rule, one template
#[test]
fn test_single_template_rename() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "notes.txt");
    touch(tmp.path(), "image.png");
    let mirror = mirror(tmp.path(), r"(.*)\.txt$:$1.md");

    assert_eq!(sorted_names(&mirror, ""), vec!["image.png", "notes.md"]);
    assert_eq!(
        mirror.resolve(&VirtualPath::new("notes.md")).unwrap(),
        tmp.path().join("notes.txt")
    );
    assert_eq!(
        mirror.resolve(&VirtualPath::new("image.png")).unwrap(),
        tmp.path().join("image.png")
    );
    assert!(matches!(
        mirror.resolve(&VirtualPath::new("notes.txt")),
        Err(ResolveError::NotFound { .. })
    ));
    assert_round_trip(&mirror, "");
}

// Scenario B: one rule, two templates
#[test]
fn test_two_templates_both_resolve() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "afile");
    let mirror = mirror(tmp.path(), "^a(.*)$:b$1;c$1");

    assert_eq!(sorted_names(&mirror, ""), vec!["bfile", "cfile"]);
    for alias in ["bfile", "cfile"] {
        assert_eq!(
            mirror.resolve(&VirtualPath::new(alias)).unwrap(),
            tmp.path().join("afile")
        );
    }
    assert!(mirror.resolve(&VirtualPath::new("afile")).unwrap_err().is_not_found());
}

// Scenario C: directories never change
#[test]
fn test_directories_pass_through() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "adir/afile");
    touch(tmp.path(), "adir/keep");
    let mirror = mirror(tmp.path(), "^a(.*)$:b$1;c$1");

    assert_eq!(sorted_names(&mirror, ""), vec!["adir"]);
    assert_eq!(
        mirror.resolve(&VirtualPath::new("adir")).unwrap(),
        tmp.path().join("adir")
    );
    assert!(mirror.resolve(&VirtualPath::new("bdir")).unwrap_err().is_not_found());

    assert_eq!(sorted_names(&mirror, "adir"), vec!["bfile", "cfile", "keep"]);
    assert_eq!(
        mirror.resolve(&VirtualPath::new("adir/cfile")).unwrap(),
        tmp.path().join("adir/afile")
    );
    assert_round_trip(&mirror, "adir");
}

#[test]
fn test_identity_passthrough() {
    let tmp = TempDir::new().unwrap();
    for name in ["one", "two.dat", "three.tar.gz"] {
        touch(tmp.path(), name);
    }
    let mirror = mirror(tmp.path(), r"^never-matches\.$:x");

    assert_eq!(sorted_names(&mirror, ""), vec!["one", "three.tar.gz", "two.dat"]);
    assert_round_trip(&mirror, "");
}

#[test]
fn test_exclusivity_of_renamed_entries() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "report.txt");
    let mirror = mirror(tmp.path(), r"^(.*)\.txt$:$1.md;$1.markdown");

    for name in ["report.txt", "report", "report.md.txt", "Report.md"] {
        assert!(
            mirror.resolve(&VirtualPath::new(name)).unwrap_err().is_not_found(),
            "{name} must not resolve"
        );
    }
    assert_round_trip(&mirror, "");
}

#[test]
fn test_cache_transparency() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "a.txt");
    touch(tmp.path(), "b.txt");
    touch(tmp.path(), "sub/c.txt");
    let config = r"^(.*)\.txt$:$1.md";
    let cached = mirror(tmp.path(), config);
    let uncached = Mirror::with_cache(tmp.path(), RuleTable::parse(config).unwrap(), None);

    for name in ["a.md", "b.md", "sub/c.md", "a.txt", "sub", "missing.md"] {
        let path = VirtualPath::new(name);
        // Twice, so the second cached lookup is a hit
        for _ in 0..2 {
            let left = cached.resolve(&path).ok();
            let right = uncached.resolve(&path).ok();
            assert_eq!(left, right, "{name}");
        }
    }
    assert!(cached.cache_stats().unwrap().hits >= 3);
}

#[test]
fn test_self_healing_after_delete() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "a.txt");
    let mirror = mirror(tmp.path(), r"^(.*)\.txt$:$1.md");
    let path = VirtualPath::new("a.md");

    mirror.resolve(&path).unwrap();
    fs::remove_file(tmp.path().join("a.txt")).unwrap();
    assert!(mirror.resolve(&path).unwrap_err().is_not_found());
    assert!(mirror.cache().unwrap().get(&path).is_none());
}

#[test]
fn test_self_healing_after_rename() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "a.txt");
    let mirror = mirror(tmp.path(), r"^(.*)\.txt$:$1.md|^(.*)\.text$:$1.md");
    let path = VirtualPath::new("a.md");

    mirror.resolve(&path).unwrap();
    fs::rename(tmp.path().join("a.txt"), tmp.path().join("a.text")).unwrap();

    assert_eq!(mirror.resolve(&path).unwrap(), tmp.path().join("a.text"));
    assert_eq!(mirror.cache().unwrap().stats().evictions, 1);
}

#[test]
fn test_stale_entry_not_reported_as_directory() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "a.txt");
    let mirror = mirror(tmp.path(), r"^(.*)\.txt$:$1");
    let path = VirtualPath::new("a");

    assert_eq!(mirror.resolve(&path).unwrap(), tmp.path().join("a.txt"));

    // A real directory appearing under the alias name takes over
    fs::create_dir(tmp.path().join("a")).unwrap();
    assert_eq!(mirror.resolve(&path).unwrap(), tmp.path().join("a"));
    assert_eq!(sorted_names(&mirror, ""), vec!["a"]);
}

#[test]
fn test_first_entry_wins_for_shared_alias() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "x.one");
    touch(tmp.path(), "x.two");
    let mirror = mirror(tmp.path(), r"^x\..*$:x");

    // Listed once and resolved to whichever entry the scan meets first
    assert_eq!(sorted_names(&mirror, ""), vec!["x"]);
    assert_round_trip(&mirror, "");
}

#[test]
fn test_symlinks_follow_rules() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "target.txt");
    std::os::unix::fs::symlink("target.txt", tmp.path().join("link.txt")).unwrap();
    let mirror = mirror(tmp.path(), r"^(.*)\.txt$:$1.md");

    let entries = mirror.list_all(&VirtualPath::root()).unwrap();
    let link = entries.iter().find(|e| e.name == "link.md").unwrap();
    assert_eq!(link.kind, EntryKind::Symlink);
    assert_round_trip(&mirror, "");
}

#[test]
fn test_shared_cache_between_mirrors() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "a.txt");
    let cache = Arc::new(PathCache::new());
    let rules = || RuleTable::parse(r"^(.*)\.txt$:$1.md").unwrap();
    let first = Mirror::with_cache(tmp.path(), rules(), Some(Arc::clone(&cache)));
    let second = Mirror::with_cache(tmp.path(), rules(), Some(Arc::clone(&cache)));

    first.resolve(&VirtualPath::new("a.md")).unwrap();
    second.resolve(&VirtualPath::new("a.md")).unwrap();
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn test_listing_missing_directory_fails() {
    let tmp = TempDir::new().unwrap();
    let mirror = mirror(tmp.path(), "^a:b");
    assert!(matches!(
        mirror.list(&VirtualPath::new("nope")),
        Err(ResolveError::Io { .. })
    ));
}

#[test]
#[cfg(target_os = "linux")]
fn test_unmatched_non_utf8_name_passes_through() {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;

    let tmp = TempDir::new().unwrap();
    let raw = OsString::from_vec(b"caf\xe9.log".to_vec());
    File::create(tmp.path().join(&raw)).unwrap();
    touch(tmp.path(), "plain.log");
    let mirror = mirror(tmp.path(), r"(.*)\.txt$:$1.md");

    let entries = mirror.list_all(&VirtualPath::root()).unwrap();
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().any(|e| e.name == raw));
    assert_eq!(
        mirror.resolve(&VirtualPath::new(&raw)).unwrap(),
        tmp.path().join(&raw)
    );
    assert_round_trip(&mirror, "");
}

//! Extended attribute passthrough.
//!
//! Attributes are read from the real entry without following symlinks. A
//! requested size of zero asks only for the size of the value, which is the
//! size query protocol FUSE uses.

use std::ffi::{CString, OsStr};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Answer to an xattr request.
#[derive(Debug, PartialEq, Eq)]
pub enum XattrReply {
    /// Answer to a size query.
    Size(u32),
    Data(Vec<u8>),
}

fn c_string(bytes: &[u8]) -> io::Result<CString> {
    CString::new(bytes).map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))
}

/// Runs one xattr syscall in size-query or fetch mode.
fn call(size: u32, f: impl FnOnce(*mut libc::c_void, usize) -> libc::ssize_t) -> io::Result<XattrReply> {
    if size == 0 {
        let n = f(std::ptr::null_mut(), 0);
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        let n = u32::try_from(n).map_err(|_| io::Error::from_raw_os_error(libc::E2BIG))?;
        return Ok(XattrReply::Size(n));
    }

    let mut buf = vec![0u8; size as usize];
    let n = f(buf.as_mut_ptr().cast(), buf.len());
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    buf.truncate(n.unsigned_abs());
    Ok(XattrReply::Data(buf))
}

#[cfg(target_os = "linux")]
unsafe fn sys_getxattr(
    path: *const libc::c_char,
    name: *const libc::c_char,
    buf: *mut libc::c_void,
    len: usize,
) -> libc::ssize_t {
    // SAFETY: forwarded from the caller.
    unsafe { libc::lgetxattr(path, name, buf, len) }
}

#[cfg(target_os = "macos")]
unsafe fn sys_getxattr(
    path: *const libc::c_char,
    name: *const libc::c_char,
    buf: *mut libc::c_void,
    len: usize,
) -> libc::ssize_t {
    // SAFETY: forwarded from the caller.
    unsafe { libc::getxattr(path, name, buf, len, 0, libc::XATTR_NOFOLLOW) }
}

#[cfg(target_os = "linux")]
unsafe fn sys_listxattr(path: *const libc::c_char, buf: *mut libc::c_char, len: usize) -> libc::ssize_t {
    // SAFETY: forwarded from the caller.
    unsafe { libc::llistxattr(path, buf, len) }
}

#[cfg(target_os = "macos")]
unsafe fn sys_listxattr(path: *const libc::c_char, buf: *mut libc::c_char, len: usize) -> libc::ssize_t {
    // SAFETY: forwarded from the caller.
    unsafe { libc::listxattr(path, buf, len, libc::XATTR_NOFOLLOW) }
}

/// Reads attribute `name` of `path`.
pub fn get(path: &Path, name: &OsStr, size: u32) -> io::Result<XattrReply> {
    let c_path = c_string(path.as_os_str().as_bytes())?;
    let c_name = c_string(name.as_bytes())?;

    // SAFETY: both strings are NUL-terminated and `buf` is null with
    // `len == 0` or points to `len` writable bytes.
    call(size, |buf, len| unsafe {
        sys_getxattr(c_path.as_ptr(), c_name.as_ptr(), buf, len)
    })
}

/// Lists attribute names of `path` as NUL-separated bytes.
pub fn list(path: &Path, size: u32) -> io::Result<XattrReply> {
    let c_path = c_string(path.as_os_str().as_bytes())?;

    // SAFETY: as in `get`.
    call(size, |buf, len| unsafe {
        sys_listxattr(c_path.as_ptr(), buf.cast(), len)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_list_size_query_on_plain_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f");
        std::fs::write(&path, b"x").unwrap();

        // Filesystems without xattr support answer ENOTSUP; both are fine
        match list(&path, 0) {
            Ok(XattrReply::Size(_)) => {}
            Ok(other) => panic!("unexpected reply: {other:?}"),
            Err(e) => assert_eq!(e.raw_os_error(), Some(libc::ENOTSUP)),
        }
    }

    #[test]
    fn test_missing_attribute() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f");
        std::fs::write(&path, b"x").unwrap();

        let err = get(&path, OsStr::new("user.regexfs.missing"), 64).unwrap_err();
        assert!(err.raw_os_error().is_some());
    }

    #[test]
    fn test_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = list(&tmp.path().join("missing"), 0).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }

    #[test]
    fn test_interior_nul_rejected() {
        let err = get(Path::new("/tmp"), OsStr::new("user.a\0b"), 0).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
    }
}

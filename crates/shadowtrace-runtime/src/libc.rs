//! Minimal libc substitute.
//!
//! The core cannot call into the guest's own (possibly-instrumented) libc
//! without risking reentrancy, so it carries a small self-contained set of
//! primitives that go straight to syscalls via the real `libc` crate.
//! This is not a guest-visible libc — it exists only for the core's own
//! bookkeeping (env lookup, raw file and mapping operations, and a tiny
//! string toolkit) rather than reimplementing all of libc.

use std::ffi::{CStr, CString};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibcError {
    #[error("syscall failed: {0}")]
    Errno(i32),
    #[error("path contains an interior NUL byte")]
    InteriorNul,
}

fn check(ret: libc::c_long) -> Result<libc::c_long, LibcError> {
    if ret < 0 {
        Err(LibcError::Errno(-ret as i32))
    } else {
        Ok(ret)
    }
}

/// `strlen`, mirroring `VG_(strlen)`'s plain byte-scan (no SIMD, the
/// original avoids libc's own optimized version for the same reentrancy
/// reason noted above).
pub fn strlen(s: &[u8]) -> usize {
    s.iter().position(|&b| b == 0).unwrap_or(s.len())
}

/// `strcmp` over NUL-containing byte slices, mirroring `VG_(strcmp)`.
pub fn strcmp(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    let la = strlen(a);
    let lb = strlen(b);
    a[..la].cmp(&b[..lb])
}

/// Find the first occurrence of `needle` in `haystack`, both NUL-bounded,
/// mirroring `VG_(strstr)`.
pub fn strstr(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    let h = &haystack[..strlen(haystack)];
    let n = &needle[..strlen(needle)];
    if n.is_empty() {
        return Some(0);
    }
    h.windows(n.len()).position(|w| w == n)
}

/// Read an environment variable without going through the guest's libc,
/// mirroring `VG_(getenv)`'s direct scan of the process environ.
pub fn getenv(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// `mmap` a fresh anonymous, private region for the core's own bookkeeping
/// (shadow-map secondaries, the thread table's backing storage, etc).
///
/// # Safety
/// `len` must be nonzero; the returned pointer is valid for `len` bytes
/// until [`munmap`] is called on it with the same length.
pub unsafe fn mmap_anon(len: usize) -> Result<*mut u8, LibcError> {
    let ptr = libc::mmap(
        std::ptr::null_mut(),
        len,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        -1,
        0,
    );
    if ptr == libc::MAP_FAILED {
        Err(LibcError::Errno(*errno_location()))
    } else {
        Ok(ptr as *mut u8)
    }
}

/// # Safety
/// `ptr`/`len` must be the exact pair returned by a prior [`mmap_anon`].
pub unsafe fn munmap(ptr: *mut u8, len: usize) -> Result<(), LibcError> {
    check(libc::munmap(ptr as *mut libc::c_void, len) as libc::c_long).map(|_| ())
}

/// # Safety
/// `ptr`/`len` must describe a currently-mapped region.
pub unsafe fn mprotect(ptr: *mut u8, len: usize, prot: i32) -> Result<(), LibcError> {
    check(libc::mprotect(ptr as *mut libc::c_void, len, prot) as libc::c_long).map(|_| ())
}

/// Open a file for the core's own use (suppression files, logs, coredumps),
/// mirroring `VG_(open)`.
pub fn open(path: &str, flags: i32, mode: u32) -> Result<i32, LibcError> {
    let c_path = CString::new(path).map_err(|_| LibcError::InteriorNul)?;
    let fd = unsafe { libc::open(c_path.as_ptr(), flags, mode as libc::c_uint) };
    check(fd as libc::c_long).map(|fd| fd as i32)
}

pub fn close(fd: i32) -> Result<(), LibcError> {
    check(unsafe { libc::close(fd) } as libc::c_long).map(|_| ())
}

pub fn write(fd: i32, buf: &[u8]) -> Result<usize, LibcError> {
    let n = unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
    check(n as libc::c_long).map(|n| n as usize)
}

pub fn read(fd: i32, buf: &mut [u8]) -> Result<usize, LibcError> {
    let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
    check(n as libc::c_long).map(|n| n as usize)
}

fn errno_location() -> *mut i32 {
    unsafe { libc::__errno_location() }
}

/// Build a `&CStr` view over a NUL-terminated byte slice without
/// allocating, mirroring `VG_(sprintf)`-adjacent helpers that hand a raw
/// buffer onward to a syscall expecting a C string.
pub fn as_cstr(buf: &[u8]) -> Option<&CStr> {
    CStr::from_bytes_until_nul(buf).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strlen_stops_at_nul() {
        assert_eq!(strlen(b"hi\0garbage"), 2);
    }

    #[test]
    fn strcmp_orders_like_std_slice_cmp() {
        assert_eq!(strcmp(b"abc\0", b"abd\0"), std::cmp::Ordering::Less);
        assert_eq!(strcmp(b"abc\0", b"abc\0"), std::cmp::Ordering::Equal);
    }

    #[test]
    fn strstr_finds_substring_before_nul() {
        assert_eq!(strstr(b"hello world\0", b"world\0"), Some(6));
        assert_eq!(strstr(b"hello\0", b"xyz\0"), None);
    }

    #[test]
    fn strstr_empty_needle_matches_at_zero() {
        assert_eq!(strstr(b"hello\0", b"\0"), Some(0));
    }

    #[test]
    fn mmap_then_munmap_roundtrips() {
        unsafe {
            let ptr = mmap_anon(4096).expect("mmap");
            assert!(!ptr.is_null());
            munmap(ptr, 4096).expect("munmap");
        }
    }

    #[test]
    fn open_nonexistent_file_reports_errno() {
        let err = open("/nonexistent/shadowtrace/path", libc::O_RDONLY, 0);
        assert!(err.is_err());
    }
}

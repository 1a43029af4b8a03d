//! The seam between the allocator and the kernel: page size, program
//! break, and anonymous mappings. Every other module reaches the
//! kernel only through here.

use std::fmt;
use std::ptr;

use libc::{c_void, intptr_t};
use log::warn;

/// A platform call failed. Never crosses the crate's public API —
/// callers only ever see a null pointer — but gives the internal
/// logging a concrete cause to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlatformError {
  /// `sbrk` refused to advance the program break.
  BreakExhausted,
  /// `mmap` could not satisfy an anonymous mapping request.
  MapFailed,
}

impl fmt::Display for PlatformError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      PlatformError::BreakExhausted => write!(f, "program break could not be advanced"),
      PlatformError::MapFailed => write!(f, "anonymous mapping request failed"),
    }
  }
}

impl std::error::Error for PlatformError {}

/// Queries the system page size. Always a power of two.
pub(crate) fn page_size() -> usize {
  unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

/// Advances the program break by exactly `bytes` (must be a positive
/// multiple of the page size) and returns the *previous* break.
pub(crate) fn grow_break(bytes: usize) -> Result<*mut u8, PlatformError> {
  debug_assert!(bytes > 0);
  let prev = unsafe { libc::sbrk(bytes as intptr_t) };
  if prev as isize == -1 {
    warn!("sbrk({bytes}) failed: address space exhausted");
    return Err(PlatformError::BreakExhausted);
  }
  Ok(prev as *mut u8)
}

/// Requests an anonymous, private, read-write mapping of `bytes`
/// (must be a page multiple).
pub(crate) fn map_anonymous(bytes: usize) -> Result<*mut u8, PlatformError> {
  debug_assert!(bytes > 0);
  let ptr = unsafe {
    libc::mmap(
      ptr::null_mut(),
      bytes,
      libc::PROT_READ | libc::PROT_WRITE,
      libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
      -1,
      0,
    )
  };
  if ptr == libc::MAP_FAILED {
    warn!("mmap({bytes}) failed: unable to satisfy anonymous mapping");
    return Err(PlatformError::MapFailed);
  }
  Ok(ptr as *mut u8)
}

/// Releases a mapping previously obtained from [`map_anonymous`].
/// Failure here has no observable effect on the caller (release
/// never fails) and is only logged.
pub(crate) fn unmap(
  addr: *mut u8,
  bytes: usize,
) {
  let rc = unsafe { libc::munmap(addr as *mut c_void, bytes) };
  if rc != 0 {
    warn!("munmap({addr:p}, {bytes}) failed");
  }
}

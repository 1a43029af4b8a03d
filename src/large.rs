//! The large-allocation path: requests at or above [`LARGE_THRESHOLD`]
//! bypass the heap entirely and are satisfied by a dedicated
//! anonymous mapping, large enough to also hold a one-word length
//! header immediately before the returned payload.
//!
//! This crate targets 64-bit hosts only, so the header is always a
//! single `usize` word; the reference implementation's 32-bit
//! two-word variant is not implemented (allowed by the spec this
//! crate follows).

use std::mem;
use std::ptr;

use crate::align::round_up;
use crate::platform;

/// Requests at or above this many bytes (after 8-byte rounding) are
/// routed through [`allocate`] instead of the small-object heap.
pub(crate) const LARGE_THRESHOLD: usize = 128 * 1024;

const HEADER: usize = mem::size_of::<usize>();

/// Maps a fresh region for a large allocation and returns a pointer
/// to its payload (just past the length header), or null on mapping
/// failure.
pub(crate) fn allocate(
  size: usize,
  page_size: usize,
) -> *mut u8 {
  let mapped_size = round_up(size + HEADER, page_size);
  match platform::map_anonymous(mapped_size) {
    Ok(base) => unsafe {
      ptr::write(base as *mut usize, mapped_size);
      base.add(HEADER)
    },
    Err(_) => ptr::null_mut(),
  }
}

/// Unmaps a large allocation given its payload pointer.
pub(crate) unsafe fn release(payload: *mut u8) {
  unsafe {
    let base = payload.sub(HEADER);
    let mapped_size = ptr::read(base as *const usize);
    platform::unmap(base, mapped_size);
  }
}

/// The payload capacity of a large allocation (the mapped region
/// minus its header), used by `resize` to determine how many bytes
/// to copy forward.
pub(crate) unsafe fn payload_capacity(payload: *mut u8) -> usize {
  unsafe {
    let base = payload.sub(HEADER);
    ptr::read(base as *const usize) - HEADER
  }
}

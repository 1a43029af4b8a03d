//! The header prepended to every block in the small-object heap.
//!
//! A block's liveness is not stored as a separate flag: `next == null`
//! *is* the "allocated" state (see the crate-level docs for the
//! trade-off this implies). A free block's `next` is always either
//! another free block or the end-of-heap sentinel, so it is never
//! null while the block is free.

use std::mem;
use std::ptr;

/// On-heap header preceding every block, free or allocated.
#[repr(C)]
pub(crate) struct Block {
  /// Payload size in bytes, excluding this header.
  pub length: usize,
  /// Previous free block, or null if this is `first_free`. Stale
  /// once the block is allocated.
  pub prev: *mut Block,
  /// Next free block, or the end-of-heap sentinel if this is
  /// `last_free`. Null iff the block is allocated.
  pub next: *mut Block,
}

impl Block {
  /// Size of the header itself, already a multiple of 8 on any
  /// platform where `usize` and pointers are 8 bytes.
  pub const HEADER_SIZE: usize = mem::size_of::<Block>();

  /// A block is free iff its `next` field is non-null.
  #[inline]
  pub fn is_free(&self) -> bool {
    !self.next.is_null()
  }

  /// Marks the block allocated in place.
  #[inline]
  pub fn mark_allocated(&mut self) {
    self.next = ptr::null_mut();
  }

  /// The address of this block's payload (just past the header).
  #[inline]
  pub fn payload(block: *mut Block) -> *mut u8 {
    unsafe { (block as *mut u8).add(Self::HEADER_SIZE) }
  }

  /// Recovers the block header from a payload pointer previously
  /// returned by [`Block::payload`].
  #[inline]
  pub fn from_payload(payload: *mut u8) -> *mut Block {
    unsafe { payload.sub(Self::HEADER_SIZE) as *mut Block }
  }

  /// The address-order successor of this block: the first byte past
  /// its payload, which is either another block's header or the
  /// current end of heap.
  #[inline]
  pub fn successor(block: *mut Block, length: usize) -> *mut Block {
    unsafe { (block as *mut u8).add(Self::HEADER_SIZE).add(length) as *mut Block }
  }

  /// Writes a fresh header at `at`, returning `at` unchanged.
  ///
  /// # Safety
  /// `at` must be valid for writes of `size_of::<Block>()` bytes and
  /// suitably aligned.
  pub unsafe fn write(
    at: *mut Block,
    length: usize,
    prev: *mut Block,
    next: *mut Block,
  ) -> *mut Block {
    unsafe {
      ptr::write(at, Block { length, prev, next });
    }
    at
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn header_size_is_word_aligned() {
    assert_eq!(Block::HEADER_SIZE % mem::size_of::<usize>(), 0);
  }

  #[test]
  fn payload_and_from_payload_round_trip() {
    let mut storage = vec![0u8; Block::HEADER_SIZE + 64];
    let block = storage.as_mut_ptr() as *mut Block;
    unsafe {
      Block::write(block, 64, ptr::null_mut(), ptr::null_mut());
      let payload = Block::payload(block);
      assert_eq!(Block::from_payload(payload), block);
    }
  }

  #[test]
  fn successor_accounts_for_header_and_length() {
    let mut storage = vec![0u8; Block::HEADER_SIZE + 64];
    let block = storage.as_mut_ptr() as *mut Block;
    let expected = unsafe { storage.as_mut_ptr().add(Block::HEADER_SIZE + 64) };
    assert_eq!(Block::successor(block, 64) as *mut u8, expected);
  }

  #[test]
  fn free_and_allocated_encoding() {
    let mut storage = vec![0u8; Block::HEADER_SIZE];
    let block = storage.as_mut_ptr() as *mut Block;
    unsafe {
      Block::write(block, 0, ptr::null_mut(), block);
      assert!((*block).is_free());
      (*block).mark_allocated();
      assert!(!(*block).is_free());
    }
  }
}

//! The process-wide small-object heap: lazy initialization, the
//! growth protocol, and the first-fit/split/coalesce allocation and
//! release paths. Everything here runs under a single mutex (see the
//! crate-level docs for the concurrency model).

use std::ptr;
use std::sync::Mutex;

use log::{debug, trace, warn};

use crate::align::round_up;
use crate::block::Block;
use crate::freelist::{FirstFit, FreeList};
use crate::large;
use crate::platform;

/// Heap growth requests are rounded up to a multiple of this many
/// pages, so small successive growth spurts don't each cost a
/// separate `sbrk` call.
const GROWTH_QUANTUM_PAGES: usize = 4;

/// A split is only worth doing if the leftover free block could
/// still hold a header plus a minimal 8-byte payload; otherwise the
/// whole block is handed to the caller.
const MIN_SPLIT_RESIDUE: usize = Block::HEADER_SIZE + 8;

/// The process-wide heap. `None` until the first call to
/// [`allocate`]/[`zero_allocate`]/[`resize`]; `release` never forces
/// initialization (mirroring the reference: freeing a pointer that
/// could only have come from a large mapping doesn't need a heap).
static HEAP: Mutex<Option<HeapState>> = Mutex::new(None);

/// All process-wide heap state guarded by [`HEAP`].
struct HeapState {
  page_size: usize,
  heap_start: usize,
  heap_end: usize,
  free: FreeList,
}

impl HeapState {
  /// Installs the first page of heap as one large free block.
  fn init() -> Result<Self, platform::PlatformError> {
    let page_size = platform::page_size();
    let prev = platform::grow_break(page_size)?;
    let heap_start = prev as usize;
    let heap_end = heap_start + page_size;
    let node = prev as *mut Block;
    unsafe {
      Block::write(node, page_size - Block::HEADER_SIZE, ptr::null_mut(), heap_end as *mut Block);
    }
    debug!("heap initialized: start={heap_start:#x} end={heap_end:#x} page_size={page_size}");
    Ok(Self { page_size, heap_start, heap_end, free: FreeList::singleton(node) })
  }

  #[inline]
  fn sentinel(&self) -> *mut Block {
    self.heap_end as *mut Block
  }

  #[inline]
  fn contains(
    &self,
    ptr: *mut u8,
  ) -> bool {
    let addr = ptr as usize;
    addr >= self.heap_start && addr < self.heap_end
  }

  /// Advances the program break by at least `need` bytes, rounded up
  /// to a whole number of growth quanta. Returns the number of pages
  /// added.
  fn grow(
    &mut self,
    need: usize,
  ) -> Result<usize, platform::PlatformError> {
    let pages = round_up(need, self.page_size) / self.page_size;
    let pages = round_up(pages, GROWTH_QUANTUM_PAGES);
    let bytes = pages * self.page_size;
    platform::grow_break(bytes)?;
    self.heap_end += bytes;
    debug!("heap grown by {pages} page(s), new end={:#x}", self.heap_end);
    Ok(pages)
  }

  /// Carves `size` bytes out of free block `block` (whose free-list
  /// predecessor is `prev`), either splitting off a free remainder or
  /// absorbing the whole block, and returns the allocated payload.
  fn split_or_absorb(
    &mut self,
    prev: *mut Block,
    block: *mut Block,
    size: usize,
  ) -> *mut u8 {
    let length = unsafe { (*block).length };
    let next = unsafe { (*block).next };
    let remainder = length - size;
    let heap_end = self.sentinel();

    if remainder >= MIN_SPLIT_RESIDUE {
      let new_free = Block::successor(block, size);
      let new_len = remainder - Block::HEADER_SIZE;
      unsafe {
        Block::write(new_free, new_len, prev, next);
      }
      self.free.link_node(prev, new_free, next, heap_end);
      unsafe {
        (*block).length = size;
        (*block).mark_allocated();
      }
      trace!("allocate: split block, remainder={new_len}");
    } else {
      self.free.unlink_between(prev, next, heap_end);
      unsafe {
        (*block).mark_allocated();
      }
      trace!("allocate: absorbed whole block, length={length}");
      if self.free.last.is_null() {
        self.repair_empty_free_list();
      }
    }

    Block::payload(block)
  }

  /// Invariant (1) requires the free list to never be empty at rest.
  /// If absorbing the sole free block emptied it, grow immediately
  /// and install a fresh trailing free block.
  fn repair_empty_free_list(&mut self) {
    let sentinel = self.sentinel();
    match self.grow(GROWTH_QUANTUM_PAGES * self.page_size) {
      Ok(pages) => {
        let added = pages * self.page_size;
        let at = sentinel as *mut Block;
        let new_sentinel = self.sentinel();
        unsafe {
          Block::write(at, added - Block::HEADER_SIZE, ptr::null_mut(), new_sentinel);
        }
        self.free.first = at;
        self.free.last = at;
      }
      Err(_) => {
        warn!("could not re-establish a free block after absorbing the last one");
      }
    }
  }

  /// The small-object allocation path (§4.5): first-fit, then split
  /// or absorb, growing the heap if nothing fits.
  fn allocate_small(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    let sentinel = self.sentinel();
    match self.free.search_first_fit(size, sentinel) {
      FirstFit::Found { prev, block } => self.split_or_absorb(prev, block, size),
      FirstFit::NotFound { tail } => self.grow_and_allocate(tail, size),
    }
  }

  fn grow_and_allocate(
    &mut self,
    tail: *mut Block,
    size: usize,
  ) -> *mut u8 {
    let old_sentinel = self.sentinel();
    let tail_adjacent = unsafe { Block::successor(tail, (*tail).length) } == old_sentinel;

    if tail_adjacent {
      let length = unsafe { (*tail).length };
      let need = size + Block::HEADER_SIZE - length;
      let pages = match self.grow(need) {
        Ok(pages) => pages,
        Err(_) => return ptr::null_mut(),
      };
      let added = pages * self.page_size;
      let new_sentinel = self.sentinel();
      unsafe {
        (*tail).length += added;
        (*tail).next = new_sentinel;
      }
      let prev = unsafe { (*tail).prev };
      self.split_or_absorb(prev, tail, size)
    } else {
      let pages = match self.grow(size + Block::HEADER_SIZE) {
        Ok(pages) => pages,
        Err(_) => return ptr::null_mut(),
      };
      let added = pages * self.page_size;
      let at = old_sentinel;
      let new_sentinel = self.sentinel();
      unsafe {
        Block::write(at, added - Block::HEADER_SIZE, tail, new_sentinel);
      }
      self.free.link_node(tail, at, new_sentinel, new_sentinel);
      self.split_or_absorb(tail, at, size)
    }
  }

  /// The release path (§4.6): three address-based cases, each with a
  /// merge and a non-merge sub-case.
  fn release_small(
    &mut self,
    payload: *mut u8,
  ) {
    let block = Block::from_payload(payload);
    let heap_end = self.sentinel();
    let last = self.free.last;
    let first = self.free.first;

    if (block as usize) > (last as usize) {
      let last_end = unsafe { Block::successor(last, (*last).length) };
      if last_end == block {
        unsafe {
          (*last).length += Block::HEADER_SIZE + (*block).length;
        }
        trace!("release: case A merge into last_free");
      } else {
        unsafe {
          (*block).prev = last;
          (*block).next = heap_end;
          (*last).next = block;
        }
        self.free.last = block;
        trace!("release: case A append");
      }
    } else if (block as usize) < (first as usize) {
      let block_end = unsafe { Block::successor(block, (*block).length) };
      if block_end == first {
        unsafe {
          (*block).length += Block::HEADER_SIZE + (*first).length;
          let first_next = (*first).next;
          (*block).next = first_next;
          if first_next != heap_end {
            (*first_next).prev = block;
          } else {
            self.free.last = block;
          }
        }
        trace!("release: case B merge into first_free");
      } else {
        unsafe {
          (*block).next = first;
          (*first).prev = block;
        }
        trace!("release: case B prepend");
      }
      unsafe {
        (*block).prev = ptr::null_mut();
      }
      self.free.first = block;
    } else {
      let block_len = unsafe { (*block).length };
      let succ = Block::successor(block, block_len);
      let succ_next = unsafe { (*succ).next };

      let predecessor = if !succ_next.is_null() {
        let predecessor = unsafe { (*succ).prev };
        let absorbed = Block::HEADER_SIZE + unsafe { (*succ).length };
        unsafe {
          (*block).length += absorbed;
        }
        if succ_next == heap_end {
          self.free.last = block;
        } else {
          unsafe { (*succ_next).prev = block };
        }
        unsafe {
          (*block).next = succ_next;
        }
        trace!("release: case C merged with free successor");
        predecessor
      } else {
        let (p, n) = self.free.find_enclosing(block as usize, self.heap_start, self.heap_end);
        unsafe {
          (*block).next = n;
          (*n).prev = block;
        }
        trace!("release: case C spliced before successor");
        p
      };

      let predecessor_end = unsafe { Block::successor(predecessor, (*predecessor).length) };
      if predecessor_end == block {
        let block_next = unsafe { (*block).next };
        let extra = Block::HEADER_SIZE + unsafe { (*block).length };
        self.free.merge_right(predecessor, block_next, extra, heap_end);
        trace!("release: case C merged forward into predecessor");
      } else {
        unsafe {
          (*predecessor).next = block;
          (*block).prev = predecessor;
        }
      }
    }
  }
}

fn with_heap<R>(f: impl FnOnce(&mut HeapState) -> Option<R>) -> Option<R> {
  let mut guard = HEAP.lock().unwrap();
  if guard.is_none() {
    match HeapState::init() {
      Ok(state) => *guard = Some(state),
      Err(_) => return None,
    }
  }
  f(guard.as_mut().unwrap())
}

/// Allocates `size` bytes and returns a payload pointer aligned to 8
/// bytes, or null on a zero-sized request or kernel exhaustion.
///
/// # Safety
///
/// The returned pointer, once non-null, must be passed to [`release`]
/// or [`resize`] at most once and only after the caller has stopped
/// using it for the size actually granted; writing past the rounded
/// allocation size is undefined behavior.
pub unsafe fn allocate(size: usize) -> *mut u8 {
  if size == 0 {
    trace!("allocate(0) -> null");
    return ptr::null_mut();
  }
  let size = round_up(size, 8);

  if size >= large::LARGE_THRESHOLD {
    let page_size = with_heap(|state| Some(state.page_size)).unwrap_or_else(platform::page_size);
    return large::allocate(size, page_size);
  }

  with_heap(|state| Some(state.allocate_small(size))).unwrap_or(ptr::null_mut())
}

/// Releases a pointer previously returned by [`allocate`],
/// [`zero_allocate`], or [`resize`]. A no-op on a null pointer.
///
/// # Safety
///
/// `ptr` must either be null or a pointer previously returned by one
/// of this crate's allocation functions, not already released, and
/// not currently aliased by any other live reference.
pub unsafe fn release(ptr: *mut u8) {
  if ptr.is_null() {
    return;
  }
  let mut guard = HEAP.lock().unwrap();
  match guard.as_mut() {
    Some(state) if state.contains(ptr) => state.release_small(ptr),
    _ => unsafe { large::release(ptr) },
  }
}

/// Allocates space for `nmemb` elements of `elem_size` bytes each,
/// zero-initialized. Returns null if either count is zero or their
/// product overflows `usize`.
///
/// # Safety
///
/// Same obligations as [`allocate`] apply to the returned pointer.
pub unsafe fn zero_allocate(
  nmemb: usize,
  elem_size: usize,
) -> *mut u8 {
  let real_size = match nmemb.checked_mul(elem_size) {
    Some(0) | None => {
      trace!("zero_allocate({nmemb}, {elem_size}) -> null");
      return ptr::null_mut();
    }
    Some(n) => n,
  };

  let ptr = unsafe { allocate(real_size) };
  if !ptr.is_null() {
    unsafe {
      ptr::write_bytes(ptr, 0, real_size);
    }
  }
  ptr
}

/// Resizes the allocation at `ptr` to `new_size` bytes, preserving
/// the leading `min(old, new)` bytes. The returned pointer always
/// differs from `ptr` on success; returns null if `ptr` was null
/// (equivalent to `allocate`), if `new_size` is zero (equivalent to
/// `release`), or on exhaustion (in which case `ptr` is left intact).
///
/// # Safety
///
/// `ptr` must either be null or a pointer previously returned by one
/// of this crate's allocation functions and not already released;
/// the returned pointer carries the same obligations as [`allocate`].
pub unsafe fn resize(
  ptr: *mut u8,
  new_size: usize,
) -> *mut u8 {
  if ptr.is_null() {
    return unsafe { allocate(new_size) };
  }
  if new_size == 0 {
    unsafe { release(ptr) };
    return ptr::null_mut();
  }

  let old_len = payload_len(ptr);
  let new_ptr = unsafe { allocate(new_size) };
  if new_ptr.is_null() {
    return ptr::null_mut();
  }

  let copy_len = old_len.min(new_size);
  unsafe {
    ptr::copy_nonoverlapping(ptr, new_ptr, copy_len);
  }
  unsafe { release(ptr) };
  new_ptr
}

fn payload_len(ptr: *mut u8) -> usize {
  let guard = HEAP.lock().unwrap();
  match guard.as_ref() {
    Some(state) if state.contains(ptr) => unsafe { (*Block::from_payload(ptr)).length },
    _ => unsafe { large::payload_capacity(ptr) },
  }
}

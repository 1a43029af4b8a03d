//! End-to-end scenarios exercising the four public operations against
//! the real process-wide heap (no mocking of `sbrk`/`mmap`).

use std::ptr;

use rallocator::{allocate, release, resize, zero_allocate};

#[test]
fn scenario_small_alloc_release_cycle() {
  unsafe {
    let a = allocate(40);
    assert!(!a.is_null());
    ptr::write_bytes(a, 0x11, 40);
    release(a);

    let b = allocate(40);
    assert!(!b.is_null());
    assert_eq!(a, b, "releasing then re-requesting the same size should reuse the block");
    release(b);
  }
}

#[test]
fn scenario_split_then_coalesce() {
  // Carve three adjacent blocks out of one larger free region, then
  // free the middle one and its neighbors in an order that forces
  // every coalescing case (A/B/C) to fire at least once.
  unsafe {
    let a = allocate(32);
    let b = allocate(32);
    let c = allocate(32);
    assert!(!a.is_null() && !b.is_null() && !c.is_null());

    release(b); // isolated free block between two allocated neighbors
    release(a); // merges forward with b (case adjacent-to-first_free)
    release(c); // merges backward with the coalesced a+b region

    // A single allocation spanning roughly the combined region should
    // now succeed without growing the heap.
    let big = allocate(32 * 3);
    assert!(!big.is_null());
    release(big);
  }
}

#[test]
fn scenario_heap_growth_on_exhaustion() {
  // Request something larger than a single page but well under the
  // large-object threshold, forcing at least one growth step.
  unsafe {
    let p = allocate(64 * 1024);
    assert!(!p.is_null());
    ptr::write_bytes(p, 0x22, 64 * 1024);
    assert_eq!(*p, 0x22);
    release(p);
  }
}

#[test]
fn scenario_large_path_round_trip() {
  let size = 256 * 1024;
  unsafe {
    let p = allocate(size);
    assert!(!p.is_null());
    assert_eq!(p as usize % 8, 0);
    ptr::write_bytes(p, 0x33, size);
    assert_eq!(*p, 0x33);
    assert_eq!(*p.add(size - 1), 0x33);
    release(p);
  }
}

#[test]
fn scenario_resize_grows_and_preserves_prefix() {
  unsafe {
    let p = allocate(16);
    assert!(!p.is_null());
    for i in 0..16u8 {
      *p.add(i as usize) = i;
    }

    let q = resize(p, 4096);
    assert!(!q.is_null());
    assert_ne!(p, q, "resize must never return the same address as the input");
    for i in 0..16u8 {
      assert_eq!(*q.add(i as usize), i);
    }
    release(q);
  }
}

#[test]
fn scenario_resize_across_the_large_threshold() {
  unsafe {
    let p = allocate(64);
    assert!(!p.is_null());
    ptr::write_bytes(p, 0x44, 64);

    let q = resize(p, 200 * 1024);
    assert!(!q.is_null());
    for i in 0..64 {
      assert_eq!(*q.add(i), 0x44);
    }
    release(q);
  }
}

#[test]
fn zero_allocate_yields_zeroed_memory_of_the_right_size() {
  unsafe {
    let p = zero_allocate(10, 8);
    assert!(!p.is_null());
    for i in 0..80 {
      assert_eq!(*p.add(i), 0);
    }
    release(p);
  }
}

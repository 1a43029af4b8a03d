//! Scenario 6: many threads hammering allocate/release concurrently.
//! Not a correctness oracle by itself (no single-threaded reference
//! to diff against), but it exercises the mutex-guarded paths under
//! real contention and catches gross corruption (crashes, corrupted
//! headers making later allocations fail or alias).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use rallocator::{allocate, release};

#[test]
fn many_threads_allocate_and_release_without_corrupting_the_heap() {
  const THREADS: usize = 8;
  const ITERATIONS: usize = 500;

  let successes = Arc::new(AtomicUsize::new(0));
  let mut handles = Vec::new();

  for t in 0..THREADS {
    let successes = Arc::clone(&successes);
    handles.push(thread::spawn(move || {
      let mut live = Vec::new();
      for i in 0..ITERATIONS {
        let size = 8 + ((t * 37 + i * 13) % 512);
        unsafe {
          let p = allocate(size);
          if p.is_null() {
            continue;
          }
          std::ptr::write_bytes(p, (t & 0xff) as u8, size);
          live.push((p, size));
          successes.fetch_add(1, Ordering::Relaxed);

          if live.len() > 16 {
            let (old_ptr, old_size) = live.remove(0);
            for i in 0..old_size {
              assert_eq!(*old_ptr.add(i), (t & 0xff) as u8, "a live block was corrupted by another thread");
            }
            release(old_ptr);
          }
        }
      }
      for (p, size) in live {
        unsafe {
          for i in 0..size {
            assert_eq!(*p.add(i), (t & 0xff) as u8);
          }
          release(p);
        }
      }
    }));
  }

  for h in handles {
    h.join().expect("worker thread panicked");
  }

  assert!(successes.load(Ordering::Relaxed) > 0);
}

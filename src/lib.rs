//! # rallocator - A General-Purpose Memory Allocator
//!
//! This crate provides a `malloc`/`free`-style allocator backed by
//! `sbrk` for ordinary small objects and `mmap` for large ones, with
//! a single process-wide free list and a first-fit, split-and-coalesce
//! placement strategy.
//!
//! ## Overview
//!
//! ```text
//!   Small-object heap (grown with sbrk):
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         HEAP MEMORY                                  │
//!   │                                                                      │
//!   │   ┌─────┬──────────┬─────┬──────────┬─────┬─────────────────────┐   │
//!   │   │ A1  │  free F1 │ A2  │  free F2  │ A3  │     free (tail)     │   │
//!   │   └─────┴──────────┴─────┴──────────┴─────┴─────────────────────┘   │
//!   │          ▲                     ▲                        ▲           │
//!   │       first_free          (address order)           last_free       │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Large requests (>= 128 KiB) skip this heap entirely and get their
//!   own anonymous mmap mapping, returned and released independently.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rallocator
//!   ├── align      - Alignment helpers (align!, round_up)
//!   ├── block      - On-heap block header (internal)
//!   ├── platform   - sbrk/mmap/munmap/page-size seam (internal)
//!   ├── freelist   - Address-ordered free list primitives (internal)
//!   ├── heap       - Singleton heap state, growth, allocate/release
//!   ├── large      - The mmap-backed large-object path (internal)
//!   └── global     - GlobalAlloc adapter
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rallocator::{allocate, release};
//!
//! fn main() {
//!     unsafe {
//!         let ptr = allocate(64);
//!         assert!(!ptr.is_null());
//!         *ptr = 42;
//!         release(ptr);
//!     }
//! }
//! ```
//!
//! Installing it as the process-wide allocator:
//!
//! ```rust,ignore
//! use rallocator::GlobalAllocator;
//!
//! #[global_allocator]
//! static ALLOCATOR: GlobalAllocator = GlobalAllocator;
//! ```
//!
//! ## How It Works
//!
//! Every block in the small-object heap carries a header:
//!
//! ```text
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │         User Data               │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ length: N       │  │  ┌──────────────────────────┐  │
//!   │  │ prev: *mut      │  │  │                          │  │
//!   │  │ next: *mut/null │  │  │     N bytes usable       │  │
//!   │  └─────────────────┘  │  │                          │  │
//!   │      24 bytes         │  └──────────────────────────┘  │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to the caller
//! ```
//!
//! A block's liveness is folded into its own header instead of a
//! separate flag: `next == null` means allocated, any other value
//! means free (either another free block or the end-of-heap
//! sentinel). This keeps the header at three words instead of four.
//!
//! ## Features
//!
//! - **First-fit placement** with splitting and address-order
//!   coalescing (adjacent free neighbors merge in every case).
//! - **Large-object bypass**: requests at or above 128 KiB get their
//!   own `mmap` region instead of competing for heap space.
//! - **Single global mutex**: every observable mutation of heap state,
//!   and every read that depends on it, happens under one lock.
//! - **Unix-only**: requires `libc` and `sbrk`/`mmap` (POSIX systems).
//!
//! ## Safety
//!
//! This crate is inherently unsafe, as it deals with raw memory
//! management. The public functions accept and return raw pointers;
//! callers are responsible for respecting ordinary allocator
//! discipline (no double-free, no use-after-free, no foreign
//! pointers).

pub mod align;
mod block;
mod freelist;
mod global;
mod heap;
mod large;
mod platform;

pub use global::GlobalAllocator;
pub use heap::{allocate, release, resize, zero_allocate};

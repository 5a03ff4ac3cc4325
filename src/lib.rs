//! # cpualloc - a per-CPU bitmap-block allocator
//!
//! This crate is a drop-in replacement for the two primitives every libc
//! allocator ultimately boils down to: `allocate(size) -> pointer | null`
//! and `deallocate(pointer)`. Memory comes straight from the operating
//! system via anonymous page mappings — there is no intermediate `malloc`
//! to lean on.
//!
//! ## Overview
//!
//! Three layers, leaf to root:
//!
//! ```text
//!   cpualloc
//!   ├── heap   - BitmapAllocator: one heap region + its bitmap
//!   ├── arena  - Arena: a BitmapAllocator behind a mutex + a load counter
//!   └── front  - the arena table, thread-to-arena policy, public API
//! ```
//!
//! A `BitmapAllocator` owns a contiguous, page-aligned heap region and a
//! dense bit-vector covering it, one bit per 16-byte block. Allocating walks
//! the bitmap for the first run of clear bits big enough for the request
//! (growing the heap by remapping on a miss); deallocating clears those
//! bits back. Each live allocation carries its logical size in an in-band
//! header word immediately before the pointer handed back to the caller.
//!
//! ```text
//!   One allocation:
//!   ┌────────────────┬──────────────────────────────────┐
//!   │  header (size) │             user data             │
//!   └────────────────┴──────────────────────────────────┘
//!                     ▲
//!                     └── pointer returned to the caller
//! ```
//!
//! An `Arena` wraps one `BitmapAllocator` in a mutex and tracks a rough
//! "blocks in use" counter, used only to steer oversized requests toward a
//! lightly loaded arena. The front-end keeps one arena per logical CPU,
//! pins each thread to an arena by round robin on first use (to spread
//! contention and keep small allocations cache-local), and for
//! `deallocate` finds the owning arena by checking which one's heap range
//! contains the pointer.
//!
//! ## Quick Start
//!
//! ```
//! use cpualloc::{allocate, deallocate};
//!
//! unsafe {
//!     let p = allocate(100);
//!     assert!(!p.is_null());
//!
//!     std::ptr::write_bytes(p, 0xAB, 100);
//!
//!     deallocate(p);
//! }
//! ```
//!
//! A [`GlobalAlloc`](std::alloc::GlobalAlloc) adapter, [`SystemArenaAlloc`],
//! is also provided for installing this as `#[global_allocator]`.
//!
//! ## Limitations
//!
//! - No coalescing beyond what the bitmap gives for free, no returning
//!   memory to the OS, no alignment stronger than the native word size.
//! - No `realloc`, `calloc`, or aligned-alloc.
//! - Heap growth is a full relocation: extending an arena's heap copies its
//!   contents to a new mapping and unmaps the old one. A pointer into a
//!   block that existed before growth and is still live stays correct only
//!   because `extend` runs with that arena's lock held and no other thread
//!   can be mid-dereference of an address the grower is about to invalidate
//!   — but the *old* heap mapping is genuinely gone afterward, so any
//!   pointer value cached outside this crate's own bookkeeping and compared
//!   against stale bounds should not be trusted across a growth event. This
//!   mirrors the allocator this crate is modeled on; there is no
//!   coalescing-free way to extend a bitmap-backed region in place once an
//!   unrelated mapping already sits past its end.
//!
//! ## Safety
//!
//! This crate is inherently unsafe: both entry points trade in raw
//! pointers backed by memory this crate mapped directly from the OS.

mod align;
mod arena;
mod bitmap;
mod block;
pub mod config;
mod error;
mod front;
mod global_alloc;
mod heap;
mod os;

pub use error::AllocError;
pub use front::{allocate, deallocate};
pub use global_alloc::SystemArenaAlloc;

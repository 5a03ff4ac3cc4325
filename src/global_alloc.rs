//! An optional [`std::alloc::GlobalAlloc`] adapter over the two-symbol
//! surface in `front.rs`. Not part of the required public contract (see
//! SPEC_FULL.md section 6), but free to provide: the in-band header already
//! stores the size `dealloc`'s `Layout` argument would otherwise need.

use std::alloc::{GlobalAlloc, Layout};

use crate::front;

/// Installs the per-CPU bitmap-arena allocator as the process's global allocator:
///
/// ```rust,ignore
/// #[global_allocator]
/// static ALLOCATOR: cpualloc::SystemArenaAlloc = cpualloc::SystemArenaAlloc;
/// ```
///
/// Per spec.md's non-goals, alignment stronger than the native word size is
/// not supported; such a request is refused rather than silently
/// under-aligned.
pub struct SystemArenaAlloc;

unsafe impl GlobalAlloc for SystemArenaAlloc {
  unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
    if layout.align() > std::mem::size_of::<usize>() {
      return std::ptr::null_mut();
    }
    unsafe { front::allocate(layout.size()) }
  }

  unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
    unsafe { front::deallocate(ptr) };
  }
}

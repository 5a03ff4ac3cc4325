//! One independent allocator instance: a [`crate::heap::BitmapAllocator`]
//! behind a mutex, plus a rough load counter used only to pick a
//! lightly-loaded arena for oversized requests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use crate::block::HEADER_SIZE;
use crate::config::{BLOCK_SIZE, HEAP_SIZE};
use crate::error::AllocError;
use crate::heap::BitmapAllocator;

struct ArenaInner {
  allocator: BitmapAllocator,
  allocated_blocks: usize,
}

pub(crate) struct Arena {
  inner: Mutex<ArenaInner>,
  // Mirrors of the locked heap bounds, updated under `inner`'s lock whenever
  // the heap is (re)mapped. Lets the front-end's cross-arena pointer lookup
  // (`owning_arena`) rule an arena in or out without taking its lock, the
  // way spec.md section 5 describes arena-table reads needing no
  // synchronization once published. A stale (too-small) read only ever
  // under-reports the range, which is safe: growth only adds blocks no
  // pointer has been issued into yet.
  heap_base: AtomicPtr<u8>,
  heap_bytes: AtomicUsize,
}

impl Arena {
  pub(crate) fn new() -> Result<Self, AllocError> {
    let allocator = BitmapAllocator::new(HEAP_SIZE)?;
    let heap_base = AtomicPtr::new(allocator.heap_base());
    let heap_bytes = AtomicUsize::new(allocator.heap_bytes());

    Ok(Self { inner: Mutex::new(ArenaInner { allocator, allocated_blocks: 0 }), heap_base, heap_bytes })
  }

  /// Cheap, lock-free range check using the last-published heap bounds.
  pub(crate) fn might_contain(&self, ptr: *mut u8) -> bool {
    let lo = self.heap_base.load(Ordering::Acquire) as usize;
    let hi = lo + self.heap_bytes.load(Ordering::Acquire);
    let p = ptr as usize;
    p >= lo && p < hi
  }

  /// Advisory load signal: bytes currently marked used, for large-allocation balancing.
  pub(crate) fn used_bytes(&self) -> usize {
    let guard = self.inner.lock().unwrap();
    guard.allocated_blocks * BLOCK_SIZE
  }

  /// Total heap capacity in bytes, snapshotted under the lock.
  pub(crate) fn heap_bytes(&self) -> usize {
    self.inner.lock().unwrap().allocator.heap_bytes()
  }

  /// Implements the allocate / grow / retry sequence from spec.md section 4.2.
  pub(crate) fn try_allocate(&self, size: usize) -> Option<*mut u8> {
    let total = size.checked_add(HEADER_SIZE)?;
    let blocks_needed = total.div_ceil(BLOCK_SIZE);

    let mut guard = self.inner.lock().unwrap();

    let start = match guard.allocator.find_free_run(blocks_needed) {
      Some(start) => start,
      None => {
        let extension = (blocks_needed * BLOCK_SIZE).max(guard.allocator.heap_bytes() / 4);
        if guard.allocator.extend(extension).is_err() {
          log::warn!("arena failed to grow heap for a {size}-byte request");
          return None;
        }
        self.publish_heap_bounds(&guard.allocator);
        guard.allocator.find_free_run(blocks_needed)?
      }
    };

    guard.allocator.mark_used(start, blocks_needed);
    let user_ptr = guard.allocator.write_header(start, size);
    guard.allocated_blocks += blocks_needed;

    Some(user_ptr)
  }

  /// Implements the range-check / header-read / free sequence from spec.md section 4.2.
  /// No-op if `user_ptr` does not belong to this arena's current heap region.
  pub(crate) fn deallocate_pointer(&self, user_ptr: *mut u8) {
    let mut guard = self.inner.lock().unwrap();

    let Some((start, size)) = guard.allocator.header_for_user_ptr(user_ptr) else {
      log::trace!("{}", AllocError::InvalidPointer);
      return;
    };

    let total = match size.checked_add(HEADER_SIZE) {
      Some(t) => t,
      None => {
        log::trace!("{}", AllocError::InvalidPointer);
        return;
      }
    };
    let blocks = total.div_ceil(BLOCK_SIZE);

    if start + blocks > guard.allocator.total_blocks() {
      log::trace!("{}", AllocError::InvalidPointer);
      return;
    }

    guard.allocator.mark_free(start, blocks);
    guard.allocated_blocks = guard.allocated_blocks.saturating_sub(blocks);
  }

  fn publish_heap_bounds(&self, allocator: &BitmapAllocator) {
    self.heap_base.store(allocator.heap_base(), Ordering::Release);
    self.heap_bytes.store(allocator.heap_bytes(), Ordering::Release);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn allocate_then_deallocate_frees_the_block() {
    let arena = Arena::new().unwrap();
    let p = arena.try_allocate(100).unwrap();
    assert!(!p.is_null());

    let used_before = arena.used_bytes();
    assert!(used_before > 0);

    arena.deallocate_pointer(p);
    assert_eq!(arena.used_bytes(), 0);
  }

  #[test]
  fn reuses_freed_block_for_an_equal_or_smaller_request() {
    let arena = Arena::new().unwrap();
    let p1 = arena.try_allocate(100).unwrap();
    arena.deallocate_pointer(p1);
    let p2 = arena.try_allocate(100).unwrap();
    assert_eq!(p1, p2);
  }

  #[test]
  fn distinct_allocations_do_not_overlap() {
    let arena = Arena::new().unwrap();
    let p1 = arena.try_allocate(100).unwrap() as usize;
    let p2 = arena.try_allocate(200).unwrap() as usize;
    let p3 = arena.try_allocate(300).unwrap() as usize;

    assert!(p1 + 100 <= p2 || p2 + 200 <= p1);
    assert!(p2 + 200 <= p3 || p3 + 300 <= p2);
  }

  #[test]
  fn deallocating_unknown_pointer_is_a_silent_no_op() {
    let arena = Arena::new().unwrap();
    let mut stray = [0u8; 64];
    let foreign = unsafe { stray.as_mut_ptr().add(HEADER_SIZE) };
    arena.deallocate_pointer(foreign);
  }

  #[test]
  fn oversized_allocation_grows_the_heap() {
    let arena = Arena::new().unwrap();
    let before = arena.heap_bytes();
    let p = arena.try_allocate(before).unwrap();
    assert!(!p.is_null());
    assert!(arena.heap_bytes() > before);
  }
}

//! Process-wide state and the two public entry points: lazy arena-table
//! initialization, thread-to-arena assignment, and cross-arena dispatch of
//! `deallocate`.

use std::cell::Cell;
use std::ptr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::arena::Arena;
use crate::config::LARGE_ALLOCATION_THRESHOLD;
use crate::error::AllocError;
use crate::os;

struct ArenaTable {
  arenas: Box<[Arena]>,
}

/// Published once, read lock-free thereafter (spec.md section 5: "written
/// exactly once during global initialization and read-only thereafter").
/// Leaked by design — the arena table lives until process exit.
static ARENA_TABLE: AtomicPtr<ArenaTable> = AtomicPtr::new(ptr::null_mut());

/// The sole "bootstrap mutex" from spec.md section 5: it guards both the
/// one-time table construction (via double-checked locking below) and the
/// round-robin cursor. It is never held while an arena mutex is acquired.
static BOOTSTRAP: Mutex<usize> = Mutex::new(0);

thread_local! {
  static THREAD_ARENA_INDEX: Cell<Option<usize>> = const { Cell::new(None) };
}

fn build_arena_table(n: usize) -> Result<ArenaTable, AllocError> {
  let mut arenas = Vec::with_capacity(n);
  for _ in 0..n {
    // On failure, `arenas` (and the `BitmapAllocator`s it already holds)
    // drops here, unmapping whatever was mapped so far.
    arenas.push(Arena::new()?);
  }
  Ok(ArenaTable { arenas: arenas.into_boxed_slice() })
}

fn arena_table() -> Option<&'static ArenaTable> {
  let existing = ARENA_TABLE.load(Ordering::Acquire);
  if !existing.is_null() {
    return Some(unsafe { &*existing });
  }

  let _cursor = BOOTSTRAP.lock().unwrap();

  // Double-checked: another thread may have finished initializing while we
  // waited for the bootstrap lock.
  let existing = ARENA_TABLE.load(Ordering::Acquire);
  if !existing.is_null() {
    return Some(unsafe { &*existing });
  }

  let n = os::online_cpu_count();
  let table = match build_arena_table(n) {
    Ok(table) => table,
    Err(_) => {
      log::warn!("failed to initialize {n}-arena table");
      return None;
    }
  };

  log::debug!("initialized arena table with {n} arenas");

  let raw = Box::into_raw(Box::new(table));
  ARENA_TABLE.store(raw, Ordering::Release);
  Some(unsafe { &*raw })
}

/// Returns this thread's preferred arena index, assigning one by round-robin
/// under the bootstrap lock on first use.
fn assigned_arena_index(table: &ArenaTable) -> usize {
  THREAD_ARENA_INDEX.with(|cell| {
    if let Some(index) = cell.get() {
      return index;
    }

    let mut next = BOOTSTRAP.lock().unwrap();
    let index = *next % table.arenas.len();
    *next = (*next + 1) % table.arenas.len();
    cell.set(Some(index));
    index
  })
}

/// Picks the arena with the least advisory load that still has room for
/// `size` bytes, falling back to arena 0 if none reports room.
fn least_loaded_arena_with_room(table: &ArenaTable, size: usize) -> usize {
  let mut best: Option<(usize, usize)> = None;

  for (index, arena) in table.arenas.iter().enumerate() {
    let usage = arena.used_bytes();
    let has_room = arena.heap_bytes().saturating_sub(usage) >= size;
    if !has_room {
      continue;
    }
    if best.is_none_or(|(_, best_usage)| usage < best_usage) {
      best = Some((index, usage));
    }
  }

  best.map(|(index, _)| index).unwrap_or(0)
}

/// Allocates at least `size` bytes, aligned to the machine word, from a
/// per-CPU arena. Returns null on `size == 0` or if the OS refuses to
/// supply memory.
///
/// # Safety
///
/// The returned pointer, once non-null, must only be passed to
/// [`deallocate`] exactly once and only after all uses of it complete.
pub unsafe fn allocate(size: usize) -> *mut u8 {
  if size == 0 {
    return ptr::null_mut();
  }

  let Some(table) = arena_table() else {
    return ptr::null_mut();
  };

  let thread_index = assigned_arena_index(table);
  let index = if size > LARGE_ALLOCATION_THRESHOLD {
    least_loaded_arena_with_room(table, size)
  } else {
    thread_index
  };

  table.arenas[index].try_allocate(size).unwrap_or(ptr::null_mut())
}

/// Releases a pointer previously returned by [`allocate`]. `ptr::null_mut()`
/// and pointers not owned by any arena are silent no-ops.
///
/// # Safety
///
/// `ptr` must either be null or have been returned by a prior call to
/// [`allocate`] on this process's arena table, and must not already have
/// been deallocated.
pub unsafe fn deallocate(ptr: *mut u8) {
  if ptr.is_null() {
    return;
  }

  let Some(table) = arena_table() else {
    return;
  };

  for arena in table.arenas.iter() {
    if arena.might_contain(ptr) {
      arena.deallocate_pointer(ptr);
      return;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn init_logger() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
      let _ = env_logger::builder().is_test(true).try_init();
    });
  }

  #[test]
  fn allocate_zero_returns_null_without_touching_state() {
    init_logger();
    unsafe {
      assert!(allocate(0).is_null());
    }
  }

  #[test]
  fn deallocate_null_is_a_no_op() {
    init_logger();
    unsafe {
      deallocate(ptr::null_mut());
    }
  }

  #[test]
  fn write_read_round_trip() {
    init_logger();
    unsafe {
      let p = allocate(100);
      assert!(!p.is_null());

      let msg = b"Hello, World!";
      ptr::copy_nonoverlapping(msg.as_ptr(), p, msg.len());

      let mut out = vec![0u8; msg.len()];
      ptr::copy_nonoverlapping(p, out.as_mut_ptr(), msg.len());
      assert_eq!(&out, msg);

      deallocate(p);
    }
  }

  #[test]
  fn three_allocations_are_non_null_and_pairwise_distinct() {
    init_logger();
    unsafe {
      let p1 = allocate(100);
      let p2 = allocate(200);
      let p3 = allocate(300);

      assert!(!p1.is_null() && !p2.is_null() && !p3.is_null());
      assert_ne!(p1, p2);
      assert_ne!(p2, p3);
      assert_ne!(p1, p3);

      deallocate(p1);
      deallocate(p2);
      deallocate(p3);
    }
  }

  #[test]
  fn allocate_one_byte_succeeds() {
    init_logger();
    unsafe {
      let p = allocate(1);
      assert!(!p.is_null());
      deallocate(p);
    }
  }

  #[test]
  fn freeing_a_middle_allocation_leaves_room_for_a_later_one() {
    init_logger();
    unsafe {
      let p1 = allocate(100);
      let p2 = allocate(200);
      let p3 = allocate(300);
      assert!(!p1.is_null() && !p2.is_null() && !p3.is_null());

      deallocate(p2);
      let p4 = allocate(150);
      assert!(!p4.is_null());

      deallocate(p1);
      deallocate(p3);
      deallocate(p4);
    }
  }

  #[test]
  fn a_half_heap_allocation_and_a_small_one_land_in_different_arenas_when_possible() {
    init_logger();
    let table = build_arena_table(2).unwrap();

    let big = table.arenas[0].try_allocate(crate::config::HEAP_SIZE / 2).unwrap();

    // With the first arena already carrying a half-heap allocation, a second
    // request for the same size should prefer the other, emptier arena.
    let index = least_loaded_arena_with_room(&table, crate::config::HEAP_SIZE / 2);
    assert_ne!(index, 0);

    table.arenas[0].deallocate_pointer(big);
  }

  #[test]
  fn large_allocation_prefers_an_arena_with_room_over_a_full_one() {
    init_logger();
    let table = build_arena_table(4).unwrap();

    // Fill arena 0 close to capacity so it has no room for a half-heap request.
    let fill_size = table.arenas[0].heap_bytes() - crate::block::HEADER_SIZE - 16;
    assert!(table.arenas[0].try_allocate(fill_size).is_some());

    let index = least_loaded_arena_with_room(&table, crate::config::HEAP_SIZE / 2);
    assert_ne!(index, 0, "the filled arena should not be chosen when others have room");
  }

  #[test]
  fn thread_arena_assignment_is_stable_and_in_range() {
    init_logger();
    let table = build_arena_table(4).unwrap();

    let first = assigned_arena_index(&table);
    assert!(first < table.arenas.len());
    let second = assigned_arena_index(&table);
    assert_eq!(first, second, "repeated calls on the same thread must return the same arena");
  }

  #[test]
  fn absurdly_large_request_does_not_crash() {
    init_logger();
    unsafe {
      let p = allocate(1 << 30);
      if !p.is_null() {
        ptr::write_bytes(p, 0xAA, 1 << 30);
        deallocate(p);
      }
    }
  }

  #[test]
  fn concurrent_alloc_free_pairs_terminate_without_overlap() {
    init_logger();
    use std::sync::{Arc, Barrier};
    use std::thread;

    let threads = 16;
    let iterations = 2000;
    let barrier = Arc::new(Barrier::new(threads));

    thread::scope(|s| {
      for tid in 0..threads {
        let barrier = Arc::clone(&barrier);
        s.spawn(move || {
          barrier.wait();
          for i in 0..iterations {
            let size = (tid * 100 + i) % 1000 + 1;
            unsafe {
              let p = allocate(size);
              assert!(!p.is_null(), "allocation should not fail under normal load");
              ptr::write_bytes(p, tid as u8, 1);
              deallocate(p);
            }
          }
        });
      }
    });
  }
}

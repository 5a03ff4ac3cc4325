//! Internal error taxonomy.
//!
//! None of this is exposed on the public two-symbol surface — `allocate`
//! returns a null pointer and `deallocate` is a silent no-op on failure, per
//! the contract in `lib.rs`. It exists so the plumbing between
//! `BitmapAllocator`, `Arena`, and the front-end can use `Result` and `?`
//! instead of threading null-pointer sentinels through every internal call.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  /// The OS refused to provide more address space, either for the initial
  /// arena table or at heap-growth time.
  OutOfMemory,
  /// A pointer passed to `deallocate` does not belong to any arena, or its
  /// stored header implies a block run outside that arena's heap.
  InvalidPointer,
}

impl fmt::Display for AllocError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AllocError::OutOfMemory => write!(f, "out of memory: the OS refused to map more pages"),
      AllocError::InvalidPointer => write!(f, "pointer is not owned by any arena"),
    }
  }
}

impl std::error::Error for AllocError {}

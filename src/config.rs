//! Compile-time tuning parameters.
//!
//! These mirror the knobs a libc allocator would expose as build-time
//! constants rather than runtime configuration: there is no config file,
//! environment variable, or runtime flag that changes them.

/// Allocation granularity. All block runs are multiples of this many bytes.
pub const BLOCK_SIZE: usize = 16;

/// Initial heap size of a freshly created arena, in bytes.
pub const HEAP_SIZE: usize = 1024 * 1024;

/// Below this many blocks, `find_free_run` favors a trailing-zeros scan.
pub const SMALL_ALLOCATION_BLOCKS: usize = 4;

/// At or above this many blocks, arena selection balances load instead of
/// pinning to the calling thread's arena, and `find_free_run` favors a
/// trailing-zeros scan over the medium-size find-first-set path.
pub const LARGE_ALLOCATION_BLOCKS: usize = 256;

/// Byte threshold mirroring [`LARGE_ALLOCATION_BLOCKS`], used by the
/// front-end's arena selection policy.
pub const LARGE_ALLOCATION_THRESHOLD: usize = LARGE_ALLOCATION_BLOCKS * BLOCK_SIZE;

const _: () = assert!(HEAP_SIZE % BLOCK_SIZE == 0, "HEAP_SIZE must be a multiple of BLOCK_SIZE");
const _: () = assert!(BLOCK_SIZE.is_power_of_two(), "BLOCK_SIZE must be a power of two");
const _: () = assert!(HEAP_SIZE / BLOCK_SIZE > 0, "HEAP_SIZE must cover at least one block");
const _: () = assert!(
  (HEAP_SIZE / BLOCK_SIZE).div_ceil(64) > 0,
  "bitmap word count must be positive"
);

//! The leaf layer: one contiguous heap region and its companion bitmap.
//!
//! `BitmapAllocator` is deliberately ignorant of concurrency — every method
//! here takes `&mut self` (or `&self` for the read-only scan) and callers
//! (`Arena`) are responsible for serializing access.

use std::ptr;

use crate::bitmap;
use crate::block::{BlockHeader, HEADER_SIZE};
use crate::config::BLOCK_SIZE;
use crate::error::AllocError;
use crate::os;

pub(crate) struct BitmapAllocator {
  heap_base: *mut u8,
  heap_bytes: usize,
  bitmap_base: *mut u64,
  bitmap_words: usize,
}

// Safety: all access to the raw pointers is mediated through `&mut self` /
// `&self` methods on this type, and every instance lives behind an `Arena`'s
// mutex, so there is never concurrent unsynchronized access across threads.
unsafe impl Send for BitmapAllocator {}

impl BitmapAllocator {
  /// Maps a fresh heap region of `heap_bytes` bytes and a bitmap sized to cover it.
  pub(crate) fn new(heap_bytes: usize) -> Result<Self, AllocError> {
    debug_assert_eq!(heap_bytes % BLOCK_SIZE, 0);

    let heap_base = os::map_anon(heap_bytes)?;
    let total_blocks = heap_bytes / BLOCK_SIZE;
    let bitmap_words = bitmap::word_count_for(total_blocks);

    let bitmap_base = match os::map_anon(bitmap_words * size_of::<u64>()) {
      Ok(p) => p as *mut u64,
      Err(e) => {
        unsafe { os::unmap(heap_base, heap_bytes) };
        return Err(e);
      }
    };

    log::trace!("new arena heap: {heap_bytes} bytes at {heap_base:p}, bitmap {bitmap_words} words");

    Ok(Self { heap_base, heap_bytes, bitmap_base, bitmap_words })
  }

  pub(crate) fn total_blocks(&self) -> usize {
    self.heap_bytes / BLOCK_SIZE
  }

  pub(crate) fn heap_base(&self) -> *mut u8 {
    self.heap_base
  }

  pub(crate) fn heap_bytes(&self) -> usize {
    self.heap_bytes
  }

  fn bitmap_slice(&self) -> &[u64] {
    unsafe { std::slice::from_raw_parts(self.bitmap_base, self.bitmap_words) }
  }

  fn bitmap_slice_mut(&mut self) -> &mut [u64] {
    unsafe { std::slice::from_raw_parts_mut(self.bitmap_base, self.bitmap_words) }
  }

  /// First-fit scan for `blocks_needed` consecutive free blocks.
  pub(crate) fn find_free_run(&self, blocks_needed: usize) -> Option<usize> {
    bitmap::find_free_run(self.bitmap_slice(), self.total_blocks(), blocks_needed)
  }

  /// Marks `[start, start + blocks_needed)` as used. Precondition: all clear.
  pub(crate) fn mark_used(&mut self, start: usize, blocks_needed: usize) {
    bitmap::mark_used(self.bitmap_slice_mut(), start, blocks_needed);
  }

  /// Marks `[start, start + blocks)` as free. Precondition: all set.
  pub(crate) fn mark_free(&mut self, start: usize, blocks: usize) {
    bitmap::mark_free(self.bitmap_slice_mut(), start, blocks);
  }

  /// Byte address of the first byte of block `index`.
  pub(crate) fn block_addr(&self, index: usize) -> *mut u8 {
    unsafe { self.heap_base.add(index * BLOCK_SIZE) }
  }

  /// Whether `addr` falls within this allocator's current heap region.
  pub(crate) fn contains(&self, addr: *mut u8) -> bool {
    let lo = self.heap_base as usize;
    let hi = lo + self.heap_bytes;
    let p = addr as usize;
    p >= lo && p < hi
  }

  /// Writes the logical `size` into the header at `start` and returns the
  /// user-visible pointer right after it.
  pub(crate) fn write_header(&self, start: usize, size: usize) -> *mut u8 {
    let header = BlockHeader::at(self.block_addr(start));
    unsafe { header.write(size) };
    header.content_addr()
  }

  /// Recovers `(block_start_index, logical_size)` from a user pointer, or
  /// `None` if the implied header address or block run falls outside this
  /// heap's bounds.
  pub(crate) fn header_for_user_ptr(&self, user_ptr: *mut u8) -> Option<(usize, usize)> {
    if (user_ptr as usize) < HEADER_SIZE {
      return None;
    }

    let header = unsafe { BlockHeader::from_user_ptr(user_ptr) };
    if !self.contains(header.block_addr()) {
      return None;
    }

    let size = unsafe { header.read() };
    let start = (header.block_addr() as usize - self.heap_base as usize) / BLOCK_SIZE;
    Some((start, size))
  }

  /// Grows the heap region by at least `min_bytes`, rounded up to the page
  /// size, by full relocation: a fresh mapping for the heap, a fresh mapping
  /// for the bitmap, old contents copied into both, old mappings released.
  /// Returns the address of the first newly available byte on success.
  pub(crate) fn extend(&mut self, min_bytes: usize) -> Result<*mut u8, AllocError> {
    let extension = os::round_up_to_page(min_bytes.max(1));
    let new_heap_bytes = self.heap_bytes + extension;
    let new_total_blocks = new_heap_bytes / BLOCK_SIZE;
    let new_bitmap_words = bitmap::word_count_for(new_total_blocks);

    let new_heap = os::map_anon(new_heap_bytes)?;
    let new_bitmap = match os::map_anon(new_bitmap_words * size_of::<u64>()) {
      Ok(p) => p as *mut u64,
      Err(e) => {
        unsafe { os::unmap(new_heap, new_heap_bytes) };
        return Err(e);
      }
    };

    unsafe {
      ptr::copy_nonoverlapping(self.heap_base, new_heap, self.heap_bytes);
      ptr::copy_nonoverlapping(self.bitmap_base, new_bitmap, self.bitmap_words);

      os::unmap(self.heap_base, self.heap_bytes);
      os::unmap(self.bitmap_base as *mut u8, self.bitmap_words * size_of::<u64>());
    }

    log::debug!(
      "heap grown: {} -> {} bytes (extension {extension}), relocated to {new_heap:p}",
      self.heap_bytes,
      new_heap_bytes
    );

    let tail_addr = unsafe { new_heap.add(self.heap_bytes) };

    self.heap_base = new_heap;
    self.heap_bytes = new_heap_bytes;
    self.bitmap_base = new_bitmap;
    self.bitmap_words = new_bitmap_words;

    Ok(tail_addr)
  }
}

impl Drop for BitmapAllocator {
  fn drop(&mut self) {
    unsafe {
      os::unmap(self.heap_base, self.heap_bytes);
      os::unmap(self.bitmap_base as *mut u8, self.bitmap_words * size_of::<u64>());
    }
  }
}

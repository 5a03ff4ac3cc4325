//! The in-band allocation header.
//!
//! Every live block run begins with one word holding the caller's logical
//! size. The user-visible pointer is the address right after this word.
//! This module hides the pointer arithmetic so the rest of the crate never
//! casts a raw address to `*mut Block` directly.

use std::mem;

/// Size in bytes of the header word placed before every allocation.
pub const HEADER_SIZE: usize = mem::size_of::<usize>();

/// A view over the header word stored at the start of a block run.
pub struct BlockHeader {
  addr: *mut u8,
}

impl BlockHeader {
  /// Wraps the header address at `block_addr`, the first byte of the block run.
  pub fn at(block_addr: *mut u8) -> Self {
    Self { addr: block_addr }
  }

  /// The header word's address, rounded up to the word boundary. Since
  /// `BLOCK_SIZE` is already a multiple of the word size on every target
  /// this crate supports, this is a no-op in practice, but spec.md section
  /// 4.2 calls for it to be preserved rather than assumed.
  fn header_addr(&self) -> *mut usize {
    crate::align_to!(self.addr as usize, mem::align_of::<usize>()) as *mut usize
  }

  /// Writes the logical `size` into the header word.
  ///
  /// # Safety
  ///
  /// `block_addr` must point to at least `HEADER_SIZE` writable, aligned bytes.
  pub unsafe fn write(&self, size: usize) {
    unsafe { self.header_addr().write(size) };
  }

  /// Reads the logical size back out of the header word.
  ///
  /// # Safety
  ///
  /// `block_addr` must have been previously initialized via [`BlockHeader::write`].
  pub unsafe fn read(&self) -> usize {
    unsafe { self.header_addr().read() }
  }

  /// The address of the byte immediately after the header: the user pointer.
  pub fn content_addr(&self) -> *mut u8 {
    unsafe { self.addr.add(HEADER_SIZE) }
  }

  /// Recovers the header view from a user pointer previously returned by `content_addr`.
  ///
  /// # Safety
  ///
  /// `user_addr` must be `HEADER_SIZE` or more bytes into the owning allocation.
  pub unsafe fn from_user_ptr(user_addr: *mut u8) -> Self {
    Self { addr: unsafe { user_addr.sub(HEADER_SIZE) } }
  }

  /// The header's own start address (the start of the block run).
  pub fn block_addr(&self) -> *mut u8 {
    self.addr
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_size_through_a_buffer() {
    let mut buf = [0u8; 64];
    let header = BlockHeader::at(buf.as_mut_ptr());

    unsafe {
      header.write(123);
      assert_eq!(header.read(), 123);

      let user_ptr = header.content_addr();
      assert_eq!(user_ptr, buf.as_mut_ptr().add(HEADER_SIZE));

      let recovered = BlockHeader::from_user_ptr(user_ptr);
      assert_eq!(recovered.read(), 123);
      assert_eq!(recovered.block_addr(), buf.as_mut_ptr());
    }
  }
}

//! The only surface this crate touches in the operating system: anonymous
//! page mapping, page unmapping, and the two `sysconf` queries the front-end
//! needs at bootstrap (online CPU count, page size).

use std::ptr;

use crate::error::AllocError;

/// Maps a fresh, zero-filled, private, read-write anonymous region of at
/// least `bytes` bytes. Returns the mapping's base address.
pub(crate) fn map_anon(bytes: usize) -> Result<*mut u8, AllocError> {
  debug_assert!(bytes > 0);

  let addr = unsafe {
    libc::mmap(
      ptr::null_mut(),
      bytes,
      libc::PROT_READ | libc::PROT_WRITE,
      libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
      -1,
      0,
    )
  };

  if addr == libc::MAP_FAILED {
    log::warn!("mmap({bytes}) failed: {}", std::io::Error::last_os_error());
    return Err(AllocError::OutOfMemory);
  }

  Ok(addr as *mut u8)
}

/// Unmaps a region previously returned by [`map_anon`].
///
/// # Safety
///
/// `addr`/`bytes` must exactly describe a live mapping obtained from
/// [`map_anon`], with no outstanding references into it.
pub(crate) unsafe fn unmap(addr: *mut u8, bytes: usize) {
  if bytes == 0 {
    return;
  }
  let rc = unsafe { libc::munmap(addr as *mut libc::c_void, bytes) };
  if rc != 0 {
    log::warn!("munmap({addr:p}, {bytes}) failed: {}", std::io::Error::last_os_error());
  }
}

/// The number of logical CPUs online right now, per `sysconf(_SC_NPROCESSORS_ONLN)`.
/// Always at least 1.
pub(crate) fn online_cpu_count() -> usize {
  let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
  if n <= 0 { 1 } else { n as usize }
}

/// The system page size, per `sysconf(_SC_PAGESIZE)`.
pub(crate) fn page_size() -> usize {
  let n = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
  if n <= 0 { 4096 } else { n as usize }
}

/// Rounds `bytes` up to the next multiple of the system page size.
pub(crate) fn round_up_to_page(bytes: usize) -> usize {
  crate::align_to!(bytes, page_size())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn map_and_unmap_round_trips() {
    let bytes = page_size() * 4;
    let addr = map_anon(bytes).unwrap();
    unsafe {
      std::ptr::write_bytes(addr, 0x42, bytes);
      assert_eq!(*addr, 0x42);
      unmap(addr, bytes);
    }
  }

  #[test]
  fn online_cpu_count_is_at_least_one() {
    assert!(online_cpu_count() >= 1);
  }

  #[test]
  fn round_up_to_page_is_idempotent_and_never_shrinks() {
    let page = page_size();
    assert_eq!(round_up_to_page(1), page);
    assert_eq!(round_up_to_page(page), page);
    assert_eq!(round_up_to_page(page + 1), page * 2);
  }
}

//! Memory sources: where the arena's bytes come from.
//!
//! A [`MemorySource`] hands out one contiguous, monotonically growing
//! byte range, in the manner of the process break: `obtain` extends the
//! range and returns the byte offset where the new space begins. The
//! allocator layers all of its boundary-tag structure on top of this
//! range and never releases individual pieces back.

#[cfg(unix)]
use std::{ptr, slice};

#[cfg(unix)]
use libc::{c_void, intptr_t, sbrk, sysconf, _SC_PAGESIZE};

/// A growable contiguous byte range backing a heap arena.
pub trait MemorySource {
  /// Extends the range by exactly `min_bytes` and returns the byte
  /// offset of the new space, or `None` when the source is exhausted.
  /// On failure the range is left untouched.
  fn obtain(&mut self, min_bytes: usize) -> Option<usize>;

  /// Granularity hint for growth requests.
  fn page_size(&self) -> usize;

  /// Total bytes obtained so far.
  fn current_size(&self) -> usize;

  /// Shrinks the range back to zero bytes.
  fn reset(&mut self);

  fn bytes(&self) -> &[u8];

  fn bytes_mut(&mut self) -> &mut [u8];
}

/// In-process memory source backed by a `Vec<u8>`.
///
/// The default source for tests and for embedding the allocator without
/// touching the program break. A byte limit can be set to simulate an
/// exhausted address space.
pub struct VecSource {
  bytes: Vec<u8>,
  limit: usize,
}

const VEC_PAGE_SIZE: usize = 4096;

impl VecSource {
  pub fn new() -> Self {
    Self::with_limit(usize::MAX)
  }

  /// A source that refuses to grow past `limit` total bytes.
  pub fn with_limit(limit: usize) -> Self {
    Self {
      bytes: Vec::new(),
      limit,
    }
  }
}

impl Default for VecSource {
  fn default() -> Self {
    Self::new()
  }
}

impl MemorySource for VecSource {
  fn obtain(
    &mut self,
    min_bytes: usize,
  ) -> Option<usize> {
    let offset = self.bytes.len();

    if min_bytes > self.limit - offset {
      return None;
    }

    self.bytes.resize(offset + min_bytes, 0);

    Some(offset)
  }

  fn page_size(&self) -> usize {
    VEC_PAGE_SIZE
  }

  fn current_size(&self) -> usize {
    self.bytes.len()
  }

  fn reset(&mut self) {
    self.bytes.clear();
  }

  fn bytes(&self) -> &[u8] {
    &self.bytes
  }

  fn bytes_mut(&mut self) -> &mut [u8] {
    &mut self.bytes
  }
}

/// Memory source over the program break, via `sbrk(2)`.
///
/// This is the classic backing store for a boundary-tag heap: each
/// `obtain` moves the break up, so successive ranges are contiguous and
/// the arena is a single run of address space.
#[cfg(unix)]
pub struct SbrkSource {
  base: *mut u8,
  len: usize,
  page: usize,
}

#[cfg(unix)]
impl SbrkSource {
  /// Binds to the program break. The range stays empty until the first
  /// `obtain`, which records where the break was at that moment.
  ///
  /// # Safety
  ///
  /// The caller must guarantee that nothing else moves the program break
  /// between `obtain` calls on this source. A foreign `sbrk`/`brk` call
  /// (or another break-based allocator) would punch a hole in the range
  /// this source believes it owns; `obtain` detects that and reports
  /// exhaustion, but the space already obtained must remain ours alone.
  pub unsafe fn new() -> Self {
    let page = unsafe { sysconf(_SC_PAGESIZE) } as usize;

    Self {
      base: ptr::null_mut(),
      len: 0,
      page,
    }
  }

  fn top(&self) -> *mut u8 {
    self.base.wrapping_add(self.len)
  }
}

#[cfg(unix)]
impl MemorySource for SbrkSource {
  fn obtain(
    &mut self,
    min_bytes: usize,
  ) -> Option<usize> {
    let address = unsafe { sbrk(min_bytes as intptr_t) };

    if address == usize::MAX as *mut c_void {
      return None;
    }

    if self.base.is_null() {
      self.base = address as *mut u8;
    } else if address as *mut u8 != self.top() {
      // something else moved the break since our last extension; the
      // new space is not contiguous with our range, so refuse it
      unsafe { sbrk(0 - min_bytes as intptr_t) };
      return None;
    }

    let offset = self.len;
    self.len += min_bytes;

    Some(offset)
  }

  fn page_size(&self) -> usize {
    self.page
  }

  fn current_size(&self) -> usize {
    self.len
  }

  fn reset(&mut self) {
    // only move the break back if it is still exactly our top; if the
    // break moved on, shrinking would release someone else's memory
    if self.len > 0 && unsafe { sbrk(0) } as *mut u8 == self.top() {
      unsafe { sbrk(0 - self.len as intptr_t) };
    }

    self.base = ptr::null_mut();
    self.len = 0;
  }

  fn bytes(&self) -> &[u8] {
    if self.len == 0 {
      return &[];
    }

    unsafe { slice::from_raw_parts(self.base, self.len) }
  }

  fn bytes_mut(&mut self) -> &mut [u8] {
    if self.len == 0 {
      return &mut [];
    }

    unsafe { slice::from_raw_parts_mut(self.base, self.len) }
  }
}

#[cfg(unix)]
impl Drop for SbrkSource {
  fn drop(&mut self) {
    self.reset();
  }
}

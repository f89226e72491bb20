//! The heap: free list, allocation, deallocation, growth, resize.
//!
//! `Heap` owns a [`MemorySource`] and carves its byte range into blocks
//! bracketed by boundary tags (see [`crate::tag`]). Free blocks form a
//! circular doubly-linked list threaded through their own tags: the
//! header link points forward to the next free block, the footer link
//! points backward to the previous one. A permanent size-0 sentinel at
//! the bottom of the arena anchors the list, and a roaming cursor
//! (`freep`) makes the search next-fit.
//!
//! Neighbor detection during free reads boundary tags only, never the
//! list order, so the list carries no address-ordering invariant.

use crate::{
  source::MemorySource,
  tag::{self, NIL, OVERHEAD},
  units::{self, UNIT},
};

pub struct Heap<M: MemorySource> {
  source: M,
  /// Header index of the sentinel block, once bootstrapped.
  base: usize,
  /// Next-fit cursor: a block currently on the free list.
  freep: usize,
  ready: bool,
}

impl<M: MemorySource> Heap<M> {
  /// Binds the allocator to a memory source. No space is obtained until
  /// the first allocation.
  pub fn new(source: M) -> Self {
    Self {
      source,
      base: 0,
      freep: 0,
      ready: false,
    }
  }

  /// Returns the arena to its initial, empty-of-allocations state. All
  /// outstanding payload handles are invalidated.
  pub fn reset(&mut self) {
    self.source.reset();
    self.base = 0;
    self.freep = 0;
    self.ready = false;
  }

  /// Unbinds and hands the memory source back.
  pub fn release(self) -> M {
    self.source
  }

  /// The bound memory source.
  pub fn source(&self) -> &M {
    &self.source
  }

  /// Allocates `nbytes` bytes and returns the payload's byte offset
  /// into the arena, or `None` when the memory source is exhausted.
  ///
  /// A zero-byte request returns a valid minimum-size block.
  pub fn allocate(
    &mut self,
    nbytes: usize,
  ) -> Option<usize> {
    if !self.bootstrap() {
      return None;
    }

    let nunits = crate::units!(nbytes);

    let mut prevp = self.freep;
    let mut p = self.fwd(prevp);

    loop {
      if self.size(p) >= nunits {
        let block = if self.size(p) > nunits + OVERHEAD {
          self.split(p, nunits)
        } else {
          // exact fit, or too tight to leave a viable remainder
          self.unlink(p);
          p
        };

        self.freep = prevp;

        return Some(tag::payload_offset(block));
      }

      if p == self.freep {
        // wrapped around the free list without a fit; grow the arena
        // and restart the circuit from the cursor the growth left
        // behind, since threading the new space in has moved it
        p = self.morecore(nunits)?;
      }

      prevp = p;
      p = self.fwd(p);
    }
  }

  /// Returns `ap` to the free list, coalescing with any address-adjacent
  /// free neighbor. `None` is a no-op.
  ///
  /// # Panics
  ///
  /// Panics if `ap` does not name a block handed out by this heap: that
  /// is a contract breach, not a recoverable error.
  pub fn free(
    &mut self,
    ap: Option<usize>,
  ) {
    let Some(offset) = ap else {
      return;
    };

    let bp = self.checked_block(offset);
    let size = self.size(bp);
    debug_assert!(
      self.fwd(bp) == NIL && self.bwd(bp) == NIL,
      "freeing a block that is already on the free list"
    );

    let lower = self.lower_free_neighbor(bp);
    let upper = self.upper_free_neighbor(bp);

    let merged = match (lower, upper) {
      (Some(low), Some(up)) => {
        // absorb the freed block and the upper neighbor into the lower
        // neighbor; the lower neighbor keeps its list position
        self.unlink(up);
        // read after the unlink: if low and up were list-adjacent the
        // unlink just rewrote low's backward link
        let low_bwd = self.bwd(low);

        let combined = self.size(low) + size + self.size(up) + 2 * OVERHEAD;
        self.set_size(low, combined);
        let f = low + combined + 1;
        self.set_size_at(f, combined);
        self.set_link_at(f, low_bwd);

        low
      }
      (None, Some(up)) => {
        // the freed block's header becomes the merged block's header,
        // taking over the upper neighbor's list position
        let next = self.fwd(up);
        let prev = self.bwd(up);

        let combined = size + self.size(up) + OVERHEAD;
        self.set_size(bp, combined);
        let f = bp + combined + 1;
        self.set_size_at(f, combined);

        self.set_fwd(bp, next);
        self.set_link_at(f, prev);
        self.set_fwd(prev, bp);
        self.set_bwd(next, bp);

        bp
      }
      (Some(low), None) => {
        // extend the lower neighbor over the freed block; its links are
        // untouched, only its footer moves
        let low_bwd = self.bwd(low);

        let combined = self.size(low) + size + OVERHEAD;
        self.set_size(low, combined);
        let f = low + combined + 1;
        self.set_size_at(f, combined);
        self.set_link_at(f, low_bwd);

        low
      }
      (None, None) => {
        // no adjacent free block; thread in at the cursor
        self.insert_after(self.freep, bp);

        bp
      }
    };

    self.freep = self.bwd(merged);
  }

  /// Resizes the allocation at `ap` to `nbytes`, preserving its
  /// contents. `resize(None, n)` behaves as `allocate(n)`. Returns
  /// `None` (leaving the original block intact) when a needed new
  /// allocation fails.
  ///
  /// A block is never shrunk in place: if `nbytes` already fits, the
  /// same handle comes back unchanged. `resize(Some(p), 0)` allocates a
  /// minimum-size block and frees `p`.
  pub fn resize(
    &mut self,
    ap: Option<usize>,
    nbytes: usize,
  ) -> Option<usize> {
    let Some(offset) = ap else {
      return self.allocate(nbytes);
    };

    let bp = self.checked_block(offset);
    let old_units = self.size(bp);

    if nbytes > 0 && old_units >= crate::units!(nbytes) {
      return Some(offset);
    }

    let new_offset = self.allocate(nbytes)?;

    let copy = units::to_bytes(old_units).min(nbytes);
    self
      .source
      .bytes_mut()
      .copy_within(offset..offset + copy, new_offset);

    self.free(Some(offset));

    Some(new_offset)
  }

  /// Total bytes currently reclaimable across all free blocks.
  pub fn free_bytes(&self) -> usize {
    if !self.ready {
      return 0;
    }

    let mut total = 0;
    let mut p = self.base;

    loop {
      total += self.size(p);
      p = self.fwd(p);

      if p == self.base {
        break;
      }
    }

    units::to_bytes(total)
  }

  /// The payload bytes of the allocation at `ap`, spanning the block's
  /// full reserved extent.
  pub fn payload(
    &self,
    ap: usize,
  ) -> &[u8] {
    let bp = self.checked_block(ap);
    let len = units::to_bytes(self.size(bp));

    &self.source.bytes()[ap..ap + len]
  }

  pub fn payload_mut(
    &mut self,
    ap: usize,
  ) -> &mut [u8] {
    let bp = self.checked_block(ap);
    let len = units::to_bytes(self.size(bp));

    &mut self.source.bytes_mut()[ap..ap + len]
  }

  /// Establishes the sentinel and the empty free list on first use.
  fn bootstrap(&mut self) -> bool {
    if self.ready {
      return true;
    }

    let Some(offset) = self.source.obtain(OVERHEAD * UNIT) else {
      return false;
    };
    debug_assert!(offset % UNIT == 0);

    let base = offset / UNIT;
    self.set_size(base, 0);
    self.set_fwd(base, base);
    // footer of a size-0 block sits at base + 1
    self.set_size_at(base + 1, 0);
    self.set_link_at(base + 1, base);

    self.base = base;
    self.freep = base;
    self.ready = true;

    true
  }

  /// Requests at least `nunits` payload units of fresh space from the
  /// memory source, page-granular, and threads it into the free list
  /// through the free path so it coalesces with the previous top of the
  /// arena. Returns the free-list cursor for the caller to resume its
  /// search from, or `None` when the source is exhausted.
  fn morecore(
    &mut self,
    nunits: usize,
  ) -> Option<usize> {
    let page_units = self.source.page_size() / UNIT;
    debug_assert!(page_units > 0);

    // a request near usize::MAX wraps the sizing math; that cannot be
    // satisfied by any source, so report it as exhaustion
    let wanted = nunits.checked_add(OVERHEAD)?.max(page_units);
    let granted = wanted.div_ceil(page_units).checked_mul(page_units)?;
    let nbytes = granted.checked_mul(UNIT)?;

    let offset = self.source.obtain(nbytes)?;
    debug_assert!(offset % UNIT == 0);

    let bp = offset / UNIT;
    let size = granted - OVERHEAD;
    self.set_size(bp, size);
    self.set_link(bp, NIL);
    self.set_size_at(bp + size + 1, size);
    self.set_link_at(bp + size + 1, NIL);

    self.free(Some(tag::payload_offset(bp)));

    Some(self.freep)
  }

  /// Carves `nunits` payload units off the high end of free block `p`.
  /// The remainder keeps its low-address position and its list links;
  /// only its footer moves down.
  fn split(
    &mut self,
    p: usize,
    nunits: usize,
  ) -> usize {
    let p_bwd = self.bwd(p);
    let remainder = self.size(p) - nunits - OVERHEAD;

    self.set_size(p, remainder);
    let f = p + remainder + 1;
    self.set_size_at(f, remainder);
    self.set_link_at(f, p_bwd);

    let block = f + 1;
    self.set_size(block, nunits);
    self.set_link(block, NIL);
    self.set_size_at(block + nunits + 1, nunits);
    self.set_link_at(block + nunits + 1, NIL);

    block
  }

  /// Removes `b` from the free list and clears its links.
  fn unlink(
    &mut self,
    b: usize,
  ) {
    let next = self.fwd(b);
    let prev = self.bwd(b);

    self.set_fwd(prev, next);
    self.set_bwd(next, prev);
    self.set_fwd(b, NIL);
    self.set_bwd(b, NIL);
  }

  /// Links `b` into the free list directly after `after`.
  fn insert_after(
    &mut self,
    after: usize,
    b: usize,
  ) {
    let next = self.fwd(after);

    self.set_fwd(after, b);
    self.set_fwd(b, next);
    self.set_bwd(b, after);
    self.set_bwd(next, b);
  }

  /// Is the block physically below `bp` free? Reads tags only; the
  /// sentinel never counts.
  fn lower_free_neighbor(
    &self,
    bp: usize,
  ) -> Option<usize> {
    let lower_footer = bp - 1;

    if lower_footer == self.base + 1 {
      return None;
    }

    if self.link_at(lower_footer) == NIL {
      return None;
    }

    Some(tag::header(self.source.bytes(), lower_footer))
  }

  /// Is the block physically above `bp` free?
  fn upper_free_neighbor(
    &self,
    bp: usize,
  ) -> Option<usize> {
    let upper = bp + self.size(bp) + OVERHEAD;

    if upper >= tag::unit_len(self.source.bytes()) {
      return None;
    }

    if self.link_at(upper) == NIL {
      return None;
    }

    Some(upper)
  }

  /// Recovers and validates the header of the block behind a payload
  /// offset. A non-positive size or an extent outside the arena means
  /// the caller handed back something this heap never produced.
  fn checked_block(
    &self,
    ap: usize,
  ) -> usize {
    assert!(self.ready, "no allocations outstanding on this heap");

    let bp = tag::header_of_payload(ap);
    let size = self.size(bp);
    let top = tag::unit_len(self.source.bytes());

    assert!(
      size > 0 && bp >= self.base + OVERHEAD && bp + size + 1 < top,
      "block at payload offset {} has a corrupted boundary tag",
      ap
    );
    debug_assert_eq!(self.size_at(bp + size + 1), size);

    bp
  }

  // boundary-tag shorthands

  fn size(
    &self,
    h: usize,
  ) -> usize {
    tag::size_at(self.source.bytes(), h)
  }

  fn size_at(
    &self,
    i: usize,
  ) -> usize {
    tag::size_at(self.source.bytes(), i)
  }

  fn set_size(
    &mut self,
    h: usize,
    v: usize,
  ) {
    tag::set_size_at(self.source.bytes_mut(), h, v);
  }

  fn set_size_at(
    &mut self,
    i: usize,
    v: usize,
  ) {
    tag::set_size_at(self.source.bytes_mut(), i, v);
  }

  fn link_at(
    &self,
    i: usize,
  ) -> usize {
    tag::link_at(self.source.bytes(), i)
  }

  fn set_link(
    &mut self,
    h: usize,
    v: usize,
  ) {
    tag::set_link_at(self.source.bytes_mut(), h, v);
  }

  fn set_link_at(
    &mut self,
    i: usize,
    v: usize,
  ) {
    tag::set_link_at(self.source.bytes_mut(), i, v);
  }

  /// Forward link: next free block after `h` in list order.
  fn fwd(
    &self,
    h: usize,
  ) -> usize {
    tag::link_at(self.source.bytes(), h)
  }

  fn set_fwd(
    &mut self,
    h: usize,
    v: usize,
  ) {
    tag::set_link_at(self.source.bytes_mut(), h, v);
  }

  /// Backward link: previous free block, stored in `h`'s footer.
  fn bwd(
    &self,
    h: usize,
  ) -> usize {
    let f = tag::footer(self.source.bytes(), h);
    tag::link_at(self.source.bytes(), f)
  }

  fn set_bwd(
    &mut self,
    h: usize,
    v: usize,
  ) {
    let f = tag::footer(self.source.bytes(), h);
    tag::set_link_at(self.source.bytes_mut(), f, v);
  }
}

//! Boundary tags over the arena byte range.
//!
//! Every block carries a tag at each end: a header at its low unit and a
//! footer at its high unit. A tag stores the block size in payload units
//! (excluding the two tags themselves) and a link, which for a free block
//! is the unit index of a neighboring free-list entry and for an
//! allocated block is [`NIL`].
//!
//! All accessors take the arena as a plain byte slice and a unit index,
//! and panic when the index falls outside the arena. Corrupted tags are a
//! contract breach, not a recoverable condition.

use crate::units::{UNIT, WORD};

/// Link value of a block that is not on the free list.
pub const NIL: usize = usize::MAX;

/// Units consumed by a block's own header and footer.
pub const OVERHEAD: usize = 2;

/// Number of whole units in the arena.
#[inline]
pub fn unit_len(arena: &[u8]) -> usize {
  arena.len() / UNIT
}

#[inline]
fn cell(
  arena: &[u8],
  index: usize,
) -> usize {
  assert!(
    index < unit_len(arena),
    "tag index {} outside arena of {} units",
    index,
    unit_len(arena)
  );
  index * UNIT
}

fn read_word(
  arena: &[u8],
  offset: usize,
) -> usize {
  let mut word = [0u8; WORD];
  word.copy_from_slice(&arena[offset..offset + WORD]);
  usize::from_ne_bytes(word)
}

fn write_word(
  arena: &mut [u8],
  offset: usize,
  value: usize,
) {
  arena[offset..offset + WORD].copy_from_slice(&value.to_ne_bytes());
}

pub fn size_at(
  arena: &[u8],
  index: usize,
) -> usize {
  let offset = cell(arena, index);
  read_word(arena, offset)
}

pub fn set_size_at(
  arena: &mut [u8],
  index: usize,
  size: usize,
) {
  let offset = cell(arena, index);
  write_word(arena, offset, size);
}

pub fn link_at(
  arena: &[u8],
  index: usize,
) -> usize {
  let offset = cell(arena, index);
  read_word(arena, offset + WORD)
}

pub fn set_link_at(
  arena: &mut [u8],
  index: usize,
  link: usize,
) {
  let offset = cell(arena, index);
  write_word(arena, offset + WORD, link);
}

/// Footer index of the block whose header is at `header`.
pub fn footer(
  arena: &[u8],
  header: usize,
) -> usize {
  header + size_at(arena, header) + 1
}

/// Header index of the block whose footer is at `footer`.
pub fn header(
  arena: &[u8],
  footer: usize,
) -> usize {
  let size = size_at(arena, footer);
  assert!(
    footer > size,
    "footer at {} claims {} payload units",
    footer,
    size
  );
  footer - size - 1
}

/// Byte offset of the payload that starts just past `header`.
#[inline]
pub fn payload_offset(header: usize) -> usize {
  (header + 1) * UNIT
}

/// Recovers the header unit index from a payload byte offset.
pub fn header_of_payload(offset: usize) -> usize {
  assert!(
    offset >= UNIT && offset % UNIT == 0,
    "payload offset {} was not produced by this allocator",
    offset
  );
  offset / UNIT - 1
}

#[cfg(test)]
mod tests {
  use super::*;

  fn arena(nunits: usize) -> Vec<u8> {
    vec![0u8; nunits * UNIT]
  }

  #[test]
  fn test_size_round_trip() {
    let mut a = arena(4);

    set_size_at(&mut a, 0, 17);
    set_size_at(&mut a, 3, 99);

    assert_eq!(size_at(&a, 0), 17);
    assert_eq!(size_at(&a, 3), 99);
  }

  #[test]
  fn test_link_round_trip() {
    let mut a = arena(4);

    set_link_at(&mut a, 1, 2);
    set_link_at(&mut a, 2, NIL);

    assert_eq!(link_at(&a, 1), 2);
    assert_eq!(link_at(&a, 2), NIL);
    // size field untouched by link writes
    assert_eq!(size_at(&a, 1), 0);
  }

  #[test]
  fn test_footer_header_inverse() {
    let mut a = arena(8);

    // block with 4 payload units: header at 1, footer at 6
    set_size_at(&mut a, 1, 4);
    let f = footer(&a, 1);
    assert_eq!(f, 6);

    set_size_at(&mut a, f, 4);
    assert_eq!(header(&a, f), 1);
  }

  #[test]
  fn test_payload_mapping() {
    assert_eq!(payload_offset(2), 3 * UNIT);
    assert_eq!(header_of_payload(3 * UNIT), 2);

    for h in 0..16 {
      assert_eq!(header_of_payload(payload_offset(h)), h);
    }
  }

  #[test]
  #[should_panic(expected = "outside arena")]
  fn test_out_of_bounds_read() {
    let a = arena(2);
    size_at(&a, 2);
  }

  #[test]
  #[should_panic(expected = "not produced by this allocator")]
  fn test_misaligned_payload() {
    header_of_payload(UNIT + 1);
  }

  #[test]
  #[should_panic(expected = "not produced by this allocator")]
  fn test_zero_payload_offset() {
    header_of_payload(0);
  }

  #[test]
  #[should_panic(expected = "payload units")]
  fn test_corrupt_footer() {
    let mut a = arena(4);
    set_size_at(&mut a, 1, 10);
    header(&a, 1);
  }
}

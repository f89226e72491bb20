/// Size in bytes of one allocation unit.
///
/// A unit is the granularity of the allocator: every block size is a unit
/// count, and one unit is exactly large enough to hold one boundary tag
/// (a `size` word plus a `link` word).
pub const UNIT: usize = 2 * size_of::<usize>();

/// Size in bytes of one tag field (`size` or `link`).
pub const WORD: usize = size_of::<usize>();

/// Rounds a byte count up to whole allocation units.
///
/// A zero-byte request still reserves one unit, so every allocation maps
/// to a real payload region.
///
/// # Examples
///
/// ```rust
/// use tagheap::{units, units::UNIT};
///
/// assert_eq!(units!(0usize), 1);
/// assert_eq!(units!(1usize), 1);
/// assert_eq!(units!(UNIT), 1);
/// assert_eq!(units!(UNIT + 1), 2);
/// ```
#[macro_export]
macro_rules! units {
  ($nbytes:expr) => {
    ($nbytes).div_ceil($crate::units::UNIT).max(1)
  };
}

/// Converts a unit count back to bytes.
#[inline]
pub fn to_bytes(nunits: usize) -> usize {
  nunits * UNIT
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_units() {
    let mut expectations = Vec::new();

    expectations.push((0..=UNIT, 1));

    for i in 1..10 {
      let sizes = (UNIT * i + 1)..=(UNIT * (i + 1));

      expectations.push((sizes, i + 1));
    }

    for (sizes, expected) in expectations {
      for size in sizes {
        assert_eq!(expected, units!(size));
      }
    }
  }

  #[test]
  fn test_to_bytes() {
    assert_eq!(to_bytes(0), 0);
    assert_eq!(to_bytes(1), UNIT);
    assert_eq!(to_bytes(7), 7 * UNIT);
  }

  #[test]
  fn test_round_trip() {
    for nbytes in 1..(4 * UNIT) {
      assert!(to_bytes(units!(nbytes)) >= nbytes);
      assert!(to_bytes(units!(nbytes)) - nbytes < UNIT);
    }
  }
}

use std::fmt;

use crate::path::Path;

/// A caret location: a node path plus a char offset into that node's delta.
/// 0-indexed as all things should be.
///
/// Positions order by path first and offset second.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
  pub path:   Path,
  pub offset: usize,
}

impl Position {
  pub fn new(path: impl Into<Path>, offset: usize) -> Self {
    Self {
      path: path.into(),
      offset,
    }
  }

  /// Offset 0 of the node at `path`.
  pub fn start_of(path: impl Into<Path>) -> Self {
    Self::new(path, 0)
  }

  #[must_use]
  pub fn with_offset(&self, offset: usize) -> Self {
    Self {
      path: self.path.clone(),
      offset,
    }
  }

  /// Moves the offset by `delta` chars, saturating at zero.
  #[must_use]
  pub fn shift(&self, delta: isize) -> Self {
    self.with_offset(self.offset.saturating_add_signed(delta))
  }
}

impl fmt::Display for Position {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.path, self.offset)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn orders_by_path_then_offset() {
    assert!(Position::new([0], 5) < Position::new([1], 0));
    assert!(Position::new([0], 5) < Position::new([0, 0], 0));
    assert!(Position::new([1], 1) < Position::new([1], 2));
  }

  #[test]
  fn shift_saturates() {
    assert_eq!(Position::new([0], 1).shift(-3).offset, 0);
    assert_eq!(Position::new([0], 1).shift(2).offset, 3);
  }
}

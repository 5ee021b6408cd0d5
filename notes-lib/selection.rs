//! Selections over the block tree.
//!
//! A [`Selection`] is a pair of [`Position`]s. `start` is where the gesture
//! began and `end` is where the caret is, so a selection dragged upwards has
//! `start > end`. Use [`Selection::normalized`] whenever a range in document
//! order is needed.
//!
//! ```text
//! start=[0]:2, end=[2]:1   forward, spans three nodes
//! start=[2]:1, end=[0]:2   backward, same range once normalized
//! start=[1]:4, end=[1]:4   collapsed caret
//! ```
//!
//! The [`SelectionMode`] distinguishes ordinary text ranges from whole-block
//! selections. In block mode the offsets are irrelevant, every node whose
//! path falls between `start.path` and `end.path` is selected entirely.

use std::fmt;

use crate::{
  path::Path,
  position::Position,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionMode {
  #[default]
  Text,
  Block,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Selection {
  pub start: Position,
  pub end:   Position,
  pub mode:  SelectionMode,
}

impl Selection {
  pub fn new(start: Position, end: Position) -> Self {
    Self {
      start,
      end,
      mode: SelectionMode::Text,
    }
  }

  /// A caret at `position`.
  pub fn collapsed(position: Position) -> Self {
    Self::new(position.clone(), position)
  }

  /// A range inside a single node. Without `end_offset` the selection is
  /// collapsed at `start_offset`.
  pub fn single(path: impl Into<Path>, start_offset: usize, end_offset: Option<usize>) -> Self {
    let path = path.into();
    let start = Position {
      path: path.clone(),
      offset: start_offset,
    };
    let end = Position {
      path,
      offset: end_offset.unwrap_or(start_offset),
    };
    Self::new(start, end)
  }

  /// Whole-node selection of the block at `path`.
  pub fn block(path: impl Into<Path>) -> Self {
    let path = path.into();
    Self {
      start: Position::start_of(path.clone()),
      end:   Position::start_of(path),
      mode:  SelectionMode::Block,
    }
  }

  #[must_use]
  pub fn with_mode(mut self, mode: SelectionMode) -> Self {
    self.mode = mode;
    self
  }

  pub fn is_block(&self) -> bool {
    self.mode == SelectionMode::Block
  }

  pub fn is_collapsed(&self) -> bool {
    self.start == self.end
  }

  /// Both ends live in the same node.
  pub fn is_single(&self) -> bool {
    self.start.path == self.end.path
  }

  pub fn is_forward(&self) -> bool {
    self.start < self.end
  }

  pub fn is_backward(&self) -> bool {
    self.start > self.end
  }

  /// Same range with `start <= end`. Idempotent.
  #[must_use]
  pub fn normalized(&self) -> Selection {
    if self.is_backward() {
      self.reversed()
    } else {
      self.clone()
    }
  }

  #[must_use]
  pub fn reversed(&self) -> Selection {
    Self {
      start: self.end.clone(),
      end:   self.start.clone(),
      mode:  self.mode,
    }
  }

  /// Collapse onto `start` (`at_start`) or `end`.
  #[must_use]
  pub fn collapse(&self, at_start: bool) -> Selection {
    let position = if at_start { &self.start } else { &self.end };
    Self {
      start: position.clone(),
      end:   position.clone(),
      mode:  self.mode,
    }
  }

  /// Offset of the earlier end.
  pub fn start_index(&self) -> usize {
    self.normalized().start.offset
  }

  /// Offset of the later end.
  pub fn end_index(&self) -> usize {
    self.normalized().end.offset
  }

  /// Both offsets moved by `delta` chars.
  #[must_use]
  pub fn shift(&self, delta: isize) -> Selection {
    Self {
      start: self.start.shift(delta),
      end:   self.end.shift(delta),
      mode:  self.mode,
    }
  }

  /// Whether `path` lies between the two ends (inclusive).
  pub fn contains_path(&self, path: &Path) -> bool {
    let normalized = self.normalized();
    let after_start = normalized.start.path <= *path || normalized.start.path.is_ancestor_of(path);
    let before_end = *path <= normalized.end.path || normalized.end.path.is_ancestor_of(path);
    after_start && before_end
  }
}

impl fmt::Display for Selection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.mode {
      SelectionMode::Text => write!(f, "{} -> {}", self.start, self.end),
      SelectionMode::Block => write!(f, "block {} -> {}", self.start.path, self.end.path),
    }
  }
}

#[cfg(test)]
mod test {
  use quickcheck::{
    Arbitrary,
    Gen,
  };

  use super::*;

  #[derive(Debug, Clone)]
  struct AnySelection(Selection);

  impl Arbitrary for AnySelection {
    fn arbitrary(g: &mut Gen) -> Self {
      let mut position = |g: &mut Gen| {
        let depth = usize::arbitrary(g) % 3 + 1;
        let path: Path = (0..depth).map(|_| usize::arbitrary(g) % 4).collect();
        Position::new(path, usize::arbitrary(g) % 8)
      };
      let start = position(g);
      let end = position(g);
      AnySelection(Selection::new(start, end))
    }
  }

  quickcheck::quickcheck! {
    fn normalized_is_ordered(selection: AnySelection) -> bool {
      let normalized = selection.0.normalized();
      normalized.start <= normalized.end
    }

    fn normalized_is_idempotent(selection: AnySelection) -> bool {
      let once = selection.0.normalized();
      once.normalized() == once
    }
  }

  #[test]
  fn reversed_input_normalizes() {
    let selection = Selection::new(Position::new([2], 1), Position::new([0], 2));
    assert!(selection.is_backward());
    let normalized = selection.normalized();
    assert_eq!(normalized.start, Position::new([0], 2));
    assert_eq!(normalized.end, Position::new([2], 1));
    assert_eq!(selection.start_index(), 2);
    assert_eq!(selection.end_index(), 1);
  }

  #[test]
  fn collapsed_iff_equal_ends() {
    assert!(Selection::single([0], 3, None).is_collapsed());
    assert!(!Selection::single([0], 3, Some(4)).is_collapsed());
    let selection = Selection::single([0], 1, Some(4));
    assert_eq!(selection.collapse(true), Selection::single([0], 1, None));
    assert_eq!(selection.collapse(false), Selection::single([0], 4, None));
  }

  #[test]
  fn contains_nested_paths() {
    let selection = Selection::new(Position::new([1], 0), Position::new([3], 0));
    assert!(selection.contains_path(&Path::from([2, 5])));
    assert!(selection.contains_path(&Path::from([1, 0])));
    assert!(!selection.contains_path(&Path::from([3, 0])));
    assert!(!selection.contains_path(&Path::from([0, 9])));
  }
}

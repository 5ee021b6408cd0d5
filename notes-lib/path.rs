//! Node addresses.
//!
//! A [`Path`] is the sequence of child indices leading from the document root
//! to a node. Paths are never stored on nodes; they are recomputed whenever
//! needed, so inserting or removing siblings cannot leave a stale address
//! behind inside the tree.
//!
//! Paths order lexicographically, index by index, with an ancestor sorting
//! before all of its descendants:
//!
//! ```text
//! [0] < [0, 0] < [0, 1] < [1] < [1, 0, 3]
//! ```

use std::fmt;

use smallvec::SmallVec;

#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(SmallVec<[usize; 4]>);

impl Path {
  /// The root's own (empty) path.
  pub fn root() -> Self {
    Self(SmallVec::new())
  }

  pub fn indices(&self) -> &[usize] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Index of the addressed node inside its parent.
  pub fn last(&self) -> Option<usize> {
    self.0.last().copied()
  }

  pub fn parent(&self) -> Option<Path> {
    let (_, parent) = self.0.split_last()?;
    Some(Self(parent.into()))
  }

  /// The slot right after this node, at the same depth.
  #[must_use]
  pub fn next(&self) -> Path {
    let mut next = self.clone();
    if let Some(last) = next.0.last_mut() {
      *last += 1;
    }
    next
  }

  /// The previous sibling slot, `None` for a first child.
  pub fn previous(&self) -> Option<Path> {
    let last = self.last()?.checked_sub(1)?;
    let mut previous = self.clone();
    *previous.0.last_mut()? = last;
    Some(previous)
  }

  #[must_use]
  pub fn child(&self, index: usize) -> Path {
    let mut child = self.clone();
    child.0.push(index);
    child
  }

  /// Replace the last index.
  #[must_use]
  pub fn with_last(&self, index: usize) -> Path {
    let mut path = self.clone();
    match path.0.last_mut() {
      Some(last) => *last = index,
      None => path.0.push(index),
    }
    path
  }

  /// Strict prefix test: a path is not its own ancestor.
  pub fn is_ancestor_of(&self, other: &Path) -> bool {
    self.len() < other.len() && other.0.starts_with(&self.0)
  }

  pub fn is_parent_of(&self, other: &Path) -> bool {
    self.len() + 1 == other.len() && other.0.starts_with(&self.0)
  }

  pub fn starts_with(&self, prefix: &Path) -> bool {
    self.0.starts_with(&prefix.0)
  }

  /// Whether both paths address children of the same parent.
  pub fn is_sibling_of(&self, other: &Path) -> bool {
    self.len() == other.len() && self.parent() == other.parent()
  }

  /// Where this path points after `count` siblings were inserted at `at`.
  #[must_use]
  pub fn shifted_by_insert(&self, at: &Path, count: usize) -> Path {
    let Some((&index, parent)) = at.0.split_last() else {
      return self.clone();
    };
    let depth = parent.len();
    let mut shifted = self.clone();
    if self.len() > depth && self.0.starts_with(parent) && self.0[depth] >= index {
      shifted.0[depth] += count;
    }
    shifted
  }

  /// Where this path points after `count` siblings starting at `at` were
  /// removed. `None` when this path was inside the removed range.
  pub fn shifted_by_delete(&self, at: &Path, count: usize) -> Option<Path> {
    let Some((&index, parent)) = at.0.split_last() else {
      return None;
    };
    let depth = parent.len();
    let mut shifted = self.clone();
    if self.len() > depth && self.0.starts_with(parent) && self.0[depth] >= index {
      if self.0[depth] < index + count {
        return None;
      }
      shifted.0[depth] -= count;
    }
    Some(shifted)
  }

  /// Longest shared prefix.
  pub fn common_prefix(&self, other: &Path) -> Path {
    Self(
      self
        .0
        .iter()
        .zip(other.0.iter())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| *a)
        .collect(),
    )
  }
}

impl fmt::Display for Path {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:?}", self.0.as_slice())
  }
}

impl From<&[usize]> for Path {
  fn from(value: &[usize]) -> Self {
    Self(value.into())
  }
}

impl From<Vec<usize>> for Path {
  fn from(value: Vec<usize>) -> Self {
    Self(value.into())
  }
}

impl<const N: usize> From<[usize; N]> for Path {
  fn from(value: [usize; N]) -> Self {
    Self(value.iter().copied().collect())
  }
}

impl FromIterator<usize> for Path {
  fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
    Self(iter.into_iter().collect())
  }
}

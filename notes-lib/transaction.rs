//! Transactional mutation of the block tree.
//!
//! A [`Transaction`] is built against a snapshot of a [`Document`] and records
//! an ordered list of [`Operation`]s. Every builder call is applied to the
//! transaction's own staged copy of the document right away, so a later call
//! sees the tree as the earlier calls left it. Paths handed to the builder are
//! therefore always interpreted against the *current* staged tree, never
//! against the document the transaction started from.
//!
//! ```ignore
//! let mut tx = Transaction::new(editor.document());
//! tx.insert_text(&path, 0, "hello ", None)?;
//! tx.format_text(&path, 0, 5, &attributes([("bold", true)]))?;
//! tx.after_selection = Some(Selection::single(path, 6, None));
//! editor.apply(tx, ApplyOptions::default())?;
//! ```
//!
//! # Operations
//!
//! Each [`Operation`] carries enough data to build its own inverse, so
//! undoing a [`ChangeSet`] never needs to look at the document:
//!
//! - **InsertNode / DeleteNode** - the nodes themselves
//! - **UpdateAttributes** - the new and the restoring attribute update
//! - **InsertText / DeleteText / FormatText / MergeText** - the text change
//!   delta and its inverse computed against the node's delta at build time
//!
//! # Formatting toggle
//!
//! [`Transaction::format_text`] flips boolean formats: an `attr: true` entry
//! whose whole target range is already `attr == true` is written as `null`,
//! so invoking the same shortcut twice restores the original text.
//!
//! # Error Handling
//!
//! Builder calls return [`Result<T, TransactionError>`]:
//!
//! - **DeltaFormat** - formatting a node that carries no delta
//! - **RangeOutOfBounds** - text range extends past the node's text
//! - **Document** - the path does not resolve in the staged tree

use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::{
  Tendril,
  attributes::{
    Attributes,
    invert_attributes,
  },
  delta::Delta,
  document::{
    Document,
    DocumentError,
  },
  node::Node,
  path::Path,
  position::Position,
  selection::Selection,
};

pub type Result<T> = std::result::Result<T, TransactionError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransactionError {
  #[error("node at {0} has no delta to format")]
  DeltaFormat(Path),
  #[error("text range {from}..{to} is out of bounds for node {path} of length {len}")]
  RangeOutOfBounds {
    path: Path,
    from: usize,
    to:   usize,
    len:  usize,
  },
  #[error(transparent)]
  Document(#[from] DocumentError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
  InsertNode {
    path:  Path,
    nodes: Vec<Node>,
  },
  DeleteNode {
    path:  Path,
    nodes: Vec<Node>,
  },
  UpdateAttributes {
    path:           Path,
    attributes:     Attributes,
    old_attributes: Attributes,
  },
  InsertText {
    path:     Path,
    delta:    Delta,
    inverted: Delta,
  },
  DeleteText {
    path:     Path,
    delta:    Delta,
    inverted: Delta,
  },
  FormatText {
    path:     Path,
    delta:    Delta,
    inverted: Delta,
  },
  MergeText {
    path:     Path,
    delta:    Delta,
    inverted: Delta,
  },
}

impl Operation {
  pub fn path(&self) -> &Path {
    match self {
      Operation::InsertNode { path, .. }
      | Operation::DeleteNode { path, .. }
      | Operation::UpdateAttributes { path, .. }
      | Operation::InsertText { path, .. }
      | Operation::DeleteText { path, .. }
      | Operation::FormatText { path, .. }
      | Operation::MergeText { path, .. } => path,
    }
  }

  /// The text change delta, for text operations.
  pub fn text_delta(&self) -> Option<&Delta> {
    match self {
      Operation::InsertText { delta, .. }
      | Operation::DeleteText { delta, .. }
      | Operation::FormatText { delta, .. }
      | Operation::MergeText { delta, .. } => Some(delta),
      _ => None,
    }
  }

  pub fn apply(&self, doc: &mut Document) -> Result<()> {
    match self {
      Operation::InsertNode { path, nodes } => doc.insert_nodes(path, nodes.clone())?,
      Operation::DeleteNode { path, nodes } => {
        doc.delete_nodes(path, nodes.len())?;
      },
      Operation::UpdateAttributes {
        path, attributes, ..
      } => {
        doc.update_attributes(path, attributes)?;
      },
      Operation::InsertText { path, delta, .. }
      | Operation::DeleteText { path, delta, .. }
      | Operation::FormatText { path, delta, .. }
      | Operation::MergeText { path, delta, .. } => doc.compose_delta(path, delta)?,
    }
    Ok(())
  }

  #[must_use]
  pub fn invert(&self) -> Operation {
    match self.clone() {
      Operation::InsertNode { path, nodes } => Operation::DeleteNode { path, nodes },
      Operation::DeleteNode { path, nodes } => Operation::InsertNode { path, nodes },
      Operation::UpdateAttributes {
        path,
        attributes,
        old_attributes,
      } => Operation::UpdateAttributes {
        path,
        attributes: old_attributes,
        old_attributes: attributes,
      },
      Operation::InsertText {
        path,
        delta,
        inverted,
      }
      | Operation::MergeText {
        path,
        delta,
        inverted,
      } => Operation::DeleteText {
        path,
        delta: inverted,
        inverted: delta,
      },
      Operation::DeleteText {
        path,
        delta,
        inverted,
      } => Operation::InsertText {
        path,
        delta: inverted,
        inverted: delta,
      },
      Operation::FormatText {
        path,
        delta,
        inverted,
      } => Operation::FormatText {
        path,
        delta: inverted,
        inverted: delta,
      },
    }
  }
}

/// An ordered list of operations, applied front to back.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChangeSet {
  operations: Vec<Operation>,
}

impl ChangeSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn operations(&self) -> &[Operation] {
    &self.operations
  }

  pub fn is_empty(&self) -> bool {
    self.operations.is_empty()
  }

  pub fn len(&self) -> usize {
    self.operations.len()
  }

  pub fn push(&mut self, operation: Operation) {
    self.operations.push(operation);
  }

  /// Apply every operation in order. Stops at the first failure, leaving the
  /// operations before it applied.
  pub fn apply(&self, doc: &mut Document) -> Result<()> {
    for operation in &self.operations {
      operation.apply(doc)?;
    }
    Ok(())
  }

  /// Apply to a copy of `doc`, leaving `doc` untouched on failure.
  pub fn apply_to(&self, doc: &Document) -> Result<Document> {
    let mut doc = doc.clone();
    self.apply(&mut doc)?;
    Ok(doc)
  }

  /// The change set undoing this one: inverted operations in reverse order.
  #[must_use]
  pub fn invert(&self) -> ChangeSet {
    Self {
      operations: self.operations.iter().rev().map(Operation::invert).collect(),
    }
  }

  /// `self` followed by `other`.
  #[must_use]
  pub fn compose(mut self, other: ChangeSet) -> ChangeSet {
    self.operations.extend(other.operations);
    self
  }
}

impl FromIterator<Operation> for ChangeSet {
  fn from_iter<T: IntoIterator<Item = Operation>>(iter: T) -> Self {
    Self {
      operations: iter.into_iter().collect(),
    }
  }
}

/// Builder for an atomic batch of operations plus the selections around it.
#[derive(Debug, Clone)]
pub struct Transaction {
  staged:               Document,
  changes:              ChangeSet,
  last_text_position:   Option<Position>,
  pub before_selection: Option<Selection>,
  pub after_selection:  Option<Selection>,
}

impl Transaction {
  pub fn new(doc: &Document) -> Self {
    Self {
      staged:             doc.clone(),
      changes:            ChangeSet::new(),
      last_text_position: None,
      before_selection:   None,
      after_selection:    None,
    }
  }

  #[must_use]
  pub fn with_selection(mut self, selection: Selection) -> Self {
    self.after_selection = Some(selection);
    self
  }

  /// The tree as it will look once the transaction is applied.
  pub fn document(&self) -> &Document {
    &self.staged
  }

  pub fn changes(&self) -> &ChangeSet {
    &self.changes
  }

  pub fn into_changes(self) -> ChangeSet {
    self.changes
  }

  pub fn is_empty(&self) -> bool {
    self.changes.is_empty()
  }

  /// Caret position implied by the last text operation, used when no
  /// `after_selection` was set.
  pub fn last_text_position(&self) -> Option<&Position> {
    self.last_text_position.as_ref()
  }

  fn push(&mut self, operation: Operation) -> Result<()> {
    operation.apply(&mut self.staged)?;
    trace!(operation = ?operation, "staged operation");
    self.changes.push(operation);
    Ok(())
  }

  fn node(&self, path: &Path) -> Result<&Node> {
    self
      .staged
      .get_node_at_path(path)
      .ok_or_else(|| DocumentError::InvalidPath(path.clone()).into())
  }

  fn text_of(&self, path: &Path) -> Result<&Delta> {
    self
      .node(path)?
      .delta()
      .ok_or_else(|| DocumentError::MissingDelta(path.clone()).into())
  }

  fn check_range(path: &Path, delta: &Delta, from: usize, to: usize) -> Result<()> {
    let len = delta.len();
    if from > to || to > len {
      return Err(TransactionError::RangeOutOfBounds {
        path: path.clone(),
        from,
        to,
        len,
      });
    }
    Ok(())
  }

  // Text operations
  //

  pub fn insert_text(
    &mut self,
    path: &Path,
    index: usize,
    text: &str,
    attributes: Option<Attributes>,
  ) -> Result<()> {
    if text.is_empty() {
      return Ok(());
    }
    let base = self.text_of(path)?;
    Self::check_range(path, base, index, index)?;
    let delta = Delta::new().retain(index, None).insert(text, attributes);
    let inverted = delta.invert(base);
    self.push(Operation::InsertText {
      path: path.clone(),
      delta,
      inverted,
    })?;
    self.last_text_position = Some(Position::new(path.clone(), index + text.chars().count()));
    Ok(())
  }

  pub fn delete_text(&mut self, path: &Path, index: usize, len: usize) -> Result<()> {
    if len == 0 {
      return Ok(());
    }
    let base = self.text_of(path)?;
    Self::check_range(path, base, index, index + len)?;
    let delta = Delta::new().retain(index, None).delete(len);
    let inverted = delta.invert(base);
    self.push(Operation::DeleteText {
      path: path.clone(),
      delta,
      inverted,
    })?;
    self.last_text_position = Some(Position::new(path.clone(), index));
    Ok(())
  }

  /// Replace `len` chars at `index` with `text` in one operation.
  pub fn replace_text(
    &mut self,
    path: &Path,
    index: usize,
    len: usize,
    text: &str,
    attributes: Option<Attributes>,
  ) -> Result<()> {
    if text.is_empty() {
      return self.delete_text(path, index, len);
    }
    let base = self.text_of(path)?;
    Self::check_range(path, base, index, index + len)?;
    let delta = Delta::new()
      .retain(index, None)
      .delete(len)
      .insert(text, attributes);
    let inverted = delta.invert(base);
    self.push(Operation::InsertText {
      path: path.clone(),
      delta,
      inverted,
    })?;
    self.last_text_position = Some(Position::new(path.clone(), index + text.chars().count()));
    Ok(())
  }

  /// Apply `attributes` to `len` chars at `index`, toggling boolean flags
  /// that are already set over the whole range.
  pub fn format_text(
    &mut self,
    path: &Path,
    index: usize,
    len: usize,
    attributes: &Attributes,
  ) -> Result<()> {
    let base = self
      .node(path)?
      .delta()
      .ok_or_else(|| TransactionError::DeltaFormat(path.clone()))?;
    Self::check_range(path, base, index, index + len)?;
    if len == 0 || attributes.is_empty() {
      return Ok(());
    }

    let toggled: Attributes = attributes
      .iter()
      .map(|(key, value)| {
        let set_everywhere =
          *value == Value::Bool(true) && base.every_attribute_eq(index, index + len, key, value);
        let value = if set_everywhere { Value::Null } else { value.clone() };
        (key.clone(), value)
      })
      .collect();

    let delta = Delta::new()
      .retain(index, None)
      .retain(len, Some(toggled));
    let inverted = delta.invert(base);
    self.push(Operation::FormatText {
      path: path.clone(),
      delta,
      inverted,
    })?;
    self.last_text_position = Some(Position::new(path.clone(), index + len));
    Ok(())
  }

  /// Write `attributes` over `len` chars at `index` as given, without the
  /// toggle rule. A `null` value clears the key.
  pub fn set_text_attributes(
    &mut self,
    path: &Path,
    index: usize,
    len: usize,
    attributes: &Attributes,
  ) -> Result<()> {
    let base = self
      .node(path)?
      .delta()
      .ok_or_else(|| TransactionError::DeltaFormat(path.clone()))?;
    Self::check_range(path, base, index, index + len)?;
    if len == 0 || attributes.is_empty() {
      return Ok(());
    }
    let delta = Delta::new()
      .retain(index, None)
      .retain(len, Some(attributes.clone()));
    let inverted = delta.invert(base);
    self.push(Operation::FormatText {
      path: path.clone(),
      delta,
      inverted,
    })?;
    self.last_text_position = Some(Position::new(path.clone(), index + len));
    Ok(())
  }

  /// Append the text of `right` (from `right_offset`) onto `left` (cut at
  /// `left_offset`) and move `right`'s children out of it.
  ///
  /// Children become the trailing children of `left` when its type nests,
  /// otherwise they are inserted as siblings right after `left`. The `right`
  /// node itself stays in place, now childless; its path after the move is
  /// returned so the caller can delete it.
  pub fn merge_text(
    &mut self,
    left: &Path,
    right: &Path,
    left_offset: Option<usize>,
    right_offset: Option<usize>,
  ) -> Result<Path> {
    let left_delta = self.text_of(left)?;
    let right_node = self.node(right)?;
    let right_delta = right_node
      .delta()
      .ok_or_else(|| DocumentError::MissingDelta(right.clone()))?;

    let left_len = left_delta.len();
    let left_offset = left_offset.unwrap_or(left_len);
    let right_len = right_delta.len();
    let right_offset = right_offset.unwrap_or(0);
    Self::check_range(left, left_delta, left_offset, left_len)?;
    Self::check_range(right, right_delta, right_offset, right_len)?;

    let mut delta = Delta::new()
      .retain(left_offset, None)
      .delete(left_len - left_offset);
    for op in right_delta.slice(right_offset, right_len).iter() {
      delta.push(op.clone());
    }
    let inverted = delta.invert(left_delta);
    let children = right_node.children().to_vec();

    self.push(Operation::MergeText {
      path: left.clone(),
      delta,
      inverted,
    })?;
    self.last_text_position = Some(Position::new(left.clone(), left_offset));

    if children.is_empty() {
      return Ok(right.clone());
    }

    let count = children.len();
    self.push(Operation::DeleteNode {
      path:  right.child(0),
      nodes: children.clone(),
    })?;
    let left_node = self.node(left)?;
    let target = if self.staged.schema().permits_children(left_node.kind()) {
      left.child(left_node.children().len())
    } else {
      left.next()
    };
    self.push(Operation::InsertNode {
      path:  target.clone(),
      nodes: children,
    })?;
    Ok(right.shifted_by_insert(&target, count))
  }

  // Node operations
  //

  pub fn insert_node(&mut self, path: &Path, node: Node) -> Result<()> {
    self.insert_nodes(path, vec![node])
  }

  /// Insert `nodes` so that the first one lands at `path`. Nodes are owned
  /// values, so the tree never aliases a caller's copy.
  pub fn insert_nodes(&mut self, path: &Path, nodes: Vec<Node>) -> Result<()> {
    if nodes.is_empty() {
      return Ok(());
    }
    self.push(Operation::InsertNode {
      path: path.clone(),
      nodes,
    })
  }

  pub fn delete_node(&mut self, path: &Path) -> Result<()> {
    self.delete_nodes(path, 1)
  }

  /// Delete `count` siblings starting at `path`, subtrees included.
  pub fn delete_nodes(&mut self, path: &Path, count: usize) -> Result<()> {
    if count == 0 {
      return Ok(());
    }
    let parent = path.parent().ok_or(DocumentError::RootPath)?;
    let index = path.last().ok_or(DocumentError::RootPath)?;
    let siblings = self
      .node(&parent)?
      .children()
      .get(index..index + count)
      .ok_or_else(|| DocumentError::InvalidPath(path.clone()))?
      .to_vec();
    self.push(Operation::DeleteNode {
      path:  path.clone(),
      nodes: siblings,
    })
  }

  pub fn update_attributes(&mut self, path: &Path, attributes: Attributes) -> Result<()> {
    let node = self.node(path)?;
    let old_attributes = invert_attributes(Some(&attributes), Some(node.attributes()));
    self.push(Operation::UpdateAttributes {
      path: path.clone(),
      attributes,
      old_attributes,
    })
  }

  /// Swap the node at `path` for a copy of type `kind`, keeping its text and
  /// children. Attributes are dropped unless `keep_attributes` is set.
  pub fn turn_into(&mut self, path: &Path, kind: &str, keep_attributes: bool) -> Result<()> {
    let node = self.node(path)?;
    let mut replacement = Node::new(Tendril::from(kind)).with_children(node.children().to_vec());
    if let Some(delta) = node.delta() {
      replacement = replacement.with_delta(delta.clone());
    }
    if keep_attributes {
      replacement = replacement.with_attributes(node.attributes().clone());
    }
    self.delete_node(path)?;
    self.insert_node(path, replacement)
  }
}

//! The block tree.
//!
//! A [`Document`] owns a root node (conventionally of type `page`) and the
//! [`BlockSchema`] describing which block types nest and which carry text.
//! Every node is addressed by a [`Path`] from the root; the root itself has
//! the empty path.
//!
//! Reads are open to everyone (encoders walk the tree through [`Document::iter`]
//! and [`Node::delta`]). Mutation happens through transactions: the editor only
//! ever hands out shared references to its live document.
//!
//! Path lookups never panic. A stale or out-of-bounds path resolves to `None`,
//! and the mutating primitives report it as [`DocumentError::InvalidPath`].

use thiserror::Error;

use crate::{
  attributes::{
    Attributes,
    invert_attributes,
  },
  delta::Delta,
  node::{
    BlockSchema,
    Node,
    PAGE,
  },
  path::Path,
  selection::Selection,
};

pub type Result<T> = std::result::Result<T, DocumentError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DocumentError {
  #[error("no node at path {0}")]
  InvalidPath(Path),
  #[error("node at {0} has no delta")]
  MissingDelta(Path),
  #[error("cannot place nodes at the root path")]
  RootPath,
  #[error("malformed document: {0}")]
  Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
  root:   Node,
  schema: BlockSchema,
}

impl Default for Document {
  fn default() -> Self {
    Self::new(Node::new(PAGE))
  }
}

impl Document {
  pub fn new(root: Node) -> Self {
    Self {
      root,
      schema: BlockSchema::default(),
    }
  }

  /// A page whose top-level blocks are `children`.
  pub fn from_blocks(children: impl IntoIterator<Item = Node>) -> Self {
    Self::new(Node::new(PAGE).with_children(children))
  }

  #[must_use]
  pub fn with_schema(mut self, schema: BlockSchema) -> Self {
    self.schema = schema;
    self
  }

  pub fn root(&self) -> &Node {
    &self.root
  }

  pub fn schema(&self) -> &BlockSchema {
    &self.schema
  }

  // Reads
  //

  /// Walk children index by index. The empty path is the root.
  pub fn get_node_at_path(&self, path: &Path) -> Option<&Node> {
    path
      .indices()
      .iter()
      .try_fold(&self.root, |node, &index| node.child(index))
  }

  pub fn delta_at(&self, path: &Path) -> Option<&Delta> {
    self.get_node_at_path(path)?.delta()
  }

  pub fn contains(&self, path: &Path) -> bool {
    self.get_node_at_path(path).is_some()
  }

  pub fn parent_of(&self, path: &Path) -> Option<&Node> {
    self.get_node_at_path(&path.parent()?)
  }

  /// Paths of all nodes between the two ends of `selection`, in document
  /// order. Descendants of nodes inside the range are included, ancestors
  /// of the start node are not.
  pub fn get_paths_in_selection(&self, selection: &Selection) -> Vec<Path> {
    let normalized = selection.normalized();
    let (start, end) = (&normalized.start.path, &normalized.end.path);
    if !self.contains(start) || !self.contains(end) {
      return Vec::new();
    }
    if start == end {
      return vec![start.clone()];
    }
    self
      .iter()
      .map(|(path, _)| path)
      .skip_while(|path| path < start)
      .take_while(|path| path <= end)
      .collect()
  }

  pub fn get_nodes_in_selection(&self, selection: &Selection) -> Vec<&Node> {
    self
      .get_paths_in_selection(selection)
      .iter()
      .filter_map(|path| self.get_node_at_path(path))
      .collect()
  }

  /// Depth-first, pre-order walk over every node below the root.
  pub fn iter(&self) -> Iter<'_> {
    Iter {
      stack: vec![(Path::root(), &self.root)],
      root:  true,
    }
  }

  /// The deepest last descendant of `path`, or `path` itself when childless.
  pub fn last_descendant(&self, path: &Path) -> Option<Path> {
    let mut node = self.get_node_at_path(path)?;
    let mut path = path.clone();
    while let Some(last) = node.children().len().checked_sub(1) {
      path = path.child(last);
      node = &node.children()[last];
    }
    Some(path)
  }

  /// The node before `path` in document order.
  pub fn previous_in_order(&self, path: &Path) -> Option<Path> {
    match path.previous() {
      Some(previous) => self.last_descendant(&previous),
      None => path.parent().filter(|parent| !parent.is_empty()),
    }
  }

  /// The node after `path` in document order.
  pub fn next_in_order(&self, path: &Path) -> Option<Path> {
    let node = self.get_node_at_path(path)?;
    if !node.children().is_empty() {
      return Some(path.child(0));
    }
    let mut cursor = path.clone();
    while !cursor.is_empty() {
      let next = cursor.next();
      if self.contains(&next) {
        return Some(next);
      }
      cursor = cursor.parent()?;
    }
    None
  }

  /// Closest preceding node (document order) that carries a delta.
  pub fn previous_text_node(&self, path: &Path) -> Option<Path> {
    let mut cursor = self.previous_in_order(path)?;
    loop {
      if self.get_node_at_path(&cursor)?.has_delta() {
        return Some(cursor);
      }
      cursor = self.previous_in_order(&cursor)?;
    }
  }

  /// Closest following node (document order) that carries a delta.
  pub fn next_text_node(&self, path: &Path) -> Option<Path> {
    let mut cursor = self.next_in_order(path)?;
    loop {
      if self.get_node_at_path(&cursor)?.has_delta() {
        return Some(cursor);
      }
      cursor = self.next_in_order(&cursor)?;
    }
  }

  /// The nearest ancestor (excluding the root) whose type is `kind`.
  pub fn ancestor_of_kind(&self, path: &Path, kind: &str) -> Option<Path> {
    let mut cursor = path.parent()?;
    while !cursor.is_empty() {
      if self.get_node_at_path(&cursor)?.is_kind(kind) {
        return Some(cursor);
      }
      cursor = cursor.parent()?;
    }
    None
  }

  /// First path of the document, if any.
  pub fn first_path(&self) -> Option<Path> {
    (!self.root.children().is_empty()).then(|| Path::from([0]))
  }

  /// Last node in document order, if any.
  pub fn last_path(&self) -> Option<Path> {
    let last = self.root.children().len().checked_sub(1)?;
    self.last_descendant(&Path::from([last]))
  }

  // Mutation primitives, driven by transaction operations.
  //

  fn node_mut(&mut self, path: &Path) -> Result<&mut Node> {
    let mut node = &mut self.root;
    for &index in path.indices() {
      node = node
        .children_mut()
        .get_mut(index)
        .ok_or_else(|| DocumentError::InvalidPath(path.clone()))?;
    }
    Ok(node)
  }

  /// Insert `nodes` so that the first one ends up at `path`.
  pub(crate) fn insert_nodes(&mut self, path: &Path, nodes: Vec<Node>) -> Result<()> {
    let (Some(parent), Some(index)) = (path.parent(), path.last()) else {
      return Err(DocumentError::RootPath);
    };
    let children = self.node_mut(&parent)?.children_mut();
    if index > children.len() {
      return Err(DocumentError::InvalidPath(path.clone()));
    }
    children.splice(index..index, nodes);
    Ok(())
  }

  /// Remove `count` siblings starting at `path`, returning them.
  pub(crate) fn delete_nodes(&mut self, path: &Path, count: usize) -> Result<Vec<Node>> {
    let (Some(parent), Some(index)) = (path.parent(), path.last()) else {
      return Err(DocumentError::RootPath);
    };
    let children = self.node_mut(&parent)?.children_mut();
    if index + count > children.len() {
      return Err(DocumentError::InvalidPath(path.clone()));
    }
    Ok(children.drain(index..index + count).collect())
  }

  /// Shallow merge into the node's attributes, `null` clears. Returns the
  /// update that restores the previous attributes.
  pub fn update_attributes(&mut self, path: &Path, attributes: &Attributes) -> Result<Attributes> {
    let node = self.node_mut(path)?;
    let inverse = invert_attributes(Some(attributes), Some(node.attributes()));
    node.merge_attributes(attributes);
    Ok(inverse)
  }

  /// Compose `change` onto the node's delta.
  pub(crate) fn compose_delta(&mut self, path: &Path, change: &Delta) -> Result<()> {
    let node = self.node_mut(path)?;
    let delta = node
      .delta_mut()
      .ok_or_else(|| DocumentError::MissingDelta(path.clone()))?;
    *delta = delta.compose(change);
    Ok(())
  }

  // Persistence
  //

  pub fn to_json(&self) -> Result<String> {
    Ok(serde_json::to_string(&self.root)?)
  }

  pub fn to_json_pretty(&self) -> Result<String> {
    Ok(serde_json::to_string_pretty(&self.root)?)
  }

  pub fn from_json(json: &str) -> Result<Self> {
    Ok(Self::new(serde_json::from_str(json)?))
  }
}

/// Pre-order iterator returned by [`Document::iter`].
pub struct Iter<'a> {
  stack: Vec<(Path, &'a Node)>,
  root:  bool,
}

impl<'a> Iterator for Iter<'a> {
  type Item = (Path, &'a Node);

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      let (path, node) = self.stack.pop()?;
      for (index, child) in node.children().iter().enumerate().rev() {
        self.stack.push((path.child(index), child));
      }
      if std::mem::take(&mut self.root) {
        continue;
      }
      return Some((path, node));
    }
  }
}

#[cfg(test)]
mod test {
  use serde_json::json;

  use super::*;
  use crate::{
    attributes::attributes,
    node::{
      BULLETED_LIST,
      DIVIDER,
      PARAGRAPH,
    },
    position::Position,
  };

  fn sample() -> Document {
    Document::from_blocks([
      Node::paragraph("one"),
      Node::new(BULLETED_LIST)
        .with_delta(Delta::from_text("two"))
        .with_children([Node::paragraph("two.a"), Node::paragraph("two.b")]),
      Node::new(DIVIDER),
      Node::paragraph("three"),
    ])
  }

  #[test]
  fn path_lookup() {
    let doc = sample();
    assert_eq!(doc.get_node_at_path(&Path::from([0])).unwrap().text(), "one");
    assert_eq!(doc.get_node_at_path(&Path::from([1, 1])).unwrap().text(), "two.b");
    assert!(doc.get_node_at_path(&Path::from([1, 2])).is_none());
    assert!(doc.get_node_at_path(&Path::from([9])).is_none());
    assert!(doc.get_node_at_path(&Path::from([0, 0])).is_none());
    assert!(doc.get_node_at_path(&Path::root()).unwrap().is_kind(PAGE));
  }

  #[test]
  fn every_iterated_path_resolves_to_its_node() {
    let doc = sample();
    let paths: Vec<_> = doc.iter().map(|(path, _)| path).collect();
    assert_eq!(paths, vec![
      Path::from([0]),
      Path::from([1]),
      Path::from([1, 0]),
      Path::from([1, 1]),
      Path::from([2]),
      Path::from([3]),
    ]);
    for (path, node) in doc.iter() {
      assert_eq!(doc.get_node_at_path(&path), Some(node));
    }
  }

  #[test]
  fn nodes_in_selection_are_in_document_order() {
    let doc = sample();
    let selection = Selection::new(Position::new([3], 2), Position::new([1, 0], 1));
    let texts: Vec<_> = doc
      .get_nodes_in_selection(&selection)
      .into_iter()
      .map(|node| node.kind().to_string())
      .collect();
    assert_eq!(texts, vec![PARAGRAPH, PARAGRAPH, DIVIDER, PARAGRAPH]);

    let single = Selection::single([0], 0, Some(2));
    assert_eq!(doc.get_nodes_in_selection(&single).len(), 1);
    let stale = Selection::single([7], 0, None);
    assert!(doc.get_nodes_in_selection(&stale).is_empty());
  }

  #[test]
  fn document_order_neighbours() {
    let doc = sample();
    assert_eq!(doc.next_in_order(&Path::from([1])), Some(Path::from([1, 0])));
    assert_eq!(doc.next_in_order(&Path::from([1, 1])), Some(Path::from([2])));
    assert_eq!(doc.next_in_order(&Path::from([3])), None);
    assert_eq!(doc.previous_in_order(&Path::from([2])), Some(Path::from([1, 1])));
    assert_eq!(doc.previous_in_order(&Path::from([1, 0])), Some(Path::from([1])));
    assert_eq!(doc.previous_in_order(&Path::from([0])), None);
    assert_eq!(doc.previous_text_node(&Path::from([3])), Some(Path::from([1, 1])));
    assert_eq!(doc.next_text_node(&Path::from([1, 1])), Some(Path::from([3])));
    assert_eq!(doc.last_path(), Some(Path::from([3])));
  }

  #[test]
  fn update_attributes_merges_and_clears() {
    let mut doc = sample();
    let path = Path::from([0]);
    doc
      .update_attributes(&path, &attributes([("align", json!("center")), ("checked", json!(true))]))
      .unwrap();
    let inverse = doc
      .update_attributes(&path, &attributes([("checked", serde_json::Value::Null)]))
      .unwrap();
    assert_eq!(
      doc.get_node_at_path(&path).unwrap().attributes(),
      &attributes([("align", json!("center"))])
    );
    doc.update_attributes(&path, &inverse).unwrap();
    assert_eq!(
      doc.get_node_at_path(&path).unwrap().attributes().get("checked"),
      Some(&json!(true))
    );
    assert!(matches!(
      doc.update_attributes(&Path::from([8]), &Attributes::new()),
      Err(DocumentError::InvalidPath(_))
    ));
  }

  #[test]
  fn json_round_trip_is_lossless() {
    let mut doc = sample();
    doc
      .update_attributes(&Path::from([1, 0]), &attributes([("indent", json!(1))]))
      .unwrap();
    doc
      .compose_delta(
        &Path::from([3]),
        &Delta::new().retain(2, Some(attributes([("bold", json!(true))]))),
      )
      .unwrap();
    let json = doc.to_json().unwrap();
    let back = Document::from_json(&json).unwrap();
    assert_eq!(back, doc);
    assert!(Document::from_json("{\"children\": 3}").is_err());
  }
}

//! Block nodes and the block schema.
//!
//! A [`Node`] is one block of the document. It owns its children by value;
//! the parent relation is implied by position in the tree and resolved
//! through [`crate::document::Document`] using a [`crate::path::Path`].

use std::collections::HashSet;

use serde::{
  Deserialize,
  Serialize,
};

use crate::{
  Tendril,
  attributes::{
    Attributes,
    merge_attributes,
  },
  delta::Delta,
};

pub const PAGE: &str = "page";
pub const PARAGRAPH: &str = "paragraph";
pub const HEADING: &str = "heading";
pub const TODO_LIST: &str = "todo_list";
pub const BULLETED_LIST: &str = "bulleted_list";
pub const NUMBERED_LIST: &str = "numbered_list";
pub const QUOTE: &str = "quote";
pub const CODE: &str = "code";
pub const DIVIDER: &str = "divider";
pub const TABLE: &str = "table";
pub const TABLE_CELL: &str = "table/cell";
pub const IMAGE: &str = "image";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  #[serde(rename = "type")]
  kind:       Tendril,
  #[serde(default)]
  attributes: Attributes,
  #[serde(default)]
  children:   Vec<Node>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  delta:      Option<Delta>,
}

impl Node {
  pub fn new(kind: impl Into<Tendril>) -> Self {
    Self {
      kind:       kind.into(),
      attributes: Attributes::new(),
      children:   Vec::new(),
      delta:      None,
    }
  }

  /// A paragraph holding plain `text`.
  pub fn paragraph(text: &str) -> Self {
    Self::new(PARAGRAPH).with_delta(Delta::from_text(text))
  }

  #[must_use]
  pub fn with_delta(mut self, delta: Delta) -> Self {
    self.delta = Some(delta);
    self
  }

  #[must_use]
  pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
    self.children = children.into_iter().collect();
    self
  }

  #[must_use]
  pub fn with_attributes(mut self, attributes: Attributes) -> Self {
    self.attributes = attributes;
    self
  }

  pub fn kind(&self) -> &str {
    &self.kind
  }

  pub fn is_kind(&self, kind: &str) -> bool {
    self.kind.as_str() == kind
  }

  pub fn attributes(&self) -> &Attributes {
    &self.attributes
  }

  pub fn children(&self) -> &[Node] {
    &self.children
  }

  pub fn child(&self, index: usize) -> Option<&Node> {
    self.children.get(index)
  }

  pub fn delta(&self) -> Option<&Delta> {
    self.delta.as_ref()
  }

  pub fn has_delta(&self) -> bool {
    self.delta.is_some()
  }

  /// Plain text of the delta, empty for structural nodes.
  pub fn text(&self) -> String {
    self
      .delta
      .as_ref()
      .map(Delta::to_plain_text)
      .unwrap_or_default()
  }

  /// Text length in chars, zero for structural nodes.
  pub fn text_len(&self) -> usize {
    self.delta.as_ref().map_or(0, Delta::len)
  }

  pub(crate) fn children_mut(&mut self) -> &mut Vec<Node> {
    &mut self.children
  }

  pub(crate) fn delta_mut(&mut self) -> Option<&mut Delta> {
    self.delta.as_mut()
  }

  pub(crate) fn merge_attributes(&mut self, update: &Attributes) {
    merge_attributes(&mut self.attributes, update);
  }
}

/// Which block types may nest children and which carry text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSchema {
  nestable: HashSet<Tendril>,
  textual:  HashSet<Tendril>,
}

impl Default for BlockSchema {
  fn default() -> Self {
    let nestable = [
      PAGE,
      PARAGRAPH,
      TODO_LIST,
      BULLETED_LIST,
      NUMBERED_LIST,
      QUOTE,
      TABLE,
      TABLE_CELL,
    ];
    let textual = [
      PARAGRAPH,
      HEADING,
      TODO_LIST,
      BULLETED_LIST,
      NUMBERED_LIST,
      QUOTE,
      CODE,
    ];
    Self {
      nestable: nestable.into_iter().map(Tendril::from).collect(),
      textual:  textual.into_iter().map(Tendril::from).collect(),
    }
  }
}

impl BlockSchema {
  pub fn permits_children(&self, kind: &str) -> bool {
    self.nestable.contains(kind)
  }

  pub fn carries_delta(&self, kind: &str) -> bool {
    self.textual.contains(kind)
  }

  /// Register a custom block type.
  pub fn register(&mut self, kind: &str, nestable: bool, textual: bool) {
    if nestable {
      self.nestable.insert(kind.into());
    } else {
      self.nestable.remove(kind);
    }
    if textual {
      self.textual.insert(kind.into());
    } else {
      self.textual.remove(kind);
    }
  }
}

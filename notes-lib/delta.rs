//! Delta-encoded rich text.
//!
//! A [`Delta`] is an ordered list of [`TextOperation`]s. A delta made only of
//! inserts describes text content (this is what a text node stores); a delta
//! mixing retains and deletes describes a *change* to such content and is
//! applied with [`Delta::compose`].
//!
//! All lengths and indices are counted in chars (Unicode scalar values), never
//! in bytes or UTF-16 units. Cursor stepping additionally respects grapheme
//! clusters through [`Delta::prev_rune_position`] and
//! [`Delta::next_rune_position`].
//!
//! ```ignore
//! let text = Delta::new().insert("hello world", None);
//! let change = Delta::new().retain(6, None).delete(5).insert("rust", None);
//! assert_eq!(text.compose(&change).to_plain_text(), "hello rust");
//! ```
//!
//! Adjacent operations of the same kind are merged while building, but only
//! when their attribute sets are equal.

use std::fmt;

use notes_core::grapheme::{
  char_len,
  char_slice,
  next_grapheme_boundary,
  prev_grapheme_boundary,
};
use serde::{
  Deserialize,
  Serialize,
};
use serde_json::Value;

use crate::{
  Tendril,
  attributes::{
    Attributes,
    compose_attributes,
    invert_attributes,
    normalize,
  },
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextOperation {
  /// Insert text, optionally formatted.
  Insert {
    #[serde(rename = "insert")]
    text:       Tendril,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attributes: Option<Attributes>,
  },

  /// Keep `len` chars, optionally changing their format.
  Retain {
    #[serde(rename = "retain")]
    len:        usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attributes: Option<Attributes>,
  },

  /// Remove `len` chars.
  Delete {
    #[serde(rename = "delete")]
    len: usize,
  },
}

impl TextOperation {
  pub fn len_chars(&self) -> usize {
    match self {
      TextOperation::Insert { text, .. } => char_len(text),
      TextOperation::Retain { len, .. } | TextOperation::Delete { len } => *len,
    }
  }

  pub fn attributes(&self) -> Option<&Attributes> {
    match self {
      TextOperation::Insert { attributes, .. } | TextOperation::Retain { attributes, .. } => {
        attributes.as_ref()
      },
      TextOperation::Delete { .. } => None,
    }
  }

  pub fn is_insert(&self) -> bool {
    matches!(self, TextOperation::Insert { .. })
  }

  pub fn is_delete(&self) -> bool {
    matches!(self, TextOperation::Delete { .. })
  }

  pub fn is_retain(&self) -> bool {
    matches!(self, TextOperation::Retain { .. })
  }

  fn is_empty(&self) -> bool {
    self.len_chars() == 0
  }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
  #[serde(default)]
  ops: Vec<TextOperation>,
}

impl Delta {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_ops(ops: impl IntoIterator<Item = TextOperation>) -> Self {
    let mut delta = Self::new();
    for op in ops {
      delta.push(op);
    }
    delta
  }

  /// Plain, unformatted text content.
  pub fn from_text(text: &str) -> Self {
    Self::new().insert(text, None)
  }

  pub fn ops(&self) -> &[TextOperation] {
    &self.ops
  }

  pub fn is_empty(&self) -> bool {
    self.ops.is_empty()
  }

  /// Sum of all operation lengths. For a content delta this is the text
  /// length in chars.
  pub fn len(&self) -> usize {
    self.ops.iter().map(TextOperation::len_chars).sum()
  }

  // Builder operations: insert/retain/delete.
  //

  #[must_use]
  pub fn insert(mut self, text: impl Into<Tendril>, attributes: Option<Attributes>) -> Self {
    self.push(TextOperation::Insert {
      text:       text.into(),
      attributes: attributes.and_then(normalize),
    });
    self
  }

  #[must_use]
  pub fn retain(mut self, len: usize, attributes: Option<Attributes>) -> Self {
    self.push(TextOperation::Retain {
      len,
      attributes: attributes.and_then(normalize),
    });
    self
  }

  #[must_use]
  pub fn delete(mut self, len: usize) -> Self {
    self.push(TextOperation::Delete { len });
    self
  }

  /// Append an operation, merging it into the previous one when both have
  /// the same kind and the same attributes. Inserts are kept in front of a
  /// trailing delete so that equivalent deltas compare equal.
  pub fn push(&mut self, op: TextOperation) {
    use TextOperation::*;

    if op.is_empty() {
      return;
    }
    let op = match op {
      Insert { text, attributes } => Insert {
        text,
        attributes: attributes.and_then(normalize),
      },
      Retain { len, attributes } => Retain {
        len,
        attributes: attributes.and_then(normalize),
      },
      delete => delete,
    };

    let mut index = self.ops.len();
    if let (Some(Delete { len: last }), Delete { len }) = (self.ops.last_mut(), &op) {
      *last += *len;
      return;
    }
    if matches!(self.ops.last(), Some(Delete { .. })) && op.is_insert() {
      index -= 1;
      if index == 0 {
        self.ops.insert(0, op);
        return;
      }
    }

    if index > 0 {
      match (&mut self.ops[index - 1], &op) {
        (
          Insert {
            text: prev,
            attributes: prev_attrs,
          },
          Insert { text, attributes },
        ) if prev_attrs == attributes => {
          prev.push_str(text);
          return;
        },
        (
          Retain {
            len: prev,
            attributes: prev_attrs,
          },
          Retain { len, attributes },
        ) if prev_attrs == attributes => {
          *prev += len;
          return;
        },
        _ => {},
      }
    }

    if index == self.ops.len() {
      self.ops.push(op);
    } else {
      self.ops.insert(index, op);
    }
  }

  /// Drop a trailing unformatted retain, it has no effect.
  #[must_use]
  pub fn chop(mut self) -> Self {
    if let Some(TextOperation::Retain {
      attributes: None, ..
    }) = self.ops.last()
    {
      self.ops.pop();
    }
    self
  }

  pub fn to_plain_text(&self) -> String {
    self
      .ops
      .iter()
      .filter_map(|op| match op {
        TextOperation::Insert { text, .. } => Some(text.as_str()),
        _ => None,
      })
      .collect()
  }

  /// Copy the chars `start..end`.
  pub fn slice(&self, start: usize, end: usize) -> Delta {
    let mut delta = Delta::new();
    let mut iter = OpIterator::new(&self.ops);
    let mut index = 0;
    while index < end && iter.has_next() {
      let next = if index < start {
        iter.next(Some(start - index))
      } else {
        let op = iter.next(Some(end - index));
        delta.push(op.clone());
        op
      };
      index += next.len_chars();
    }
    delta
  }

  /// Apply `other` on top of `self`.
  pub fn compose(&self, other: &Delta) -> Delta {
    use TextOperation::*;

    let mut this_iter = OpIterator::new(&self.ops);
    let mut other_iter = OpIterator::new(&other.ops);
    let mut delta = Delta::new();

    while this_iter.has_next() || other_iter.has_next() {
      if other_iter.peek().is_some_and(TextOperation::is_insert) {
        delta.push(other_iter.next(None));
      } else if this_iter.peek().is_some_and(TextOperation::is_delete) {
        delta.push(this_iter.next(None));
      } else {
        let len = this_iter.peek_len().min(other_iter.peek_len());
        let this_op = this_iter.next(Some(len));
        let other_op = other_iter.next(Some(len));
        match (this_op, other_op) {
          (
            Retain {
              len,
              attributes: this_attrs,
            },
            Retain {
              attributes: other_attrs,
              ..
            },
          ) => {
            delta.push(Retain {
              len,
              attributes: compose_attributes(this_attrs.as_ref(), other_attrs.as_ref(), true),
            });
          },
          (
            Insert {
              text,
              attributes: this_attrs,
            },
            Retain {
              attributes: other_attrs,
              ..
            },
          ) => {
            delta.push(Insert {
              text,
              attributes: compose_attributes(this_attrs.as_ref(), other_attrs.as_ref(), false),
            });
          },
          (Retain { .. }, delete @ Delete { .. }) => delta.push(delete),
          // insert followed by delete cancels out
          _ => {},
        }
      }
    }

    delta.chop()
  }

  /// A delta that undoes `self` when composed onto `base.compose(self)`.
  /// `base` is the content this change was applied to.
  pub fn invert(&self, base: &Delta) -> Delta {
    use TextOperation::*;

    let mut inverted = Delta::new();
    let mut base_index = 0;
    for op in &self.ops {
      match op {
        Insert { text, .. } => inverted.push(Delete {
          len: char_len(text),
        }),
        Retain {
          len,
          attributes: None,
        } => {
          inverted.push(Retain {
            len:        *len,
            attributes: None,
          });
          base_index += len;
        },
        Retain { len, attributes } => {
          for base_op in base.slice(base_index, base_index + len).ops {
            inverted.push(Retain {
              len:        base_op.len_chars(),
              attributes: normalize(invert_attributes(
                attributes.as_ref(),
                base_op.attributes(),
              )),
            });
          }
          base_index += len;
        },
        Delete { len } => {
          for base_op in base.slice(base_index, base_index + len).ops {
            inverted.push(base_op);
          }
          base_index += len;
        },
      }
    }
    inverted.chop()
  }

  /// Attributes of the char at `index`, or of the char before it when
  /// `index` is the end of the text.
  pub fn attributes_at(&self, index: usize) -> Option<&Attributes> {
    let mut offset = 0;
    let mut last = None;
    for op in &self.ops {
      let len = op.len_chars();
      if index < offset + len {
        return op.attributes();
      }
      offset += len;
      last = op.attributes();
    }
    if index == offset { last } else { None }
  }

  /// Whether every char in `start..end` has attributes satisfying `pred`.
  /// An empty range never matches.
  pub fn every_attribute(
    &self,
    start: usize,
    end: usize,
    mut pred: impl FnMut(Option<&Attributes>) -> bool,
  ) -> bool {
    let slice = self.slice(start, end);
    !slice.is_empty() && slice.ops.iter().all(|op| pred(op.attributes()))
  }

  /// Whether every char in `start..end` has `key == value`.
  pub fn every_attribute_eq(&self, start: usize, end: usize, key: &str, value: &Value) -> bool {
    self.every_attribute(start, end, |attrs| {
      attrs.and_then(|attrs| attrs.get(key)) == Some(value)
    })
  }

  /// Char index of the grapheme boundary before `pos`.
  pub fn prev_rune_position(&self, pos: usize) -> usize {
    prev_grapheme_boundary(&self.to_plain_text(), pos)
  }

  /// Char index of the grapheme boundary after `pos`.
  pub fn next_rune_position(&self, pos: usize) -> usize {
    next_grapheme_boundary(&self.to_plain_text(), pos)
  }

  /// Plain text of the chars `start..end`.
  pub fn text_between(&self, start: usize, end: usize) -> String {
    char_slice(&self.to_plain_text(), start, end).to_string()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, TextOperation> {
    self.ops.iter()
  }
}

impl fmt::Display for Delta {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_plain_text())
  }
}

impl<'a> IntoIterator for &'a Delta {
  type Item = &'a TextOperation;
  type IntoIter = std::slice::Iter<'a, TextOperation>;

  fn into_iter(self) -> Self::IntoIter {
    self.ops.iter()
  }
}

/// Walks a list of operations, handing out pieces of at most a requested
/// length. Past the end it yields unbounded plain retains, which is what
/// composition expects.
struct OpIterator<'a> {
  ops:    &'a [TextOperation],
  index:  usize,
  offset: usize,
}

impl<'a> OpIterator<'a> {
  fn new(ops: &'a [TextOperation]) -> Self {
    Self {
      ops,
      index: 0,
      offset: 0,
    }
  }

  fn has_next(&self) -> bool {
    self.peek_len() < usize::MAX
  }

  fn peek(&self) -> Option<&'a TextOperation> {
    self.ops.get(self.index)
  }

  fn peek_len(&self) -> usize {
    self
      .ops
      .get(self.index)
      .map_or(usize::MAX, |op| op.len_chars() - self.offset)
  }

  fn next(&mut self, len: Option<usize>) -> TextOperation {
    use TextOperation::*;

    let Some(op) = self.ops.get(self.index) else {
      return Retain {
        len:        len.unwrap_or(usize::MAX),
        attributes: None,
      };
    };

    let offset = self.offset;
    let op_len = op.len_chars();
    let len = len.unwrap_or(usize::MAX).min(op_len - offset);
    if len == op_len - offset {
      self.index += 1;
      self.offset = 0;
    } else {
      self.offset += len;
    }

    match op {
      Delete { .. } => Delete { len },
      Retain { attributes, .. } => Retain {
        len,
        attributes: attributes.clone(),
      },
      Insert { text, attributes } => Insert {
        text:       char_slice(text, offset, offset + len).into(),
        attributes: attributes.clone(),
      },
    }
  }
}

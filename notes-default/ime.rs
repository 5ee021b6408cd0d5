//! Platform text input values and the deltas between them.
//!
//! Platforms report the full editing state of the focused block after every
//! change. [`diff`] turns two consecutive states into exactly one
//! [`TextEditingDelta`]. All offsets are in chars.
//!
//! The values exchanged with the platform carry a leading [`SENTINEL`], so a
//! backspace at the true start of the block is still a deletion the platform
//! can report.

use notes_core::grapheme::{
  char_len,
  char_slice,
};
use notes_lib::transaction::TransactionError;
use thiserror::Error;

/// Zero width space kept in front of every value handed to the platform.
pub const SENTINEL: char = '\u{200B}';

pub type Result<T> = std::result::Result<T, ImeError>;

#[derive(Debug, Error)]
pub enum ImeError {
  #[error(transparent)]
  Transaction(#[from] TransactionError),
  #[error("no text block is attached to the input connection")]
  Detached,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextRange {
  pub start: usize,
  pub end:   usize,
}

impl TextRange {
  pub const fn new(start: usize, end: usize) -> Self {
    Self { start, end }
  }

  pub const fn collapsed(offset: usize) -> Self {
    Self::new(offset, offset)
  }

  pub const fn is_collapsed(self) -> bool {
    self.start == self.end
  }

  pub const fn len(self) -> usize {
    self.end.saturating_sub(self.start)
  }

  pub const fn is_empty(self) -> bool {
    self.len() == 0
  }

  #[must_use]
  pub fn shifted(self, by: isize) -> Self {
    Self::new(
      self.start.saturating_add_signed(by),
      self.end.saturating_add_signed(by),
    )
  }
}

/// Composing range after an update. When both the old and the new range are
/// known the merged range keeps the old start and takes the new end.
pub fn merge_composing(previous: Option<TextRange>, next: Option<TextRange>) -> Option<TextRange> {
  match (previous, next) {
    (Some(previous), Some(next)) => Some(TextRange::new(previous.start, next.end)),
    (_, next) => next,
  }
}

/// Editing state as the platform sees it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TextEditingValue {
  pub text:      String,
  pub selection: TextRange,
  pub composing: Option<TextRange>,
}

impl TextEditingValue {
  pub fn new(text: impl Into<String>, selection: TextRange) -> Self {
    Self {
      text: text.into(),
      selection,
      composing: None,
    }
  }

  /// `text` with the sentinel in front and the selection shifted past it.
  pub fn with_sentinel(text: &str, selection: TextRange) -> Self {
    let mut value = String::with_capacity(text.len() + SENTINEL.len_utf8());
    value.push(SENTINEL);
    value.push_str(text);
    Self::new(value, selection.shifted(1))
  }

  pub fn has_sentinel(&self) -> bool {
    self.text.starts_with(SENTINEL)
  }

  pub fn len_chars(&self) -> usize {
    char_len(&self.text)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextEditingDelta {
  Insertion {
    offset:    usize,
    text:      String,
    selection: TextRange,
    composing: Option<TextRange>,
  },
  Deletion {
    range:     TextRange,
    selection: TextRange,
    composing: Option<TextRange>,
  },
  Replacement {
    range:     TextRange,
    text:      String,
    selection: TextRange,
    composing: Option<TextRange>,
  },
  /// Only the selection or the composing range moved.
  NonTextUpdate {
    selection: TextRange,
    composing: Option<TextRange>,
  },
}

impl TextEditingDelta {
  pub fn selection(&self) -> TextRange {
    match self {
      TextEditingDelta::Insertion { selection, .. }
      | TextEditingDelta::Deletion { selection, .. }
      | TextEditingDelta::Replacement { selection, .. }
      | TextEditingDelta::NonTextUpdate { selection, .. } => *selection,
    }
  }

  pub fn composing(&self) -> Option<TextRange> {
    match self {
      TextEditingDelta::Insertion { composing, .. }
      | TextEditingDelta::Deletion { composing, .. }
      | TextEditingDelta::Replacement { composing, .. }
      | TextEditingDelta::NonTextUpdate { composing, .. } => *composing,
    }
  }

  /// The old text range this delta rewrites. Empty for insertions and
  /// selection-only updates.
  pub fn replaced_range(&self) -> TextRange {
    match self {
      TextEditingDelta::Insertion { offset, .. } => TextRange::collapsed(*offset),
      TextEditingDelta::Deletion { range, .. } | TextEditingDelta::Replacement { range, .. } => {
        *range
      },
      TextEditingDelta::NonTextUpdate { selection, .. } => TextRange::collapsed(selection.start),
    }
  }

  /// `text` with this delta applied.
  pub fn apply_to_text(&self, text: &str) -> String {
    let splice = |range: TextRange, with: &str| {
      let mut out = String::with_capacity(text.len() + with.len());
      out.push_str(char_slice(text, 0, range.start));
      out.push_str(with);
      out.push_str(char_slice(text, range.end, char_len(text)));
      out
    };
    match self {
      TextEditingDelta::Insertion { offset, text: inserted, .. } => {
        splice(TextRange::collapsed(*offset), inserted)
      },
      TextEditingDelta::Deletion { range, .. } => splice(*range, ""),
      TextEditingDelta::Replacement { range, text: replacement, .. } => splice(*range, replacement),
      TextEditingDelta::NonTextUpdate { .. } => text.to_string(),
    }
  }
}

/// The single delta that turns `old` into `new`.
///
/// The changed region is found by trimming the longest common prefix and
/// then the longest common suffix. With a collapsed caret the prefix never
/// extends past the point where the typed text must have started, so typing
/// `a` after `a` inserts at the caret rather than at the front of the run.
pub fn diff(old: &TextEditingValue, new: &TextEditingValue) -> TextEditingDelta {
  let before: Vec<char> = old.text.chars().collect();
  let after: Vec<char> = new.text.chars().collect();
  let selection = new.selection;
  let composing = new.composing;

  let mut prefix = before
    .iter()
    .zip(&after)
    .take_while(|(a, b)| a == b)
    .count();
  if selection.is_collapsed() {
    let grown = after.len().saturating_sub(before.len());
    prefix = prefix.min(selection.end.saturating_sub(grown));
  }
  let suffix = before[prefix..]
    .iter()
    .rev()
    .zip(after[prefix..].iter().rev())
    .take_while(|(a, b)| a == b)
    .count();

  let removed = TextRange::new(prefix, before.len() - suffix);
  let inserted: String = after[prefix..after.len() - suffix].iter().collect();

  match (removed.is_empty(), inserted.is_empty()) {
    (true, true) => TextEditingDelta::NonTextUpdate {
      selection,
      composing,
    },
    (true, false) => TextEditingDelta::Insertion {
      offset: prefix,
      text: inserted,
      selection,
      composing,
    },
    (false, true) => TextEditingDelta::Deletion {
      range: removed,
      selection,
      composing,
    },
    (false, false) => TextEditingDelta::Replacement {
      range: removed,
      text: inserted,
      selection,
      composing,
    },
  }
}

/// The platform side of a text input session.
pub trait TextInputConnection {
  /// Overwrite what the platform believes the editing state is.
  fn set_editing_state(&mut self, value: &TextEditingValue);

  fn close(&mut self);
}

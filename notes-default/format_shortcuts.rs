//! Inline formatting by wrapping text in markers: `` `code` ``, `_italic_`,
//! `*italic*`, `~strike~`, `**bold**`, `__bold__` and `~~strike~~`.
//!
//! Both flavours insert the closing marker first, in an undo group of its own,
//! and then remove the markers and toggle the format in a second transaction.
//! Undoing once brings back the raw markers, undoing twice removes the
//! closing one.

use notes_core::chars::str_is_blank;
use notes_lib::{
  attributes::attributes,
  editor::{
    ApplyOptions,
    Editor,
  },
  path::Path,
  selection::Selection,
  transaction::Result,
};

use crate::{
  CharacterOutcome,
  character_shortcut::{
    after_trigger,
    caret,
    insert_trigger,
    settle,
  },
};

/// Format applied by a single `ch` marker pair.
pub fn single_marker_format(ch: char) -> Option<&'static str> {
  match ch {
    '`' => Some("code"),
    '_' | '*' => Some("italic"),
    '~' => Some("strikethrough"),
    _ => None,
  }
}

/// Format applied by a doubled `ch` marker pair.
pub fn double_marker_format(ch: char) -> Option<&'static str> {
  match ch {
    '_' | '*' => Some("bold"),
    '~' => Some("strikethrough"),
    _ => None,
  }
}

/// Char index of the opening marker that typing `ch` at the end of `before`
/// would close, if any.
///
/// The marker must enclose some non-blank text and must not be the second
/// half of a doubled marker (backticks excepted).
pub fn single_wrap_start(before: &str, ch: char) -> Option<usize> {
  let chars: Vec<char> = before.chars().collect();
  let start = chars.iter().rposition(|c| *c == ch)?;
  let enclosed: String = chars[start + 1..].iter().collect();
  if enclosed.is_empty() || str_is_blank(&enclosed) {
    return None;
  }
  if ch != '`' && start > 0 && chars[start - 1] == ch {
    return None;
  }
  Some(start)
}

/// Char index of the first opening marker that typing `ch` at the end of
/// `before` would close into a doubled pair.
///
/// The last three markers must read `ch ch ... ch` with the closing half
/// already typed right before the caret, and the middle two apart so that
/// `***` does not count.
pub fn double_wrap_start(before: &str, ch: char) -> Option<usize> {
  let chars: Vec<char> = before.chars().collect();
  let markers: Vec<usize> = chars
    .iter()
    .enumerate()
    .filter_map(|(index, c)| (*c == ch).then_some(index))
    .collect();
  let [.., third, second, last] = markers.as_slice() else {
    return None;
  };
  let (third, second, last) = (*third, *second, *last);
  if second != third + 1 || last == second + 1 || last + 1 != chars.len() {
    return None;
  }
  let enclosed: String = chars[second + 1..last].iter().collect();
  if str_is_blank(&enclosed) {
    return None;
  }
  Some(third)
}

pub fn single_wrap(editor: &mut Editor, ch: char) -> CharacterOutcome {
  let Some(format) = single_marker_format(ch) else {
    return CharacterOutcome::Ignored;
  };
  settle("single character wrap", try_single_wrap(editor, ch, format))
}

pub(crate) fn try_single_wrap(editor: &mut Editor, ch: char, format: &str) -> Result<CharacterOutcome> {
  let Some((path, offset, delta)) = caret(editor) else {
    return Ok(CharacterOutcome::Ignored);
  };
  let Some(start) = single_wrap_start(&delta.text_between(0, offset), ch) else {
    return Ok(CharacterOutcome::Ignored);
  };

  insert_trigger(editor, &path, offset, ch)?;
  Ok(after_trigger(
    "single character wrap",
    unwrap_single(editor, path, start, offset, format),
  ))
}

// "_abc" + "_", the closing marker now sits at `offset`
fn unwrap_single(editor: &mut Editor, path: Path, start: usize, offset: usize, format: &str) -> Result<()> {
  let mut tx = editor.transaction();
  tx.delete_text(&path, start, 1)?;
  tx.format_text(&path, start, offset - 1 - start, &attributes([(format, true)]))?;
  tx.delete_text(&path, offset - 1, 1)?;
  tx.after_selection = Some(Selection::single(path, offset - 1, None));
  editor.apply(tx, ApplyOptions::default())
}

pub fn double_wrap(editor: &mut Editor, ch: char) -> CharacterOutcome {
  let Some(format) = double_marker_format(ch) else {
    return CharacterOutcome::Ignored;
  };
  settle("double character wrap", try_double_wrap(editor, ch, format))
}

fn try_double_wrap(editor: &mut Editor, ch: char, format: &str) -> Result<CharacterOutcome> {
  let Some((path, offset, delta)) = caret(editor) else {
    return Ok(CharacterOutcome::Ignored);
  };
  let Some(start) = double_wrap_start(&delta.text_between(0, offset), ch) else {
    return Ok(CharacterOutcome::Ignored);
  };

  insert_trigger(editor, &path, offset, ch)?;
  Ok(after_trigger(
    "double character wrap",
    unwrap_double(editor, path, start, offset, format),
  ))
}

// "**abc*" + "*", the closing pair now sits at `offset - 1`
fn unwrap_double(editor: &mut Editor, path: Path, start: usize, offset: usize, format: &str) -> Result<()> {
  let mut tx = editor.transaction();
  tx.delete_text(&path, offset - 1, 2)?;
  tx.delete_text(&path, start, 2)?;
  tx.format_text(&path, start, offset - 3 - start, &attributes([(format, true)]))?;
  tx.after_selection = Some(Selection::single(path, offset - 3, None));
  editor.apply(tx, ApplyOptions::default())
}

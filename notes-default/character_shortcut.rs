//! Per-character input shortcuts.
//!
//! Every typed character is first offered to the [`CharacterShortcutEvent`]s
//! registered for it, in registration order. The first handler that does not
//! return [`CharacterOutcome::Ignored`] wins; when all decline, the character
//! is inserted as plain text by [`insert_character`].

use std::fmt;

use notes_lib::{
  attributes::Attributes,
  delta::Delta,
  editor::{
    ApplyOptions,
    Editor,
  },
  path::Path,
  position::Position,
  selection::Selection,
  transaction::Result,
};
use tracing::{
  trace,
  warn,
};

use crate::{
  CharacterOutcome,
  delete::delete_non_collapsed,
  format_shortcuts,
  text_shortcuts,
};

pub type CharacterHandler = fn(&mut Editor, char) -> CharacterOutcome;

#[derive(Clone)]
pub struct CharacterShortcutEvent {
  pub key:       &'static str,
  pub character: char,
  pub handler:   CharacterHandler,
}

impl fmt::Debug for CharacterShortcutEvent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CharacterShortcutEvent")
      .field("key", &self.key)
      .field("character", &self.character)
      .finish_non_exhaustive()
  }
}

impl CharacterShortcutEvent {
  pub const fn new(key: &'static str, character: char, handler: CharacterHandler) -> Self {
    Self {
      key,
      character,
      handler,
    }
  }
}

#[derive(Debug, Default, Clone)]
pub struct CharacterShortcutDispatcher {
  events: Vec<CharacterShortcutEvent>,
}

impl CharacterShortcutDispatcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_standard_shortcuts() -> Self {
    Self {
      events: standard_character_shortcuts(),
    }
  }

  pub fn events(&self) -> &[CharacterShortcutEvent] {
    &self.events
  }

  pub fn register(&mut self, event: CharacterShortcutEvent) {
    self.events.push(event);
  }

  pub fn unregister(&mut self, key: &str) -> bool {
    let before = self.events.len();
    self.events.retain(|event| event.key != key);
    before != self.events.len()
  }

  /// Run the handlers registered for `ch` until one takes it.
  pub fn dispatch(&self, editor: &mut Editor, ch: char) -> CharacterOutcome {
    for event in self.events.iter().filter(|event| event.character == ch) {
      let outcome = (event.handler)(editor, ch);
      if !outcome.is_ignored() {
        trace!(shortcut = event.key, ?outcome, "character shortcut");
        return outcome;
      }
    }
    CharacterOutcome::Ignored
  }

  /// [`Self::dispatch`], falling back to a plain insertion.
  pub fn handle(&self, editor: &mut Editor, ch: char) -> Result<CharacterOutcome> {
    let outcome = self.dispatch(editor, ch);
    if outcome.is_ignored() {
      let mut buf = [0; 4];
      insert_character(editor, ch.encode_utf8(&mut buf))?;
    }
    Ok(outcome)
  }
}

/// Attributes a char typed at `offset` picks up from the char before it.
/// Links do not extend past their end.
pub(crate) fn inherited_attributes(delta: &Delta, offset: usize) -> Option<Attributes> {
  let mut attributes = delta.attributes_at(offset.checked_sub(1)?)?.clone();
  attributes.remove("href");
  (!attributes.is_empty()).then_some(attributes)
}

/// Replace the selection with `text`. Returns `false` when there is no text
/// caret to type at.
pub fn insert_character(editor: &mut Editor, text: &str) -> Result<bool> {
  let Some(selection) = editor.selection().cloned() else {
    return Ok(false);
  };
  if selection.is_block() {
    return Ok(false);
  }
  let mut tx = editor.transaction();
  let caret = if delete_non_collapsed(&mut tx, &selection)? {
    match &tx.after_selection {
      Some(after) => after.start.clone(),
      None => selection.normalized().start,
    }
  } else {
    selection.end
  };
  let Some(delta) = tx.document().delta_at(&caret.path) else {
    return Ok(false);
  };
  let attributes = inherited_attributes(delta, caret.offset);
  tx.insert_text(&caret.path, caret.offset, text, attributes)?;
  tx.after_selection = Some(Selection::collapsed(
    caret.shift(text.chars().count() as isize),
  ));
  editor.apply(tx, ApplyOptions::default())?;
  Ok(true)
}

/// Caret path, offset and node text for a collapsed text selection.
pub(crate) fn caret(editor: &Editor) -> Option<(Path, usize, Delta)> {
  let selection = editor.selection()?;
  if selection.is_block() || !selection.is_collapsed() {
    return None;
  }
  let Position { path, offset } = selection.end.clone();
  let delta = editor.document().delta_at(&path)?.clone();
  Some((path, offset, delta))
}

/// Insert the trigger character in an undo group of its own, so one undo
/// after a shortcut brings back exactly what the user typed.
pub(crate) fn insert_trigger(editor: &mut Editor, path: &Path, offset: usize, ch: char) -> Result<()> {
  let mut buf = [0; 4];
  let mut tx = editor.transaction();
  tx.insert_text(path, offset, ch.encode_utf8(&mut buf), None)?;
  editor.apply(tx, ApplyOptions::isolated())
}

/// Settle the rewrite that follows [`insert_trigger`]. The trigger is already
/// in the document, so a failed rewrite still counts as handled and the
/// character is not typed a second time.
pub(crate) fn after_trigger(shortcut: &str, rewrite: Result<()>) -> CharacterOutcome {
  if let Err(err) = rewrite {
    warn!(shortcut, %err, "character shortcut failed after its trigger was typed");
  }
  CharacterOutcome::Handled
}

/// Turn a failed shortcut into `Ignored` so the character is typed normally.
pub(crate) fn settle(shortcut: &str, result: Result<CharacterOutcome>) -> CharacterOutcome {
  result.unwrap_or_else(|err| {
    warn!(shortcut, %err, "character shortcut failed");
    CharacterOutcome::Ignored
  })
}

/// The built-in shortcuts. Double-character wraps come before the single
/// ones sharing their trigger.
pub fn standard_character_shortcuts() -> Vec<CharacterShortcutEvent> {
  vec![
    CharacterShortcutEvent::new("format bold with **", '*', format_shortcuts::double_wrap),
    CharacterShortcutEvent::new("format bold with __", '_', format_shortcuts::double_wrap),
    CharacterShortcutEvent::new(
      "format strikethrough with ~~",
      '~',
      format_shortcuts::double_wrap,
    ),
    CharacterShortcutEvent::new("format code with `", '`', format_shortcuts::single_wrap),
    CharacterShortcutEvent::new("format italic with *", '*', format_shortcuts::single_wrap),
    CharacterShortcutEvent::new("format italic with _", '_', format_shortcuts::single_wrap),
    CharacterShortcutEvent::new(
      "format strikethrough with ~",
      '~',
      format_shortcuts::single_wrap,
    ),
    CharacterShortcutEvent::new("replace -> with arrow", '>', text_shortcuts::replace_arrow),
    CharacterShortcutEvent::new("replace => with arrow", '>', text_shortcuts::replace_double_arrow),
    CharacterShortcutEvent::new("replace -- with em dash", '-', text_shortcuts::replace_em_dash),
    CharacterShortcutEvent::new("format markdown link", ')', text_shortcuts::markdown_link),
    CharacterShortcutEvent::new("markdown block syntax", ' ', text_shortcuts::block_syntax),
    CharacterShortcutEvent::new("open slash menu", '/', text_shortcuts::slash_command),
  ]
}

#[cfg(test)]
mod test {
  use notes_lib::{
    attributes::attributes,
    document::Document,
    node::{
      Node,
      PARAGRAPH,
    },
  };
  use serde_json::json;

  use super::*;

  fn editor(delta: Delta, caret: usize) -> Editor {
    let mut editor = Editor::new(Document::from_blocks([
      Node::new(PARAGRAPH).with_delta(delta)
    ]));
    editor.update_selection(Some(Selection::single([0], caret, None)));
    editor
  }

  fn no_shortcut(_: &mut Editor, _: char) -> CharacterOutcome {
    CharacterOutcome::Ignored
  }

  fn swallow(_: &mut Editor, _: char) -> CharacterOutcome {
    CharacterOutcome::Handled
  }

  #[test]
  fn unhandled_characters_are_inserted() {
    let mut dispatcher = CharacterShortcutDispatcher::new();
    dispatcher.register(CharacterShortcutEvent::new("noop", 'x', no_shortcut));
    let mut editor = editor(Delta::from_text("ab"), 1);
    assert_eq!(
      dispatcher.handle(&mut editor, 'x').unwrap(),
      CharacterOutcome::Ignored
    );
    assert_eq!(editor.document().root().children()[0].text(), "axb");
    assert_eq!(editor.selection(), Some(&Selection::single([0], 2, None)));

    dispatcher.register(CharacterShortcutEvent::new("swallow", 'x', swallow));
    assert_eq!(
      dispatcher.handle(&mut editor, 'x').unwrap(),
      CharacterOutcome::Handled
    );
    assert_eq!(editor.document().root().children()[0].text(), "axb");
    assert!(dispatcher.unregister("swallow"));
  }

  #[test]
  fn typed_text_inherits_formatting_but_not_links() {
    let styled = attributes([("bold", json!(true)), ("href", json!("https://example.com"))]);
    let mut editor = editor(Delta::new().insert("ab", Some(styled)), 2);
    insert_character(&mut editor, "c").unwrap();
    let delta = editor.document().delta_at(&Path::from([0])).unwrap();
    assert_eq!(
      delta.attributes_at(2),
      Some(&attributes([("bold", json!(true))]))
    );
  }

  #[test]
  fn failed_rewrite_keeps_the_single_trigger() {
    let mut editor = editor(Delta::from_text("ab"), 2);
    insert_trigger(&mut editor, &Path::from([0]), 2, '*').unwrap();
    let failed = editor.transaction().delete_text(&Path::from([4]), 0, 1);
    assert!(failed.is_err());
    assert_eq!(
      after_trigger("broken rewrite", failed),
      CharacterOutcome::Handled
    );
    assert_eq!(editor.document().root().children()[0].text(), "ab*");
  }

  #[test]
  fn typing_over_a_range_replaces_it() {
    let mut editor = editor(Delta::from_text("hello"), 0);
    editor.update_selection(Some(Selection::single([0], 1, Some(4))));
    assert!(insert_character(&mut editor, "ipp").unwrap());
    assert_eq!(editor.document().root().children()[0].text(), "hippo");
    assert_eq!(editor.selection(), Some(&Selection::single([0], 4, None)));
  }
}

//! End to end editing through the default key and character dispatchers.

use notes_default::{
  CharacterShortcutDispatcher,
  CommandContext,
  CommandOutcome,
  CommandShortcutDispatcher,
  Key,
  KeyEvent,
  Modifiers,
};
use notes_lib::{
  attributes::attributes,
  delta::Delta,
  document::Document,
  editor::Editor,
  node::{
    HEADING,
    Node,
  },
  path::Path,
  platform::Platform,
  position::Position,
  selection::Selection,
};
use serde_json::json;

struct Session {
  editor:     Editor,
  commands:   CommandShortcutDispatcher,
  characters: CharacterShortcutDispatcher,
}

impl Session {
  fn new(blocks: &[&str]) -> Self {
    let editor = Editor::new(Document::from_blocks(
      blocks.iter().map(|text| Node::paragraph(text)),
    ));
    Self {
      editor,
      commands: CommandShortcutDispatcher::with_standard_commands(Platform::Linux),
      characters: CharacterShortcutDispatcher::with_standard_shortcuts(),
    }
  }

  fn select(&mut self, selection: Selection) {
    self.editor.update_selection(Some(selection));
  }

  fn type_text(&mut self, text: &str) {
    for ch in text.chars() {
      self.characters.handle(&mut self.editor, ch).unwrap();
    }
  }

  fn press(&mut self, key: Key, bits: u8) -> CommandOutcome {
    let mut ctx = CommandContext::new(&mut self.editor);
    self.commands.dispatch(&mut ctx, &KeyEvent::with(key, bits))
  }

  fn text(&self, index: usize) -> String {
    self.editor.document().root().children()[index].text()
  }

  fn delta(&self, index: usize) -> Delta {
    self
      .editor
      .document()
      .delta_at(&Path::from([index]))
      .cloned()
      .unwrap()
  }
}

#[test]
fn typed_markers_italicize_and_undo_in_steps() {
  let mut session = Session::new(&[""]);
  session.select(Selection::single([0], 0, None));
  session.type_text("*hello*");

  assert_eq!(
    session.delta(0),
    Delta::new().insert("hello", Some(attributes([("italic", json!(true))])))
  );
  assert_eq!(session.press(Key::Char('z'), Modifiers::CTRL), CommandOutcome::Handled);
  assert_eq!(session.text(0), "*hello*");
  assert_eq!(session.press(Key::Char('z'), Modifiers::CTRL), CommandOutcome::Handled);
  assert_eq!(session.text(0), "*hello");
}

#[test]
fn wrapping_italic_text_again_clears_it() {
  let mut session = Session::new(&[""]);
  session.select(Selection::single([0], 0, None));
  session.type_text("*hello*");

  session.select(Selection::single([0], 0, None));
  session.type_text("*");
  session.select(Selection::single([0], 6, None));
  session.type_text("*");

  assert_eq!(session.delta(0), Delta::new().insert("hello", None));
  assert_eq!(
    session.editor.selection(),
    Some(&Selection::single([0], 5, None))
  );
}

#[test]
fn wrapping_bold_text_again_clears_it() {
  for marker in ["**", "__"] {
    let mut session = Session::new(&[""]);
    session.select(Selection::single([0], 0, None));
    session.type_text(&format!("{marker}hello{marker}"));
    assert_eq!(
      session.delta(0),
      Delta::new().insert("hello", Some(attributes([("bold", json!(true))])))
    );

    session.select(Selection::single([0], 0, None));
    session.type_text(marker);
    session.select(Selection::single([0], 7, None));
    session.type_text(marker);

    assert_eq!(session.delta(0), Delta::new().insert("hello", None), "{marker}");
  }
}

#[test]
fn double_dash_becomes_em_dash() {
  let mut session = Session::new(&["wait"]);
  session.select(Selection::single([0], 4, None));
  session.type_text("--now");
  assert_eq!(session.text(0), "wait—now");
}

#[test]
fn backspace_over_three_blocks() {
  let mut session = Session::new(&["hello", "middle", "world"]);
  session.select(Selection::new(
    Position::new([2], 3),
    Position::new([0], 2),
  ));
  assert_eq!(session.press(Key::Backspace, 0), CommandOutcome::Handled);

  assert_eq!(session.editor.document().root().children().len(), 1);
  assert_eq!(session.text(0), "held");
  assert_eq!(
    session.editor.selection(),
    Some(&Selection::single([0], 2, None))
  );
}

#[test]
fn quick_typing_is_one_undo_step() {
  let mut session = Session::new(&[""]);
  session.select(Selection::single([0], 0, None));
  session.type_text("abc");
  assert_eq!(session.text(0), "abc");

  assert_eq!(session.press(Key::Char('z'), Modifiers::CTRL), CommandOutcome::Handled);
  assert_eq!(session.text(0), "");
  assert_eq!(session.press(Key::Char('z'), Modifiers::CTRL), CommandOutcome::Handled);
  assert_eq!(session.text(0), "");

  assert_eq!(
    session.press(Key::Char('z'), Modifiers::CTRL | Modifiers::SHIFT),
    CommandOutcome::Handled
  );
  assert_eq!(session.text(0), "abc");
}

#[test]
fn bold_toggle_round_trips() {
  let mut session = Session::new(&["make me bold"]);
  session.select(Selection::single([0], 8, Some(12)));
  let original = session.delta(0);

  session.press(Key::Char('b'), Modifiers::CTRL);
  assert_eq!(
    session.delta(0),
    Delta::new()
      .insert("make me ", None)
      .insert("bold", Some(attributes([("bold", json!(true))])))
  );
  session.press(Key::Char('b'), Modifiers::CTRL);
  assert_eq!(session.delta(0), original);
}

#[test]
fn enter_then_markdown_heading() {
  let mut session = Session::new(&["intro"]);
  session.select(Selection::single([0], 5, None));
  assert_eq!(session.press(Key::Enter, 0), CommandOutcome::Handled);
  session.type_text("## Usage");

  let heading = &session.editor.document().root().children()[1];
  assert!(heading.is_kind(HEADING));
  assert_eq!(heading.attributes(), &attributes([("level", 2)]));
  assert_eq!(heading.text(), "Usage");
}

#[test]
fn edited_document_survives_json() {
  let mut session = Session::new(&["one", "two"]);
  session.select(Selection::single([1], 3, None));
  session.type_text(" [link](https://example.com)");

  let json = session.editor.document().to_json().unwrap();
  let restored = Document::from_json(&json).unwrap();
  assert_eq!(&restored, session.editor.document());
  assert_eq!(
    restored.delta_at(&Path::from([1])).unwrap(),
    &Delta::new()
      .insert("two ", None)
      .insert("link", Some(attributes([("href", json!("https://example.com"))])))
  );
}

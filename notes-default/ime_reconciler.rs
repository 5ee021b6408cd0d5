//! Keeps a platform text input connection and the document in step.
//!
//! The reconciler owns the value last agreed on with the platform. Each
//! update the platform reports is debounced, diffed against that value and
//! routed to the editor:
//!
//! - a single typed char goes through the character shortcuts
//! - other insertions, deletions and replacements become one transaction
//! - deleting the sentinel is a backspace at the start of the block
//! - selection-only updates move the editor selection
//!
//! When the editor refuses a change, the platform is reset to the previous
//! value.

use std::time::{
  Duration,
  Instant,
};

use notes_core::grapheme::char_len;
use notes_event::{
  AsyncHook,
  Coalesce,
  Debouncer,
};
use notes_lib::{
  editor::{
    ApplyOptions,
    Editor,
  },
  path::Path,
  platform::{
    PlatformProfile,
    SelectionSync,
  },
  render::{
    Point,
    SelectableLookup,
  },
  selection::Selection,
  transaction,
};
use tokio::sync::mpsc::{
  self,
  Receiver,
  Sender,
};
use tracing::{
  debug,
  trace,
  warn,
};

use crate::{
  CharacterOutcome,
  character_shortcut::{
    CharacterShortcutDispatcher,
    inherited_attributes,
  },
  command_shortcut::CommandContext,
  delete,
  format_shortcuts::{
    self,
    single_wrap_start,
  },
  ime::{
    ImeError,
    Result,
    TextEditingDelta,
    TextEditingValue,
    TextInputConnection,
    TextRange,
    diff,
    merge_composing,
  },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImeOutcome {
  Applied,
  /// Applied, and the slash menu should be opened at the caret.
  OpenMenu,
  /// The editor refused the change and the platform was reset.
  Rejected,
  Ignored,
}

pub struct ImeReconciler<C> {
  profile:    PlatformProfile,
  connection: C,
  characters: CharacterShortcutDispatcher,
  path:       Option<Path>,
  /// Last value both sides agree on, sentinel included.
  current:    TextEditingValue,
  debouncer:  Debouncer<TextEditingValue>,
  floating:   bool,
}

impl<C: TextInputConnection> ImeReconciler<C> {
  pub fn new(profile: PlatformProfile, connection: C) -> Self {
    Self {
      profile,
      connection,
      characters: CharacterShortcutDispatcher::with_standard_shortcuts(),
      path: None,
      current: TextEditingValue::default(),
      debouncer: Debouncer::new(profile.ime_debounce),
      floating: false,
    }
  }

  #[must_use]
  pub fn with_characters(mut self, characters: CharacterShortcutDispatcher) -> Self {
    self.characters = characters;
    self
  }

  pub fn connection(&self) -> &C {
    &self.connection
  }

  pub fn path(&self) -> Option<&Path> {
    self.path.as_ref()
  }

  pub fn current(&self) -> &TextEditingValue {
    &self.current
  }

  pub fn is_floating(&self) -> bool {
    self.floating
  }

  /// Bind to the text block holding the editor selection and push its value
  /// to the platform.
  pub fn attach(&mut self, editor: &Editor) -> Result<()> {
    self.debouncer.cancel();
    self.path = None;
    self.resync(editor);
    if self.path.is_none() {
      return Err(ImeError::Detached);
    }
    Ok(())
  }

  pub fn detach(&mut self) {
    self.debouncer.cancel();
    self.path = None;
    self.floating = false;
    self.connection.close();
  }

  /// Queue a value reported by the platform. Returns when it becomes due, or
  /// `None` when a floating cursor gesture suppresses it.
  pub fn update_editing_value(&mut self, value: TextEditingValue, now: Instant) -> Option<Instant> {
    if self.floating {
      trace!("ime update suppressed by floating cursor");
      return None;
    }
    Some(self.debouncer.push(value, now))
  }

  /// Apply the queued value if its debounce window has passed.
  pub fn poll(&mut self, editor: &mut Editor, now: Instant) -> ImeOutcome {
    match self.debouncer.poll(now) {
      Some(value) => self.apply_update(editor, value),
      None => ImeOutcome::Ignored,
    }
  }

  /// Apply the queued value right away.
  pub fn flush(&mut self, editor: &mut Editor) -> ImeOutcome {
    match self.debouncer.flush() {
      Some(value) => self.apply_update(editor, value),
      None => ImeOutcome::Ignored,
    }
  }

  pub fn next_deadline(&self) -> Option<Instant> {
    self.debouncer.next_deadline()
  }

  /// Route one platform value to the editor.
  pub fn apply_update(&mut self, editor: &mut Editor, value: TextEditingValue) -> ImeOutcome {
    let Some(path) = self.path.clone() else {
      return ImeOutcome::Ignored;
    };
    let delta = diff(&self.current, &value);
    trace!(?delta, "ime update");

    let result = match &delta {
      TextEditingDelta::NonTextUpdate { .. } => {
        if let Some(outcome) = self.backtick_wrap(editor, &path, &value) {
          return outcome;
        }
        self.apply_selection(editor, &path, value.selection);
        Ok(ImeOutcome::Applied)
      },
      TextEditingDelta::Deletion { range, .. } if *range == TextRange::new(0, 1) => {
        editor.update_selection(Some(Selection::single(path, 0, None)));
        if !delete::backspace(&mut CommandContext::new(editor)).is_handled() {
          debug!("backspace at block start declined, restoring the sentinel");
          self.connection.set_editing_state(&self.current);
          return ImeOutcome::Rejected;
        }
        self.resync(editor);
        return ImeOutcome::Applied;
      },
      TextEditingDelta::Insertion {
        offset,
        text,
        composing: None,
        ..
      } if *offset > 0 && char_len(text) == 1 => {
        match text.chars().next() {
          Some(ch) => self.type_character(editor, &path, offset - 1, ch),
          None => Ok(ImeOutcome::Ignored),
        }
      },
      _ => {
        self
          .apply_text_delta(editor, &path, &delta, value.selection)
          .map(|()| ImeOutcome::Applied)
      },
    };

    match result {
      Ok(outcome) => {
        // shortcuts and edits around the sentinel leave the platform behind
        let agreed = self
          .path
          .as_ref()
          .and_then(|path| editing_value(editor, path))
          .is_some_and(|expected| expected.text == value.text);
        if agreed {
          self.current = TextEditingValue {
            composing: merge_composing(self.current.composing, value.composing),
            ..value
          };
        } else {
          self.resync(editor);
        }
        outcome
      },
      Err(err) => {
        warn!(%err, "editor rejected ime update, restoring previous value");
        self.connection.set_editing_state(&self.current);
        ImeOutcome::Rejected
      },
    }
  }

  fn type_character(
    &mut self,
    editor: &mut Editor,
    path: &Path,
    offset: usize,
    ch: char,
  ) -> transaction::Result<ImeOutcome> {
    editor.update_selection(Some(Selection::single(path.clone(), offset, None)));
    let outcome = self.characters.handle(editor, ch)?;
    if !outcome.is_ignored() {
      debug!(?outcome, %ch, "ime character shortcut");
    }
    Ok(match outcome {
      CharacterOutcome::OpenMenu => ImeOutcome::OpenMenu,
      _ => ImeOutcome::Applied,
    })
  }

  fn apply_text_delta(
    &mut self,
    editor: &mut Editor,
    path: &Path,
    delta: &TextEditingDelta,
    selection: TextRange,
  ) -> transaction::Result<()> {
    let range = delta.replaced_range().shifted(-1);
    let inherited = editor
      .document()
      .delta_at(path)
      .and_then(|text| inherited_attributes(text, range.start));

    let mut tx = editor.transaction();
    match delta {
      TextEditingDelta::Insertion { text, .. } => {
        tx.insert_text(path, range.start, text, inherited)?;
      },
      TextEditingDelta::Deletion { .. } => tx.delete_text(path, range.start, range.len())?,
      TextEditingDelta::Replacement { text, .. } => {
        tx.replace_text(path, range.start, range.len(), text, inherited)?;
      },
      TextEditingDelta::NonTextUpdate { .. } => return Ok(()),
    }
    let len = tx.document().delta_at(path).map_or(0, |text| text.len());
    tx.after_selection = Some(node_selection(path, selection, len));
    editor.apply(tx, ApplyOptions::default())
  }

  fn apply_selection(&mut self, editor: &mut Editor, path: &Path, selection: TextRange) {
    let len = editor.document().delta_at(path).map_or(0, |text| text.len());
    editor.update_selection(Some(node_selection(path, selection, len)));
  }

  /// Some platforms only ever report a typed backtick as part of a
  /// composition. When a composition ends on a backtick that closes a code
  /// span, retype it through the code wrap shortcut.
  fn backtick_wrap(
    &mut self,
    editor: &mut Editor,
    path: &Path,
    value: &TextEditingValue,
  ) -> Option<ImeOutcome> {
    let composition_ended = self.current.composing.is_some() && value.composing.is_none();
    if !composition_ended || !value.selection.is_collapsed() {
      return None;
    }
    let caret = value.selection.end.checked_sub(1)?;
    let before = editor.document().delta_at(path)?.text_between(0, caret);
    let head = before.strip_suffix('`')?;
    single_wrap_start(head, '`')?;

    let mut tx = editor.transaction();
    let removed = match tx.delete_text(path, caret - 1, 1) {
      Ok(()) => {
        tx.after_selection = Some(Selection::single(path.clone(), caret - 1, None));
        editor.apply(tx, ApplyOptions::isolated())
      },
      Err(err) => Err(err),
    };
    if let Err(err) = removed {
      warn!(%err, "failed to retype backtick");
      return None;
    }
    if format_shortcuts::single_wrap(editor, '`').is_ignored() {
      warn!("code wrap declined after composition, undoing");
      if let Err(err) = editor.undo() {
        warn!(%err, "failed to restore backtick");
      }
    }
    self.resync(editor);
    Some(ImeOutcome::Applied)
  }

  /// Tell the platform about a selection change made by the editor.
  pub fn on_selection_changed(&mut self, editor: &Editor) {
    if self.floating || self.path.is_none() {
      return;
    }
    let push = match self.profile.selection_sync {
      SelectionSync::Eager => true,
      SelectionSync::OnCommit => self.current.composing.is_none(),
    };
    if push {
      self.resync(editor);
    }
  }

  /// Re-read the attached block (following the selection to another block
  /// if it moved) and push the value when it differs from the platform's.
  fn resync(&mut self, editor: &Editor) {
    if let Some(path) = text_selection_path(editor) {
      self.path = Some(path);
    }
    let Some(value) = self
      .path
      .as_ref()
      .and_then(|path| editing_value(editor, path))
    else {
      return;
    };
    if value != self.current {
      self.current = value;
      self.connection.set_editing_state(&self.current);
    }
  }

  pub fn start_floating_cursor(&mut self) -> bool {
    if !self.profile.supports_floating_cursor || self.path.is_none() {
      return false;
    }
    self.floating = true;
    self.debouncer.cancel();
    true
  }

  /// Move the caret to `point` within the attached block.
  pub fn update_floating_cursor(
    &mut self,
    editor: &mut Editor,
    point: Point,
    lookup: &dyn SelectableLookup,
  ) -> bool {
    if !self.floating {
      return false;
    }
    let Some(position) = self
      .path
      .as_ref()
      .and_then(|path| lookup.selectable(path))
      .and_then(|selectable| selectable.position_at_point(point))
    else {
      return false;
    };
    editor.update_selection(Some(Selection::collapsed(position)));
    true
  }

  pub fn end_floating_cursor(&mut self, editor: &Editor) {
    if !self.floating {
      return;
    }
    self.floating = false;
    self.resync(editor);
  }
}

fn text_selection_path(editor: &Editor) -> Option<Path> {
  let selection = editor.selection()?;
  let same_node = selection.start.path == selection.end.path;
  (!selection.is_block() && same_node && editor.document().delta_at(&selection.end.path).is_some())
    .then(|| selection.end.path.clone())
}

/// The platform value for the block at `path`.
fn editing_value(editor: &Editor, path: &Path) -> Option<TextEditingValue> {
  let text = editor.document().delta_at(path)?.to_plain_text();
  let selection = editor
    .selection()
    .filter(|selection| selection.start.path == *path && selection.end.path == *path)
    .map_or_else(
      || TextRange::collapsed(char_len(&text)),
      |selection| {
        let selection = selection.normalized();
        TextRange::new(selection.start.offset, selection.end.offset)
      },
    );
  Some(TextEditingValue::with_sentinel(&text, selection))
}

/// Editor selection for a platform range, sentinel removed and clamped to
/// the block.
fn node_selection(path: &Path, range: TextRange, len: usize) -> Selection {
  let range = range.shifted(-1);
  let start = range.start.min(len);
  let end = range.end.min(len);
  Selection::single(path.clone(), start, (start != end).then_some(end))
}

/// Coalesce platform values off the input thread. Returns the sender to feed
/// raw values into and the receiver of debounced ones.
pub fn spawn_update_coalescer(
  interval: Duration,
) -> (Sender<TextEditingValue>, Receiver<TextEditingValue>) {
  let (output, debounced) = mpsc::channel(16);
  (Coalesce::new(interval, output).spawn(), debounced)
}

#[cfg(test)]
mod test {
  use std::{
    cell::RefCell,
    rc::Rc,
  };

  use notes_event::send_blocking;
  use notes_lib::{
    attributes::attributes,
    delta::Delta,
    document::Document,
    node::Node,
    platform::Platform,
    position::Position,
    render::{
      Rect,
      Selectable,
    },
  };
  use serde_json::json;

  use super::*;
  use crate::ime::SENTINEL;

  #[derive(Debug, Default, Clone)]
  struct Recorder {
    states: Rc<RefCell<Vec<TextEditingValue>>>,
    closed: Rc<RefCell<bool>>,
  }

  impl Recorder {
    fn last(&self) -> Option<TextEditingValue> {
      self.states.borrow().last().cloned()
    }
  }

  impl TextInputConnection for Recorder {
    fn set_editing_state(&mut self, value: &TextEditingValue) {
      self.states.borrow_mut().push(value.clone());
    }

    fn close(&mut self) {
      *self.closed.borrow_mut() = true;
    }
  }

  fn platform(text: &str, caret: usize) -> TextEditingValue {
    TextEditingValue::with_sentinel(text, TextRange::collapsed(caret))
  }

  fn setup(blocks: &[&str], caret: Position) -> (Editor, ImeReconciler<Recorder>, Recorder) {
    let mut editor = Editor::new(Document::from_blocks(
      blocks.iter().map(|text| Node::paragraph(text)),
    ));
    editor.update_selection(Some(Selection::collapsed(caret)));
    let recorder = Recorder::default();
    let mut ime = ImeReconciler::new(
      PlatformProfile::for_platform(Platform::Linux),
      recorder.clone(),
    );
    ime.attach(&editor).unwrap();
    (editor, ime, recorder)
  }

  fn text(editor: &Editor, index: usize) -> String {
    editor.document().root().children()[index].text()
  }

  #[test]
  fn attach_pushes_the_sentinel_value() {
    let (_, ime, recorder) = setup(&["hi"], Position::new([0], 1));
    let pushed = recorder.last().unwrap();
    assert_eq!(pushed.text, format!("{SENTINEL}hi"));
    assert_eq!(pushed.selection, TextRange::collapsed(2));
    assert_eq!(ime.path(), Some(&Path::from([0])));
  }

  #[test]
  fn attach_needs_a_text_caret() {
    let mut editor = Editor::new(Document::from_blocks([Node::paragraph("x")]));
    editor.update_selection(None);
    let mut ime = ImeReconciler::new(PlatformProfile::for_platform(Platform::Linux), Recorder::default());
    assert!(matches!(ime.attach(&editor), Err(ImeError::Detached)));
  }

  #[test]
  fn updates_are_debounced() {
    let (mut editor, mut ime, _) = setup(&[""], Position::new([0], 0));
    let t0 = Instant::now();
    ime.update_editing_value(platform("a", 1), t0);
    let due = ime
      .update_editing_value(platform("ab", 2), t0 + Duration::from_millis(5))
      .unwrap();
    assert_eq!(ime.poll(&mut editor, t0 + Duration::from_millis(10)), ImeOutcome::Ignored);
    assert_eq!(text(&editor, 0), "");

    assert_eq!(ime.poll(&mut editor, due), ImeOutcome::Applied);
    assert_eq!(text(&editor, 0), "ab");
    assert_eq!(editor.selection(), Some(&Selection::single([0], 2, None)));
    assert_eq!(ime.current(), &platform("ab", 2));
  }

  #[test]
  fn typed_characters_run_shortcuts() {
    let (mut editor, mut ime, recorder) = setup(&["*hi"], Position::new([0], 3));
    assert_eq!(ime.apply_update(&mut editor, platform("*hi*", 4)), ImeOutcome::Applied);
    let delta = editor.document().delta_at(&Path::from([0])).cloned().unwrap();
    assert_eq!(
      delta,
      Delta::new().insert("hi", Some(attributes([("italic", json!(true))])))
    );
    assert_eq!(recorder.last(), Some(platform("hi", 2)));
  }

  #[test]
  fn slash_asks_for_the_menu() {
    let (mut editor, mut ime, _) = setup(&[""], Position::new([0], 0));
    assert_eq!(ime.apply_update(&mut editor, platform("/", 1)), ImeOutcome::OpenMenu);
    assert_eq!(text(&editor, 0), "/");
  }

  #[test]
  fn composing_text_skips_shortcuts() {
    let (mut editor, mut ime, _) = setup(&["*hi"], Position::new([0], 3));
    let mut value = platform("*hi*", 4);
    value.composing = Some(TextRange::new(4, 5));
    assert_eq!(ime.apply_update(&mut editor, value), ImeOutcome::Applied);
    assert_eq!(text(&editor, 0), "*hi*");
    assert_eq!(ime.current().composing, Some(TextRange::new(4, 5)));
  }

  #[test]
  fn deleting_the_sentinel_is_a_backspace() {
    let (mut editor, mut ime, recorder) = setup(&["ab", "cd"], Position::new([1], 0));
    let value = TextEditingValue::new("cd", TextRange::collapsed(0));
    assert_eq!(ime.apply_update(&mut editor, value), ImeOutcome::Applied);
    assert_eq!(text(&editor, 0), "abcd");
    assert_eq!(ime.path(), Some(&Path::from([0])));
    assert_eq!(recorder.last(), Some(platform("abcd", 2)));
  }

  #[test]
  fn declined_sentinel_backspace_restores_the_platform() {
    let (mut editor, mut ime, recorder) = setup(&["ab"], Position::new([0], 0));
    let value = TextEditingValue::new("ab", TextRange::collapsed(0));
    assert_eq!(ime.apply_update(&mut editor, value), ImeOutcome::Rejected);
    assert_eq!(text(&editor, 0), "ab");
    assert_eq!(recorder.last(), Some(platform("ab", 0)));
    assert_eq!(ime.current(), &platform("ab", 0));
  }

  #[test]
  fn rejected_updates_restore_the_platform() {
    let (mut editor, mut ime, recorder) = setup(&["hello"], Position::new([0], 5));
    // the document changes behind the platform's back
    let mut tx = editor.transaction();
    tx.delete_text(&Path::from([0]), 0, 3).unwrap();
    editor.apply(tx, ApplyOptions::default()).unwrap();

    assert_eq!(ime.apply_update(&mut editor, platform("hell", 4)), ImeOutcome::Rejected);
    assert_eq!(text(&editor, 0), "lo");
    assert_eq!(recorder.last(), Some(platform("hello", 5)));
    assert_eq!(ime.current(), &platform("hello", 5));
  }

  #[test]
  fn composed_backtick_wraps_code() {
    let (mut editor, mut ime, recorder) = setup(&["`code"], Position::new([0], 5));
    let mut composing = platform("`code`", 6);
    composing.composing = Some(TextRange::new(6, 7));
    assert_eq!(ime.apply_update(&mut editor, composing), ImeOutcome::Applied);
    assert_eq!(text(&editor, 0), "`code`");

    assert_eq!(ime.apply_update(&mut editor, platform("`code`", 6)), ImeOutcome::Applied);
    let delta = editor.document().delta_at(&Path::from([0])).cloned().unwrap();
    assert_eq!(
      delta,
      Delta::new().insert("code", Some(attributes([("code", json!(true))])))
    );
    assert_eq!(recorder.last(), Some(platform("code", 4)));
  }

  #[test]
  fn selection_updates_move_the_caret() {
    let (mut editor, mut ime, _) = setup(&["hello"], Position::new([0], 5));
    let mut value = platform("hello", 0);
    value.selection = TextRange::new(2, 4);
    assert_eq!(ime.apply_update(&mut editor, value), ImeOutcome::Applied);
    assert_eq!(editor.selection(), Some(&Selection::single([0], 1, Some(3))));
  }

  struct Line;

  impl Selectable for Line {
    fn cursor_rect(&self, position: &Position) -> Option<Rect> {
      Some(Rect::new(position.offset as f32, 0.0, 1.0, 1.0))
    }

    fn rects_in_selection(&self, _: &Selection) -> Vec<Rect> {
      Vec::new()
    }

    fn block_rect(&self) -> Rect {
      Rect::new(0.0, 0.0, 100.0, 1.0)
    }

    fn position_at_point(&self, point: Point) -> Option<Position> {
      Some(Position::new([0], point.x as usize))
    }
  }

  impl SelectableLookup for Line {
    fn selectable(&self, _: &Path) -> Option<&dyn Selectable> {
      Some(self)
    }
  }

  #[test]
  fn floating_cursor_suppresses_updates() {
    let mut editor = Editor::new(Document::from_blocks([Node::paragraph("hello")]));
    editor.update_selection(Some(Selection::single([0], 5, None)));
    let recorder = Recorder::default();
    let mut ime = ImeReconciler::new(
      PlatformProfile::for_platform(Platform::Android),
      recorder.clone(),
    );
    ime.attach(&editor).unwrap();

    assert!(ime.start_floating_cursor());
    assert_eq!(ime.update_editing_value(platform("hello!", 6), Instant::now()), None);
    assert!(ime.update_floating_cursor(&mut editor, Point::new(2.0, 0.5), &Line));
    assert_eq!(editor.selection(), Some(&Selection::single([0], 2, None)));
    assert_eq!(ime.flush(&mut editor), ImeOutcome::Ignored);

    ime.end_floating_cursor(&editor);
    assert!(!ime.is_floating());
    assert_eq!(recorder.last(), Some(platform("hello", 2)));

    ime.detach();
    assert!(*recorder.closed.borrow());
  }

  #[test]
  fn desktop_has_no_floating_cursor() {
    let (_, mut ime, _) = setup(&["x"], Position::new([0], 0));
    assert!(!ime.start_floating_cursor());
  }

  #[tokio::test(start_paused = true)]
  async fn coalescer_forwards_the_settled_value() {
    let (raw, mut settled) = spawn_update_coalescer(Duration::from_millis(30));
    send_blocking(&raw, platform("a", 1));
    send_blocking(&raw, platform("ab", 2));
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(settled.recv().await, Some(platform("ab", 2)));
  }
}

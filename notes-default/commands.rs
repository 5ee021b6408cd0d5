//! Built-in command handlers, other than deletion.

use notes_lib::{
  Tendril,
  attributes::{
    Attributes,
    attributes,
  },
  delta::Delta,
  editor::ApplyOptions,
  node::{
    BULLETED_LIST,
    CODE,
    NUMBERED_LIST,
    Node,
    PARAGRAPH,
    TABLE,
    TABLE_CELL,
    TODO_LIST,
  },
  path::Path,
  position::Position,
  selection::Selection,
  transaction::Result,
};
use serde_json::Value;
use tracing::warn;

use crate::{
  CommandOutcome,
  command_shortcut::CommandContext,
  delete::delete_selection,
};

/// Turn a failed transaction into `Ignored`. Handlers never surface errors:
/// a stale path simply means the key is not for us.
pub(crate) fn settle(command: &str, result: Result<CommandOutcome>) -> CommandOutcome {
  result.unwrap_or_else(|err| {
    warn!(command, %err, "command failed");
    CommandOutcome::Ignored
  })
}

fn is_list(node: &Node) -> bool {
  node.is_kind(BULLETED_LIST) || node.is_kind(NUMBERED_LIST) || node.is_kind(TODO_LIST)
}

/// Type and attributes of the node a split continues with.
fn continuation(node: &Node) -> (Tendril, Attributes) {
  if node.is_kind(TODO_LIST) {
    (Tendril::from(TODO_LIST), attributes([("checked", false)]))
  } else if is_list(node) {
    (Tendril::from(node.kind()), Attributes::new())
  } else {
    (Tendril::from(PARAGRAPH), Attributes::new())
  }
}

// Enter
//

pub fn enter(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  settle("insert newline", try_enter(ctx))
}

fn try_enter(ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
  let Some(selection) = ctx.editor.selection().cloned() else {
    return Ok(CommandOutcome::Ignored);
  };
  if selection.is_block() {
    return Ok(CommandOutcome::Ignored);
  }
  let mut tx = ctx.editor.transaction();
  let caret = if selection.is_collapsed() {
    selection.end
  } else {
    delete_selection(&mut tx, &selection)?;
    selection.normalized().start
  };
  let Position { path, offset } = caret;

  let document = tx.document();
  let Some(node) = document.get_node_at_path(&path) else {
    return Ok(CommandOutcome::Ignored);
  };
  let Some(delta) = node.delta() else {
    return Ok(CommandOutcome::Ignored);
  };
  let len = delta.len();

  if node.is_kind(CODE) {
    tx.insert_text(&path, offset, "\n", None)?;
  } else if is_list(node) && len == 0 {
    tx.turn_into(&path, PARAGRAPH, false)?;
    tx.after_selection = Some(Selection::collapsed(Position::start_of(path)));
  } else if offset == 0 && len > 0 {
    let (kind, attributes) = continuation(node);
    let empty = Node::new(kind)
      .with_delta(Delta::new())
      .with_attributes(attributes);
    tx.insert_node(&path, empty)?;
    tx.after_selection = Some(Selection::collapsed(Position::start_of(path.next())));
  } else {
    let (kind, attributes) = continuation(node);
    let tail = delta.slice(offset, len);
    let children = node.children().to_vec();
    tx.delete_text(&path, offset, len - offset)?;
    if !children.is_empty() {
      tx.delete_nodes(&path.child(0), children.len())?;
    }
    let split = Node::new(kind)
      .with_delta(tail)
      .with_attributes(attributes)
      .with_children(children);
    tx.insert_node(&path.next(), split)?;
    tx.after_selection = Some(Selection::collapsed(Position::start_of(path.next())));
  }
  ctx.editor.apply(tx, ApplyOptions::default())?;
  Ok(CommandOutcome::Handled)
}

// History
//

pub fn undo(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  settle("undo", ctx.editor.undo().map(|_| CommandOutcome::Handled))
}

pub fn redo(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  settle("redo", ctx.editor.redo().map(|_| CommandOutcome::Handled))
}

// Formatting
//

pub fn toggle_bold(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  settle("toggle bold", toggle_attribute(ctx, "bold"))
}

pub fn toggle_italic(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  settle("toggle italic", toggle_attribute(ctx, "italic"))
}

pub fn toggle_underline(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  settle("toggle underline", toggle_attribute(ctx, "underline"))
}

pub fn toggle_strikethrough(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  settle("toggle strikethrough", toggle_attribute(ctx, "strikethrough"))
}

pub fn toggle_code(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  settle("toggle code", toggle_attribute(ctx, "code"))
}

/// Flip `key` over the selected text. Across several nodes the flag is
/// cleared only when every selected char already has it, and set everywhere
/// otherwise.
fn toggle_attribute(ctx: &mut CommandContext<'_>, key: &str) -> Result<CommandOutcome> {
  let Some(selection) = ctx.editor.selection().cloned() else {
    return Ok(CommandOutcome::Ignored);
  };
  if selection.is_block() || selection.is_collapsed() {
    return Ok(CommandOutcome::Ignored);
  }
  let normalized = selection.normalized();
  let document = ctx.editor.document();
  let ranges: Vec<(Path, usize, usize)> = document
    .get_paths_in_selection(&normalized)
    .into_iter()
    .filter_map(|path| {
      let len = document.delta_at(&path)?.len();
      let start = if path == normalized.start.path {
        normalized.start.offset
      } else {
        0
      };
      let end = if path == normalized.end.path {
        normalized.end.offset
      } else {
        len
      };
      (start < end).then_some((path, start, end))
    })
    .collect();

  let mut tx = ctx.editor.transaction();
  match ranges.as_slice() {
    [] => return Ok(CommandOutcome::Ignored),
    [(path, start, end)] => {
      tx.format_text(path, *start, end - start, &attributes([(key, true)]))?;
    },
    ranges => {
      let on = Value::Bool(true);
      let everywhere = ranges.iter().all(|(path, start, end)| {
        document
          .delta_at(path)
          .is_some_and(|delta| delta.every_attribute_eq(*start, *end, key, &on))
      });
      let value = if everywhere { Value::Null } else { on };
      let update = attributes([(key, value)]);
      for (path, start, end) in ranges {
        tx.set_text_attributes(path, *start, end - start, &update)?;
      }
    },
  }
  tx.after_selection = Some(selection);
  ctx.editor.apply(tx, ApplyOptions::default())?;
  Ok(CommandOutcome::Handled)
}

// Selection
//

pub fn select_all(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  let document = ctx.editor.document();
  let (Some(first), Some(last)) = (document.first_path(), document.last_path()) else {
    return CommandOutcome::Ignored;
  };
  let len = document.delta_at(&last).map_or(0, |delta| delta.len());
  let selection = Selection::new(Position::start_of(first), Position::new(last, len));
  ctx.editor.update_selection(Some(selection));
  CommandOutcome::Handled
}

pub fn exit_block_mode(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  if ctx.editor.exit_block_mode() {
    CommandOutcome::Handled
  } else {
    CommandOutcome::Ignored
  }
}

/// One rune back, stepping into the end of the previous text node at a node
/// start. Stays put at the very start of the document.
fn step_back(ctx: &CommandContext<'_>, position: &Position) -> Position {
  let document = ctx.editor.document();
  if position.offset > 0
    && let Some(delta) = document.delta_at(&position.path)
  {
    return position.with_offset(delta.prev_rune_position(position.offset));
  }
  document
    .previous_text_node(&position.path)
    .and_then(|path| {
      let len = document.delta_at(&path)?.len();
      Some(Position::new(path, len))
    })
    .unwrap_or_else(|| position.clone())
}

fn step_forward(ctx: &CommandContext<'_>, position: &Position) -> Position {
  let document = ctx.editor.document();
  if let Some(delta) = document.delta_at(&position.path)
    && position.offset < delta.len()
  {
    return position.with_offset(delta.next_rune_position(position.offset));
  }
  document
    .next_text_node(&position.path)
    .map(Position::start_of)
    .unwrap_or_else(|| position.clone())
}

pub fn move_left(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  let Some(selection) = ctx.editor.selection().cloned() else {
    return CommandOutcome::Ignored;
  };
  let target = if selection.is_collapsed() {
    step_back(ctx, &selection.end)
  } else {
    selection.normalized().start
  };
  ctx.editor.update_selection(Some(Selection::collapsed(target)));
  CommandOutcome::Handled
}

pub fn move_right(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  let Some(selection) = ctx.editor.selection().cloned() else {
    return CommandOutcome::Ignored;
  };
  let target = if selection.is_collapsed() {
    step_forward(ctx, &selection.end)
  } else {
    selection.normalized().end
  };
  ctx.editor.update_selection(Some(Selection::collapsed(target)));
  CommandOutcome::Handled
}

pub fn select_left(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  let Some(selection) = ctx.editor.selection().cloned() else {
    return CommandOutcome::Ignored;
  };
  let end = step_back(ctx, &selection.end);
  ctx
    .editor
    .update_selection(Some(Selection::new(selection.start, end)));
  CommandOutcome::Handled
}

pub fn select_right(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  let Some(selection) = ctx.editor.selection().cloned() else {
    return CommandOutcome::Ignored;
  };
  let end = step_forward(ctx, &selection.end);
  ctx
    .editor
    .update_selection(Some(Selection::new(selection.start, end)));
  CommandOutcome::Handled
}

pub fn move_to_start(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  let Some(selection) = ctx.editor.selection() else {
    return CommandOutcome::Ignored;
  };
  let target = Position::start_of(selection.end.path.clone());
  ctx
    .editor
    .update_selection(Some(Selection::collapsed(target)));
  CommandOutcome::Handled
}

pub fn move_to_end(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  let Some(selection) = ctx.editor.selection() else {
    return CommandOutcome::Ignored;
  };
  let path = selection.end.path.clone();
  let len = ctx
    .editor
    .document()
    .delta_at(&path)
    .map_or(0, |delta| delta.len());
  ctx
    .editor
    .update_selection(Some(Selection::collapsed(Position::new(path, len))));
  CommandOutcome::Handled
}

fn move_vertical(ctx: &mut CommandContext<'_>, upwards: bool) -> CommandOutcome {
  let (Some(selection), Some(selectables)) = (ctx.editor.selection(), ctx.selectables) else {
    return CommandOutcome::Ignored;
  };
  let from = if upwards {
    selection.normalized().start
  } else {
    selection.normalized().end
  };
  match from.move_vertical(upwards, ctx.editor.document(), selectables) {
    Some(target) => {
      ctx
        .editor
        .update_selection(Some(Selection::collapsed(target)));
      CommandOutcome::Handled
    },
    None => CommandOutcome::Ignored,
  }
}

pub fn move_up(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  move_vertical(ctx, true)
}

pub fn move_down(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  move_vertical(ctx, false)
}

// Nesting
//

/// The node a nesting command acts on: the caret's node, when the selection
/// stays inside one node.
fn nesting_target(ctx: &CommandContext<'_>) -> Option<(Selection, Path)> {
  let selection = ctx.editor.selection()?.clone();
  if selection.is_block() || selection.start.path != selection.end.path {
    return None;
  }
  let path = selection.end.path.clone();
  Some((selection, path))
}

fn moved(selection: &Selection, to: &Path) -> Selection {
  let mut selection = selection.clone();
  selection.start.path = to.clone();
  selection.end.path = to.clone();
  selection
}

pub fn indent(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  settle("indent", try_indent(ctx))
}

fn try_indent(ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
  let Some((selection, path)) = nesting_target(ctx) else {
    return Ok(CommandOutcome::Ignored);
  };
  let document = ctx.editor.document();
  let (Some(node), Some(previous)) = (document.get_node_at_path(&path), path.previous()) else {
    return Ok(CommandOutcome::Ignored);
  };
  let Some(parent) = document.get_node_at_path(&previous) else {
    return Ok(CommandOutcome::Ignored);
  };
  if !document.schema().permits_children(parent.kind()) || parent.is_kind(TABLE) {
    return Ok(CommandOutcome::Ignored);
  }

  let target = previous.child(parent.children().len());
  let node = node.clone();
  let mut tx = ctx.editor.transaction();
  tx.delete_node(&path)?;
  tx.insert_node(&target, node)?;
  tx.after_selection = Some(moved(&selection, &target));
  ctx.editor.apply(tx, ApplyOptions::default())?;
  Ok(CommandOutcome::Handled)
}

pub fn outdent(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  settle("outdent", try_outdent(ctx))
}

fn try_outdent(ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
  let Some((selection, path)) = nesting_target(ctx) else {
    return Ok(CommandOutcome::Ignored);
  };
  let Some(parent) = path.parent().filter(|parent| !parent.is_empty()) else {
    return Ok(CommandOutcome::Ignored);
  };
  let document = ctx.editor.document();
  let (Some(node), Some(parent_node)) = (
    document.get_node_at_path(&path),
    document.get_node_at_path(&parent),
  ) else {
    return Ok(CommandOutcome::Ignored);
  };
  if parent_node.is_kind(TABLE_CELL) || parent_node.is_kind(TABLE) {
    return Ok(CommandOutcome::Ignored);
  }

  let target = parent.next();
  let node = node.clone();
  let mut tx = ctx.editor.transaction();
  tx.delete_node(&path)?;
  tx.insert_node(&target, node)?;
  tx.after_selection = Some(moved(&selection, &target));
  ctx.editor.apply(tx, ApplyOptions::default())?;
  Ok(CommandOutcome::Handled)
}

#[cfg(test)]
mod test {
  use notes_lib::{
    document::Document,
    editor::Editor,
    node::HEADING,
    selection::SelectionMode,
  };
  use serde_json::json;

  use super::*;

  fn editor(blocks: impl IntoIterator<Item = Node>) -> Editor {
    Editor::new(Document::from_blocks(blocks))
  }

  fn node(editor: &Editor, path: &[usize]) -> Node {
    editor
      .document()
      .get_node_at_path(&Path::from(path))
      .cloned()
      .unwrap()
  }

  fn run(editor: &mut Editor, handler: fn(&mut CommandContext<'_>) -> CommandOutcome) -> CommandOutcome {
    handler(&mut CommandContext::new(editor))
  }

  #[test]
  fn enter_splits_and_hands_children_to_the_new_node() {
    let mut editor = editor([Node::new(TODO_LIST)
      .with_attributes(attributes([("checked", true)]))
      .with_delta(Delta::from_text("buy milk"))
      .with_children([Node::paragraph("details")])]);
    editor.update_selection(Some(Selection::single([0], 3, None)));
    run(&mut editor, enter);

    let first = node(&editor, &[0]);
    let second = node(&editor, &[1]);
    assert_eq!(first.text(), "buy");
    assert!(first.children().is_empty());
    assert!(second.is_kind(TODO_LIST));
    assert_eq!(second.text(), " milk");
    assert_eq!(second.attributes().get("checked"), Some(&json!(false)));
    assert_eq!(second.children().len(), 1);
    assert_eq!(editor.selection(), Some(&Selection::single([1], 0, None)));
  }

  #[test]
  fn enter_at_start_inserts_above() {
    let mut editor = editor([Node::new(HEADING).with_delta(Delta::from_text("title"))]);
    editor.update_selection(Some(Selection::single([0], 0, None)));
    run(&mut editor, enter);
    assert!(node(&editor, &[0]).is_kind(PARAGRAPH));
    assert!(node(&editor, &[1]).is_kind(HEADING));
    assert_eq!(editor.selection(), Some(&Selection::single([1], 0, None)));
  }

  #[test]
  fn enter_on_empty_list_item_leaves_the_list() {
    let mut editor = editor([Node::new(BULLETED_LIST).with_delta(Delta::new())]);
    editor.update_selection(Some(Selection::single([0], 0, None)));
    run(&mut editor, enter);
    assert!(node(&editor, &[0]).is_kind(PARAGRAPH));
    assert_eq!(editor.document().root().children().len(), 1);
  }

  #[test]
  fn enter_in_code_inserts_a_newline() {
    let mut editor = editor([Node::new(CODE).with_delta(Delta::from_text("fn main()"))]);
    editor.update_selection(Some(Selection::single([0], 9, None)));
    run(&mut editor, enter);
    assert_eq!(node(&editor, &[0]).text(), "fn main()\n");
  }

  #[test]
  fn toggles_cover_every_selected_node() {
    let mut editor = editor([
      Node::new(PARAGRAPH).with_delta(Delta::new().insert("ab", Some(attributes([("bold", true)])))),
      Node::paragraph("cd"),
    ]);
    editor.update_selection(Some(Selection::new(
      Position::new([0], 0),
      Position::new([1], 2),
    )));
    run(&mut editor, toggle_bold);
    let on = json!(true);
    let document = editor.document();
    assert!(document.delta_at(&Path::from([0])).unwrap().every_attribute_eq(0, 2, "bold", &on));
    assert!(document.delta_at(&Path::from([1])).unwrap().every_attribute_eq(0, 2, "bold", &on));

    run(&mut editor, toggle_bold);
    assert_eq!(node(&editor, &[0]).delta(), Some(&Delta::from_text("ab")));
    assert_eq!(node(&editor, &[1]).delta(), Some(&Delta::from_text("cd")));
  }

  #[test]
  fn toggle_needs_a_range() {
    let mut editor = editor([Node::paragraph("ab")]);
    editor.update_selection(Some(Selection::single([0], 1, None)));
    assert_eq!(run(&mut editor, toggle_italic), CommandOutcome::Ignored);
  }

  #[test]
  fn arrows_cross_node_boundaries() {
    let mut editor = editor([Node::paragraph("ab"), Node::paragraph("c")]);
    editor.update_selection(Some(Selection::single([1], 0, None)));
    run(&mut editor, move_left);
    assert_eq!(editor.selection(), Some(&Selection::single([0], 2, None)));
    run(&mut editor, move_right);
    assert_eq!(editor.selection(), Some(&Selection::single([1], 0, None)));

    run(&mut editor, select_left);
    run(&mut editor, select_left);
    assert_eq!(
      editor.selection(),
      Some(&Selection::new(Position::new([1], 0), Position::new([0], 1)))
    );
    run(&mut editor, move_left);
    assert_eq!(editor.selection(), Some(&Selection::single([0], 1, None)));

    run(&mut editor, move_to_end);
    assert_eq!(editor.selection(), Some(&Selection::single([0], 2, None)));
    run(&mut editor, move_to_start);
    assert_eq!(editor.selection(), Some(&Selection::single([0], 0, None)));
  }

  #[test]
  fn select_all_then_escape_from_block_mode() {
    let mut editor = editor([Node::paragraph("ab"), Node::paragraph("cde")]);
    run(&mut editor, select_all);
    assert_eq!(
      editor.selection(),
      Some(&Selection::new(Position::new([0], 0), Position::new([1], 3)))
    );
    assert_eq!(run(&mut editor, exit_block_mode), CommandOutcome::Ignored);
    editor.update_selection(Some(Selection::block([1])));
    assert_eq!(run(&mut editor, exit_block_mode), CommandOutcome::Handled);
    assert_eq!(editor.selection().map(|s| s.mode), Some(SelectionMode::Text));
  }

  #[test]
  fn indent_and_outdent_move_the_caret_node() {
    let mut editor = editor([Node::new(BULLETED_LIST).with_delta(Delta::from_text("a")), Node::paragraph("b")]);
    editor.update_selection(Some(Selection::single([1], 1, None)));
    assert_eq!(run(&mut editor, indent), CommandOutcome::Handled);
    assert_eq!(node(&editor, &[0, 0]).text(), "b");
    assert_eq!(editor.selection(), Some(&Selection::single([0, 0], 1, None)));

    assert_eq!(run(&mut editor, indent), CommandOutcome::Ignored);
    assert_eq!(run(&mut editor, outdent), CommandOutcome::Handled);
    assert_eq!(node(&editor, &[1]).text(), "b");
    assert_eq!(run(&mut editor, outdent), CommandOutcome::Ignored);
  }

  #[test]
  fn undo_on_empty_history_is_still_handled() {
    let mut editor = editor([Node::paragraph("a")]);
    assert_eq!(run(&mut editor, undo), CommandOutcome::Handled);
    assert_eq!(run(&mut editor, redo), CommandOutcome::Handled);
  }
}

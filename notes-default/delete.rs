//! Backspace, forward delete and range deletion.

use notes_lib::{
  document::Document,
  editor::ApplyOptions,
  node::{
    Node,
    PARAGRAPH,
    TABLE,
    TABLE_CELL,
  },
  path::Path,
  position::Position,
  selection::Selection,
  transaction::{
    Result,
    Transaction,
  },
};
use tracing::debug;

use crate::{
  CommandOutcome,
  command_shortcut::CommandContext,
  commands::settle,
};

/// The table cell `path` lives in, if any.
pub(crate) fn cell_of(document: &Document, path: &Path) -> Option<Path> {
  match document.get_node_at_path(path) {
    Some(node) if node.is_kind(TABLE_CELL) => Some(path.clone()),
    _ => document.ancestor_of_kind(path, TABLE_CELL),
  }
}

/// Table structure is never deleted by text editing.
fn is_table_structure(document: &Document, path: &Path) -> bool {
  document
    .get_node_at_path(path)
    .is_some_and(|node| node.is_kind(TABLE) || node.is_kind(TABLE_CELL))
    || cell_of(document, path).is_some()
}

/// Whether `selection` spans the whole document.
pub fn covers_document(document: &Document, selection: &Selection) -> bool {
  let normalized = selection.normalized();
  let (Some(first), Some(last)) = (document.first_path(), document.last_path()) else {
    return false;
  };
  let last_len = document
    .get_node_at_path(&last)
    .map_or(0, Node::text_len);
  normalized.start == Position::new(first, 0) && normalized.end == Position::new(last, last_len)
}

/// Delete the content of a non-collapsed text selection and collapse the
/// selection to its start.
///
/// Nodes strictly between the two ends are deleted, except table structure
/// whose text is cleared instead. Ancestors of the last node go once its
/// tail has been merged, handing any other children to the first node. The tail of the last node, and its
/// children, are merged onto the first node unless the two ends sit in
/// different table cells, in which case each side is truncated on its own.
pub fn delete_selection(tx: &mut Transaction, selection: &Selection) -> Result<()> {
  let normalized = selection.normalized();
  let (start, end) = (&normalized.start, &normalized.end);
  let paths = tx.document().get_paths_in_selection(&normalized);
  let (Some(first), Some(last)) = (paths.first().cloned(), paths.last().cloned()) else {
    return Ok(());
  };

  if paths.len() == 1 {
    let document = tx.document();
    if document.delta_at(&first).is_some() {
      tx.delete_text(&first, start.offset, end.offset.saturating_sub(start.offset))?;
    } else if !is_table_structure(document, &first) {
      tx.delete_node(&first)?;
    }
    tx.after_selection = Some(Selection::collapsed(start.clone()));
    return Ok(());
  }

  // clear table interiors, note the ancestors of `last` by depth and pick the
  // top-most of the remaining middle nodes
  let mut doomed: Vec<Path> = Vec::new();
  let mut hollow: Vec<usize> = Vec::new();
  for path in &paths[1..paths.len() - 1] {
    if is_table_structure(tx.document(), path) {
      clear_text(tx, path)?;
      continue;
    }
    if path.is_ancestor_of(&last) {
      hollow.push(path.len());
      continue;
    }
    if doomed.last().is_some_and(|top| top.is_ancestor_of(path)) {
      continue;
    }
    doomed.push(path.clone());
  }

  let mut last = last;
  for path in doomed.iter().rev() {
    tx.delete_node(path)?;
    if let Some(shifted) = last.shifted_by_delete(path, 1) {
      last = shifted;
    }
  }

  let document = tx.document();
  let first_len = document.delta_at(&first).map(|delta| delta.len());
  let last_len = document.delta_at(&last).map(|delta| delta.len());
  let same_cell = cell_of(document, &first) == cell_of(document, &last);
  let first_is_table = is_table_structure(document, &first);
  let last_is_table = is_table_structure(document, &last);

  let merges = same_cell && first_len.is_some() && last_len.is_some();
  if !merges {
    for &depth in &hollow {
      clear_text(tx, &Path::from(&last.indices()[..depth]))?;
    }
  }

  match (first_len, last_len) {
    (Some(_), Some(_)) if same_cell => {
      let right = tx.merge_text(&first, &last, Some(start.offset), Some(end.offset))?;
      tx.delete_node(&right)?;
      dissolve_ancestors(tx, &first, right, &hollow)?;
      tx.after_selection = Some(Selection::collapsed(start.clone()));
    },
    (Some(first_len), Some(_)) => {
      tx.delete_text(&first, start.offset, first_len.saturating_sub(start.offset))?;
      tx.delete_text(&last, 0, end.offset)?;
      tx.after_selection = Some(Selection::collapsed(start.clone()));
    },
    (Some(first_len), None) => {
      tx.delete_text(&first, start.offset, first_len.saturating_sub(start.offset))?;
      if !last_is_table {
        tx.delete_node(&last)?;
      }
      tx.after_selection = Some(Selection::collapsed(start.clone()));
    },
    (None, last_len) => {
      if last_len.is_some() {
        tx.delete_text(&last, 0, end.offset)?;
      } else if !last_is_table {
        tx.delete_node(&last)?;
      }
      if !first_is_table {
        tx.delete_node(&first)?;
        last = last.shifted_by_delete(&first, 1).unwrap_or(last);
      }
      tx.after_selection = tx
        .document()
        .delta_at(&last)
        .map(|_| Selection::collapsed(Position::start_of(last.clone())));
    },
  }
  Ok(())
}

fn clear_text(tx: &mut Transaction, path: &Path) -> Result<()> {
  let len = tx.document().delta_at(path).map_or(0, |delta| delta.len());
  if len > 0 {
    tx.delete_text(path, 0, len)?;
  }
  Ok(())
}

/// Delete the ancestors of a merged-away node, deepest first. `anchor` is the
/// merged node's old path and `depths` the lengths of the ancestor paths.
/// Children an ancestor still holds move onto `first` the way `merge_text`
/// moves them.
fn dissolve_ancestors(
  tx: &mut Transaction,
  first: &Path,
  mut anchor: Path,
  depths: &[usize],
) -> Result<()> {
  for &depth in depths.iter().rev() {
    let ancestor = Path::from(&anchor.indices()[..depth]);
    let children = tx
      .document()
      .get_node_at_path(&ancestor)
      .map(|node| node.children().to_vec())
      .unwrap_or_default();
    if !children.is_empty() {
      let count = children.len();
      tx.delete_nodes(&ancestor.child(0), count)?;
      let document = tx.document();
      let target = match document.get_node_at_path(first) {
        Some(node) if document.schema().permits_children(node.kind()) => {
          first.child(node.children().len())
        },
        _ => first.next(),
      };
      tx.insert_nodes(&target, children)?;
      anchor = anchor.shifted_by_insert(&target, count);
    }
    tx.delete_node(&Path::from(&anchor.indices()[..depth]))?;
  }
  Ok(())
}

/// Delete every node of a block selection, top-most first. An emptied
/// document gets a fresh paragraph.
fn delete_blocks(tx: &mut Transaction, selection: &Selection) -> Result<()> {
  let normalized = selection.normalized();
  let mut tops: Vec<Path> = Vec::new();
  for path in tx.document().get_paths_in_selection(&normalized) {
    if !tops.last().is_some_and(|top| top.is_ancestor_of(&path)) {
      tops.push(path);
    }
  }
  for path in tops.iter().rev() {
    tx.delete_node(path)?;
  }
  ensure_paragraph(tx)?;

  let start = normalized.start.path;
  let document = tx.document();
  tx.after_selection = if document.delta_at(&start).is_some() {
    Some(Selection::collapsed(Position::start_of(start)))
  } else {
    document.previous_text_node(&start).and_then(|path| {
      let len = document.delta_at(&path)?.len();
      Some(Selection::collapsed(Position::new(path, len)))
    })
  };
  Ok(())
}

fn ensure_paragraph(tx: &mut Transaction) -> Result<()> {
  if tx.document().root().children().is_empty() {
    tx.insert_node(&Path::from([0]), Node::paragraph(""))?;
  }
  Ok(())
}

/// Replace the whole document with one empty paragraph.
fn delete_everything(tx: &mut Transaction) -> Result<()> {
  let count = tx.document().root().children().len();
  tx.delete_nodes(&Path::from([0]), count)?;
  ensure_paragraph(tx)?;
  tx.after_selection = Some(Selection::single([0], 0, None));
  Ok(())
}

/// Delete whatever a non-collapsed or block selection covers. Returns
/// `false` for a collapsed text selection.
pub(crate) fn delete_non_collapsed(tx: &mut Transaction, selection: &Selection) -> Result<bool> {
  if selection.is_block() {
    delete_blocks(tx, selection)?;
  } else if selection.is_collapsed() {
    return Ok(false);
  } else if covers_document(tx.document(), selection) {
    delete_everything(tx)?;
  } else {
    delete_selection(tx, selection)?;
  }
  Ok(true)
}

pub fn backspace(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  settle("backspace", try_backspace(ctx))
}

fn try_backspace(ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
  let Some(selection) = ctx.editor.selection().cloned() else {
    return Ok(CommandOutcome::Ignored);
  };
  let mut tx = ctx.editor.transaction();
  if delete_non_collapsed(&mut tx, &selection)? {
    ctx.editor.apply(tx, ApplyOptions::default())?;
    return Ok(CommandOutcome::Handled);
  }

  let Position { path, offset } = selection.end;
  let document = ctx.editor.document();
  let Some(node) = document.get_node_at_path(&path) else {
    return Ok(CommandOutcome::Ignored);
  };
  let Some(delta) = node.delta() else {
    return Ok(CommandOutcome::Ignored);
  };

  if offset > 0 {
    let previous = delta.prev_rune_position(offset);
    tx.delete_text(&path, previous, offset - previous)?;
    ctx.editor.apply(tx, ApplyOptions::default())?;
    return Ok(CommandOutcome::Handled);
  }

  // at the start of the node
  let in_cell = cell_of(document, &path).is_some();
  if !node.is_kind(PARAGRAPH) {
    tx.turn_into(&path, PARAGRAPH, false)?;
    tx.after_selection = Some(Selection::collapsed(Position::start_of(path)));
    ctx.editor.apply(tx, ApplyOptions::default())?;
    return Ok(CommandOutcome::Handled);
  }

  let parent = path.parent().filter(|parent| !parent.is_empty());
  if let Some(parent) = parent
    && node.children().is_empty()
    && !document.contains(&path.next())
    && !in_cell
  {
    let target = parent.next();
    let lifted = node.clone();
    tx.delete_node(&path)?;
    tx.insert_node(&target, lifted)?;
    tx.after_selection = Some(Selection::collapsed(Position::start_of(target)));
    ctx.editor.apply(tx, ApplyOptions::default())?;
    return Ok(CommandOutcome::Handled);
  }

  // a divider or image right before the caret goes first
  if let Some(previous) = path.previous()
    && let Some(sibling) = document.get_node_at_path(&previous)
    && !sibling.has_delta()
    && sibling.children().is_empty()
    && !is_table_structure(document, &previous)
  {
    tx.delete_node(&previous)?;
    tx.after_selection = Some(Selection::collapsed(Position::start_of(previous)));
    ctx.editor.apply(tx, ApplyOptions::default())?;
    return Ok(CommandOutcome::Handled);
  }

  let Some(target) = document.previous_text_node(&path) else {
    return Ok(CommandOutcome::Ignored);
  };
  if cell_of(document, &target) != cell_of(document, &path) {
    debug!(%path, "backspace stops at the table cell boundary");
    return Ok(CommandOutcome::Ignored);
  }
  let target_len = document.delta_at(&target).map_or(0, |delta| delta.len());
  let right = tx.merge_text(&target, &path, None, None)?;
  tx.delete_node(&right)?;
  tx.after_selection = Some(Selection::collapsed(Position::new(target, target_len)));
  ctx.editor.apply(tx, ApplyOptions::default())?;
  Ok(CommandOutcome::Handled)
}

pub fn forward_delete(ctx: &mut CommandContext<'_>) -> CommandOutcome {
  settle("delete", try_forward_delete(ctx))
}

fn try_forward_delete(ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
  let Some(selection) = ctx.editor.selection().cloned() else {
    return Ok(CommandOutcome::Ignored);
  };
  let mut tx = ctx.editor.transaction();
  if delete_non_collapsed(&mut tx, &selection)? {
    ctx.editor.apply(tx, ApplyOptions::default())?;
    return Ok(CommandOutcome::Handled);
  }

  let Position { path, offset } = selection.end;
  let document = ctx.editor.document();
  let Some(delta) = document.delta_at(&path) else {
    return Ok(CommandOutcome::Ignored);
  };

  if offset < delta.len() {
    let next = delta.next_rune_position(offset);
    tx.delete_text(&path, offset, next - offset)?;
    tx.after_selection = Some(Selection::collapsed(Position::new(path, offset)));
    ctx.editor.apply(tx, ApplyOptions::default())?;
    return Ok(CommandOutcome::Handled);
  }

  let Some(next) = document.next_text_node(&path) else {
    return Ok(CommandOutcome::Ignored);
  };
  if cell_of(document, &next) != cell_of(document, &path) {
    return Ok(CommandOutcome::Ignored);
  }
  let right = tx.merge_text(&path, &next, None, None)?;
  tx.delete_node(&right)?;
  tx.after_selection = Some(Selection::collapsed(Position::new(path, offset)));
  ctx.editor.apply(tx, ApplyOptions::default())?;
  Ok(CommandOutcome::Handled)
}

//! Live editor state: the document, the selection and the undo history.
//!
//! [`Editor::apply`] is the single entry point through which the live tree
//! changes. It applies a transaction atomically (on failure the document is
//! left untouched), updates the selection, records the change for undo and
//! then notifies listeners synchronously.

use std::time::Instant;

use tracing::{
  debug,
  trace,
};

use crate::{
  config::EditorConfig,
  document::Document,
  history::{
    History,
    HistoryJump,
  },
  selection::{
    Selection,
    SelectionMode,
  },
  transaction::{
    ChangeSet,
    Operation,
    Result,
    Transaction,
  },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
  /// Record the change in the undo history.
  pub record_undo:           bool,
  /// Put the change in an undo group of its own.
  pub skip_history_debounce: bool,
}

impl Default for ApplyOptions {
  fn default() -> Self {
    Self {
      record_undo:           true,
      skip_history_debounce: false,
    }
  }
}

impl ApplyOptions {
  pub fn isolated() -> Self {
    Self {
      skip_history_debounce: true,
      ..Self::default()
    }
  }

  pub fn without_undo() -> Self {
    Self {
      record_undo: false,
      ..Self::default()
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(usize);

type SelectionListener = Box<dyn FnMut(Option<&Selection>)>;
type DocumentListener = Box<dyn FnMut(&Document, &ChangeSet)>;

#[derive(Default)]
struct Listeners {
  next_id:   usize,
  selection: Vec<(ListenerId, SelectionListener)>,
  document:  Vec<(ListenerId, DocumentListener)>,
}

impl Listeners {
  fn next_id(&mut self) -> ListenerId {
    self.next_id += 1;
    ListenerId(self.next_id)
  }
}

pub struct Editor {
  document:  Document,
  selection: Option<Selection>,
  history:   History,
  listeners: Listeners,
}

impl std::fmt::Debug for Editor {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Editor")
      .field("document", &self.document)
      .field("selection", &self.selection)
      .field("history", &self.history)
      .finish_non_exhaustive()
  }
}

impl Editor {
  pub fn new(document: Document) -> Self {
    Self::with_config(document, &EditorConfig::default())
  }

  pub fn with_config(document: Document, config: &EditorConfig) -> Self {
    Self {
      document,
      selection: None,
      history: History::new(config.undo_debounce(), config.max_undo_groups),
      listeners: Listeners::default(),
    }
  }

  pub fn document(&self) -> &Document {
    &self.document
  }

  pub fn selection(&self) -> Option<&Selection> {
    self.selection.as_ref()
  }

  pub fn history(&self) -> &History {
    &self.history
  }

  /// A transaction against the current document, remembering the current
  /// selection as its `before_selection`.
  pub fn transaction(&self) -> Transaction {
    let mut tx = Transaction::new(&self.document);
    tx.before_selection = self.selection.clone();
    tx
  }

  /// Move the selection without touching the document.
  pub fn update_selection(&mut self, selection: Option<Selection>) {
    if self.selection == selection {
      return;
    }
    self.selection = selection;
    self.notify_selection();
  }

  /// Leave block mode, keeping the selection in place as a text range.
  pub fn exit_block_mode(&mut self) -> bool {
    match &self.selection {
      Some(selection) if selection.is_block() => {
        let selection = selection.clone().with_mode(SelectionMode::Text);
        self.update_selection(Some(selection));
        true
      },
      _ => false,
    }
  }

  pub fn apply(&mut self, transaction: Transaction, options: ApplyOptions) -> Result<()> {
    self.apply_at(transaction, options, Instant::now())
  }

  /// [`Editor::apply`] with an explicit commit time for undo grouping.
  pub fn apply_at(
    &mut self,
    transaction: Transaction,
    options: ApplyOptions,
    now: Instant,
  ) -> Result<()> {
    let after_selection = transaction.after_selection.clone();
    let before_selection = transaction
      .before_selection
      .clone()
      .or_else(|| self.selection.clone());
    let fallback = transaction
      .last_text_position()
      .cloned()
      .map(Selection::collapsed);
    let changes = transaction.into_changes();

    self.document = changes.apply_to(&self.document)?;
    let selection = after_selection
      .or(fallback)
      .or_else(|| map_selection(self.selection.as_ref(), &changes))
      .filter(|selection| {
        self.document.contains(&selection.start.path) && self.document.contains(&selection.end.path)
      });
    debug!(
      operations = changes.len(),
      selection = ?selection,
      "applied transaction"
    );

    if options.record_undo {
      self.history.commit_revision_at_timestamp(
        changes.clone(),
        before_selection,
        selection.clone(),
        options.skip_history_debounce,
        now,
      );
    }

    let selection_changed = self.selection != selection;
    self.selection = selection;
    if !changes.is_empty() {
      self.notify_document(&changes);
    }
    if selection_changed {
      self.notify_selection();
    }
    Ok(())
  }

  /// Revert the latest undo group. Returns whether anything was undone.
  pub fn undo(&mut self) -> Result<bool> {
    let jump = self.history.undo();
    self.jump(jump)
  }

  /// Reapply the latest undone group. Returns whether anything was redone.
  pub fn redo(&mut self) -> Result<bool> {
    let jump = self.history.redo();
    self.jump(jump)
  }

  fn jump(&mut self, jump: Option<HistoryJump>) -> Result<bool> {
    let Some(jump) = jump else {
      trace!("history stack empty");
      return Ok(false);
    };
    self.document = jump.changes.apply_to(&self.document)?;
    self.history.apply_jump(&jump);
    debug!(kind = ?jump.kind, operations = jump.changes.len(), "history jump");

    self.notify_document(&jump.changes);
    let selection = jump.selection.clone();
    if self.selection != selection {
      self.selection = selection;
      self.notify_selection();
    }
    Ok(true)
  }

  // Listeners
  //

  pub fn add_selection_listener(
    &mut self,
    listener: impl FnMut(Option<&Selection>) + 'static,
  ) -> ListenerId {
    let id = self.listeners.next_id();
    self.listeners.selection.push((id, Box::new(listener)));
    id
  }

  pub fn add_document_listener(
    &mut self,
    listener: impl FnMut(&Document, &ChangeSet) + 'static,
  ) -> ListenerId {
    let id = self.listeners.next_id();
    self.listeners.document.push((id, Box::new(listener)));
    id
  }

  /// Returns whether a listener was registered under `id`.
  pub fn remove_listener(&mut self, id: ListenerId) -> bool {
    let before = self.listeners.selection.len() + self.listeners.document.len();
    self.listeners.selection.retain(|(listener, _)| *listener != id);
    self.listeners.document.retain(|(listener, _)| *listener != id);
    before != self.listeners.selection.len() + self.listeners.document.len()
  }

  fn notify_selection(&mut self) {
    let selection = self.selection.as_ref();
    for (_, listener) in &mut self.listeners.selection {
      listener(selection);
    }
  }

  fn notify_document(&mut self, changes: &ChangeSet) {
    let document = &self.document;
    for (_, listener) in &mut self.listeners.document {
      listener(document, changes);
    }
  }
}

/// Carry `selection` through the node insertions and deletions in `changes`.
/// `None` when one of its ends was deleted.
fn map_selection(selection: Option<&Selection>, changes: &ChangeSet) -> Option<Selection> {
  let mut selection = selection?.clone();
  for operation in changes.operations() {
    let (start, end) = match operation {
      Operation::InsertNode { path, nodes } => (
        selection.start.path.shifted_by_insert(path, nodes.len()),
        selection.end.path.shifted_by_insert(path, nodes.len()),
      ),
      Operation::DeleteNode { path, nodes } => (
        selection.start.path.shifted_by_delete(path, nodes.len())?,
        selection.end.path.shifted_by_delete(path, nodes.len())?,
      ),
      _ => continue,
    };
    selection.start.path = start;
    selection.end.path = end;
  }
  Some(selection)
}

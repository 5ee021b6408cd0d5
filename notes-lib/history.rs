use std::{
  num::NonZeroUsize,
  time::{
    Duration,
    Instant,
  },
};

use tracing::debug;

use crate::{
  selection::Selection,
  transaction::ChangeSet,
};

/// Default window in which consecutive commits are grouped into one undo step.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Which stack a [`HistoryJump`] was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
  Undo,
  Redo,
}

/// A pending undo or redo that has not been applied yet.
///
/// The caller applies `changes` to the document and, only once that succeeded,
/// hands the jump back to [`History::apply_jump`]. History state therefore
/// never moves ahead of the document.
#[derive(Debug, Clone)]
pub struct HistoryJump {
  pub changes:   ChangeSet,
  /// Selection to restore once the changes are applied.
  pub selection: Option<Selection>,
  pub kind:      JumpKind,
}

impl HistoryJump {
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.changes.is_empty()
  }
}

/// One undo step: every change set committed inside a debounce window.
#[derive(Debug, Clone)]
struct Group {
  changes:          Vec<ChangeSet>,
  before_selection: Option<Selection>,
  after_selection:  Option<Selection>,
  last_commit:      Instant,
}

impl Group {
  /// Inverse of the whole group: change sets in reverse order, each inverted.
  fn inversion(&self) -> ChangeSet {
    self
      .changes
      .iter()
      .rev()
      .fold(ChangeSet::new(), |acc, changes| acc.compose(changes.invert()))
  }

  fn replay(&self) -> ChangeSet {
    self
      .changes
      .iter()
      .cloned()
      .fold(ChangeSet::new(), ChangeSet::compose)
  }
}

/// Linear undo/redo stacks with time-based grouping.
///
/// A commit joins the newest undo group when it arrives within `debounce` of
/// the group's previous commit; otherwise it opens a new group. A commit
/// flagged `skip_debounce` always sits alone in its own group, so neither the
/// edit before it nor the edit after it can join it.
///
/// Any new commit clears the redo stack. Undo and redo on an empty stack
/// produce no jump.
#[derive(Debug)]
pub struct History {
  undo:       Vec<Group>,
  redo:       Vec<Group>,
  debounce:   Duration,
  max_groups: Option<NonZeroUsize>,
  sealed:     bool,
}

impl Default for History {
  fn default() -> Self {
    Self::new(DEFAULT_DEBOUNCE, None)
  }
}

impl History {
  pub fn new(debounce: Duration, max_groups: Option<NonZeroUsize>) -> Self {
    Self {
      undo: Vec::new(),
      redo: Vec::new(),
      debounce,
      max_groups,
      sealed: false,
    }
  }

  pub fn commit_revision(
    &mut self,
    changes: ChangeSet,
    before_selection: Option<Selection>,
    after_selection: Option<Selection>,
    skip_debounce: bool,
  ) {
    self.commit_revision_at_timestamp(
      changes,
      before_selection,
      after_selection,
      skip_debounce,
      Instant::now(),
    );
  }

  pub fn commit_revision_at_timestamp(
    &mut self,
    changes: ChangeSet,
    before_selection: Option<Selection>,
    after_selection: Option<Selection>,
    skip_debounce: bool,
    timestamp: Instant,
  ) {
    if changes.is_empty() {
      return;
    }
    self.redo.clear();

    let joinable = !skip_debounce && !self.sealed;
    match self.undo.last_mut() {
      Some(group)
        if joinable && timestamp.saturating_duration_since(group.last_commit) <= self.debounce =>
      {
        group.changes.push(changes);
        group.after_selection = after_selection;
        group.last_commit = timestamp;
      },
      _ => {
        self.undo.push(Group {
          changes: vec![changes],
          before_selection,
          after_selection,
          last_commit: timestamp,
        });
        if let Some(max) = self.max_groups
          && self.undo.len() > max.get()
        {
          let excess = self.undo.len() - max.get();
          self.undo.drain(..excess);
          debug!(excess, "dropped oldest undo groups");
        }
      },
    }
    self.sealed = skip_debounce;
  }

  /// Close the current group; the next commit opens a new one.
  pub fn seal(&mut self) {
    self.sealed = true;
  }

  pub fn can_undo(&self) -> bool {
    !self.undo.is_empty()
  }

  pub fn can_redo(&self) -> bool {
    !self.redo.is_empty()
  }

  pub fn undo_len(&self) -> usize {
    self.undo.len()
  }

  pub fn redo_len(&self) -> usize {
    self.redo.len()
  }

  /// Prepare an undo without touching the stacks.
  pub fn undo(&self) -> Option<HistoryJump> {
    let group = self.undo.last()?;
    Some(HistoryJump {
      changes:   group.inversion(),
      selection: group.before_selection.clone(),
      kind:      JumpKind::Undo,
    })
  }

  /// Prepare a redo without touching the stacks.
  pub fn redo(&self) -> Option<HistoryJump> {
    let group = self.redo.last()?;
    Some(HistoryJump {
      changes:   group.replay(),
      selection: group.after_selection.clone(),
      kind:      JumpKind::Redo,
    })
  }

  /// Move the group between stacks once its changes were applied.
  pub fn apply_jump(&mut self, jump: &HistoryJump) {
    let (from, to) = match jump.kind {
      JumpKind::Undo => (&mut self.undo, &mut self.redo),
      JumpKind::Redo => (&mut self.redo, &mut self.undo),
    };
    if let Some(group) = from.pop() {
      to.push(group);
    }
    self.sealed = true;
  }

  pub fn clear(&mut self) {
    self.undo.clear();
    self.redo.clear();
    self.sealed = false;
  }
}

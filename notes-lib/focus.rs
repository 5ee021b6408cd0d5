//! Scoped suppression of focus hand-off.
//!
//! While transient UI (a menu, a link popover) is open the editor must not
//! hand keyboard focus back to the text field. Each piece of UI holds a
//! [`FocusGuard`] for as long as it is open; dropping the guard releases it
//! on every exit path.

use std::{
  cell::Cell,
  rc::Rc,
};

#[derive(Debug, Clone, Default)]
pub struct FocusRetention {
  holders: Rc<Cell<usize>>,
}

impl FocusRetention {
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use = "focus is released as soon as the guard is dropped"]
  pub fn acquire(&self) -> FocusGuard {
    self.holders.set(self.holders.get() + 1);
    FocusGuard {
      holders: self.holders.clone(),
    }
  }

  /// Whether any guard is alive.
  pub fn is_retained(&self) -> bool {
    self.holders.get() > 0
  }

  pub fn holders(&self) -> usize {
    self.holders.get()
  }
}

#[derive(Debug)]
pub struct FocusGuard {
  holders: Rc<Cell<usize>>,
}

impl Drop for FocusGuard {
  fn drop(&mut self) {
    self.holders.set(self.holders.get().saturating_sub(1));
  }
}

//! Default input behaviors for the block editor.
//!
//! This crate sits on top of `notes-lib` and turns raw input into document
//! edits: key combos into commands, typed characters into markdown-style
//! shortcuts, platform IME updates into transactions, and `/` into the slash
//! command menu.

pub mod character_shortcut;
pub mod command_shortcut;
pub mod commands;
pub mod delete;
pub mod format_shortcuts;
pub mod ime;
pub mod ime_reconciler;
mod input;
pub mod keymap;
pub mod selection_menu;
pub mod text_shortcuts;

pub use character_shortcut::{
  CharacterShortcutDispatcher,
  CharacterShortcutEvent,
  insert_character,
};
pub use command_shortcut::{
  CommandContext,
  CommandShortcutDispatcher,
  CommandShortcutEvent,
  KeyInterceptors,
};
pub use ime_reconciler::{
  ImeOutcome,
  ImeReconciler,
};
pub use input::{
  CharacterOutcome,
  CommandOutcome,
  Key,
  KeyEvent,
  Modifiers,
};
pub use keymap::{
  KeyBinding,
  KeyCombos,
};
pub use selection_menu::{
  SelectionMenuService,
  SelectionMenuSession,
};

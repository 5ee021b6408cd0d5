//! Input event types for editor dispatch.

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Modifiers {
  bits: u8,
}

impl Modifiers {
  pub const CTRL: u8 = 0b0000_0001;
  pub const ALT: u8 = 0b0000_0010;
  pub const SHIFT: u8 = 0b0000_0100;
  /// Command on macOS, the Windows key elsewhere.
  pub const META: u8 = 0b0000_1000;

  #[must_use]
  pub const fn empty() -> Self {
    Self { bits: 0 }
  }

  #[must_use]
  pub const fn from_bits(bits: u8) -> Self {
    Self { bits }
  }

  #[must_use]
  pub const fn is_empty(self) -> bool {
    self.bits == 0
  }

  #[must_use]
  pub const fn ctrl(self) -> bool {
    (self.bits & Self::CTRL) != 0
  }

  #[must_use]
  pub const fn alt(self) -> bool {
    (self.bits & Self::ALT) != 0
  }

  #[must_use]
  pub const fn shift(self) -> bool {
    (self.bits & Self::SHIFT) != 0
  }

  #[must_use]
  pub const fn meta(self) -> bool {
    (self.bits & Self::META) != 0
  }

  pub fn insert(&mut self, bits: u8) {
    self.bits |= bits;
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
  Char(char),
  Enter,
  Escape,
  Backspace,
  Tab,
  Delete,
  Home,
  End,
  PageUp,
  PageDown,
  Left,
  Right,
  Up,
  Down,
  Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
  pub key:       Key,
  pub modifiers: Modifiers,
}

impl KeyEvent {
  pub const fn new(key: Key, modifiers: Modifiers) -> Self {
    Self { key, modifiers }
  }

  /// An unmodified key press.
  pub const fn plain(key: Key) -> Self {
    Self::new(key, Modifiers::empty())
  }

  pub const fn with(key: Key, bits: u8) -> Self {
    Self::new(key, Modifiers::from_bits(bits))
  }
}

/// Result of running a command shortcut handler.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
  Handled,
  #[default]
  Ignored,
}

impl CommandOutcome {
  pub fn is_handled(self) -> bool {
    self == CommandOutcome::Handled
  }
}

/// Result of running a character shortcut handler.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CharacterOutcome {
  /// Not for this handler, the character should be inserted normally.
  #[default]
  Ignored,
  Handled,
  /// Handled, and the slash menu should be opened at the caret.
  OpenMenu,
}

impl CharacterOutcome {
  pub fn is_ignored(self) -> bool {
    self == CharacterOutcome::Ignored
  }
}

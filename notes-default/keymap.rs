//! Key combo strings.
//!
//! Combos are written the way users see them: modifiers and a key joined by
//! `+`, alternatives separated by `,`:
//!
//! ```text
//! backspace
//! ctrl+shift+z,ctrl+y
//! cmd+b
//! shift+arrow left
//! ```

use std::{
  fmt,
  str::FromStr,
};

use smallvec::SmallVec;
use thiserror::Error;

use crate::{
  Key,
  KeyEvent,
  Modifiers,
};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ParseKeyBindingError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyBinding {
  pub code:  Key,
  pub shift: bool,
  pub ctrl:  bool,
  pub alt:   bool,
  pub meta:  bool,
}

impl KeyBinding {
  pub const fn new(code: Key) -> Self {
    Self {
      code,
      shift: false,
      ctrl: false,
      alt: false,
      meta: false,
    }
  }

  pub const fn from_key_event(event: &KeyEvent) -> Self {
    Self {
      code:  event.key,
      shift: event.modifiers.shift(),
      ctrl:  event.modifiers.ctrl(),
      alt:   event.modifiers.alt(),
      meta:  event.modifiers.meta(),
    }
  }

  #[must_use]
  pub fn to_key_event(&self) -> KeyEvent {
    let mut modifiers = Modifiers::empty();
    if self.ctrl {
      modifiers.insert(Modifiers::CTRL);
    }
    if self.alt {
      modifiers.insert(Modifiers::ALT);
    }
    if self.shift {
      modifiers.insert(Modifiers::SHIFT);
    }
    if self.meta {
      modifiers.insert(Modifiers::META);
    }
    KeyEvent {
      key: self.code,
      modifiers,
    }
  }

  /// Letters compare case-insensitively: with shift held, platforms report
  /// `Z` where the combo says `z`.
  pub fn matches(&self, event: &KeyEvent) -> bool {
    let other = Self::from_key_event(event);
    normalize(self.code) == normalize(other.code)
      && self.shift == other.shift
      && self.ctrl == other.ctrl
      && self.alt == other.alt
      && self.meta == other.meta
  }
}

fn normalize(key: Key) -> Key {
  match key {
    Key::Char(c) => Key::Char(c.to_ascii_lowercase()),
    other => other,
  }
}

impl fmt::Display for KeyBinding {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.ctrl {
      f.write_str("ctrl+")?;
    }
    if self.meta {
      f.write_str("cmd+")?;
    }
    if self.alt {
      f.write_str("alt+")?;
    }
    if self.shift {
      f.write_str("shift+")?;
    }
    match self.code {
      Key::Char(' ') => f.write_str("space"),
      Key::Char(c) => write!(f, "{c}"),
      Key::Enter => f.write_str("enter"),
      Key::Escape => f.write_str("escape"),
      Key::Backspace => f.write_str("backspace"),
      Key::Tab => f.write_str("tab"),
      Key::Delete => f.write_str("delete"),
      Key::Home => f.write_str("home"),
      Key::End => f.write_str("end"),
      Key::PageUp => f.write_str("page up"),
      Key::PageDown => f.write_str("page down"),
      Key::Left => f.write_str("arrow left"),
      Key::Right => f.write_str("arrow right"),
      Key::Up => f.write_str("arrow up"),
      Key::Down => f.write_str("arrow down"),
      Key::Other => f.write_str("other"),
    }
  }
}

impl FromStr for KeyBinding {
  type Err = ParseKeyBindingError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
      return Err(ParseKeyBindingError("empty key combo".into()));
    }
    // a trailing "+" is the plus key itself, as in "ctrl++"
    let (modifiers, key_token) = match trimmed.strip_suffix("++") {
      Some(rest) => (rest, "+"),
      None if trimmed == "+" => ("", "+"),
      None => trimmed.rsplit_once('+').unwrap_or(("", trimmed)),
    };

    let mut binding = KeyBinding::new(parse_key_token(key_token.trim())?);
    for token in modifiers.split('+').map(str::trim).filter(|t| !t.is_empty()) {
      let flag = match token.to_ascii_lowercase().as_str() {
        "shift" => &mut binding.shift,
        "ctrl" | "control" => &mut binding.ctrl,
        "alt" | "option" => &mut binding.alt,
        "cmd" | "meta" | "command" | "super" => &mut binding.meta,
        invalid => {
          return Err(ParseKeyBindingError(format!(
            "invalid key modifier '{invalid}+'"
          )));
        },
      };
      if *flag {
        return Err(ParseKeyBindingError(format!(
          "repeated key modifier '{token}+'"
        )));
      }
      *flag = true;
    }
    Ok(binding)
  }
}

fn parse_key_token(token: &str) -> Result<Key, ParseKeyBindingError> {
  let mut chars = token.chars();
  if let (Some(c), None) = (chars.next(), chars.next()) {
    return Ok(Key::Char(c));
  }

  match token.to_ascii_lowercase().as_str() {
    "space" => Ok(Key::Char(' ')),
    "minus" => Ok(Key::Char('-')),
    "plus" => Ok(Key::Char('+')),
    "comma" => Ok(Key::Char(',')),
    "slash" => Ok(Key::Char('/')),
    "backquote" | "backtick" => Ok(Key::Char('`')),
    "enter" | "return" => Ok(Key::Enter),
    "esc" | "escape" => Ok(Key::Escape),
    "backspace" => Ok(Key::Backspace),
    "tab" => Ok(Key::Tab),
    "delete" | "del" => Ok(Key::Delete),
    "home" => Ok(Key::Home),
    "end" => Ok(Key::End),
    "page up" | "pageup" => Ok(Key::PageUp),
    "page down" | "pagedown" => Ok(Key::PageDown),
    "arrow left" | "left" => Ok(Key::Left),
    "arrow right" | "right" => Ok(Key::Right),
    "arrow up" | "up" => Ok(Key::Up),
    "arrow down" | "down" => Ok(Key::Down),
    invalid => Err(ParseKeyBindingError(format!("unknown key '{invalid}'"))),
  }
}

/// One or more alternative bindings for the same command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombos(SmallVec<[KeyBinding; 2]>);

impl KeyCombos {
  pub fn bindings(&self) -> &[KeyBinding] {
    &self.0
  }

  pub fn matches(&self, event: &KeyEvent) -> bool {
    self.0.iter().any(|binding| binding.matches(event))
  }
}

impl FromStr for KeyCombos {
  type Err = ParseKeyBindingError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    // "ctrl+," keeps its comma: split only on commas followed by a combo
    let mut combos = SmallVec::new();
    let mut start = 0;
    for (index, _) in s.match_indices(',') {
      if index == start || s[start..index].ends_with('+') {
        continue;
      }
      combos.push(s[start..index].parse()?);
      start = index + 1;
    }
    combos.push(s[start..].parse()?);
    Ok(Self(combos))
  }
}

impl fmt::Display for KeyCombos {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (index, binding) in self.0.iter().enumerate() {
      if index > 0 {
        f.write_str(",")?;
      }
      write!(f, "{binding}")?;
    }
    Ok(())
  }
}

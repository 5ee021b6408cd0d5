//! Character classes used by the inline shortcuts.

/// Whitespace as far as inline markup is concerned.
///
/// On top of Unicode whitespace this counts the zero width characters that
/// platform text input and pasted content leave behind, so a run made only of
/// them never gets wrapped in formatting.
#[inline]
pub fn char_is_blank(ch: char) -> bool {
  ch.is_whitespace() || matches!(ch, '\u{180E}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}')
}

#[inline]
pub fn char_is_line_ending(ch: char) -> bool {
  matches!(ch, '\n' | '\r' | '\u{000B}' | '\u{000C}' | '\u{0085}' | '\u{2028}' | '\u{2029}')
}

/// True when `text` is empty or made only of blank characters.
#[inline]
pub fn str_is_blank(text: &str) -> bool {
  text.chars().all(char_is_blank)
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn zero_width_counts_as_blank() {
    for ch in ['\u{200B}', '\u{FEFF}', '\u{3000}', '\t', ' '] {
      assert!(char_is_blank(ch), "{ch:?} should be blank");
    }
    assert!(!char_is_blank('a'));
    assert!(!char_is_blank('_'));
  }

  #[test]
  fn line_endings_are_blank_too() {
    for ch in "\n\r\u{2028}".chars() {
      assert!(char_is_line_ending(ch));
      assert!(char_is_blank(ch));
    }
  }

  #[test]
  fn blank_runs() {
    assert!(str_is_blank(""));
    assert!(str_is_blank(" \t\u{3000}\u{200B}"));
    assert!(!str_is_blank(" a "));
  }
}

//! Rune-safe indexing over `str`.
//!
//! Every offset in the document engine is a *char index* (a count of Unicode
//! scalar values). Cursor movement must additionally never land inside an
//! extended grapheme cluster (`"e\u{301}"`, flag sequences, ZWJ emoji), so the
//! boundary helpers below walk clusters with [`GraphemeCursor`] and report
//! the result back as char indices.

use unicode_segmentation::{
  GraphemeCursor,
  GraphemeIncomplete,
  UnicodeSegmentation,
};

/// Number of chars in `text`.
#[inline]
pub fn char_len(text: &str) -> usize {
  text.chars().count()
}

/// Converts a char index into a byte index, clamping to the end of `text`.
#[must_use]
pub fn char_to_byte(text: &str, char_idx: usize) -> usize {
  text
    .char_indices()
    .nth(char_idx)
    .map_or(text.len(), |(byte, _)| byte)
}

/// Converts a byte index into a char index. `byte_idx` must sit on a char
/// boundary.
#[must_use]
pub fn byte_to_char(text: &str, byte_idx: usize) -> usize {
  debug_assert!(text.is_char_boundary(byte_idx.min(text.len())));
  text[..byte_idx.min(text.len())].chars().count()
}

/// Borrow the chars `start..end` of `text`. Out of range bounds are clamped.
#[must_use]
pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
  let start_byte = char_to_byte(text, start);
  let end_byte = char_to_byte(text, end.max(start));
  &text[start_byte..end_byte]
}

#[must_use]
pub fn nth_prev_grapheme_boundary(text: &str, char_idx: usize, n: usize) -> usize {
  let mut byte_idx = char_to_byte(text, char_idx);
  let mut gc = GraphemeCursor::new(byte_idx, text.len(), true);

  for _ in 0..n {
    loop {
      match gc.prev_boundary(text, 0) {
        Ok(None) => return 0,
        Ok(Some(n)) => {
          byte_idx = n;
          break;
        },
        Err(GraphemeIncomplete::PreContext(n)) => {
          gc.provide_context(&text[..n], 0);
        },
        // The whole text is a single chunk, nothing else can be requested.
        Err(_) => return byte_to_char(text, byte_idx),
      }
    }
  }
  byte_to_char(text, byte_idx)
}

#[must_use]
pub fn nth_next_grapheme_boundary(text: &str, char_idx: usize, n: usize) -> usize {
  let mut byte_idx = char_to_byte(text, char_idx);
  let mut gc = GraphemeCursor::new(byte_idx, text.len(), true);

  for _ in 0..n {
    loop {
      match gc.next_boundary(text, 0) {
        Ok(None) => return char_len(text),
        Ok(Some(n)) => {
          byte_idx = n;
          break;
        },
        Err(GraphemeIncomplete::PreContext(n)) => {
          gc.provide_context(&text[..n], 0);
        },
        Err(_) => return byte_to_char(text, byte_idx),
      }
    }
  }

  byte_to_char(text, byte_idx)
}

/// Finds the next grapheme boundary after the given char position.
#[must_use]
#[inline(always)]
pub fn next_grapheme_boundary(text: &str, char_idx: usize) -> usize {
  nth_next_grapheme_boundary(text, char_idx, 1)
}

/// Finds the previous grapheme boundary before the given char position.
#[must_use]
#[inline(always)]
pub fn prev_grapheme_boundary(text: &str, char_idx: usize) -> usize {
  nth_prev_grapheme_boundary(text, char_idx, 1)
}

/// Returns the passed char index if it's already a grapheme boundary,
/// or the next grapheme boundary char index if not.
#[must_use]
#[inline]
pub fn ensure_grapheme_boundary_next(text: &str, char_idx: usize) -> usize {
  let len = char_len(text);
  let char_idx = char_idx.min(len);

  if char_idx == 0 {
    char_idx
  } else {
    next_grapheme_boundary(text, char_idx - 1)
  }
}

/// Returns the passed char index if it's already a grapheme boundary,
/// or the prev grapheme boundary char index if not.
#[must_use]
#[inline]
pub fn ensure_grapheme_boundary_prev(text: &str, char_idx: usize) -> usize {
  let len = char_len(text);
  let char_idx = char_idx.min(len);

  if char_idx == len {
    char_idx
  } else {
    prev_grapheme_boundary(text, char_idx + 1)
  }
}

/// Whether `char_idx` falls on a cluster boundary of `text`.
#[must_use]
pub fn is_grapheme_boundary(text: &str, char_idx: usize) -> bool {
  let byte_idx = char_to_byte(text, char_idx);
  let mut gc = GraphemeCursor::new(byte_idx, text.len(), true);
  loop {
    match gc.is_boundary(text, 0) {
      Ok(is_boundary) => return is_boundary,
      Err(GraphemeIncomplete::PreContext(n)) => gc.provide_context(&text[..n], 0),
      Err(_) => return true,
    }
  }
}

/// Number of grapheme clusters in `text`.
#[must_use]
pub fn grapheme_count(text: &str) -> usize {
  text.graphemes(true).count()
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn boundaries_skip_combining_marks() {
    // "e" + combining acute accent is one cluster made of two chars.
    let text = "ae\u{301}b";
    assert_eq!(next_grapheme_boundary(text, 0), 1);
    assert_eq!(next_grapheme_boundary(text, 1), 3);
    assert_eq!(prev_grapheme_boundary(text, 3), 1);
    assert_eq!(prev_grapheme_boundary(text, 4), 3);
    assert!(!is_grapheme_boundary(text, 2));
    assert_eq!(ensure_grapheme_boundary_prev(text, 2), 1);
    assert_eq!(ensure_grapheme_boundary_next(text, 2), 3);
  }

  #[test]
  fn boundaries_on_zwj_sequence() {
    // family emoji: 5 chars, 1 cluster
    let text = "x👨\u{200d}👩\u{200d}👧y";
    assert_eq!(next_grapheme_boundary(text, 1), 6);
    assert_eq!(prev_grapheme_boundary(text, 6), 1);
    assert_eq!(grapheme_count(text), 3);
  }

  #[test]
  fn boundaries_clamp_at_edges() {
    assert_eq!(prev_grapheme_boundary("abc", 0), 0);
    assert_eq!(next_grapheme_boundary("abc", 3), 3);
    assert_eq!(nth_next_grapheme_boundary("abc", 0, 10), 3);
    assert_eq!(nth_prev_grapheme_boundary("abc", 3, 10), 0);
    assert_eq!(next_grapheme_boundary("", 0), 0);
  }

  #[test]
  fn char_slicing() {
    let text = "héllo 世界";
    assert_eq!(char_slice(text, 1, 4), "éll");
    assert_eq!(char_slice(text, 6, 100), "世界");
    assert_eq!(char_to_byte(text, 7), "héllo 世".len());
    assert_eq!(byte_to_char(text, "héllo 世".len()), 7);
  }

  quickcheck::quickcheck! {
    fn prev_then_next_never_splits(text: String, idx: usize) -> bool {
      let len = char_len(&text);
      let idx = if len == 0 { 0 } else { idx % (len + 1) };
      let prev = prev_grapheme_boundary(&text, idx);
      let next = next_grapheme_boundary(&text, idx);
      is_grapheme_boundary(&text, prev) && is_grapheme_boundary(&text, next) && prev <= idx && idx <= next
    }
  }
}

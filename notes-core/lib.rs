pub mod chars;
pub mod grapheme;

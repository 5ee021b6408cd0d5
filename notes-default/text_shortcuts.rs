//! Character shortcuts that rewrite the text around the caret: glyph
//! replacements, markdown links, markdown block prefixes and the slash
//! command trigger.

use notes_core::grapheme::byte_to_char;
use notes_lib::{
  attributes::{
    Attributes,
    attributes,
  },
  editor::{
    ApplyOptions,
    Editor,
  },
  node::{
    BULLETED_LIST,
    CODE,
    HEADING,
    NUMBERED_LIST,
    PARAGRAPH,
    QUOTE,
    TODO_LIST,
  },
  path::Path,
  selection::Selection,
  transaction::Result,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use tracing::debug;

use crate::{
  CharacterOutcome,
  character_shortcut::{
    after_trigger,
    caret,
    inherited_attributes,
    insert_character,
    insert_trigger,
    settle,
  },
};

static MARKDOWN_LINK: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"\[([^\]]+)\]\(([^)]+)\)$").expect("markdown link regex should compile")
});

pub fn replace_arrow(editor: &mut Editor, ch: char) -> CharacterOutcome {
  settle("replace -> with arrow", replace_pair(editor, ch, '-', "→"))
}

pub fn replace_double_arrow(editor: &mut Editor, ch: char) -> CharacterOutcome {
  settle("replace => with arrow", replace_pair(editor, ch, '=', "⇒"))
}

pub fn replace_em_dash(editor: &mut Editor, ch: char) -> CharacterOutcome {
  settle("replace -- with em dash", replace_pair(editor, ch, '-', "—"))
}

/// Replace `first` immediately before the caret plus the typed `ch` with
/// `glyph`.
fn replace_pair(editor: &mut Editor, ch: char, first: char, glyph: &str) -> Result<CharacterOutcome> {
  let Some((path, offset, delta)) = caret(editor) else {
    return Ok(CharacterOutcome::Ignored);
  };
  if offset == 0 || !delta.text_between(offset - 1, offset).starts_with(first) {
    return Ok(CharacterOutcome::Ignored);
  }
  let inherited = inherited_attributes(&delta, offset);

  insert_trigger(editor, &path, offset, ch)?;
  Ok(after_trigger(
    "replace character pair",
    replace_glyph(editor, path, offset - 1, glyph, inherited),
  ))
}

/// Swap the two chars at `start` for `glyph`.
fn replace_glyph(
  editor: &mut Editor,
  path: Path,
  start: usize,
  glyph: &str,
  inherited: Option<Attributes>,
) -> Result<()> {
  let mut tx = editor.transaction();
  tx.replace_text(&path, start, 2, glyph, inherited)?;
  tx.after_selection = Some(Selection::single(path, start + glyph.chars().count(), None));
  editor.apply(tx, ApplyOptions::default())
}

/// Turn a trailing `[text](url)` into `text` linked to `url`.
pub fn markdown_link(editor: &mut Editor, ch: char) -> CharacterOutcome {
  settle("format markdown link", try_markdown_link(editor, ch))
}

fn try_markdown_link(editor: &mut Editor, ch: char) -> Result<CharacterOutcome> {
  let Some((path, offset, delta)) = caret(editor) else {
    return Ok(CharacterOutcome::Ignored);
  };
  let mut typed = delta.text_between(0, offset);
  typed.push(ch);
  let Some(captures) = MARKDOWN_LINK.captures(&typed) else {
    return Ok(CharacterOutcome::Ignored);
  };
  let (Some(whole), Some(text), Some(url)) = (captures.get(0), captures.get(1), captures.get(2))
  else {
    return Ok(CharacterOutcome::Ignored);
  };
  let start = byte_to_char(&typed, whole.start());
  let text = text.as_str();
  let mut link = inherited_attributes(&delta, start + 1).unwrap_or_default();
  link.insert("href".into(), json!(url.as_str()));

  insert_trigger(editor, &path, offset, ch)?;
  Ok(after_trigger(
    "format markdown link",
    link_text(editor, path, start, offset + 1 - start, text, link),
  ))
}

fn link_text(
  editor: &mut Editor,
  path: Path,
  start: usize,
  len: usize,
  text: &str,
  link: Attributes,
) -> Result<()> {
  let mut tx = editor.transaction();
  tx.replace_text(&path, start, len, text, Some(link))?;
  tx.after_selection = Some(Selection::single(path, start + text.chars().count(), None));
  editor.apply(tx, ApplyOptions::default())
}

/// Block kind and attributes a markdown line prefix stands for.
pub fn block_for_prefix(prefix: &str) -> Option<(&'static str, Attributes)> {
  let none = Attributes::new;
  let block = match prefix {
    "-" | "*" => (BULLETED_LIST, none()),
    ">" => (QUOTE, none()),
    "```" => (CODE, none()),
    "[]" | "[ ]" => (TODO_LIST, attributes([("checked", false)])),
    "[x]" | "[X]" => (TODO_LIST, attributes([("checked", true)])),
    _ if (1..=6).contains(&prefix.len()) && prefix.bytes().all(|b| b == b'#') => {
      (HEADING, attributes([("level", prefix.len())]))
    },
    _ => {
      let number = prefix.strip_suffix('.')?.parse::<u64>().ok()?;
      (NUMBERED_LIST, attributes([("number", number)]))
    },
  };
  Some(block)
}

/// Convert a paragraph whose whole text before the caret is a markdown
/// block prefix, once the space after it is typed.
pub fn block_syntax(editor: &mut Editor, ch: char) -> CharacterOutcome {
  settle("markdown block syntax", try_block_syntax(editor, ch))
}

fn try_block_syntax(editor: &mut Editor, ch: char) -> Result<CharacterOutcome> {
  let Some((path, offset, delta)) = caret(editor) else {
    return Ok(CharacterOutcome::Ignored);
  };
  let is_paragraph = editor
    .document()
    .get_node_at_path(&path)
    .is_some_and(|node| node.is_kind(PARAGRAPH));
  if !is_paragraph || offset == 0 {
    return Ok(CharacterOutcome::Ignored);
  }
  let Some((kind, block_attributes)) = block_for_prefix(&delta.text_between(0, offset)) else {
    return Ok(CharacterOutcome::Ignored);
  };

  insert_trigger(editor, &path, offset, ch)?;
  Ok(after_trigger(
    "markdown block syntax",
    convert_block(editor, path, offset + 1, kind, block_attributes),
  ))
}

/// Drop the first `prefix_len` chars of the paragraph at `path` and turn it
/// into `kind`.
fn convert_block(
  editor: &mut Editor,
  path: Path,
  prefix_len: usize,
  kind: &str,
  block_attributes: Attributes,
) -> Result<()> {
  let mut tx = editor.transaction();
  tx.delete_text(&path, 0, prefix_len)?;
  tx.turn_into(&path, kind, false)?;
  if !block_attributes.is_empty() {
    tx.update_attributes(&path, block_attributes)?;
  }
  tx.after_selection = Some(Selection::single(path.clone(), 0, None));
  editor.apply(tx, ApplyOptions::default())?;
  debug!(kind, path = ?path, "converted block from markdown prefix");
  Ok(())
}

/// Type the `/` and ask the caller to open the slash menu.
pub fn slash_command(editor: &mut Editor, ch: char) -> CharacterOutcome {
  if caret(editor).is_none() {
    return CharacterOutcome::Ignored;
  }
  let mut buf = [0; 4];
  match insert_character(editor, ch.encode_utf8(&mut buf)) {
    Ok(true) => CharacterOutcome::OpenMenu,
    Ok(false) => CharacterOutcome::Ignored,
    Err(err) => settle("open slash menu", Err(err)),
  }
}

/// Path of the node a slash menu opened by the caret would act on.
pub fn slash_target(editor: &Editor) -> Option<(Path, usize)> {
  caret(editor).map(|(path, offset, _)| (path, offset))
}

#[cfg(test)]
mod test {
  use notes_lib::{
    delta::Delta,
    document::Document,
    node::Node,
  };

  use super::*;

  fn typed(text: &str) -> Editor {
    let mut editor = Editor::new(Document::from_blocks([Node::paragraph(text)]));
    editor.update_selection(Some(Selection::single([0], text.chars().count(), None)));
    editor
  }

  fn first(editor: &Editor) -> &Node {
    &editor.document().root().children()[0]
  }

  #[test]
  fn glyph_replacements() {
    let mut editor = typed("a -");
    assert_eq!(replace_arrow(&mut editor, '>'), CharacterOutcome::Handled);
    assert_eq!(first(&editor).text(), "a →");
    assert_eq!(editor.selection(), Some(&Selection::single([0], 3, None)));

    let mut editor = typed("x =");
    assert_eq!(replace_arrow(&mut editor, '>'), CharacterOutcome::Ignored);
    assert_eq!(replace_double_arrow(&mut editor, '>'), CharacterOutcome::Handled);
    assert_eq!(first(&editor).text(), "x ⇒");
  }

  #[test]
  fn em_dash_undoes_to_the_typed_dashes() {
    let mut editor = typed("wait-");
    assert_eq!(replace_em_dash(&mut editor, '-'), CharacterOutcome::Handled);
    assert_eq!(first(&editor).text(), "wait—");
    editor.undo().unwrap();
    assert_eq!(first(&editor).text(), "wait--");
  }

  #[test]
  fn markdown_link_becomes_href() {
    let mut editor = typed("see [docs](https://example.com");
    assert_eq!(markdown_link(&mut editor, ')'), CharacterOutcome::Handled);
    let delta = first(&editor).delta().cloned().unwrap();
    assert_eq!(
      delta,
      Delta::new()
        .insert("see ", None)
        .insert("docs", Some(attributes([("href", "https://example.com")])))
    );
    assert_eq!(editor.selection(), Some(&Selection::single([0], 8, None)));

    let mut editor = typed("no link(here");
    assert_eq!(markdown_link(&mut editor, ')'), CharacterOutcome::Ignored);
  }

  #[test]
  fn prefixes_map_to_blocks() {
    assert_eq!(block_for_prefix("###").unwrap().0, HEADING);
    assert_eq!(block_for_prefix("###").unwrap().1, attributes([("level", 3)]));
    assert_eq!(block_for_prefix("#######"), None);
    assert_eq!(block_for_prefix("12.").unwrap().1, attributes([("number", 12)]));
    assert_eq!(block_for_prefix("[x]").unwrap().1, attributes([("checked", true)]));
    assert_eq!(block_for_prefix("-").unwrap().0, BULLETED_LIST);
    assert_eq!(block_for_prefix("a."), None);
    assert_eq!(block_for_prefix("hello"), None);
  }

  #[test]
  fn heading_from_hashes() {
    let mut editor = typed("##");
    assert_eq!(block_syntax(&mut editor, ' '), CharacterOutcome::Handled);
    let node = first(&editor);
    assert!(node.is_kind(HEADING));
    assert_eq!(node.attributes(), &attributes([("level", 2)]));
    assert_eq!(node.text(), "");
    assert_eq!(editor.selection(), Some(&Selection::single([0], 0, None)));
  }

  #[test]
  fn block_syntax_only_converts_paragraphs() {
    let mut editor = Editor::new(Document::from_blocks([
      Node::new(QUOTE).with_delta(Delta::from_text("-"))
    ]));
    editor.update_selection(Some(Selection::single([0], 1, None)));
    assert_eq!(block_syntax(&mut editor, ' '), CharacterOutcome::Ignored);
    assert!(first(&editor).is_kind(QUOTE));
  }

  #[test]
  fn slash_inserts_and_asks_for_the_menu() {
    let mut editor = typed("a");
    assert_eq!(slash_command(&mut editor, '/'), CharacterOutcome::OpenMenu);
    assert_eq!(first(&editor).text(), "a/");
    assert_eq!(slash_target(&editor), Some((Path::from([0]), 2)));
  }
}

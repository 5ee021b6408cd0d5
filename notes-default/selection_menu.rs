//! Slash command menu.
//!
//! Typing `/` in a text block opens a [`SelectionMenuSession`] anchored at
//! the caret. The text typed after the slash is the session keyword, and it
//! filters the static item list. While open, the session owns the arrow keys,
//! Enter and Escape through a [`KeyInterceptors`] registration and keeps
//! editor focus retained. Closing (or dropping) the session releases both.

use std::{
  cell::RefCell,
  fmt,
  rc::Rc,
  time::Duration,
};

use notes_lib::{
  attributes::attributes,
  config::SlashMenuConfig,
  document::Document,
  editor::{
    ApplyOptions,
    Editor,
  },
  focus::{
    FocusGuard,
    FocusRetention,
  },
  node::{
    BULLETED_LIST,
    CODE,
    DIVIDER,
    HEADING,
    NUMBERED_LIST,
    Node,
    PARAGRAPH,
    QUOTE,
    TODO_LIST,
  },
  path::Path,
  render::Rect,
  selection::Selection,
  transaction::{
    self,
    Transaction,
  },
};
use tracing::{
  debug,
  trace,
  warn,
};

use crate::{
  CommandOutcome,
  Key,
  KeyEvent,
  command_shortcut::{
    CommandContext,
    InterceptorId,
    KeyInterceptors,
  },
  text_shortcuts::slash_target,
};

/// Rewrites the block at the given path once the slash command is removed.
pub type MenuItemHandler = fn(&mut Transaction, &Path) -> transaction::Result<()>;

#[derive(Clone, Copy)]
pub struct SelectionMenuItem {
  pub name:     &'static str,
  /// Lowercase search terms.
  pub keywords: &'static [&'static str],
  pub handler:  MenuItemHandler,
}

impl fmt::Debug for SelectionMenuItem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SelectionMenuItem")
      .field("name", &self.name)
      .field("keywords", &self.keywords)
      .finish_non_exhaustive()
  }
}

impl SelectionMenuItem {
  pub fn matches(&self, keyword: &str) -> bool {
    let keyword = keyword.to_lowercase();
    self
      .keywords
      .iter()
      .any(|candidate| candidate.contains(keyword.as_str()))
  }
}

fn turn_into_paragraph(tx: &mut Transaction, path: &Path) -> transaction::Result<()> {
  tx.turn_into(path, PARAGRAPH, false)
}

fn heading(tx: &mut Transaction, path: &Path, level: u8) -> transaction::Result<()> {
  tx.turn_into(path, HEADING, false)?;
  tx.update_attributes(path, attributes([("level", level)]))
}

fn turn_into_heading_1(tx: &mut Transaction, path: &Path) -> transaction::Result<()> {
  heading(tx, path, 1)
}

fn turn_into_heading_2(tx: &mut Transaction, path: &Path) -> transaction::Result<()> {
  heading(tx, path, 2)
}

fn turn_into_heading_3(tx: &mut Transaction, path: &Path) -> transaction::Result<()> {
  heading(tx, path, 3)
}

fn turn_into_bulleted_list(tx: &mut Transaction, path: &Path) -> transaction::Result<()> {
  tx.turn_into(path, BULLETED_LIST, false)
}

fn turn_into_numbered_list(tx: &mut Transaction, path: &Path) -> transaction::Result<()> {
  tx.turn_into(path, NUMBERED_LIST, false)?;
  tx.update_attributes(path, attributes([("number", 1)]))
}

fn turn_into_todo_list(tx: &mut Transaction, path: &Path) -> transaction::Result<()> {
  tx.turn_into(path, TODO_LIST, false)?;
  tx.update_attributes(path, attributes([("checked", false)]))
}

fn turn_into_quote(tx: &mut Transaction, path: &Path) -> transaction::Result<()> {
  tx.turn_into(path, QUOTE, false)
}

fn turn_into_code(tx: &mut Transaction, path: &Path) -> transaction::Result<()> {
  tx.turn_into(path, CODE, false)
}

fn insert_divider(tx: &mut Transaction, path: &Path) -> transaction::Result<()> {
  tx.insert_node(&path.next(), Node::new(DIVIDER))
}

pub fn standard_selection_menu_items() -> Vec<SelectionMenuItem> {
  const ITEMS: &[SelectionMenuItem] = &[
    SelectionMenuItem {
      name:     "Text",
      keywords: &["text", "paragraph"],
      handler:  turn_into_paragraph,
    },
    SelectionMenuItem {
      name:     "Heading 1",
      keywords: &["heading 1", "h1", "title"],
      handler:  turn_into_heading_1,
    },
    SelectionMenuItem {
      name:     "Heading 2",
      keywords: &["heading 2", "h2", "subtitle"],
      handler:  turn_into_heading_2,
    },
    SelectionMenuItem {
      name:     "Heading 3",
      keywords: &["heading 3", "h3"],
      handler:  turn_into_heading_3,
    },
    SelectionMenuItem {
      name:     "Bulleted list",
      keywords: &["bulleted list", "list", "unordered"],
      handler:  turn_into_bulleted_list,
    },
    SelectionMenuItem {
      name:     "Numbered list",
      keywords: &["numbered list", "list", "ordered"],
      handler:  turn_into_numbered_list,
    },
    SelectionMenuItem {
      name:     "To-do list",
      keywords: &["to-do", "todo", "checkbox"],
      handler:  turn_into_todo_list,
    },
    SelectionMenuItem {
      name:     "Quote",
      keywords: &["quote", "blockquote"],
      handler:  turn_into_quote,
    },
    SelectionMenuItem {
      name:     "Code block",
      keywords: &["code", "codeblock"],
      handler:  turn_into_code,
    },
    SelectionMenuItem {
      name:     "Divider",
      keywords: &["divider", "separator", "line"],
      handler:  insert_divider,
    },
  ];
  ITEMS.to_vec()
}

/// Where the menu should be drawn for the block at a path, once the block
/// has been laid out.
pub trait MenuAnchorSource {
  fn anchor(&self, path: &Path) -> Option<Rect>;
}

impl<F> MenuAnchorSource for F
where
  F: Fn(&Path) -> Option<Rect>,
{
  fn anchor(&self, path: &Path) -> Option<Rect> {
    self(path)
  }
}

/// Opens slash menu sessions.
#[derive(Debug, Clone)]
pub struct SelectionMenuService {
  items:     Rc<[SelectionMenuItem]>,
  /// Block kinds the menu may open in. Any kind when `None`.
  permitted: Option<Vec<String>>,
  config:    SlashMenuConfig,
  focus:     FocusRetention,
}

impl SelectionMenuService {
  pub fn new(config: SlashMenuConfig, focus: FocusRetention) -> Self {
    Self {
      items: standard_selection_menu_items().into(),
      permitted: None,
      config,
      focus,
    }
  }

  #[must_use]
  pub fn with_items(mut self, items: Vec<SelectionMenuItem>) -> Self {
    self.items = items.into();
    self
  }

  #[must_use]
  pub fn with_permitted_types<S: Into<String>>(
    mut self,
    kinds: impl IntoIterator<Item = S>,
  ) -> Self {
    self.permitted = Some(kinds.into_iter().map(Into::into).collect());
    self
  }

  pub fn items(&self) -> &[SelectionMenuItem] {
    &self.items
  }

  /// Whether the block at `path` and every block it is nested in are of a
  /// permitted kind.
  pub fn is_permitted(&self, document: &Document, path: &Path) -> bool {
    let Some(permitted) = &self.permitted else {
      return document.contains(path);
    };
    let mut cursor = Some(path.clone());
    while let Some(current) = cursor.filter(|path| !path.is_empty()) {
      let Some(node) = document.get_node_at_path(&current) else {
        return false;
      };
      if !permitted.iter().any(|kind| node.is_kind(kind)) {
        trace!(kind = node.kind(), path = ?current, "slash menu not permitted");
        return false;
      }
      cursor = current.parent();
    }
    true
  }

  /// Poll `source` for the menu anchor, a bounded number of times.
  pub async fn resolve_anchor(&self, source: &dyn MenuAnchorSource, path: &Path) -> Option<Rect> {
    let interval = Duration::from_millis(self.config.context_interval_ms);
    for attempt in 0..self.config.context_attempts {
      if let Some(anchor) = source.anchor(path) {
        debug!(attempt, "resolved slash menu anchor");
        return Some(anchor);
      }
      tokio::time::sleep(interval).await;
    }
    warn!(
      attempts = self.config.context_attempts,
      path = ?path,
      "slash menu anchor never resolved, menu disabled"
    );
    None
  }

  /// Open a session for the `/` right before the caret. `None` when there is
  /// no such slash, the block is not permitted, or the anchor never resolves.
  pub async fn open(
    &self,
    editor: &Editor,
    interceptors: &KeyInterceptors,
    anchors: &dyn MenuAnchorSource,
  ) -> Option<SelectionMenuSession> {
    let (path, caret) = slash_target(editor)?;
    let slash_offset = caret.checked_sub(1)?;
    let typed_slash = editor
      .document()
      .delta_at(&path)
      .is_some_and(|delta| delta.text_between(slash_offset, caret) == "/");
    if !typed_slash || !self.is_permitted(editor.document(), &path) {
      return None;
    }
    let anchor = self.resolve_anchor(anchors, &path).await?;

    let mut state = MenuState {
      path,
      slash_offset,
      anchor,
      keyword: String::new(),
      selected: 0,
      items: self.items.clone(),
      filtered: Vec::new(),
      last_matched_len: 0,
      open: true,
      focus: Some(self.focus.acquire()),
      registration: None,
    };
    state.refilter();
    let state = Rc::new(RefCell::new(state));

    let handle = state.clone();
    let id = interceptors.register(move |ctx, event| intercept(&handle, ctx, event));
    state.borrow_mut().registration = Some((interceptors.clone(), id));
    debug!(path = ?state.borrow().path, "opened slash menu");
    Some(SelectionMenuSession { state })
  }
}

struct MenuState {
  path:             Path,
  /// Char offset of the `/`.
  slash_offset:     usize,
  anchor:           Rect,
  keyword:          String,
  selected:         usize,
  items:            Rc<[SelectionMenuItem]>,
  /// Indices into `items`.
  filtered:         Vec<usize>,
  /// Length of the longest keyword that still had results.
  last_matched_len: usize,
  open:             bool,
  focus:            Option<FocusGuard>,
  registration:     Option<(KeyInterceptors, InterceptorId)>,
}

impl MenuState {
  fn refilter(&mut self) {
    self.filtered = self
      .items
      .iter()
      .enumerate()
      .filter(|(_, item)| item.matches(&self.keyword))
      .map(|(index, _)| index)
      .collect();
    self.selected = 0;
    if !self.filtered.is_empty() {
      self.last_matched_len = self.last_matched_len.max(self.keyword.chars().count());
    }
  }

  fn should_close(&self) -> bool {
    self.filtered.is_empty() && self.keyword.chars().count() >= self.last_matched_len + 2
  }
}

fn close(state: &RefCell<MenuState>) {
  let registration = {
    let mut state = state.borrow_mut();
    if !state.open {
      return;
    }
    state.open = false;
    state.focus = None;
    state.registration.take()
  };
  if let Some((interceptors, id)) = registration {
    interceptors.unregister(id);
  }
  trace!("closed slash menu");
}

fn intercept(
  state: &Rc<RefCell<MenuState>>,
  ctx: &mut CommandContext<'_>,
  event: &KeyEvent,
) -> CommandOutcome {
  if !state.borrow().open || !event.modifiers.is_empty() {
    return CommandOutcome::Ignored;
  }
  match event.key {
    Key::Up | Key::Down => {
      let mut state = state.borrow_mut();
      let len = state.filtered.len();
      if len == 0 {
        return CommandOutcome::Ignored;
      }
      state.selected = if event.key == Key::Up {
        (state.selected + len - 1) % len
      } else {
        (state.selected + 1) % len
      };
      CommandOutcome::Handled
    },
    Key::Enter => {
      let outcome = execute(state, ctx.editor);
      close(state);
      outcome
    },
    Key::Escape => {
      close(state);
      CommandOutcome::Handled
    },
    _ => CommandOutcome::Ignored,
  }
}

/// Remove `/keyword` and run the selected item, as one undo step.
fn execute(state: &RefCell<MenuState>, editor: &mut Editor) -> CommandOutcome {
  let (path, slash_offset, len, item) = {
    let state = state.borrow();
    let Some(item) = state
      .filtered
      .get(state.selected)
      .map(|index| state.items[*index])
    else {
      return CommandOutcome::Ignored;
    };
    (
      state.path.clone(),
      state.slash_offset,
      1 + state.keyword.chars().count(),
      item,
    )
  };

  let mut tx = editor.transaction();
  let result = tx
    .delete_text(&path, slash_offset, len)
    .and_then(|()| (item.handler)(&mut tx, &path));
  if let Err(err) = result {
    warn!(item = item.name, %err, "slash menu item failed");
    return CommandOutcome::Ignored;
  }
  tx.after_selection = Some(Selection::single(path, slash_offset, None));
  match editor.apply(tx, ApplyOptions::default()) {
    Ok(()) => {
      debug!(item = item.name, "ran slash menu item");
      CommandOutcome::Handled
    },
    Err(err) => {
      warn!(item = item.name, %err, "slash menu item failed");
      CommandOutcome::Ignored
    },
  }
}

/// An open slash menu. Dropping it closes the menu.
pub struct SelectionMenuSession {
  state: Rc<RefCell<MenuState>>,
}

impl fmt::Debug for SelectionMenuSession {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.borrow();
    f.debug_struct("SelectionMenuSession")
      .field("path", &state.path)
      .field("keyword", &state.keyword)
      .field("open", &state.open)
      .finish_non_exhaustive()
  }
}

impl SelectionMenuSession {
  pub fn is_open(&self) -> bool {
    self.state.borrow().open
  }

  pub fn path(&self) -> Path {
    self.state.borrow().path.clone()
  }

  pub fn anchor(&self) -> Rect {
    self.state.borrow().anchor
  }

  pub fn keyword(&self) -> String {
    self.state.borrow().keyword.clone()
  }

  pub fn selected(&self) -> Option<SelectionMenuItem> {
    let state = self.state.borrow();
    state
      .filtered
      .get(state.selected)
      .map(|index| state.items[*index])
  }

  /// Names of the items matching the keyword, in menu order.
  pub fn visible_items(&self) -> Vec<&'static str> {
    let state = self.state.borrow();
    state
      .filtered
      .iter()
      .map(|index| state.items[*index].name)
      .collect()
  }

  /// Re-read the keyword from the text between the slash and the caret.
  /// Closes the menu when the slash is gone, the caret left the keyword, or
  /// the keyword ran too far past its last match.
  pub fn sync(&self, editor: &Editor) {
    if !self.is_open() {
      return;
    }
    let keyword = {
      let state = self.state.borrow();
      slash_target(editor).and_then(|(path, caret)| {
        let delta = editor.document().delta_at(&state.path)?;
        let in_keyword = path == state.path && caret > state.slash_offset;
        (in_keyword && delta.text_between(state.slash_offset, state.slash_offset + 1) == "/")
          .then(|| delta.text_between(state.slash_offset + 1, caret))
      })
    };
    let Some(keyword) = keyword else {
      close(&self.state);
      return;
    };

    let should_close = {
      let mut state = self.state.borrow_mut();
      if state.keyword != keyword {
        state.keyword = keyword;
        state.refilter();
      }
      state.should_close()
    };
    if should_close {
      debug!(keyword = self.keyword(), "no slash menu items left");
      close(&self.state);
    }
  }

  pub fn close(&self) {
    close(&self.state);
  }
}

impl Drop for SelectionMenuSession {
  fn drop(&mut self) {
    close(&self.state);
  }
}

#[cfg(test)]
mod test {
  use std::cell::Cell;

  use notes_lib::{
    config::SlashMenuConfig,
    delta::Delta,
    document::Document,
  };

  use super::*;
  use crate::character_shortcut::insert_character;

  const ANCHOR: Rect = Rect::new(0.0, 20.0, 200.0, 10.0);

  fn anchored(_: &Path) -> Option<Rect> {
    Some(ANCHOR)
  }

  fn slashed() -> Editor {
    let mut editor = Editor::new(Document::from_blocks([Node::paragraph("/")]));
    editor.update_selection(Some(Selection::single([0], 1, None)));
    editor
  }

  fn press(editor: &mut Editor, interceptors: &KeyInterceptors, key: Key) -> CommandOutcome {
    interceptors.intercept(&mut CommandContext::new(editor), &KeyEvent::plain(key))
  }

  fn service() -> (SelectionMenuService, FocusRetention) {
    let focus = FocusRetention::new();
    (
      SelectionMenuService::new(SlashMenuConfig::default(), focus.clone()),
      focus,
    )
  }

  #[test]
  fn items_match_on_keyword_substrings() {
    let items = standard_selection_menu_items();
    let names: Vec<_> = items
      .iter()
      .filter(|item| item.matches("HEAD"))
      .map(|item| item.name)
      .collect();
    assert_eq!(names, ["Heading 1", "Heading 2", "Heading 3"]);
    assert!(items.iter().all(|item| item.matches("")));
  }

  #[test]
  fn permission_is_checked_up_the_ancestors() {
    let document = Document::from_blocks([Node::new(QUOTE)
      .with_delta(Delta::from_text("q"))
      .with_children([Node::paragraph("nested")])]);
    let (service, _) = service();
    let service = service.with_permitted_types([PARAGRAPH]);
    assert!(!service.is_permitted(&document, &Path::from([0, 0])));
    let service = service.with_permitted_types([PARAGRAPH, QUOTE]);
    assert!(service.is_permitted(&document, &Path::from([0, 0])));
    assert!(!service.is_permitted(&document, &Path::from([3])));
  }

  #[tokio::test(start_paused = true)]
  async fn anchor_resolution_retries_then_gives_up() {
    let (service, _) = service();
    let calls = Cell::new(0);
    let late = |_: &Path| {
      calls.set(calls.get() + 1);
      (calls.get() >= 3).then_some(ANCHOR)
    };
    let start = tokio::time::Instant::now();
    assert_eq!(service.resolve_anchor(&late, &Path::from([0])).await, Some(ANCHOR));
    assert_eq!(calls.get(), 3);
    assert_eq!(start.elapsed(), Duration::from_millis(40));

    let never = |_: &Path| -> Option<Rect> { None };
    assert_eq!(service.resolve_anchor(&never, &Path::from([0])).await, None);
  }

  #[tokio::test(start_paused = true)]
  async fn unresolved_anchor_disables_the_menu() {
    let (service, focus) = service();
    let editor = slashed();
    let interceptors = KeyInterceptors::default();
    let never = |_: &Path| -> Option<Rect> { None };
    assert!(service.open(&editor, &interceptors, &never).await.is_none());
    assert!(interceptors.is_empty());
    assert!(!focus.is_retained());
  }

  #[tokio::test]
  async fn enter_runs_the_selected_item() {
    let (service, focus) = service();
    let mut editor = slashed();
    let interceptors = KeyInterceptors::default();
    let session = service.open(&editor, &interceptors, &anchored).await.unwrap();
    assert!(focus.is_retained());
    assert_eq!(interceptors.len(), 1);
    assert_eq!(session.anchor(), ANCHOR);

    insert_character(&mut editor, "head").unwrap();
    session.sync(&editor);
    assert_eq!(session.keyword(), "head");
    assert_eq!(session.visible_items(), ["Heading 1", "Heading 2", "Heading 3"]);

    assert_eq!(press(&mut editor, &interceptors, Key::Down), CommandOutcome::Handled);
    assert_eq!(session.selected().map(|item| item.name), Some("Heading 2"));
    assert_eq!(press(&mut editor, &interceptors, Key::Enter), CommandOutcome::Handled);

    let node = &editor.document().root().children()[0];
    assert!(node.is_kind(HEADING));
    assert_eq!(node.attributes(), &attributes([("level", 2)]));
    assert_eq!(node.text(), "");
    assert!(!session.is_open());
    assert!(interceptors.is_empty());
    assert!(!focus.is_retained());
  }

  #[tokio::test]
  async fn runaway_keyword_closes_the_menu() {
    let (service, focus) = service();
    let mut editor = slashed();
    let interceptors = KeyInterceptors::default();
    let session = service.open(&editor, &interceptors, &anchored).await.unwrap();

    insert_character(&mut editor, "co").unwrap();
    session.sync(&editor);
    assert_eq!(session.visible_items(), ["Code block"]);

    insert_character(&mut editor, "x").unwrap();
    session.sync(&editor);
    assert!(session.is_open());
    assert!(session.visible_items().is_empty());

    insert_character(&mut editor, "y").unwrap();
    session.sync(&editor);
    assert!(!session.is_open());
    assert!(!focus.is_retained());
    assert_eq!(editor.document().root().children()[0].text(), "/coxy");
  }

  #[tokio::test]
  async fn deleting_the_slash_or_escape_closes() {
    let (service, focus) = service();
    let mut editor = slashed();
    let interceptors = KeyInterceptors::default();

    let session = service.open(&editor, &interceptors, &anchored).await.unwrap();
    assert_eq!(press(&mut editor, &interceptors, Key::Escape), CommandOutcome::Handled);
    assert!(!session.is_open());
    assert_eq!(press(&mut editor, &interceptors, Key::Escape), CommandOutcome::Ignored);

    let session = service.open(&editor, &interceptors, &anchored).await.unwrap();
    assert_eq!(press(&mut editor, &interceptors, Key::Backspace), CommandOutcome::Ignored);
    crate::delete::backspace(&mut CommandContext::new(&mut editor));
    session.sync(&editor);
    assert!(!session.is_open());
    assert!(interceptors.is_empty());

    let session = service.open(&slashed(), &interceptors, &anchored).await.unwrap();
    drop(session);
    assert!(interceptors.is_empty());
    assert!(!focus.is_retained());
  }
}

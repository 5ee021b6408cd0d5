//! Key combo driven commands.
//!
//! A [`CommandShortcutEvent`] binds a handler to one or more key combos, with
//! an optional macOS-specific combo set. The [`CommandShortcutDispatcher`]
//! first offers a key to the registered [`KeyInterceptors`] (open menus and
//! popovers), then runs the matching handlers in registration order until
//! one reports [`CommandOutcome::Handled`].

use std::{
  cell::RefCell,
  fmt,
  rc::Rc,
};

use notes_lib::{
  editor::Editor,
  platform::Platform,
  render::SelectableLookup,
};
use tracing::{
  trace,
  warn,
};

use crate::{
  CommandOutcome,
  KeyEvent,
  commands,
  delete,
  keymap::{
    KeyCombos,
    ParseKeyBindingError,
  },
};

/// What a command handler gets to work with.
pub struct CommandContext<'a> {
  pub editor:      &'a mut Editor,
  /// Mounted block renderers, for commands that need geometry.
  pub selectables: Option<&'a dyn SelectableLookup>,
}

impl<'a> CommandContext<'a> {
  pub fn new(editor: &'a mut Editor) -> Self {
    Self {
      editor,
      selectables: None,
    }
  }

  #[must_use]
  pub fn with_selectables(mut self, selectables: &'a dyn SelectableLookup) -> Self {
    self.selectables = Some(selectables);
    self
  }
}

pub type CommandHandler = fn(&mut CommandContext<'_>) -> CommandOutcome;

#[derive(Clone)]
pub struct CommandShortcutEvent {
  pub key:         &'static str,
  pub command:     KeyCombos,
  pub mac_command: Option<KeyCombos>,
  pub handler:     CommandHandler,
}

impl fmt::Debug for CommandShortcutEvent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CommandShortcutEvent")
      .field("key", &self.key)
      .field("command", &self.command.to_string())
      .field(
        "mac_command",
        &self.mac_command.as_ref().map(ToString::to_string),
      )
      .finish_non_exhaustive()
  }
}

impl CommandShortcutEvent {
  pub fn new(
    key: &'static str,
    command: &str,
    mac_command: Option<&str>,
    handler: CommandHandler,
  ) -> Result<Self, ParseKeyBindingError> {
    Ok(Self {
      key,
      command: command.parse()?,
      mac_command: mac_command.map(str::parse).transpose()?,
      handler,
    })
  }

  /// The combos in effect on `platform`.
  pub fn combos(&self, platform: Platform) -> &KeyCombos {
    match &self.mac_command {
      Some(mac) if platform == Platform::MacOs => mac,
      _ => &self.command,
    }
  }

  pub fn matches(&self, event: &KeyEvent, platform: Platform) -> bool {
    self.combos(platform).matches(event)
  }

  /// Replace the combos. Leaves the event untouched when either fails to
  /// parse.
  pub fn rebind(
    &mut self,
    command: &str,
    mac_command: Option<&str>,
  ) -> Result<(), ParseKeyBindingError> {
    let command = command.parse()?;
    let mac_command = mac_command.map(str::parse).transpose()?;
    self.command = command;
    self.mac_command = mac_command;
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorId(usize);

type Interceptor = Box<dyn FnMut(&mut CommandContext<'_>, &KeyEvent) -> CommandOutcome>;

#[derive(Default)]
struct InterceptorTable {
  next_id: usize,
  // `None` while the interceptor is running
  entries: Vec<(InterceptorId, Option<Interceptor>)>,
}

/// Keyboard hooks that see every key before the command table does.
///
/// Cloning yields another handle to the same table, so transient UI can hold
/// on to it and unregister itself when it closes, even from inside its own
/// interceptor.
#[derive(Clone, Default)]
pub struct KeyInterceptors {
  table: Rc<RefCell<InterceptorTable>>,
}

impl fmt::Debug for KeyInterceptors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("KeyInterceptors")
      .field("len", &self.len())
      .finish()
  }
}

impl KeyInterceptors {
  pub fn register(
    &self,
    interceptor: impl FnMut(&mut CommandContext<'_>, &KeyEvent) -> CommandOutcome + 'static,
  ) -> InterceptorId {
    let mut table = self.table.borrow_mut();
    table.next_id += 1;
    let id = InterceptorId(table.next_id);
    table.entries.push((id, Some(Box::new(interceptor))));
    id
  }

  /// Returns whether `id` was registered.
  pub fn unregister(&self, id: InterceptorId) -> bool {
    let mut table = self.table.borrow_mut();
    let before = table.entries.len();
    table.entries.retain(|(entry, _)| *entry != id);
    before != table.entries.len()
  }

  pub fn len(&self) -> usize {
    self.table.borrow().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Offer `event` to the interceptors, most recently registered first.
  pub fn intercept(&self, ctx: &mut CommandContext<'_>, event: &KeyEvent) -> CommandOutcome {
    let ids: Vec<InterceptorId> = self
      .table
      .borrow()
      .entries
      .iter()
      .rev()
      .map(|(id, _)| *id)
      .collect();

    for id in ids {
      let taken = self
        .table
        .borrow_mut()
        .entries
        .iter_mut()
        .find(|(entry, _)| *entry == id)
        .and_then(|(_, interceptor)| interceptor.take());
      let Some(mut interceptor) = taken else {
        continue;
      };
      let outcome = interceptor(ctx, event);
      // put it back unless it unregistered itself meanwhile
      if let Some((_, slot)) = self
        .table
        .borrow_mut()
        .entries
        .iter_mut()
        .find(|(entry, _)| *entry == id)
      {
        *slot = Some(interceptor);
      }
      if outcome.is_handled() {
        return outcome;
      }
    }
    CommandOutcome::Ignored
  }
}

#[derive(Debug)]
pub struct CommandShortcutDispatcher {
  events:       Vec<CommandShortcutEvent>,
  platform:     Platform,
  interceptors: KeyInterceptors,
}

impl CommandShortcutDispatcher {
  pub fn new(platform: Platform) -> Self {
    Self {
      events: Vec::new(),
      platform,
      interceptors: KeyInterceptors::default(),
    }
  }

  /// A dispatcher carrying the built-in command table.
  pub fn with_standard_commands(platform: Platform) -> Self {
    let mut dispatcher = Self::new(platform);
    for event in standard_command_shortcuts() {
      dispatcher.register(event);
    }
    dispatcher
  }

  pub fn platform(&self) -> Platform {
    self.platform
  }

  pub fn events(&self) -> &[CommandShortcutEvent] {
    &self.events
  }

  pub fn interceptors(&self) -> &KeyInterceptors {
    &self.interceptors
  }

  pub fn register(&mut self, event: CommandShortcutEvent) {
    self.events.push(event);
  }

  /// Drop every event registered under `key`. Returns whether any was.
  pub fn unregister(&mut self, key: &str) -> bool {
    let before = self.events.len();
    self.events.retain(|event| event.key != key);
    before != self.events.len()
  }

  /// Rebind every event registered under `key`.
  pub fn rebind(
    &mut self,
    key: &str,
    command: &str,
    mac_command: Option<&str>,
  ) -> Result<bool, ParseKeyBindingError> {
    let mut found = false;
    for event in self.events.iter_mut().filter(|event| event.key == key) {
      event.rebind(command, mac_command)?;
      found = true;
    }
    Ok(found)
  }

  pub fn dispatch(&self, ctx: &mut CommandContext<'_>, event: &KeyEvent) -> CommandOutcome {
    if self.interceptors.intercept(ctx, event).is_handled() {
      trace!(?event, "key intercepted");
      return CommandOutcome::Handled;
    }
    for shortcut in self
      .events
      .iter()
      .filter(|shortcut| shortcut.matches(event, self.platform))
    {
      if (shortcut.handler)(ctx).is_handled() {
        trace!(command = shortcut.key, "command handled");
        return CommandOutcome::Handled;
      }
    }
    CommandOutcome::Ignored
  }
}

/// The built-in command table. Entries whose combos fail to parse are
/// logged and skipped.
pub fn standard_command_shortcuts() -> Vec<CommandShortcutEvent> {
  const TABLE: &[(&str, &str, Option<&str>, CommandHandler)] = &[
    ("backspace", "backspace,shift+backspace", None, delete::backspace),
    ("delete", "delete,shift+delete", None, delete::forward_delete),
    ("insert newline", "enter", None, commands::enter),
    ("select all", "ctrl+a", Some("cmd+a"), commands::select_all),
    ("undo", "ctrl+z", Some("cmd+z"), commands::undo),
    ("redo", "ctrl+y,ctrl+shift+z", Some("cmd+shift+z"), commands::redo),
    ("toggle bold", "ctrl+b", Some("cmd+b"), commands::toggle_bold),
    ("toggle italic", "ctrl+i", Some("cmd+i"), commands::toggle_italic),
    ("toggle underline", "ctrl+u", Some("cmd+u"), commands::toggle_underline),
    (
      "toggle strikethrough",
      "ctrl+shift+s",
      Some("cmd+shift+s"),
      commands::toggle_strikethrough,
    ),
    ("toggle code", "ctrl+e", Some("cmd+e"), commands::toggle_code),
    ("move cursor left", "arrow left", None, commands::move_left),
    ("move cursor right", "arrow right", None, commands::move_right),
    ("select left", "shift+arrow left", None, commands::select_left),
    ("select right", "shift+arrow right", None, commands::select_right),
    (
      "move cursor to start",
      "home",
      Some("cmd+arrow left"),
      commands::move_to_start,
    ),
    (
      "move cursor to end",
      "end",
      Some("cmd+arrow right"),
      commands::move_to_end,
    ),
    ("move cursor up", "arrow up", None, commands::move_up),
    ("move cursor down", "arrow down", None, commands::move_down),
    ("indent", "tab", None, commands::indent),
    ("outdent", "shift+tab", None, commands::outdent),
    ("exit block mode", "escape", None, commands::exit_block_mode),
  ];

  TABLE
    .iter()
    .filter_map(|(key, command, mac_command, handler)| {
      CommandShortcutEvent::new(*key, command, *mac_command, *handler)
        .inspect_err(|err| warn!("skipping command shortcut '{key}': {err}"))
        .ok()
    })
    .collect()
}

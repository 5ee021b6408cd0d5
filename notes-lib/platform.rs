//! Platform profile injected into input handling.
//!
//! Input code never inspects the environment itself. It receives a
//! [`PlatformProfile`] at construction time and reads intervals and flags from
//! it.

use std::time::Duration;

use serde::{
  Deserialize,
  Serialize,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
  MacOs,
  Windows,
  #[default]
  Linux,
  Android,
  Ios,
  Web,
}

impl Platform {
  /// The platform this binary was compiled for.
  pub fn current() -> Self {
    if cfg!(target_os = "macos") {
      Platform::MacOs
    } else if cfg!(target_os = "windows") {
      Platform::Windows
    } else if cfg!(target_os = "android") {
      Platform::Android
    } else if cfg!(target_os = "ios") {
      Platform::Ios
    } else if cfg!(target_family = "wasm") {
      Platform::Web
    } else {
      Platform::Linux
    }
  }

  pub fn is_mobile(self) -> bool {
    matches!(self, Platform::Android | Platform::Ios)
  }

  pub fn is_apple(self) -> bool {
    matches!(self, Platform::MacOs | Platform::Ios)
  }
}

/// How the IME connection learns about selection changes made by the editor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSync {
  /// Push every selection change to the platform.
  #[default]
  Eager,
  /// Only push when the composing range is cleared.
  OnCommit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformProfile {
  pub platform:                Platform,
  /// Coalescing window for IME update events.
  pub ime_debounce:            Duration,
  pub selection_sync:          SelectionSync,
  pub supports_floating_cursor: bool,
}

impl PlatformProfile {
  pub fn for_platform(platform: Platform) -> Self {
    if platform.is_mobile() {
      Self {
        platform,
        ime_debounce: Duration::from_millis(30),
        selection_sync: SelectionSync::OnCommit,
        supports_floating_cursor: true,
      }
    } else {
      Self {
        platform,
        ime_debounce: Duration::from_millis(10),
        selection_sync: SelectionSync::Eager,
        supports_floating_cursor: false,
      }
    }
  }

  pub fn current() -> Self {
    Self::for_platform(Platform::current())
  }
}

impl Default for PlatformProfile {
  fn default() -> Self {
    Self::current()
  }
}

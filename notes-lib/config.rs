//! Editor configuration, loaded from TOML.
//!
//! Every field has a default, so a partial (or empty) file is valid:
//!
//! ```toml
//! undo_debounce_ms = 100
//! platform = "mac_os"
//!
//! [ime]
//! mobile_debounce_ms = 40
//! ```

use std::{
  num::NonZeroUsize,
  path::Path,
  time::Duration,
};

use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;
use tracing::warn;

use crate::platform::{
  Platform,
  PlatformProfile,
};

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config: {0}")]
  Io(#[from] std::io::Error),
  #[error("failed to parse config: {0}")]
  Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
  /// Commits closer than this are undone together.
  pub undo_debounce_ms: u64,
  /// Oldest undo groups are dropped beyond this depth. Unbounded when unset.
  pub max_undo_groups:  Option<NonZeroUsize>,
  /// Overrides the compile-time platform.
  pub platform:         Option<Platform>,
  pub ime:              ImeConfig,
  pub slash_menu:       SlashMenuConfig,
}

impl Default for EditorConfig {
  fn default() -> Self {
    Self {
      undo_debounce_ms: 50,
      max_undo_groups:  None,
      platform:         None,
      ime:              ImeConfig::default(),
      slash_menu:       SlashMenuConfig::default(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImeConfig {
  pub desktop_debounce_ms: u64,
  pub mobile_debounce_ms:  u64,
}

impl Default for ImeConfig {
  fn default() -> Self {
    Self {
      desktop_debounce_ms: 10,
      mobile_debounce_ms:  30,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlashMenuConfig {
  /// Attempts at resolving the page context before giving up.
  pub context_attempts:    usize,
  pub context_interval_ms: u64,
}

impl Default for SlashMenuConfig {
  fn default() -> Self {
    Self {
      context_attempts:    10,
      context_interval_ms: 20,
    }
  }
}

impl EditorConfig {
  pub fn from_toml(contents: &str) -> Result<Self> {
    Ok(toml::from_str(contents)?)
  }

  /// Read `path`, falling back to defaults when the file is missing or
  /// malformed.
  pub fn load_or_default(path: &Path) -> Self {
    match std::fs::read_to_string(path) {
      Ok(contents) => {
        Self::from_toml(&contents).unwrap_or_else(|err| {
          warn!("Failed to parse editor config '{}': {err}", path.display());
          Self::default()
        })
      },
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
      Err(err) => {
        warn!("Failed to read editor config '{}': {err}", path.display());
        Self::default()
      },
    }
  }

  pub fn undo_debounce(&self) -> Duration {
    Duration::from_millis(self.undo_debounce_ms)
  }

  /// Platform profile with the configured overrides applied.
  pub fn platform_profile(&self) -> PlatformProfile {
    let platform = self.platform.unwrap_or_else(Platform::current);
    let mut profile = PlatformProfile::for_platform(platform);
    profile.ime_debounce = Duration::from_millis(if platform.is_mobile() {
      self.ime.mobile_debounce_ms
    } else {
      self.ime.desktop_debounce_ms
    });
    profile
  }
}

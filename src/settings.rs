//! Persisted form values.
//!
//! The record is stored as JSON with the field names `apiKey`, `mode`,
//! `contentfilter`, `kind` and `q`. Those names are the on-disk schema and must
//! not change. Values are kept as plain strings; the form decides what an
//! unknown value means.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

const SETTINGS_FILE: &str = "settings.json";

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct SettingsRecord {
  #[serde(rename = "apiKey", default)]
  pub api_key: String,
  #[serde(default)]
  pub mode: String,
  #[serde(rename = "contentfilter", default)]
  pub content_filter: String,
  #[serde(default)]
  pub kind: String,
  #[serde(rename = "q", default)]
  pub query: String,
}

/// Where the form reads its initial values from and writes changes to.
pub trait SettingsStore {
  fn load(&self) -> Option<SettingsRecord>;
  fn save(&self, record: &SettingsRecord);
}

/// JSON file in the platform config directory.
pub struct FileSettingsStore {
  path: Option<PathBuf>,
}

impl FileSettingsStore {
  pub fn new() -> Self {
    let path = ProjectDirs::from("", "", "tenor-tui").map(|dirs| dirs.config_dir().join(SETTINGS_FILE));
    Self { path }
  }

  #[cfg(test)]
  pub fn at(path: PathBuf) -> Self {
    Self { path: Some(path) }
  }
}

impl Default for FileSettingsStore {
  fn default() -> Self {
    Self::new()
  }
}

impl SettingsStore for FileSettingsStore {
  fn load(&self) -> Option<SettingsRecord> {
    let path = self.path.as_ref()?;
    let raw = match std::fs::read_to_string(path) {
      Ok(raw) => raw,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
      Err(e) => {
        warn!(err = %e, path = %path.display(), "settings: failed to read");
        return None;
      }
    };
    match serde_json::from_str(&raw) {
      Ok(record) => {
        debug!(path = %path.display(), "settings: loaded");
        Some(record)
      }
      Err(e) => {
        warn!(err = %e, path = %path.display(), "settings: failed to parse");
        None
      }
    }
  }

  fn save(&self, record: &SettingsRecord) {
    let Some(path) = self.path.as_ref() else { return };
    if let Some(dir) = path.parent()
      && let Err(e) = std::fs::create_dir_all(dir)
    {
      warn!(err = %e, dir = %dir.display(), "settings: failed to create config dir");
      return;
    }
    let content = match serde_json::to_string(record) {
      Ok(content) => content,
      Err(e) => {
        warn!(err = %e, "settings: failed to serialize");
        return;
      }
    };
    if let Err(e) = std::fs::write(path, content) {
      warn!(err = %e, path = %path.display(), "settings: failed to write");
    }
  }
}

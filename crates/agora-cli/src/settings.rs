//! Runtime configuration: a TOML file overlaid with `AGORA_*` environment
//! variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use agora_store_sqlite::StoreOptions;
use anyhow::Context as _;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgoraConfig {
  /// SQLite database file; a leading `~/` is expanded.
  #[serde(default = "default_store_path")]
  pub store_path:      PathBuf,
  /// Attempts per vote cast before reporting a conflict.
  #[serde(default = "default_cast_attempts")]
  pub cast_attempts:   u32,
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms: u64,
}

fn default_store_path() -> PathBuf { PathBuf::from("agora.db") }

fn default_cast_attempts() -> u32 { StoreOptions::default().cast_attempts }

fn default_busy_timeout_ms() -> u64 {
  StoreOptions::default().busy_timeout.as_millis() as u64
}

impl AgoraConfig {
  /// Read `path` if it exists, then apply `AGORA_*` overrides.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("AGORA").try_parsing(true))
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise AgoraConfig")
  }

  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }

  pub fn store_options(&self) -> StoreOptions {
    StoreOptions {
      cast_attempts: self.cast_attempts,
      busy_timeout:  Duration::from_millis(self.busy_timeout_ms),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use config::{Config, File, FileFormat};

  use super::*;

  fn from_toml(toml: &str) -> AgoraConfig {
    Config::builder()
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_file_gives_defaults() {
    let cfg = from_toml("");
    assert_eq!(cfg.store_path, PathBuf::from("agora.db"));
    assert_eq!(cfg.store_options(), StoreOptions::default());
  }

  #[test]
  fn file_values_reach_store_options() {
    let cfg = from_toml(
      r#"
      store_path      = "/var/lib/agora/agora.db"
      cast_attempts   = 7
      busy_timeout_ms = 250
      "#,
    );
    let options = cfg.store_options();
    assert_eq!(options.cast_attempts, 7);
    assert_eq!(options.busy_timeout, Duration::from_millis(250));
    assert_eq!(cfg.store_path(), PathBuf::from("/var/lib/agora/agora.db"));
  }

  #[test]
  fn relative_paths_are_left_alone() {
    assert_eq!(expand_tilde(Path::new("data/agora.db")), PathBuf::from("data/agora.db"));
    assert_eq!(expand_tilde(Path::new("~user/x")), PathBuf::from("~user/x"));
  }
}

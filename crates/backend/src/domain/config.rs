//! Configuration for the face indexer.
//!
//! Config priority: explicit path > user (~/.config/faceindex/config.toml) > defaults

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use serde::{Deserialize, Serialize};

// ============================================================================
// Indexer Configuration
// ============================================================================

/// Scheduling behaviour of the face indexer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
  /// Whether face indexing is enabled at all (default: true)
  pub enabled: bool,

  /// How long the scheduler sleeps when there is nothing to do (default: 30)
  pub idle_sleep_secs: u64,

  /// Number of backlog files fetched from the store at a time (default: 16)
  pub backfill_chunk_size: usize,

  /// Version of the legacy index status record to read (default: 1)
  pub index_version: u32,

  /// Request buffer of the face worker (default: 32)
  pub worker_queue_size: usize,
}

impl Default for IndexerConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      idle_sleep_secs: 30,
      backfill_chunk_size: 16,
      index_version: 1,
      worker_queue_size: 32,
    }
  }
}

impl IndexerConfig {
  pub fn idle_sleep(&self) -> Duration {
    Duration::from_secs(self.idle_sleep_secs)
  }
}

// ============================================================================
// Library Configuration
// ============================================================================

/// Where media files live and how they are discovered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
  /// Library root directory
  #[serde(skip_serializing_if = "Option::is_none")]
  pub root: Option<PathBuf>,

  /// File extensions considered media (case-insensitive)
  pub extensions: Vec<String>,

  /// Watch the library for new files and index them live (default: true)
  pub watch: bool,

  /// Debounce for watcher events in milliseconds (default: 500)
  pub watcher_debounce_ms: u64,
}

impl Default for LibraryConfig {
  fn default() -> Self {
    Self {
      root: None,
      extensions: ["jpg", "jpeg", "png", "webp", "heic", "heif"]
        .iter()
        .map(|s| s.to_string())
        .collect(),
      watch: true,
      watcher_debounce_ms: 500,
    }
  }
}

// ============================================================================
// Detector Configuration
// ============================================================================

/// External face detector program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
  /// Program to run; receives the file path as its last argument
  pub command: String,

  /// Extra arguments placed before the file path
  pub args: Vec<String>,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      command: "face-detect".to_string(),
      args: Vec::new(),
    }
  }
}

// ============================================================================
// Daemon Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
  /// Log level: off, error, warn, info, debug, trace (default: info)
  pub log_level: String,

  /// Log file rotation: daily, hourly, never (default: daily)
  pub log_rotation: String,
}

impl Default for DaemonConfig {
  fn default() -> Self {
    Self {
      log_level: "info".to_string(),
      log_rotation: "daily".to_string(),
    }
  }
}

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub indexer: IndexerConfig,
  pub library: LibraryConfig,
  pub detector: DetectorConfig,
  pub daemon: DaemonConfig,
}

impl Config {
  /// Load configuration, preferring an explicit path over the user config.
  ///
  /// Unreadable or invalid files fall through to the next source.
  pub fn load(explicit: Option<&Path>) -> Self {
    if let Some(path) = explicit
      && let Some(config) = Self::load_file(path)
    {
      return config;
    }

    if let Some(user_config_path) = Self::user_config_path()
      && let Some(config) = Self::load_file(&user_config_path)
    {
      return config;
    }

    Self::default()
  }

  fn load_file(path: &Path) -> Option<Self> {
    if !path.exists() {
      return None;
    }

    let content = match std::fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) => {
        tracing::warn!(path = %path.display(), error = %e, "Failed to read config");
        return None;
      }
    };

    match toml::from_str(&content) {
      Ok(config) => Some(config),
      Err(e) => {
        tracing::warn!(path = %path.display(), error = %e, "Invalid config, ignoring");
        None
      }
    }
  }

  /// Get the user-level config path
  pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CONFIG_DIR") {
      return Some(PathBuf::from(path).join("config.toml"));
    }

    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
      return Some(PathBuf::from(path).join("faceindex").join("config.toml"));
    }

    dirs::config_dir().map(|p: PathBuf| p.join("faceindex").join("config.toml"))
  }

  /// Render the default configuration as a commented TOML template
  pub fn generate_template() -> String {
    let body = toml::to_string_pretty(&Self::default()).unwrap_or_default();
    format!(
      "# faceindex configuration\n\
       # Set [library] root to the directory holding your photos.\n\n{}",
      body
    )
  }
}

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::provider::DEFAULT_PAGE_SIZE;
use crate::zooniverse::DEFAULT_SUBJECTS_URL;

const APP_DIR: &str = "galaxyzoo-mirror";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub zooniverse: ZooniverseConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub network: NetworkConfig,
  #[serde(default)]
  pub sync: SyncConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZooniverseConfig {
  #[serde(default = "default_subjects_url")]
  pub subjects_url: String,
  /// Subjects requested per refresh
  #[serde(default = "default_page_size")]
  pub page_size: usize,
}

impl Default for ZooniverseConfig {
  fn default() -> Self {
    Self {
      subjects_url: default_subjects_url(),
      page_size: default_page_size(),
    }
  }
}

fn default_subjects_url() -> String {
  DEFAULT_SUBJECTS_URL.to_string()
}

fn default_page_size() -> usize {
  DEFAULT_PAGE_SIZE
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// Database, image cache and logs (defaults to $XDG_DATA_HOME/galaxyzoo-mirror)
  pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkConfig {
  /// Treat the network as unusable: nothing is fetched
  #[serde(default)]
  pub offline: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
  /// Seconds between sweeps when nothing is missing
  #[serde(default = "default_interval")]
  pub interval_secs: u64,
  /// Seconds between sweeps while images are still missing
  #[serde(default = "default_busy_interval")]
  pub busy_interval_secs: u64,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      interval_secs: default_interval(),
      busy_interval_secs: default_busy_interval(),
    }
  }
}

fn default_interval() -> u64 {
  300
}

fn default_busy_interval() -> u64 {
  30
}

impl SyncConfig {
  pub fn interval(&self, work_remaining: bool) -> Duration {
    let secs = if work_remaining {
      self.busy_interval_secs
    } else {
      self.interval_secs
    };
    Duration::from_secs(secs.max(1))
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./gzm.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/galaxyzoo-mirror/config.yaml
  ///
  /// Falls back to defaults when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("gzm.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join(APP_DIR).join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    // An empty file is a valid, all-default config.
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Resolved data directory.
  pub fn data_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.storage.data_dir {
      return Ok(dir.clone());
    }
    dirs::data_dir()
      .map(|d| d.join(APP_DIR))
      .ok_or_else(|| eyre!("Could not determine a data directory; set storage.data_dir"))
  }

  pub fn database_path(&self) -> Result<PathBuf> {
    Ok(self.data_dir()?.join("items.db"))
  }

  pub fn cache_dir(&self) -> Result<PathBuf> {
    Ok(self.data_dir()?.join("files"))
  }

  pub fn log_dir(&self) -> Result<PathBuf> {
    Ok(self.data_dir()?.join("logs"))
  }
}

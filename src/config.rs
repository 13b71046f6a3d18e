use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding `backend.url`.
pub const BACKEND_URL_ENV: &str = "ACADEMY_SYNC_BACKEND_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub backend: BackendConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
  /// Web-app endpoint serving every action
  #[serde(default)]
  pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Set to false to always read from the network
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// SQLite file (defaults to $XDG_DATA_HOME/academy-sync/cache.db)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      path: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
  /// Filter used when RUST_LOG is unset, e.g. "info" or "academy_sync=debug"
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Write daily rolling log files here in addition to stderr
  pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      directory: None,
    }
  }
}

fn default_true() -> bool {
  true
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./academy-sync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/academy-sync/config.yaml
  ///
  /// A missing file is fine when the backend URL comes from the environment.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let env_url = std::env::var(BACKEND_URL_ENV).ok();
    Self::load_with(explicit_path, env_url)
  }

  fn load_with(explicit_path: Option<&Path>, env_url: Option<String>) -> Result<Self> {
    let env_url = env_url.filter(|u| !u.trim().is_empty());

    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match (path, &env_url) {
      (Some(p), _) => Self::load_from_path(&p)?,
      (None, Some(_)) => Config::default(),
      (None, None) => {
        return Err(eyre!(
          "No configuration file found. Create one at ~/.config/academy-sync/config.yaml\n\
           or set {} to the backend URL. See config.example.yaml for the format.",
          BACKEND_URL_ENV
        ))
      }
    };

    if let Some(url) = env_url {
      config.backend.url = url;
    }

    if config.backend.url.trim().is_empty() {
      return Err(eyre!(
        "Backend URL is not configured. Set backend.url or {}.",
        BACKEND_URL_ENV
      ));
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("academy-sync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("academy-sync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Location of the cache database.
  pub fn cache_path(&self) -> Result<PathBuf> {
    if let Some(path) = &self.cache.path {
      return Ok(path.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("academy-sync").join("cache.db"))
  }
}

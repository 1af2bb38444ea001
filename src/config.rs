use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{DataError, Result};

/// Default origin of the restaurant data service.
const DEFAULT_SERVICE_URL: &str = "http://localhost:1337";

/// Default origin the application shell is served from.
const DEFAULT_APP_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub service: ServiceConfig,
  #[serde(default)]
  pub app: AppConfig,
  /// Override for the store location (defaults to the platform data dir)
  pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  pub base_url: String,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_SERVICE_URL.to_string(),
    }
  }
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_APP_URL.to_string(),
    }
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      service: ServiceConfig::default(),
      app: AppConfig::default(),
      data_dir: None,
    }
  }
}

impl Config {
  /// Load configuration from file, falling back to defaults.
  ///
  /// Search order:
  /// 1. Explicit path if provided (an error if missing)
  /// 2. ./bitecache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/bitecache/config.yaml
  /// 4. Built-in defaults (localhost service)
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(DataError::Validation(format!(
          "config file not found: {}",
          p.display()
        )));
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
    // Check current directory
    let local = PathBuf::from("bitecache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("bitecache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
      DataError::Validation(format!("failed to read config {}: {}", path.display(), e))
    })?;

    let config: Config = serde_yaml::from_str(&contents).map_err(|e| {
      DataError::Validation(format!("failed to parse config {}: {}", path.display(), e))
    })?;

    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_point_at_localhost() {
    let config = Config::default();
    assert_eq!(config.service.base_url, "http://localhost:1337");
    assert!(config.data_dir.is_none());
  }

  #[test]
  fn partial_yaml_fills_in_defaults() {
    let config: Config =
      serde_yaml::from_str("service:\n  base_url: http://10.0.0.2:1337\n").unwrap();
    assert_eq!(config.service.base_url, "http://10.0.0.2:1337");
    assert_eq!(config.app.base_url, "http://localhost:8000");
  }
}

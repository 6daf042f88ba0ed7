use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const APP_DIR_NAME: &str = "quarry";
pub const CONFIG_DIR_ENV: &str = "QUARRY_CONFIG_DIR";
const SETTINGS_FILE_NAME: &str = "settings.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub connect_timeout_secs: u64,
    pub max_connections: usize,
    pub table_page_size: u64,
    pub log_filter: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            max_connections: 10,
            table_page_size: 100,
            log_filter: None,
        }
    }
}

impl Settings {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("config directory is unavailable for this platform")]
    ConfigDirUnavailable,
    #[error("failed to read settings file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid settings: {0}")]
    Invalid(String),
}

pub fn load_default() -> Result<Settings, SettingsError> {
    load_from_path(default_config_dir()?.join(SETTINGS_FILE_NAME))
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Settings, SettingsError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Settings::default());
    }

    let raw = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if raw.trim().is_empty() {
        return Ok(Settings::default());
    }

    let settings: Settings = toml::from_str(&raw).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    if settings.max_connections == 0 {
        return Err(SettingsError::Invalid(
            "max_connections must be greater than 0".to_string(),
        ));
    }
    if settings.table_page_size == 0 {
        return Err(SettingsError::Invalid(
            "table_page_size must be greater than 0".to_string(),
        ));
    }

    Ok(settings)
}

/// Resolves the per-user directory holding settings and persisted state.
pub fn default_config_dir() -> Result<PathBuf, SettingsError> {
    if let Some(custom) = env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(custom));
    }

    let base_dir = if cfg!(target_os = "windows") {
        env::var_os("APPDATA")
            .map(PathBuf::from)
            .ok_or(SettingsError::ConfigDirUnavailable)?
    } else if let Some(xdg_config_home) = env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config_home)
    } else {
        let home = env::var_os("HOME").ok_or(SettingsError::ConfigDirUnavailable)?;
        PathBuf::from(home).join(".config")
    };

    Ok(base_dir.join(APP_DIR_NAME))
}

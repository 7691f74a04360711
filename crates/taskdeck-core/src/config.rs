use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Optional settings read from `<taskdeck home>/config.toml`. Command-line
/// flags take precedence over every field here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskdeckConfig {
    /// Directory holding the database file and markdown exports.
    pub data_dir: Option<String>,
    /// Interface the server binds. Defaults to loopback.
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Directory of static UI assets served on unmatched paths.
    pub ui_dir: Option<String>,
}

pub fn resolve_user_home_dir() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    if let Ok(profile) = std::env::var("USERPROFILE") {
        let trimmed = profile.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    None
}

pub fn resolve_taskdeck_home_dir() -> Option<PathBuf> {
    if let Ok(value) = std::env::var("TASKDECK_HOME") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    resolve_user_home_dir().map(|home| home.join(".taskdeck"))
}

pub fn config_path() -> Option<PathBuf> {
    resolve_taskdeck_home_dir().map(|home| home.join("config.toml"))
}

/// Load the config file if present. A missing file is not an error.
pub fn load_config() -> Result<Option<TaskdeckConfig>, ConfigError> {
    let Some(path) = config_path() else {
        return Ok(None);
    };
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)?;
    Ok(Some(toml::from_str::<TaskdeckConfig>(&text)?))
}

/// Data directory resolution: config value, else `<taskdeck home>/data`,
/// else `./taskdeck-data` when no home directory can be determined.
pub fn resolve_data_dir(config: Option<&TaskdeckConfig>) -> PathBuf {
    if let Some(dir) = config.and_then(|c| c.data_dir.as_deref()) {
        let trimmed = dir.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    resolve_taskdeck_home_dir()
        .map(|home| home.join("data"))
        .unwrap_or_else(|| PathBuf::from("taskdeck-data"))
}

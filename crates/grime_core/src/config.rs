//! Runtime configuration.
//!
//! # Responsibility
//! - Load optional TOML settings for storage and logging.
//! - Merge caller overrides (flags, env) over file values over defaults.
//!
//! # Invariants
//! - Resolved `storage_root` and `log_dir` are always set.
//! - An explicitly requested config file must exist; the default location
//!   is optional.

use crate::logging::default_log_level;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const APP_DIR_NAME: &str = "grime";
const CONFIG_FILE_NAME: &str = "config.toml";
const LOG_DIR_NAME: &str = "logs";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{}`: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config `{}`: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("no platform data directory available; set storage_root explicitly")]
    NoDataDir,
}

/// On-disk config file shape. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub storage_root: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
}

/// Values supplied by the caller that win over the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub storage_root: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrimeConfig {
    /// Global storage root; workspaces live in `<storage_root>/<hash>/`.
    pub storage_root: PathBuf,
    pub log_level: String,
    pub log_dir: PathBuf,
}

impl GrimeConfig {
    /// Loads `path` (or the default config location) and applies overrides.
    pub fn load(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => read_config_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => read_config_file(&path)?,
                _ => ConfigFile::default(),
            },
        };
        Self::resolve(file, overrides)
    }

    /// Merges overrides over file values over defaults.
    pub fn resolve(file: ConfigFile, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let storage_root = match overrides.storage_root.or(file.storage_root) {
            Some(root) => root,
            None => default_storage_root().ok_or(ConfigError::NoDataDir)?,
        };
        let log_level = overrides
            .log_level
            .or(file.log_level)
            .unwrap_or_else(|| default_log_level().to_string());
        let log_dir = overrides
            .log_dir
            .or(file.log_dir)
            .unwrap_or_else(|| storage_root.join(LOG_DIR_NAME));

        Ok(Self {
            storage_root,
            log_level,
            log_dir,
        })
    }
}

/// `<config_dir>/grime/config.toml` when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// `<data_dir>/grime` when the platform has a data dir.
pub fn default_storage_root() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_DIR_NAME))
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

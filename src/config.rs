//! Configuration: settings loaded from ~/.markut/settings.yaml and the user
//! markut file evaluated before every program.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CACHE_DIR: &str = "markut-chunks";

/// Tool settings loaded from YAML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Prefix of a custom ffmpeg distribution; the binary is `<prefix>/bin/ffmpeg`.
    #[serde(default)]
    pub ffmpeg_prefix: Option<String>,
    /// Where rendered chunks are cached.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    /// Always pass `-y` to ffmpeg.
    #[serde(default)]
    pub overwrite: bool,
}

fn default_cache_dir() -> String {
    DEFAULT_CACHE_DIR.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ffmpeg_prefix: None,
            cache_dir: default_cache_dir(),
            overwrite: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// ~/.markut
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".markut"))
}

/// ~/.markut/settings.yaml
pub fn settings_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("settings.yaml"))
}

/// ~/.markut/config.markut, evaluated into the context before any user file.
pub fn user_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.markut"))
}

impl Settings {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load settings from the standard path, falling back to defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match settings_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }
}

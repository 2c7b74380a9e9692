//! Configuration module
//!
//! Handles loading and parsing of plugbridge.toml.

pub mod model;

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub use self::model::*;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "plugbridge.toml";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl BridgeConfig {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load the given file, or `plugbridge.toml` from the working directory,
    /// or the user config directory. Falls back to defaults when none exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let candidates = [
            Some(PathBuf::from(CONFIG_FILE_NAME)),
            dirs::config_dir().map(|dir| dir.join("plugbridge").join(CONFIG_FILE_NAME)),
        ];

        for candidate in candidates.into_iter().flatten() {
            if candidate.is_file() {
                debug!("Loading configuration from {}", candidate.display());
                return Self::load(&candidate);
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }
}

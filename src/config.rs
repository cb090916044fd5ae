//! Optional JSON configuration file.
//!
//! ```json
//! {
//!   "service": "spotify",
//!   "playlist_title": "Tango 1935-1940",
//!   "cache_dir": "/home/me/.discsync",
//!   "verbose": 1,
//!   "fuzzy_rank_threshold": 30,
//!   "include_year_in_query": false
//! }
//! ```
//!
//! Every key is optional; command-line flags override file values.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;
use crate::scoring::DEFAULT_FUZZY_RANK_THRESHOLD;

pub const DEFAULT_SERVICE: &str = "spotify";
pub const DEFAULT_CACHE_DIR_NAME: &str = ".discsync";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: String,
    pub playlist_title: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub verbose: u8,
    pub fuzzy_rank_threshold: usize,
    pub include_year_in_query: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE.to_string(),
            playlist_title: None,
            cache_dir: None,
            verbose: 0,
            fuzzy_rank_threshold: DEFAULT_FUZZY_RANK_THRESHOLD,
            include_year_in_query: false,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&data).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(data).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.service.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "service",
                reason: "must not be empty".to_string(),
            });
        }
        if self.fuzzy_rank_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "fuzzy_rank_threshold",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Root of the sync cache: the configured directory, else `$HOME/.discsync`,
    /// else `.discsync` in the working directory.
    pub fn cache_root(&self) -> PathBuf {
        if let Some(dir) = &self.cache_dir {
            return dir.clone();
        }
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(DEFAULT_CACHE_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR_NAME))
    }
}

//! Error types surfaced by the I/O-backed parts of the library.
//!
//! Pure functions (canonicalization, matching, sorting) never fail; only the
//! synchronization cache, config loading and playlist submissions do.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid collection key {0:?}")]
    InvalidCollectionKey(String),
    #[error("cache path {} exists but is not a directory", .0.display())]
    NotADirectory(PathBuf),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io { path: path.into(), source }
    }
}

/// Failure reported by a playlist service for a single submission.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("no match for query: {0}")]
    NotFound(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

//! Error types shared across the dataset core

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by dataset operations
#[derive(Debug, Error)]
pub enum BlackbirdError {
    /// Invalid or unreadable configuration (locations file, schema)
    #[error("configuration error: {0}")]
    Config(String),

    /// A symbolic path could not be parsed or resolved
    #[error("invalid symbolic path '{path}': {reason}")]
    SymbolicPath { path: String, reason: String },

    /// A location name is not present in the locations map
    #[error("unknown location '{0}'")]
    UnknownLocation(String),

    /// Bad user input (unknown component, proportion out of range, ...)
    #[error("{0}")]
    User(String),

    /// Local file I/O failure, wrapped with the path it happened on
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Network or HTTP failure talking to a WebDAV server
    #[error("network error: {0}")]
    Network(String),

    /// Downloaded bytes do not match the size recorded in the index
    #[error("size mismatch for {path}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    /// Malformed or inconsistent operation state file
    #[error("operation state error: {0}")]
    State(String),
}

impl BlackbirdError {
    /// Wrap an I/O error with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BlackbirdError>;

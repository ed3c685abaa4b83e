//! Error types for oskit core.

use std::path::PathBuf;
use thiserror::Error;

/// Core result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for oskit core operations.
///
/// Path and bitwise operations return their own narrower error types.
#[derive(Debug, Error)]
pub enum Error {
    #[error("OS probe failed: {0}")]
    Probe(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON5 parse error: {0}")]
    Json5(String),
}

/// Path operation errors.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("Path is not valid UTF-8: {}", .0.display())]
    NonUtf8(PathBuf),

    #[error("Path {path} is not under {start}")]
    NotUnderStart { path: String, start: String },

    #[error("Cannot resolve {path}: {source}")]
    Resolve {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bitwise table errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BitwiseError {
    #[error("Unknown flag name: {0}")]
    UnknownName(String),

    #[error("Bits {0:#x} are not covered by the table")]
    UnknownBits(u64),

    #[error("Buffer too small: need {needed} bytes, have {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    #[error("Invalid flag name: {0:?}")]
    InvalidName(String),
}

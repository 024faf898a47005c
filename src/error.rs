// src/error.rs

//! Error types for Pantry

use thiserror::Error;

/// Result type used across the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while reading recipes, resolving environments,
/// driving builds and assembling packages
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A file or directory operation that failed with context attached
    #[error("Filesystem error: {0}")]
    Filesystem(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Download failed: {0}")]
    DownloadError(String),

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Dependency resolution failed: {0}")]
    ResolutionError(String),

    /// An external tool exited unsuccessfully. `output` holds what it printed.
    #[error("{step} failed with exit code {}\n{output}", code.map(|c| c.to_string()).unwrap_or_else(|| "none (killed by signal)".to_string()))]
    StepFailed {
        step: String,
        code: Option<i32>,
        output: String,
    },

    #[error("{step} timed out after {secs}s")]
    StepTimeout { step: String, secs: u64 },

    #[error("Packaging failed: {0}")]
    PackageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

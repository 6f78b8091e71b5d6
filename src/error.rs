//! Error types for the bootstrap.
//!
//! None of these ever reach the host: the hook entry points log them and
//! hand control back as if the bootstrap had succeeded.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Runtime symbol `{0}` could not be resolved")]
    MissingSymbol(&'static str),

    #[error("No configuration installed")]
    MissingConfig,

    #[error("No target assembly configured")]
    MissingTarget,

    #[error("Runtime library not found: {0}")]
    RuntimeNotFound(PathBuf),

    #[error("Failed to load runtime library {path}: {reason}")]
    LibraryLoad { path: PathBuf, reason: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`{0}` did not create a domain")]
    NoDomain(&'static str),

    #[error("Failed to open assembly image {path}: status {status}")]
    ImageOpen { path: PathBuf, status: i32 },

    #[error("Failed to load assembly {path}: status {status}")]
    AssemblyLoad { path: PathBuf, status: i32 },

    #[error("No `{0}` entry point found in the target assembly")]
    EntryPointMissing(&'static str),

    #[error("CoreCLR `{call}` failed with code {code:#010x}")]
    ClrStatus { call: &'static str, code: i32 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Path contains an interior NUL byte: {0}")]
    InteriorNul(String),
}

pub type Result<T> = std::result::Result<T, BootstrapError>;

/// Unwrap a required binding-table slot
pub fn required<F>(slot: Option<F>, name: &'static str) -> Result<F> {
    slot.ok_or(BootstrapError::MissingSymbol(name))
}

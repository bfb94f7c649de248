//! CLI error types.

use std::path::PathBuf;

use thiserror::Error;

use fcindex_core::IndexError;

/// CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid date format.
    #[error("Invalid date format: {0}. Use YYYY-MM-DD.")]
    InvalidDate(String),

    /// Universe file with an unknown extension.
    #[error("Unsupported universe format: {0}. Use .json or .csv.")]
    UnsupportedFormat(PathBuf),

    /// Universe file could not be parsed.
    #[error("Failed to parse {path}: {reason}")]
    Parse {
        /// File being read.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// Empty sizing list.
    #[error("No sizing values given")]
    NoValues,

    /// Index construction error.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;

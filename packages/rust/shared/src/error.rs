//! Error types for feedwire.
//!
//! Library crates use [`FeedwireError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all feedwire operations.
#[derive(Debug, thiserror::Error)]
pub enum FeedwireError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching a feed or page.
    #[error("network error: {0}")]
    Network(String),

    /// Feed parsing or content extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// An article with this id has already been committed.
    #[error("duplicate key: article {id} already exists")]
    DuplicateKey { id: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad row, unknown label, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Reading or writing a CSV table failed.
    #[error("table error at {path:?}: {message}")]
    Table { path: PathBuf, message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FeedwireError>;

impl FeedwireError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a table error for the file at `path`.
    pub fn table(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Table {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// True if this is a [`FeedwireError::DuplicateKey`].
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}

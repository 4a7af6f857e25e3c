//! Error types raised by the rewrite engine and file discovery.

use std::path::PathBuf;
use thiserror::Error;

/// Failures the core can report. Rejected candidates and spans that were
/// consumed by an earlier substitution are not errors and never show up here.
#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("template has {count} interpolations; only 26 placeholders (a-z) are available")]
    PlaceholderOverflow { count: usize },

    #[error("input path does not exist: {}", path.display())]
    RootNotFound { path: PathBuf },

    #[error("unsupported file type: {}", path.display())]
    UnsupportedFile { path: PathBuf },

    #[error("invalid ignore pattern '{pattern}': {message}")]
    InvalidIgnorePattern { pattern: String, message: String },
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, RewriteError>;

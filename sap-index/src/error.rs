//! Error types for sap-index
//!
//! Stage-level failures. Per-file failures (`ParseError`, `BuildError`) live
//! next to the code that produces them and never reach this type.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for sap-index
#[derive(Error, Debug)]
pub enum Error {
    /// Store failure (schema, prepare, bind, step). Fatal to the whole run:
    /// a broken store invalidates both dedup and persistence.
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration or database initialization error from sap-common
    #[error("Common error: {0}")]
    Common(#[from] sap_common::Error),

    /// Scan root rejected before any work started
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    /// A pipeline worker panicked or could not be joined
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Scan root validation errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Convenience Result type using sap-index Error
pub type Result<T> = std::result::Result<T, Error>;

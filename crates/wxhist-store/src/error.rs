//! Error types for wxhist-store.

use std::path::PathBuf;

/// Result type for wxhist-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in wxhist-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Storage backend cannot serve the request.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

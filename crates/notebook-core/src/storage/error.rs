//! Storage error handling
//!
//! Provides typed errors for local store operations with descriptive
//! messages and recovery suggestions.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during local store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to create data directory
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to open the database file
    #[error("Failed to open database '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No book with this uuid or name
    #[error("Book not found: '{0}'")]
    BookNotFound(String),

    /// No note with this uuid
    #[error("Note not found: '{0}'")]
    NoteNotFound(Uuid),

    /// A live book already uses this name
    #[error("A book named '{0}' already exists")]
    DuplicateBook(String),

    /// Book names must be non-empty
    #[error("Invalid book name: '{0}'")]
    InvalidBookName(String),

    /// A stored value could not be decoded
    #[error("Corrupt value for '{key}': {details}")]
    Corrupt { key: String, details: String },
}

impl StoreError {
    /// Whether this error reflects damaged local state rather than a bad request
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::Database(_)
                | StoreError::Open { .. }
                | StoreError::Corrupt { .. }
                | StoreError::CreateDirectory { .. }
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StoreError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            StoreError::Open { .. } => {
                Some("Check that the database file is readable and not locked by another process.")
            }
            StoreError::Corrupt { .. } => {
                Some("The local database holds an unexpected value. Back it up before editing it.")
            }
            StoreError::DuplicateBook(_) => Some("Pick a different name or rename the other book."),
            _ => None,
        }
    }
}

/// Result type for local store operations
pub type StoreResult<T> = Result<T, StoreError>;

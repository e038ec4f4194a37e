//! Sync error handling
//!
//! Every failure a sync can hit, classified so callers can decide whether
//! to retry, re-login, or give up, and so the CLI can map it to an exit
//! code.

use thiserror::Error;

use crate::storage::StoreError;

/// Errors that abort a sync
#[derive(Error, Debug)]
pub enum SyncError {
    /// Missing, expired or rejected session
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Server rejected a write because of a conflicting row
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Server has no row with this uuid for the user
    #[error("Not found: {0}")]
    NotFound(String),

    /// Server rejected a malformed request
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Network failure, timeout, or server-side error; safe to retry
    #[error("Sync interrupted: {0}")]
    Transient(String),

    /// Local store failure
    #[error(transparent)]
    Fatal(#[from] StoreError),
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        SyncError::Fatal(StoreError::Database(err))
    }
}

impl SyncError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::Auth(_) => 2,
            SyncError::Transient(_) => 3,
            SyncError::Conflict(_) => 4,
            SyncError::Validation(_) | SyncError::NotFound(_) => 5,
            SyncError::Fatal(_) => 6,
        }
    }

    /// Whether running the sync again may succeed without user action
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transient(_))
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            SyncError::Auth(_) => Some("Run 'notebook login' and try again."),
            SyncError::Transient(_) => {
                Some("Check the server address and your connection, then sync again.")
            }
            SyncError::Conflict(_) => {
                Some("Rename the conflicting book locally and sync again.")
            }
            SyncError::NotFound(_) => {
                Some("The server no longer has a row this change refers to. Sync again to refresh.")
            }
            SyncError::Validation(_) => None,
            SyncError::Fatal(err) => err.recovery_suggestion(),
        }
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

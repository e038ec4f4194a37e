//! Data models for notebook
//!
//! Books and notes as held in the local replica. Both are versioned by the
//! server-assigned `usn` and deleted logically; `dirty` marks rows with
//! local edits the server has not acknowledged yet.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{BookRecord, NoteRecord};

/// A named collection of notes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Book {
    /// Stable identifier (provisional until the server acknowledges a create)
    pub uuid: Uuid,
    /// Unique among live books; a random placeholder once deleted
    pub name: String,
    /// Last server-acknowledged USN, 0 if never synced
    pub usn: i64,
    pub deleted: bool,
    /// Has local edits pending push
    pub dirty: bool,
    /// Nanoseconds since the unix epoch
    pub added_on: i64,
}

impl Book {
    /// Whether the server has never seen this book
    pub fn is_new(&self) -> bool {
        self.usn == 0
    }
}

/// A note body inside a book
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    pub uuid: Uuid,
    pub book_uuid: Uuid,
    /// Empty once deleted
    pub body: String,
    pub public: bool,
    /// Nanoseconds since the unix epoch
    pub added_on: i64,
    /// Nanoseconds since the unix epoch
    pub edited_on: i64,
    pub usn: i64,
    pub deleted: bool,
    pub dirty: bool,
}

impl Note {
    /// Whether the server has never seen this note
    pub fn is_new(&self) -> bool {
        self.usn == 0
    }
}

/// Placeholder name for a deleted book
///
/// Deleted books keep their row so the tombstone can travel, but must
/// never collide with a live name.
pub fn deleted_book_placeholder() -> String {
    Uuid::new_v4().to_string()
}

impl From<&BookRecord> for Book {
    fn from(record: &BookRecord) -> Self {
        let name = if record.deleted {
            deleted_book_placeholder()
        } else {
            record.name.clone()
        };
        Self {
            uuid: record.uuid,
            name,
            usn: record.usn,
            deleted: record.deleted,
            dirty: false,
            added_on: record.added_on,
        }
    }
}

impl From<&NoteRecord> for Note {
    fn from(record: &NoteRecord) -> Self {
        let body = if record.deleted {
            String::new()
        } else {
            record.body.clone()
        };
        Self {
            uuid: record.uuid,
            book_uuid: record.book_uuid,
            body,
            public: record.public,
            added_on: record.added_on,
            edited_on: record.edited_on,
            usn: record.usn,
            deleted: record.deleted,
            dirty: false,
        }
    }
}

//! SQLite schema for the local replica
//!
//! `notes.book_uuid` carries no foreign key: a fragment may deliver a note
//! before the book it references, and tombstones must outlive their parents.

use rusqlite::{Connection, OptionalExtension, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// `system` key holding the schema version
pub const SYSTEM_SCHEMA: &str = "schema";

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Key/value bookkeeping
        CREATE TABLE IF NOT EXISTS system (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Books table
        CREATE TABLE IF NOT EXISTS books (
            uuid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            usn INTEGER NOT NULL DEFAULT 0,
            deleted INTEGER NOT NULL DEFAULT 0,
            dirty INTEGER NOT NULL DEFAULT 0,
            added_on INTEGER NOT NULL
        );

        -- Notes table
        CREATE TABLE IF NOT EXISTS notes (
            uuid TEXT PRIMARY KEY,
            book_uuid TEXT NOT NULL,
            body TEXT NOT NULL,
            public INTEGER NOT NULL DEFAULT 0,
            added_on INTEGER NOT NULL,
            edited_on INTEGER NOT NULL,
            usn INTEGER NOT NULL DEFAULT 0,
            deleted INTEGER NOT NULL DEFAULT 0,
            dirty INTEGER NOT NULL DEFAULT 0
        );

        -- Indexes for common query patterns

        -- Name lookups among live books
        CREATE INDEX IF NOT EXISTS idx_books_name ON books(name);

        -- Notes of a book
        CREATE INDEX IF NOT EXISTS idx_notes_book_uuid ON notes(book_uuid);

        -- Dirty scans
        CREATE INDEX IF NOT EXISTS idx_books_dirty ON books(dirty);
        CREATE INDEX IF NOT EXISTS idx_notes_dirty ON notes(dirty);
        "#,
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO system (key, value) VALUES (?, ?)",
        [SYSTEM_SCHEMA, &SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM system WHERE key = ?",
            [SYSTEM_SCHEMA],
            |row| row.get(0),
        )
        .optional()?;

    Ok(value.and_then(|v| v.parse().ok()))
}

/// Check if schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='system'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}

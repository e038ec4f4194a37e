//! Server database schema
//!
//! Users own books and notes. `users.max_usn` is the per-user USN counter;
//! every row carries the USN of its last mutation.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

pub const SCHEMA_VERSION: i32 = 1;

/// Open (creating if needed) the server database at `path`
pub fn open(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database: {:?}", path))?;
    prepare(&conn)?;
    info!("Opened database at {:?}", path);
    Ok(conn)
}

/// Open an in-memory database (for testing)
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    prepare(&conn)?;
    Ok(conn)
}

fn prepare(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    if needs_init(conn) {
        init_schema(conn).context("Failed to initialize schema")?;
    }
    Ok(())
}

/// Create all tables and indexes
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    debug!("Initializing server schema v{}", SCHEMA_VERSION);

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_info (
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            max_usn INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            key TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            expires_at INTEGER NOT NULL,
            last_used_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS books (
            uuid TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            usn INTEGER NOT NULL,
            deleted INTEGER NOT NULL DEFAULT 0,
            added_on INTEGER NOT NULL,
            edited_on INTEGER NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_books_live_name
            ON books(user_id, name) WHERE deleted = 0;
        CREATE INDEX IF NOT EXISTS idx_books_user_usn ON books(user_id, usn);

        CREATE TABLE IF NOT EXISTS notes (
            uuid TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            book_uuid TEXT NOT NULL REFERENCES books(uuid),
            body TEXT NOT NULL DEFAULT '',
            public INTEGER NOT NULL DEFAULT 0,
            added_on INTEGER NOT NULL,
            edited_on INTEGER NOT NULL,
            usn INTEGER NOT NULL,
            deleted INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_notes_user_usn ON notes(user_id, usn);
        CREATE INDEX IF NOT EXISTS idx_notes_book_uuid ON notes(book_uuid);
        "#,
    )?;

    conn.execute("DELETE FROM schema_info", [])?;
    conn.execute(
        "INSERT INTO schema_info (version) VALUES (?)",
        [SCHEMA_VERSION],
    )?;
    Ok(())
}

/// Get the current schema version (None if not initialized)
pub fn get_schema_version(conn: &Connection) -> Option<i32> {
    conn.query_row("SELECT version FROM schema_info LIMIT 1", [], |row| {
        row.get(0)
    })
    .optional()
    .ok()
    .flatten()
}

pub fn needs_init(conn: &Connection) -> bool {
    get_schema_version(conn).is_none()
}

/// Read a TEXT column holding a uuid
pub(crate) fn uuid_column(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let value: String = row.get(idx)?;
    Uuid::parse_str(&value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_in_memory_initializes() {
        let conn = open_in_memory().unwrap();
        assert_eq!(get_schema_version(&conn), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_init_is_idempotent() {
        let conn = open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_info", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_live_name_index_ignores_deleted_rows() {
        let conn = open_in_memory().unwrap();
        conn.execute(
            "INSERT INTO users (uuid, email, password_hash, created_at) \
             VALUES ('u', 'a@b.c', 'h', 0)",
            [],
        )
        .unwrap();
        let insert = |uuid: &str, deleted: bool| {
            conn.execute(
                "INSERT INTO books (uuid, user_id, name, usn, deleted, added_on, edited_on) \
                 VALUES (?, 1, 'js', 1, ?, 0, 0)",
                rusqlite::params![uuid, deleted],
            )
        };

        insert("b1", true).unwrap();
        insert("b2", false).unwrap();
        assert!(insert("b3", false).is_err());
    }

    #[test]
    fn test_open_file_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data").join("server.db");

        drop(open(&path).unwrap());
        let conn = open(&path).unwrap();
        assert_eq!(get_schema_version(&conn), Some(SCHEMA_VERSION));
    }
}

//! Local replica
//!
//! The `LocalStore` owns the SQLite connection holding the user's books and
//! notes and the `system` bookkeeping table. Every sync step runs inside a
//! `StoreTx`, so a crash leaves either the whole step or none of it.
//!
//! ## Dirty rows
//!
//! Local edits set `dirty` and leave `usn` alone. `usn` always reflects the
//! last version the server acknowledged (0 if never), and `dirty` is cleared
//! only by `StoreTx::acknowledge_book` / `StoreTx::acknowledge_note` once the
//! server has assigned a new USN.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = LocalStore::open(&config)?;
//!
//! let book = store.add_book("js")?;
//! store.add_note(book.uuid, "hello")?;
//!
//! let dirty = store.begin()?.scan_dirty()?;
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::api::{BookRecord, NoteRecord};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::models::{deleted_book_placeholder, Book, Note};
use crate::storage::schema::{init_schema, needs_init};
use crate::storage::{StoreError, StoreResult};

/// Highest USN pulled from the server
pub const SYSTEM_LAST_MAX_USN: &str = "last_max_usn";
/// Server wall time (unix seconds) of the last successful sync
pub const SYSTEM_LAST_SYNC_TIME: &str = "last_sync_time";
/// Bearer credential
pub const SYSTEM_SESSION_TOKEN: &str = "session_token";
/// Expiry of the bearer credential, unix seconds
pub const SYSTEM_SESSION_TOKEN_EXPIRY: &str = "session_token_expiry";

const BOOK_COLUMNS: &str = "uuid, name, usn, deleted, dirty, added_on";
const NOTE_COLUMNS: &str =
    "uuid, book_uuid, body, public, added_on, edited_on, usn, deleted, dirty";

/// Stored login session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub key: String,
    /// Unix seconds
    pub expires_at: i64,
}

impl Session {
    /// Whether the session has expired at `now` (unix seconds)
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// A local edit to a book
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookMutation {
    Rename(String),
    /// Soft delete; the name is swapped for a placeholder
    Delete,
}

/// Field changes for a note edit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteEdit {
    pub body: Option<String>,
    pub book_uuid: Option<Uuid>,
    pub public: Option<bool>,
}

/// A local edit to a note
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteMutation {
    Edit(NoteEdit),
    /// Soft delete; the body is cleared
    Delete,
}

/// What applying a server row did to the local replica
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No local row existed
    Inserted,
    /// A clean local row was overwritten
    Replaced,
    /// A dirty local row kept its content and adopted the server USN
    KeptLocal,
}

/// Rows awaiting push, in push order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySet {
    pub books: Vec<Book>,
    pub notes: Vec<Note>,
}

impl DirtySet {
    pub fn is_empty(&self) -> bool {
        self.books.is_empty() && self.notes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.books.len() + self.notes.len()
    }
}

/// Local replica of books and notes
pub struct LocalStore {
    conn: Connection,
    clock: Arc<dyn Clock>,
}

impl LocalStore {
    /// Open the database configured for this user
    pub fn open(config: &Config) -> StoreResult<Self> {
        Self::open_path(&config.database_path(), Arc::new(SystemClock))
    }

    /// Open or create a database at `path`
    pub fn open_path(path: &Path, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        Self::with_connection(conn, clock)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory(clock: Arc<dyn Clock>) -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, clock)
    }

    fn with_connection(conn: Connection, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        if needs_init(&conn) {
            debug!("Initializing local schema");
            init_schema(&conn)?;
        }
        Ok(Self { conn, clock })
    }

    /// The clock used for local timestamps
    pub fn clock(&self) -> &dyn Clock {
        &*self.clock
    }

    /// Get a reference to the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction
    pub fn begin(&mut self) -> StoreResult<StoreTx<'_>> {
        let clock: &dyn Clock = &*self.clock;
        let tx = self.conn.transaction()?;
        Ok(StoreTx { tx, clock })
    }

    // ==================== Queries ====================

    /// Get a book by uuid, deleted or not
    pub fn get_book(&self, uuid: Uuid) -> StoreResult<Option<Book>> {
        query_book(&self.conn, uuid)
    }

    /// Get a note by uuid, deleted or not
    pub fn get_note(&self, uuid: Uuid) -> StoreResult<Option<Note>> {
        query_note(&self.conn, uuid)
    }

    /// Find a live book by name
    pub fn find_book_by_name(&self, name: &str) -> StoreResult<Option<Book>> {
        query_book_by_name(&self.conn, name)
    }

    /// All live books, by name
    pub fn list_books(&self) -> StoreResult<Vec<Book>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE deleted = 0 ORDER BY name"
        ))?;
        let books = stmt
            .query_map([], book_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(books)
    }

    /// Live notes of a book, oldest first
    pub fn list_notes(&self, book_uuid: Uuid) -> StoreResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE book_uuid = ? AND deleted = 0 ORDER BY added_on, uuid"
        ))?;
        let notes = stmt
            .query_map(params![book_uuid.to_string()], note_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    /// Rows awaiting push
    pub fn scan_dirty(&self) -> StoreResult<DirtySet> {
        query_dirty(&self.conn)
    }

    /// Count of live books
    pub fn book_count(&self) -> StoreResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM books WHERE deleted = 0", [], |row| {
                row.get(0)
            })?)
    }

    /// Count of live notes
    pub fn note_count(&self) -> StoreResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM notes WHERE deleted = 0", [], |row| {
                row.get(0)
            })?)
    }

    /// Number of dirty books and notes
    pub fn dirty_counts(&self) -> StoreResult<(i64, i64)> {
        let books = self
            .conn
            .query_row("SELECT COUNT(*) FROM books WHERE dirty = 1", [], |row| {
                row.get(0)
            })?;
        let notes = self
            .conn
            .query_row("SELECT COUNT(*) FROM notes WHERE dirty = 1", [], |row| {
                row.get(0)
            })?;
        Ok((books, notes))
    }

    /// Highest USN pulled from the server
    pub fn last_max_usn(&self) -> StoreResult<i64> {
        get_system_i64(&self.conn, SYSTEM_LAST_MAX_USN)
    }

    /// Server time of the last successful sync, unix seconds
    pub fn last_sync_time(&self) -> StoreResult<i64> {
        get_system_i64(&self.conn, SYSTEM_LAST_SYNC_TIME)
    }

    // ==================== Session ====================

    /// The stored session, if logged in
    pub fn session(&self) -> StoreResult<Option<Session>> {
        let Some(key) = get_system(&self.conn, SYSTEM_SESSION_TOKEN)? else {
            return Ok(None);
        };
        let expires_at = get_system_i64(&self.conn, SYSTEM_SESSION_TOKEN_EXPIRY)?;
        Ok(Some(Session { key, expires_at }))
    }

    /// Store a session after login
    pub fn set_session(&mut self, session: &Session) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        set_system(&tx, SYSTEM_SESSION_TOKEN, &session.key)?;
        set_system(
            &tx,
            SYSTEM_SESSION_TOKEN_EXPIRY,
            &session.expires_at.to_string(),
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Forget the stored session
    pub fn clear_session(&mut self) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM system WHERE key IN (?, ?)",
            params![SYSTEM_SESSION_TOKEN, SYSTEM_SESSION_TOKEN_EXPIRY],
        )?;
        Ok(())
    }

    // ==================== Local edits ====================

    /// Create a book locally; it is pushed on the next sync
    pub fn add_book(&mut self, name: &str) -> StoreResult<Book> {
        let name = validate_book_name(name)?;
        let tx = self.begin()?;
        if tx.find_book_by_name(&name)?.is_some() {
            return Err(StoreError::DuplicateBook(name));
        }

        let book = Book {
            uuid: Uuid::new_v4(),
            name,
            usn: 0,
            deleted: false,
            dirty: true,
            added_on: tx.clock.now_nanos(),
        };
        write_book(&tx.tx, &book)?;
        tx.commit()?;
        Ok(book)
    }

    /// Rename a live book
    pub fn rename_book(&mut self, uuid: Uuid, name: &str) -> StoreResult<Book> {
        let name = validate_book_name(name)?;
        let tx = self.begin()?;
        tx.live_book(uuid)?;
        if let Some(other) = tx.find_book_by_name(&name)? {
            if other.uuid != uuid {
                return Err(StoreError::DuplicateBook(name));
            }
        }

        let book = tx.mark_dirty_book(uuid, BookMutation::Rename(name))?;
        tx.commit()?;
        Ok(book)
    }

    /// Delete a live book and every live note in it
    pub fn remove_book(&mut self, uuid: Uuid) -> StoreResult<Book> {
        let tx = self.begin()?;
        tx.live_book(uuid)?;

        let note_uuids: Vec<Uuid> = {
            let mut stmt = tx
                .tx
                .prepare("SELECT uuid FROM notes WHERE book_uuid = ? AND deleted = 0")?;
            let uuids = stmt
                .query_map(params![uuid.to_string()], |row| uuid_column(row, 0))?
                .collect::<Result<Vec<_>, _>>()?;
            uuids
        };
        for note_uuid in note_uuids {
            tx.mark_dirty_note(note_uuid, NoteMutation::Delete)?;
        }

        let book = tx.mark_dirty_book(uuid, BookMutation::Delete)?;
        tx.commit()?;
        Ok(book)
    }

    /// Create a note in a live book
    pub fn add_note(&mut self, book_uuid: Uuid, body: &str) -> StoreResult<Note> {
        let tx = self.begin()?;
        tx.live_book(book_uuid)?;

        let now = tx.clock.now_nanos();
        let note = Note {
            uuid: Uuid::new_v4(),
            book_uuid,
            body: body.to_string(),
            public: false,
            added_on: now,
            edited_on: now,
            usn: 0,
            deleted: false,
            dirty: true,
        };
        write_note(&tx.tx, &note)?;
        tx.commit()?;
        Ok(note)
    }

    /// Edit a live note
    pub fn edit_note(&mut self, uuid: Uuid, edit: NoteEdit) -> StoreResult<Note> {
        let tx = self.begin()?;
        tx.live_note(uuid)?;
        if let Some(book_uuid) = edit.book_uuid {
            tx.live_book(book_uuid)?;
        }

        let note = tx.mark_dirty_note(uuid, NoteMutation::Edit(edit))?;
        tx.commit()?;
        Ok(note)
    }

    /// Delete a live note
    pub fn remove_note(&mut self, uuid: Uuid) -> StoreResult<Note> {
        let tx = self.begin()?;
        tx.live_note(uuid)?;
        let note = tx.mark_dirty_note(uuid, NoteMutation::Delete)?;
        tx.commit()?;
        Ok(note)
    }
}

/// A transaction on the local replica
///
/// Dropping it without `commit` rolls back.
pub struct StoreTx<'a> {
    tx: Transaction<'a>,
    clock: &'a dyn Clock,
}

impl StoreTx<'_> {
    pub fn commit(self) -> StoreResult<()> {
        self.tx.commit()?;
        Ok(())
    }

    pub fn rollback(self) -> StoreResult<()> {
        self.tx.rollback()?;
        Ok(())
    }

    pub fn get_book(&self, uuid: Uuid) -> StoreResult<Option<Book>> {
        query_book(&self.tx, uuid)
    }

    pub fn get_note(&self, uuid: Uuid) -> StoreResult<Option<Note>> {
        query_note(&self.tx, uuid)
    }

    pub fn find_book_by_name(&self, name: &str) -> StoreResult<Option<Book>> {
        query_book_by_name(&self.tx, name)
    }

    fn live_book(&self, uuid: Uuid) -> StoreResult<Book> {
        match self.get_book(uuid)? {
            Some(book) if !book.deleted => Ok(book),
            _ => Err(StoreError::BookNotFound(uuid.to_string())),
        }
    }

    fn live_note(&self, uuid: Uuid) -> StoreResult<Note> {
        match self.get_note(uuid)? {
            Some(note) if !note.deleted => Ok(note),
            _ => Err(StoreError::NoteNotFound(uuid)),
        }
    }

    // ==================== Bookkeeping ====================

    pub fn last_max_usn(&self) -> StoreResult<i64> {
        get_system_i64(&self.tx, SYSTEM_LAST_MAX_USN)
    }

    pub fn set_last_max_usn(&self, usn: i64) -> StoreResult<()> {
        set_system(&self.tx, SYSTEM_LAST_MAX_USN, &usn.to_string())
    }

    pub fn last_sync_time(&self) -> StoreResult<i64> {
        get_system_i64(&self.tx, SYSTEM_LAST_SYNC_TIME)
    }

    pub fn set_last_sync_time(&self, secs: i64) -> StoreResult<()> {
        set_system(&self.tx, SYSTEM_LAST_SYNC_TIME, &secs.to_string())
    }

    // ==================== Server rows ====================

    /// Apply a book received from the server
    ///
    /// Never marks the row dirty. A dirty local row keeps its content and
    /// only adopts the server USN as the base for its next push.
    pub fn upsert_book_from_server(&self, record: &BookRecord) -> StoreResult<MergeOutcome> {
        match self.get_book(record.uuid)? {
            None => {
                write_book(&self.tx, &Book::from(record))?;
                Ok(MergeOutcome::Inserted)
            }
            Some(local) if !local.dirty => {
                let mut incoming = Book::from(record);
                if local.deleted && incoming.deleted {
                    incoming.name = local.name;
                }
                write_book(&self.tx, &incoming)?;
                Ok(MergeOutcome::Replaced)
            }
            Some(_) => {
                self.tx.execute(
                    "UPDATE books SET usn = ? WHERE uuid = ?",
                    params![record.usn, record.uuid.to_string()],
                )?;
                Ok(MergeOutcome::KeptLocal)
            }
        }
    }

    /// Apply a note received from the server
    pub fn upsert_note_from_server(&self, record: &NoteRecord) -> StoreResult<MergeOutcome> {
        match self.get_note(record.uuid)? {
            None => {
                write_note(&self.tx, &Note::from(record))?;
                Ok(MergeOutcome::Inserted)
            }
            Some(local) if !local.dirty => {
                write_note(&self.tx, &Note::from(record))?;
                Ok(MergeOutcome::Replaced)
            }
            Some(_) => {
                self.tx.execute(
                    "UPDATE notes SET usn = ? WHERE uuid = ?",
                    params![record.usn, record.uuid.to_string()],
                )?;
                Ok(MergeOutcome::KeptLocal)
            }
        }
    }

    /// Record the server's acknowledgment of a pushed book
    ///
    /// Adopts the server uuid (re-pointing notes that referenced the
    /// provisional one), the new USN and the server's copy of the fields,
    /// and clears `dirty`.
    pub fn acknowledge_book(&self, local_uuid: Uuid, record: &BookRecord) -> StoreResult<Book> {
        let local = self
            .get_book(local_uuid)?
            .ok_or_else(|| StoreError::BookNotFound(local_uuid.to_string()))?;

        if local_uuid != record.uuid {
            self.tx.execute(
                "UPDATE books SET uuid = ? WHERE uuid = ?",
                params![record.uuid.to_string(), local_uuid.to_string()],
            )?;
            let moved = self.tx.execute(
                "UPDATE notes SET book_uuid = ? WHERE book_uuid = ?",
                params![record.uuid.to_string(), local_uuid.to_string()],
            )?;
            debug!(
                "Book {} is now {} ({} notes re-pointed)",
                local_uuid, record.uuid, moved
            );
        }

        let mut book = Book::from(record);
        if book.deleted && local.deleted {
            book.name = local.name;
        }
        write_book(&self.tx, &book)?;
        Ok(book)
    }

    /// Record the server's acknowledgment of a pushed note
    pub fn acknowledge_note(&self, local_uuid: Uuid, record: &NoteRecord) -> StoreResult<Note> {
        if self.get_note(local_uuid)?.is_none() {
            return Err(StoreError::NoteNotFound(local_uuid));
        }

        if local_uuid != record.uuid {
            self.tx.execute(
                "UPDATE notes SET uuid = ? WHERE uuid = ?",
                params![record.uuid.to_string(), local_uuid.to_string()],
            )?;
        }

        let note = Note::from(record);
        write_note(&self.tx, &note)?;
        Ok(note)
    }

    // ==================== Local mutations ====================

    /// Apply a local edit to a book and mark it dirty
    ///
    /// `usn` is left unchanged. No uniqueness check happens here; the
    /// server enforces live-name uniqueness when the row is pushed.
    pub fn mark_dirty_book(&self, uuid: Uuid, mutation: BookMutation) -> StoreResult<Book> {
        let mut book = self
            .get_book(uuid)?
            .ok_or_else(|| StoreError::BookNotFound(uuid.to_string()))?;

        match mutation {
            BookMutation::Rename(name) => book.name = name,
            BookMutation::Delete => {
                book.deleted = true;
                book.name = deleted_book_placeholder();
            }
        }
        book.dirty = true;

        write_book(&self.tx, &book)?;
        Ok(book)
    }

    /// Apply a local edit to a note and mark it dirty
    pub fn mark_dirty_note(&self, uuid: Uuid, mutation: NoteMutation) -> StoreResult<Note> {
        let mut note = self
            .get_note(uuid)?
            .ok_or(StoreError::NoteNotFound(uuid))?;

        match mutation {
            NoteMutation::Edit(edit) => {
                if let Some(body) = edit.body {
                    note.body = body;
                }
                if let Some(book_uuid) = edit.book_uuid {
                    note.book_uuid = book_uuid;
                }
                if let Some(public) = edit.public {
                    note.public = public;
                }
                note.edited_on = self.clock.now_nanos();
            }
            NoteMutation::Delete => {
                note.deleted = true;
                note.body.clear();
            }
        }
        note.dirty = true;

        write_note(&self.tx, &note)?;
        Ok(note)
    }

    /// Rows awaiting push: books before notes, each by ascending USN with
    /// never-synced rows last
    pub fn scan_dirty(&self) -> StoreResult<DirtySet> {
        query_dirty(&self.tx)
    }

    // ==================== Physical removal ====================

    /// Physically remove a book row; returns whether it existed
    pub fn expunge_book(&self, uuid: Uuid) -> StoreResult<bool> {
        let n = self.tx.execute(
            "DELETE FROM books WHERE uuid = ?",
            params![uuid.to_string()],
        )?;
        Ok(n > 0)
    }

    /// Physically remove a note row; returns whether it existed
    pub fn expunge_note(&self, uuid: Uuid) -> StoreResult<bool> {
        let n = self.tx.execute(
            "DELETE FROM notes WHERE uuid = ?",
            params![uuid.to_string()],
        )?;
        Ok(n > 0)
    }

    /// Remove every clean row whose uuid is not in the given sets
    ///
    /// Used after a full sync: clean rows the server no longer reports are
    /// gone remotely. Dirty rows are kept.
    pub fn remove_clean_rows_except(
        &self,
        books: &HashSet<Uuid>,
        notes: &HashSet<Uuid>,
    ) -> StoreResult<usize> {
        let mut removed = 0;

        for uuid in self.clean_uuids("books")? {
            if !books.contains(&uuid) && self.expunge_book(uuid)? {
                removed += 1;
            }
        }
        for uuid in self.clean_uuids("notes")? {
            if !notes.contains(&uuid) && self.expunge_note(uuid)? {
                removed += 1;
            }
        }

        Ok(removed)
    }

    fn clean_uuids(&self, table: &str) -> StoreResult<Vec<Uuid>> {
        let mut stmt = self
            .tx
            .prepare(&format!("SELECT uuid FROM {table} WHERE dirty = 0"))?;
        let uuids = stmt
            .query_map([], |row| uuid_column(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(uuids)
    }
}

// ==================== Row helpers ====================

fn validate_book_name(name: &str) -> StoreResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::InvalidBookName(name.to_string()));
    }
    Ok(name.to_string())
}

fn uuid_column(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let value: String = row.get(idx)?;
    Uuid::parse_str(&value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn book_from_row(row: &Row) -> rusqlite::Result<Book> {
    Ok(Book {
        uuid: uuid_column(row, 0)?,
        name: row.get(1)?,
        usn: row.get(2)?,
        deleted: row.get(3)?,
        dirty: row.get(4)?,
        added_on: row.get(5)?,
    })
}

fn note_from_row(row: &Row) -> rusqlite::Result<Note> {
    Ok(Note {
        uuid: uuid_column(row, 0)?,
        book_uuid: uuid_column(row, 1)?,
        body: row.get(2)?,
        public: row.get(3)?,
        added_on: row.get(4)?,
        edited_on: row.get(5)?,
        usn: row.get(6)?,
        deleted: row.get(7)?,
        dirty: row.get(8)?,
    })
}

fn query_book(conn: &Connection, uuid: Uuid) -> StoreResult<Option<Book>> {
    let book = conn
        .query_row(
            &format!("SELECT {BOOK_COLUMNS} FROM books WHERE uuid = ?"),
            params![uuid.to_string()],
            book_from_row,
        )
        .optional()?;
    Ok(book)
}

fn query_book_by_name(conn: &Connection, name: &str) -> StoreResult<Option<Book>> {
    let book = conn
        .query_row(
            &format!(
                "SELECT {BOOK_COLUMNS} FROM books WHERE name = ? AND deleted = 0 \
                 ORDER BY usn = 0, usn LIMIT 1"
            ),
            params![name],
            book_from_row,
        )
        .optional()?;
    Ok(book)
}

fn query_note(conn: &Connection, uuid: Uuid) -> StoreResult<Option<Note>> {
    let note = conn
        .query_row(
            &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE uuid = ?"),
            params![uuid.to_string()],
            note_from_row,
        )
        .optional()?;
    Ok(note)
}

fn query_dirty(conn: &Connection) -> StoreResult<DirtySet> {
    let books = {
        let mut stmt = conn.prepare(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE dirty = 1 \
             ORDER BY usn = 0, usn, added_on, uuid"
        ))?;
        let books = stmt
            .query_map([], book_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        books
    };

    let notes = {
        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE dirty = 1 \
             ORDER BY usn = 0, usn, added_on, uuid"
        ))?;
        let notes = stmt
            .query_map([], note_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        notes
    };

    Ok(DirtySet { books, notes })
}

fn write_book(conn: &Connection, book: &Book) -> StoreResult<()> {
    conn.execute(
        r#"
        INSERT INTO books (uuid, name, usn, deleted, dirty, added_on)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(uuid) DO UPDATE SET
            name = excluded.name,
            usn = excluded.usn,
            deleted = excluded.deleted,
            dirty = excluded.dirty,
            added_on = excluded.added_on
        "#,
        params![
            book.uuid.to_string(),
            book.name,
            book.usn,
            book.deleted,
            book.dirty,
            book.added_on,
        ],
    )?;
    Ok(())
}

fn write_note(conn: &Connection, note: &Note) -> StoreResult<()> {
    conn.execute(
        r#"
        INSERT INTO notes (uuid, book_uuid, body, public, added_on, edited_on, usn, deleted, dirty)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(uuid) DO UPDATE SET
            book_uuid = excluded.book_uuid,
            body = excluded.body,
            public = excluded.public,
            added_on = excluded.added_on,
            edited_on = excluded.edited_on,
            usn = excluded.usn,
            deleted = excluded.deleted,
            dirty = excluded.dirty
        "#,
        params![
            note.uuid.to_string(),
            note.book_uuid.to_string(),
            note.body,
            note.public,
            note.added_on,
            note.edited_on,
            note.usn,
            note.deleted,
            note.dirty,
        ],
    )?;
    Ok(())
}

fn get_system(conn: &Connection, key: &str) -> StoreResult<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM system WHERE key = ?",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

/// Integer system value; absent keys read as 0
fn get_system_i64(conn: &Connection, key: &str) -> StoreResult<i64> {
    match get_system(conn, key)? {
        None => Ok(0),
        Some(value) => value.parse().map_err(|_| StoreError::Corrupt {
            key: key.to_string(),
            details: format!("expected an integer, found '{}'", value),
        }),
    }
}

fn set_system(conn: &Connection, key: &str, value: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO system (key, value) VALUES (?, ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

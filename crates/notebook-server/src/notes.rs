//! Note operations
//!
//! Like books, every mutation takes a fresh USN inside the caller's write
//! transaction. A note always references a book of the same user.

use notebook_core::api::{CreateNoteRequest, NoteRecord, UpdateNoteRequest};
use notebook_core::Clock;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use crate::books::get_live_book;
use crate::db::uuid_column;
use crate::error::{ServiceError, ServiceResult};
use crate::usn;

const NOTE_COLUMNS: &str = "uuid, book_uuid, body, public, added_on, edited_on, usn, deleted";

fn note_from_row(row: &Row) -> rusqlite::Result<NoteRecord> {
    Ok(NoteRecord {
        uuid: uuid_column(row, 0)?,
        book_uuid: uuid_column(row, 1)?,
        body: row.get(2)?,
        public: row.get(3)?,
        added_on: row.get(4)?,
        edited_on: row.get(5)?,
        usn: row.get(6)?,
        deleted: row.get(7)?,
    })
}

/// Get a note owned by `user_id`, deleted or not
pub fn get_note(conn: &Connection, user_id: i64, uuid: Uuid) -> ServiceResult<Option<NoteRecord>> {
    let note = conn
        .query_row(
            &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE uuid = ? AND user_id = ?"),
            params![uuid.to_string(), user_id],
            note_from_row,
        )
        .optional()?;
    Ok(note)
}

fn owned_note(conn: &Connection, user_id: i64, uuid: Uuid) -> ServiceResult<NoteRecord> {
    get_note(conn, user_id, uuid)?.ok_or_else(|| ServiceError::NotFound(format!("note {}", uuid)))
}

fn write_note(conn: &Connection, note: &NoteRecord) -> ServiceResult<()> {
    conn.execute(
        "UPDATE notes SET book_uuid = ?, body = ?, public = ?, edited_on = ?, usn = ?, deleted = ? \
         WHERE uuid = ?",
        params![
            note.book_uuid.to_string(),
            note.body,
            note.public,
            note.edited_on,
            note.usn,
            note.deleted,
            note.uuid.to_string(),
        ],
    )?;
    Ok(())
}

/// Create a note in a live book of the user
///
/// Fails with `NotFound` when the book is absent, deleted, or owned by
/// someone else.
pub fn create_note(
    conn: &Connection,
    clock: &dyn Clock,
    user_id: i64,
    req: &CreateNoteRequest,
) -> ServiceResult<NoteRecord> {
    if get_live_book(conn, user_id, req.book_uuid)?.is_none() {
        return Err(ServiceError::NotFound(format!("book {}", req.book_uuid)));
    }

    let usn = usn::increment(conn, user_id)?;
    let now = clock.now_nanos();
    let added_on = req.added_on.unwrap_or(now);
    let note = NoteRecord {
        uuid: Uuid::new_v4(),
        book_uuid: req.book_uuid,
        body: req.content.clone(),
        public: req.public.unwrap_or(false),
        added_on,
        edited_on: req.edited_on.unwrap_or(added_on),
        usn,
        deleted: false,
    };

    conn.execute(
        &format!(
            "INSERT INTO notes (user_id, {NOTE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ),
        params![
            user_id,
            note.uuid.to_string(),
            note.book_uuid.to_string(),
            note.body,
            note.public,
            note.added_on,
            note.edited_on,
            note.usn,
            note.deleted,
        ],
    )?;
    debug!("Created note {} at usn {}", note.uuid, usn);
    Ok(note)
}

/// Apply a partial update; an update to a deleted note restores it
///
/// Moving the note into a book that is absent or deleted is a validation
/// error rather than `NotFound`, so it cannot be mistaken for a missing note.
/// A `book_uuid` equal to the current one is not a move and is accepted even
/// if that book has since been deleted.
pub fn update_note(
    conn: &Connection,
    clock: &dyn Clock,
    user_id: i64,
    uuid: Uuid,
    req: &UpdateNoteRequest,
) -> ServiceResult<NoteRecord> {
    let mut note = owned_note(conn, user_id, uuid)?;

    if let Some(book_uuid) = req.book_uuid.filter(|b| *b != note.book_uuid) {
        if get_live_book(conn, user_id, book_uuid)?.is_none() {
            return Err(ServiceError::Validation(format!(
                "book {} does not exist",
                book_uuid
            )));
        }
        note.book_uuid = book_uuid;
    }
    if let Some(content) = &req.content {
        note.body = content.clone();
    }
    if let Some(public) = req.public {
        note.public = public;
    }

    note.deleted = false;
    note.edited_on = clock.now_nanos();
    note.usn = usn::increment(conn, user_id)?;
    write_note(conn, &note)?;
    debug!("Updated note {} at usn {}", uuid, note.usn);
    Ok(note)
}

/// Soft delete a note; a note that is already deleted is returned unchanged
pub fn delete_note(
    conn: &Connection,
    clock: &dyn Clock,
    user_id: i64,
    uuid: Uuid,
) -> ServiceResult<NoteRecord> {
    let mut note = owned_note(conn, user_id, uuid)?;
    if note.deleted {
        return Ok(note);
    }

    note.deleted = true;
    note.body.clear();
    note.edited_on = clock.now_nanos();
    note.usn = usn::increment(conn, user_id)?;
    write_note(conn, &note)?;
    debug!("Deleted note {} at usn {}", uuid, note.usn);
    Ok(note)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::books::{create_book, delete_book};
    use crate::testutil::{add_user, note_row, test_conn};
    use notebook_core::FixedClock;

    #[test]
    fn test_create_note() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(20);
        let user = add_user(&conn, "a@example.com");
        let book = create_book(&conn, &clock, user, "js").unwrap();

        let note = create_note(&conn, &clock, user, &note_row(book.uuid, "hello")).unwrap();

        assert_eq!(note.usn, 2);
        assert_eq!(note.body, "hello");
        assert_eq!(note.book_uuid, book.uuid);
        assert_eq!(note.added_on, 20_000_000_000);
        assert_eq!(get_note(&conn, user, note.uuid).unwrap(), Some(note));
    }

    #[test]
    fn test_create_keeps_client_timestamps() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(20);
        let user = add_user(&conn, "a@example.com");
        let book = create_book(&conn, &clock, user, "js").unwrap();

        let req = CreateNoteRequest {
            added_on: Some(5),
            edited_on: Some(6),
            public: Some(true),
            ..note_row(book.uuid, "hello")
        };
        let note = create_note(&conn, &clock, user, &req).unwrap();

        assert_eq!(note.added_on, 5);
        assert_eq!(note.edited_on, 6);
        assert!(note.public);
    }

    #[test]
    fn test_create_in_missing_or_deleted_book_is_not_found() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(20);
        let user = add_user(&conn, "a@example.com");
        let book = create_book(&conn, &clock, user, "js").unwrap();
        delete_book(&conn, &clock, user, book.uuid).unwrap();

        for book_uuid in [book.uuid, Uuid::new_v4()] {
            assert!(matches!(
                create_note(&conn, &clock, user, &note_row(book_uuid, "x")),
                Err(ServiceError::NotFound(_))
            ));
        }
    }

    #[test]
    fn test_update_is_partial() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(20);
        let user = add_user(&conn, "a@example.com");
        let js = create_book(&conn, &clock, user, "js").unwrap();
        let css = create_book(&conn, &clock, user, "css").unwrap();
        let note = create_note(&conn, &clock, user, &note_row(js.uuid, "hello")).unwrap();

        clock.advance_secs(1);
        let moved = update_note(
            &conn,
            &clock,
            user,
            note.uuid,
            &UpdateNoteRequest {
                book_uuid: Some(css.uuid),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(moved.book_uuid, css.uuid);
        assert_eq!(moved.body, "hello");
        assert_eq!(moved.usn, 4);
        assert_eq!(moved.edited_on, 21_000_000_000);
        assert_eq!(moved.added_on, note.added_on);
    }

    #[test]
    fn test_update_into_deleted_book_is_invalid() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(20);
        let user = add_user(&conn, "a@example.com");
        let js = create_book(&conn, &clock, user, "js").unwrap();
        let gone = create_book(&conn, &clock, user, "gone").unwrap();
        delete_book(&conn, &clock, user, gone.uuid).unwrap();
        let note = create_note(&conn, &clock, user, &note_row(js.uuid, "hello")).unwrap();

        let result = update_note(
            &conn,
            &clock,
            user,
            note.uuid,
            &UpdateNoteRequest {
                book_uuid: Some(gone.uuid),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_update_in_place_after_book_deleted() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(20);
        let user = add_user(&conn, "a@example.com");
        let js = create_book(&conn, &clock, user, "js").unwrap();
        let note = create_note(&conn, &clock, user, &note_row(js.uuid, "hello")).unwrap();
        delete_book(&conn, &clock, user, js.uuid).unwrap();

        let edited = update_note(
            &conn,
            &clock,
            user,
            note.uuid,
            &UpdateNoteRequest {
                book_uuid: Some(js.uuid),
                content: Some("edited".to_string()),
                public: Some(false),
            },
        )
        .unwrap();

        assert_eq!(edited.book_uuid, js.uuid);
        assert_eq!(edited.body, "edited");
        assert!(!edited.deleted);
        assert_eq!(edited.usn, 5);
    }

    #[test]
    fn test_other_users_note_is_not_found() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(20);
        let alice = add_user(&conn, "alice@example.com");
        let bob = add_user(&conn, "bob@example.com");
        let book = create_book(&conn, &clock, alice, "js").unwrap();
        let note = create_note(&conn, &clock, alice, &note_row(book.uuid, "secret")).unwrap();

        assert!(matches!(
            delete_note(&conn, &clock, bob, note.uuid),
            Err(ServiceError::NotFound(_))
        ));
        assert!(get_note(&conn, bob, note.uuid).unwrap().is_none());
    }

    #[test]
    fn test_delete_clears_body_and_is_idempotent() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(20);
        let user = add_user(&conn, "a@example.com");
        let book = create_book(&conn, &clock, user, "js").unwrap();
        let note = create_note(&conn, &clock, user, &note_row(book.uuid, "hello")).unwrap();

        let deleted = delete_note(&conn, &clock, user, note.uuid).unwrap();
        assert!(deleted.deleted);
        assert!(deleted.body.is_empty());
        assert_eq!(deleted.usn, 3);

        let again = delete_note(&conn, &clock, user, note.uuid).unwrap();
        assert_eq!(again, deleted);
        assert_eq!(usn::current(&conn, user).unwrap(), 3);
    }

    #[test]
    fn test_update_restores_deleted_note() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(20);
        let user = add_user(&conn, "a@example.com");
        let book = create_book(&conn, &clock, user, "js").unwrap();
        let note = create_note(&conn, &clock, user, &note_row(book.uuid, "hello")).unwrap();
        delete_note(&conn, &clock, user, note.uuid).unwrap();

        let restored = update_note(
            &conn,
            &clock,
            user,
            note.uuid,
            &UpdateNoteRequest {
                content: Some("back".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        assert!(!restored.deleted);
        assert_eq!(restored.body, "back");
    }
}

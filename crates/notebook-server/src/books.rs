//! Book operations
//!
//! Each function runs inside the caller's write transaction, takes a fresh
//! USN per mutated row and never touches another user's rows. Live book
//! names are unique per user.

use notebook_core::api::{BookRecord, UpdateBookRequest};
use notebook_core::Clock;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use crate::db::uuid_column;
use crate::error::{ServiceError, ServiceResult};
use crate::usn;

const BOOK_COLUMNS: &str = "uuid, name, usn, deleted, added_on";

fn book_from_row(row: &Row) -> rusqlite::Result<BookRecord> {
    Ok(BookRecord {
        uuid: uuid_column(row, 0)?,
        name: row.get(1)?,
        usn: row.get(2)?,
        deleted: row.get(3)?,
        added_on: row.get(4)?,
    })
}

/// Get a book owned by `user_id`, deleted or not
pub fn get_book(conn: &Connection, user_id: i64, uuid: Uuid) -> ServiceResult<Option<BookRecord>> {
    let book = conn
        .query_row(
            &format!("SELECT {BOOK_COLUMNS} FROM books WHERE uuid = ? AND user_id = ?"),
            params![uuid.to_string(), user_id],
            book_from_row,
        )
        .optional()?;
    Ok(book)
}

/// Get a live book owned by `user_id`
pub fn get_live_book(
    conn: &Connection,
    user_id: i64,
    uuid: Uuid,
) -> ServiceResult<Option<BookRecord>> {
    Ok(get_book(conn, user_id, uuid)?.filter(|book| !book.deleted))
}

fn owned_book(conn: &Connection, user_id: i64, uuid: Uuid) -> ServiceResult<BookRecord> {
    get_book(conn, user_id, uuid)?.ok_or_else(|| ServiceError::NotFound(format!("book {}", uuid)))
}

fn validate_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation(
            "book name must not be empty".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Fail with `Conflict` if another live book of the user has `name`
fn ensure_name_free(
    conn: &Connection,
    user_id: i64,
    name: &str,
    except: Option<Uuid>,
) -> ServiceResult<()> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT uuid FROM books WHERE user_id = ? AND name = ? AND deleted = 0",
            params![user_id, name],
            |row| row.get(0),
        )
        .optional()?;

    let except = except.map(|uuid| uuid.to_string());
    match existing {
        Some(uuid) if except.as_deref() != Some(uuid.as_str()) => Err(ServiceError::Conflict(
            format!("duplicate book name: {}", name),
        )),
        _ => Ok(()),
    }
}

/// Create a live book
pub fn create_book(
    conn: &Connection,
    clock: &dyn Clock,
    user_id: i64,
    name: &str,
) -> ServiceResult<BookRecord> {
    let name = validate_name(name)?;
    ensure_name_free(conn, user_id, &name, None)?;

    let usn = usn::increment(conn, user_id)?;
    let now = clock.now_nanos();
    let book = BookRecord {
        uuid: Uuid::new_v4(),
        name,
        usn,
        deleted: false,
        added_on: now,
    };

    conn.execute(
        "INSERT INTO books (uuid, user_id, name, usn, deleted, added_on, edited_on) \
         VALUES (?, ?, ?, ?, 0, ?, ?)",
        params![book.uuid.to_string(), user_id, book.name, usn, now, now],
    )?;
    debug!("Created book {} at usn {}", book.uuid, usn);
    Ok(book)
}

/// Update a book; an update to a deleted book restores it
pub fn update_book(
    conn: &Connection,
    clock: &dyn Clock,
    user_id: i64,
    uuid: Uuid,
    req: &UpdateBookRequest,
) -> ServiceResult<BookRecord> {
    let existing = owned_book(conn, user_id, uuid)?;

    let name = match &req.name {
        Some(name) => validate_name(name)?,
        None if existing.deleted => {
            return Err(ServiceError::Validation(
                "a name is required to restore a deleted book".to_string(),
            ))
        }
        None => existing.name.clone(),
    };
    ensure_name_free(conn, user_id, &name, Some(uuid))?;

    let usn = usn::increment(conn, user_id)?;
    conn.execute(
        "UPDATE books SET name = ?, usn = ?, deleted = 0, edited_on = ? WHERE uuid = ?",
        params![name, usn, clock.now_nanos(), uuid.to_string()],
    )?;
    debug!("Updated book {} at usn {}", uuid, usn);

    Ok(BookRecord {
        name,
        usn,
        deleted: false,
        ..existing
    })
}

/// Soft delete a book and every live note in it
///
/// Notes are deleted first, each with its own USN, then the book. A book
/// that is already deleted is returned unchanged.
pub fn delete_book(
    conn: &Connection,
    clock: &dyn Clock,
    user_id: i64,
    uuid: Uuid,
) -> ServiceResult<BookRecord> {
    let existing = owned_book(conn, user_id, uuid)?;
    if existing.deleted {
        return Ok(existing);
    }

    let now = clock.now_nanos();
    let note_uuids: Vec<String> = {
        let mut stmt = conn.prepare(
            "SELECT uuid FROM notes WHERE book_uuid = ? AND user_id = ? AND deleted = 0 \
             ORDER BY usn, uuid",
        )?;
        let uuids = stmt
            .query_map(params![uuid.to_string(), user_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        uuids
    };

    for note_uuid in &note_uuids {
        let usn = usn::increment(conn, user_id)?;
        conn.execute(
            "UPDATE notes SET deleted = 1, body = '', usn = ?, edited_on = ? WHERE uuid = ?",
            params![usn, now, note_uuid],
        )?;
    }

    let usn = usn::increment(conn, user_id)?;
    conn.execute(
        "UPDATE books SET deleted = 1, name = '', usn = ?, edited_on = ? WHERE uuid = ?",
        params![usn, now, uuid.to_string()],
    )?;
    debug!(
        "Deleted book {} and {} notes, book usn {}",
        uuid,
        note_uuids.len(),
        usn
    );

    Ok(BookRecord {
        name: String::new(),
        usn,
        deleted: true,
        ..existing
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{add_user, note_row, test_conn};
    use notebook_core::FixedClock;

    #[test]
    fn test_create_assigns_sequential_usns() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(10);
        let user = add_user(&conn, "a@example.com");

        let js = create_book(&conn, &clock, user, "js").unwrap();
        let css = create_book(&conn, &clock, user, " css ").unwrap();

        assert_eq!(js.usn, 1);
        assert_eq!(css.usn, 2);
        assert_eq!(css.name, "css");
        assert_eq!(js.added_on, 10_000_000_000);
    }

    #[test]
    fn test_create_rejects_duplicate_and_empty() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(10);
        let user = add_user(&conn, "a@example.com");
        create_book(&conn, &clock, user, "js").unwrap();

        assert!(matches!(
            create_book(&conn, &clock, user, "js"),
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            create_book(&conn, &clock, user, ""),
            Err(ServiceError::Validation(_))
        ));
        // Failed writes consume no USN
        assert_eq!(usn::current(&conn, user).unwrap(), 1);
    }

    #[test]
    fn test_names_are_scoped_per_user() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(10);
        let alice = add_user(&conn, "alice@example.com");
        let bob = add_user(&conn, "bob@example.com");

        create_book(&conn, &clock, alice, "js").unwrap();
        let bobs = create_book(&conn, &clock, bob, "js").unwrap();
        assert_eq!(bobs.usn, 1);
    }

    #[test]
    fn test_update_renames_and_checks_conflicts() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(10);
        let user = add_user(&conn, "a@example.com");
        let js = create_book(&conn, &clock, user, "js").unwrap();
        create_book(&conn, &clock, user, "css").unwrap();

        let req = |name: &str| UpdateBookRequest {
            name: Some(name.to_string()),
        };
        assert!(matches!(
            update_book(&conn, &clock, user, js.uuid, &req("css")),
            Err(ServiceError::Conflict(_))
        ));

        let renamed = update_book(&conn, &clock, user, js.uuid, &req("javascript")).unwrap();
        assert_eq!(renamed.name, "javascript");
        assert_eq!(renamed.usn, 3);
        assert_eq!(renamed.added_on, js.added_on);

        // Same name as itself is not a conflict
        let same = update_book(&conn, &clock, user, js.uuid, &req("javascript")).unwrap();
        assert_eq!(same.usn, 4);
    }

    #[test]
    fn test_update_other_users_book_is_not_found() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(10);
        let alice = add_user(&conn, "alice@example.com");
        let bob = add_user(&conn, "bob@example.com");
        let js = create_book(&conn, &clock, alice, "js").unwrap();

        let result = update_book(&conn, &clock, bob, js.uuid, &UpdateBookRequest::default());
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn test_delete_cascades_notes_with_increasing_usns() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(10);
        let user = add_user(&conn, "a@example.com");
        let book = create_book(&conn, &clock, user, "b").unwrap();
        let n1 = crate::notes::create_note(&conn, &clock, user, &note_row(book.uuid, "one"))
            .unwrap();
        let n2 = crate::notes::create_note(&conn, &clock, user, &note_row(book.uuid, "two"))
            .unwrap();

        let deleted = delete_book(&conn, &clock, user, book.uuid).unwrap();

        assert!(deleted.deleted);
        assert!(deleted.name.is_empty());
        assert_eq!(deleted.usn, 6);

        let n1 = crate::notes::get_note(&conn, user, n1.uuid).unwrap().unwrap();
        let n2 = crate::notes::get_note(&conn, user, n2.uuid).unwrap().unwrap();
        assert!(n1.deleted && n2.deleted);
        assert!(n1.body.is_empty() && n2.body.is_empty());
        let mut usns = vec![n1.usn, n2.usn];
        usns.sort();
        assert_eq!(usns, vec![4, 5]);
    }

    #[test]
    fn test_delete_twice_is_unchanged() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(10);
        let user = add_user(&conn, "a@example.com");
        let book = create_book(&conn, &clock, user, "b").unwrap();

        let first = delete_book(&conn, &clock, user, book.uuid).unwrap();
        let second = delete_book(&conn, &clock, user, book.uuid).unwrap();

        assert_eq!(first, second);
        assert_eq!(usn::current(&conn, user).unwrap(), 2);
    }

    #[test]
    fn test_deleted_name_is_reusable_and_restore_needs_name() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(10);
        let user = add_user(&conn, "a@example.com");
        let old = create_book(&conn, &clock, user, "js").unwrap();
        delete_book(&conn, &clock, user, old.uuid).unwrap();

        create_book(&conn, &clock, user, "js").unwrap();

        assert!(matches!(
            update_book(&conn, &clock, user, old.uuid, &UpdateBookRequest::default()),
            Err(ServiceError::Validation(_))
        ));
        let restored = update_book(
            &conn,
            &clock,
            user,
            old.uuid,
            &UpdateBookRequest {
                name: Some("js-old".to_string()),
            },
        )
        .unwrap();
        assert!(!restored.deleted);
        assert_eq!(restored.name, "js-old");
    }
}

//! Sync reads
//!
//! `state` reports the user's `max_usn` and the server clock. `fragment`
//! returns rows changed after a cursor, books and notes merged in USN order
//! and cut at a row limit. `user_max_usn` and the rows are read in one
//! transaction so they describe the same snapshot.

use notebook_core::api::{BookRecord, NoteRecord, SyncFragment, SyncStateResponse};
use notebook_core::Clock;
use rusqlite::{params, Connection};

use crate::db::uuid_column;
use crate::error::ServiceResult;
use crate::usn;

/// Build the `GET /v1/sync/state` response
pub fn state(
    conn: &Connection,
    clock: &dyn Clock,
    user_id: i64,
    full_sync_before: i64,
) -> ServiceResult<SyncStateResponse> {
    Ok(SyncStateResponse {
        full_sync_before,
        max_usn: usn::current(conn, user_id)?,
        current_time: clock.now_secs(),
    })
}

/// Rows of `user_id` with `usn > after_usn`, at most `limit` of them
pub fn fragment(
    conn: &mut Connection,
    clock: &dyn Clock,
    user_id: i64,
    after_usn: i64,
    limit: usize,
) -> ServiceResult<SyncFragment> {
    let tx = conn.transaction()?;
    let user_max_usn = usn::current(&tx, user_id)?;
    let limit = limit.max(1);

    let mut books = {
        let mut stmt = tx.prepare(
            "SELECT uuid, name, usn, deleted, added_on FROM books \
             WHERE user_id = ? AND usn > ? ORDER BY usn LIMIT ?",
        )?;
        let books = stmt
            .query_map(params![user_id, after_usn, limit as i64], |row| {
                Ok(BookRecord {
                    uuid: uuid_column(row, 0)?,
                    name: row.get(1)?,
                    usn: row.get(2)?,
                    deleted: row.get(3)?,
                    added_on: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        books
    };

    let mut notes = {
        let mut stmt = tx.prepare(
            "SELECT uuid, book_uuid, body, public, added_on, edited_on, usn, deleted FROM notes \
             WHERE user_id = ? AND usn > ? ORDER BY usn LIMIT ?",
        )?;
        let notes = stmt
            .query_map(params![user_id, after_usn, limit as i64], |row| {
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
            })?
            .collect::<Result<Vec<_>, _>>()?;
        notes
    };
    tx.commit()?;

    // Keep the `limit` lowest USNs across both tables
    let cutoff = {
        let mut usns: Vec<i64> = books
            .iter()
            .map(|b| b.usn)
            .chain(notes.iter().map(|n| n.usn))
            .collect();
        usns.sort_unstable();
        usns.get(limit - 1).copied()
    };
    if let Some(cutoff) = cutoff {
        books.retain(|b| b.usn <= cutoff);
        notes.retain(|n| n.usn <= cutoff);
    }

    let frag_max_usn = books
        .iter()
        .map(|b| b.usn)
        .chain(notes.iter().map(|n| n.usn))
        .max()
        .unwrap_or(after_usn);

    Ok(SyncFragment {
        frag_max_usn,
        user_max_usn,
        current_time: clock.now_secs(),
        notes,
        books,
        expunged_notes: Vec::new(),
        expunged_books: Vec::new(),
    })
}

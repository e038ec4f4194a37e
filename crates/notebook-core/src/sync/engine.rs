//! Sync engine
//!
//! One `sync()` runs three phases in order:
//!
//! 1. **State**: fetch the server's `max_usn`, clock and full-sync threshold
//!    and decide between a full and an incremental pull.
//! 2. **Pull**: fetch fragments after the local cursor and merge them, one
//!    local transaction per fragment.
//! 3. **Push**: send every dirty book, then every dirty note, committing each
//!    acknowledgment on its own.
//!
//! Pushing may reveal that another device wrote in between (the returned USN
//! skips ahead of `last_max_usn`). In that case one more pull runs so the
//! replica ends caught up.
//!
//! A row the server rejects on its own merits (validation, a lost name
//! conflict, a create whose parent is gone) stays dirty while the remaining
//! rows are pushed; the first such error is returned once the sync finishes.

use std::collections::HashSet;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{SyncError, SyncResult};
use crate::api::{
    BookRecord, CreateBookRequest, CreateNoteRequest, NoteRecord, SyncFragment,
    SyncStateResponse, UpdateBookRequest, UpdateNoteRequest,
};
use crate::models::{Book, Note};
use crate::store::{BookMutation, DirtySet, LocalStore, StoreTx};

/// Server clock skew that triggers a warning, in seconds
const CLOCK_DRIFT_WARN_SECS: i64 = 60 * 60;

/// Requests the engine makes against the sync server
pub trait SyncTransport {
    fn get_sync_state(&self) -> SyncResult<SyncStateResponse>;

    fn get_sync_fragment(&self, after_usn: i64) -> SyncResult<SyncFragment>;

    fn create_book(&self, req: &CreateBookRequest) -> SyncResult<BookRecord>;

    fn update_book(&self, uuid: Uuid, req: &UpdateBookRequest) -> SyncResult<BookRecord>;

    fn delete_book(&self, uuid: Uuid) -> SyncResult<BookRecord>;

    fn create_note(&self, req: &CreateNoteRequest) -> SyncResult<NoteRecord>;

    fn update_note(&self, uuid: Uuid, req: &UpdateNoteRequest) -> SyncResult<NoteRecord>;

    fn delete_note(&self, uuid: Uuid) -> SyncResult<NoteRecord>;
}

impl<T: SyncTransport + ?Sized> SyncTransport for &T {
    fn get_sync_state(&self) -> SyncResult<SyncStateResponse> {
        (**self).get_sync_state()
    }

    fn get_sync_fragment(&self, after_usn: i64) -> SyncResult<SyncFragment> {
        (**self).get_sync_fragment(after_usn)
    }

    fn create_book(&self, req: &CreateBookRequest) -> SyncResult<BookRecord> {
        (**self).create_book(req)
    }

    fn update_book(&self, uuid: Uuid, req: &UpdateBookRequest) -> SyncResult<BookRecord> {
        (**self).update_book(uuid, req)
    }

    fn delete_book(&self, uuid: Uuid) -> SyncResult<BookRecord> {
        (**self).delete_book(uuid)
    }

    fn create_note(&self, req: &CreateNoteRequest) -> SyncResult<NoteRecord> {
        (**self).create_note(req)
    }

    fn update_note(&self, uuid: Uuid, req: &UpdateNoteRequest) -> SyncResult<NoteRecord> {
        (**self).update_note(uuid, req)
    }

    fn delete_note(&self, uuid: Uuid) -> SyncResult<NoteRecord> {
        (**self).delete_note(uuid)
    }
}

/// How the pull phase started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Pulled the whole history from USN 0
    Full,
    /// Pulled only changes after `last_max_usn`
    #[default]
    Incremental,
}

/// What a completed sync did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub pulled_books: usize,
    pub pulled_notes: usize,
    /// Local rows physically removed because the server no longer has them
    pub expunged: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Books renamed after a name conflict on push
    pub renamed: usize,
    /// Never-synced rows deleted locally before they were pushed
    pub dropped: usize,
    pub last_max_usn: i64,
}

impl SyncReport {
    /// Rows written to the server
    pub fn pushed(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    /// Rows received from the server
    pub fn pulled(&self) -> usize {
        self.pulled_books + self.pulled_notes
    }
}

/// Where a pull loop records its final bookkeeping from
#[derive(Clone, Copy)]
enum PullTarget<'a> {
    /// The state fetched at the start of the sync
    State(&'a SyncStateResponse),
    /// The last fragment of the loop
    LastFragment,
}

/// Bidirectional delta sync between a `LocalStore` and a server
pub struct SyncEngine<T> {
    transport: T,
}

impl<T: SyncTransport> SyncEngine<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run one full sync
    ///
    /// On error the store keeps every change committed so far; running
    /// `sync` again resumes where this one stopped.
    pub fn sync(&self, store: &mut LocalStore) -> SyncResult<SyncReport> {
        let state = self.transport.get_sync_state()?;
        check_clock_drift(store, &state);

        let last_max_usn = store.last_max_usn()?;
        let last_sync_time = store.last_sync_time()?;

        let mut report = SyncReport::default();
        let after_usn = if last_sync_time < state.full_sync_before {
            info!(
                "Full sync required (last sync {} < threshold {})",
                last_sync_time, state.full_sync_before
            );
            report.mode = SyncMode::Full;
            0
        } else if last_max_usn > state.max_usn {
            warn!(
                "Local cursor {} is ahead of server max_usn {}; running a full sync",
                last_max_usn, state.max_usn
            );
            report.mode = SyncMode::Full;
            0
        } else {
            last_max_usn
        };

        info!(
            "Pulling changes after usn {} (server max_usn {})",
            after_usn, state.max_usn
        );
        self.pull(
            store,
            after_usn,
            report.mode == SyncMode::Full,
            PullTarget::State(&state),
            &mut report,
        )?;

        let mut rejected = Vec::new();
        if self.push(store, &mut report, &mut rejected)? {
            let cursor = store.last_max_usn()?;
            info!("Server changed during push; pulling again after usn {}", cursor);
            self.pull(store, cursor, false, PullTarget::LastFragment, &mut report)?;
        }

        report.last_max_usn = store.last_max_usn()?;
        if !rejected.is_empty() {
            warn!(
                "Sync finished with {} rows rejected by the server; they stay dirty",
                rejected.len()
            );
            return Err(rejected.remove(0));
        }
        info!(
            "Sync complete: pulled {}, pushed {}, last_max_usn {}",
            report.pulled(),
            report.pushed(),
            report.last_max_usn
        );
        Ok(report)
    }

    // ==================== Pull ====================

    fn pull(
        &self,
        store: &mut LocalStore,
        after_usn: i64,
        full: bool,
        target: PullTarget<'_>,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let mut cursor = after_usn;
        let mut seen_books = HashSet::new();
        let mut seen_notes = HashSet::new();

        loop {
            let fragment = self.transport.get_sync_fragment(cursor)?;
            debug!(
                "Fragment after {}: {} books, {} notes, frag_max_usn {}, user_max_usn {}",
                cursor,
                fragment.books.len(),
                fragment.notes.len(),
                fragment.frag_max_usn,
                fragment.user_max_usn
            );

            let caught_up = fragment.frag_max_usn >= fragment.user_max_usn;
            let stalled = fragment.frag_max_usn <= cursor;
            if stalled && !caught_up {
                warn!(
                    "Fragment after {} made no progress toward user_max_usn {}",
                    cursor, fragment.user_max_usn
                );
            }
            let done = caught_up || stalled;

            let tx = store.begin()?;
            apply_fragment(&tx, &fragment, report)?;
            seen_books.extend(fragment.books.iter().map(|b| b.uuid));
            seen_notes.extend(fragment.notes.iter().map(|n| n.uuid));

            if caught_up {
                if full {
                    let removed = tx.remove_clean_rows_except(&seen_books, &seen_notes)?;
                    if removed > 0 {
                        info!("Removed {} local rows missing from the server", removed);
                    }
                    report.expunged += removed;
                }

                let (max_usn, current_time) = match target {
                    PullTarget::State(state) => (state.max_usn, state.current_time),
                    PullTarget::LastFragment => (fragment.user_max_usn, fragment.current_time),
                };
                tx.set_last_max_usn(max_usn)?;
                tx.set_last_sync_time(current_time)?;
            } else if done {
                // Keep the cursor at what was actually received so the next
                // sync asks again
                tx.set_last_max_usn(cursor)?;
            }
            tx.commit()?;

            if done {
                return Ok(());
            }
            cursor = fragment.frag_max_usn;
        }
    }

    // ==================== Push ====================

    /// Push every dirty row; returns whether the server is ahead of the
    /// local cursor afterwards
    ///
    /// Rows the server rejects are collected into `rejected` and left dirty.
    /// Any other error stops the push.
    fn push(
        &self,
        store: &mut LocalStore,
        report: &mut SyncReport,
        rejected: &mut Vec<SyncError>,
    ) -> SyncResult<bool> {
        let mut behind = false;

        let DirtySet { books, .. } = store.scan_dirty()?;
        if !books.is_empty() {
            info!("Pushing {} books", books.len());
        }
        for book in books {
            let uuid = book.uuid;
            match self.push_book(store, book, report) {
                Ok(ahead) => behind |= ahead,
                Err(err) if is_row_rejection(&err) => {
                    warn!("Server rejected book {}: {}", uuid, err);
                    rejected.push(err);
                }
                Err(err) => return Err(err),
            }
        }

        // Book acknowledgments may have re-pointed notes
        let DirtySet { notes, .. } = store.scan_dirty()?;
        if !notes.is_empty() {
            info!("Pushing {} notes", notes.len());
        }
        for note in notes {
            let uuid = note.uuid;
            match self.push_note(store, note, report) {
                Ok(ahead) => behind |= ahead,
                Err(err) if is_row_rejection(&err) => {
                    warn!("Server rejected note {}: {}", uuid, err);
                    rejected.push(err);
                }
                Err(err) => return Err(err),
            }
        }

        Ok(behind)
    }

    fn push_book(
        &self,
        store: &mut LocalStore,
        mut book: Book,
        report: &mut SyncReport,
    ) -> SyncResult<bool> {
        if book.is_new() && book.deleted {
            debug!("Dropping never-synced book {}", book.uuid);
            let tx = store.begin()?;
            tx.expunge_book(book.uuid)?;
            tx.commit()?;
            report.dropped += 1;
            return Ok(false);
        }

        let mut renamed = false;
        loop {
            let result = if book.is_new() {
                self.transport.create_book(&CreateBookRequest {
                    name: book.name.clone(),
                })
            } else if book.deleted {
                self.transport.delete_book(book.uuid)
            } else {
                self.transport.update_book(
                    book.uuid,
                    &UpdateBookRequest {
                        name: Some(book.name.clone()),
                    },
                )
            };

            match result {
                Ok(record) => {
                    let tx = store.begin()?;
                    tx.acknowledge_book(book.uuid, &record)?;
                    let behind = advance_cursor(&tx, record.usn)?;
                    tx.commit()?;

                    if book.is_new() {
                        report.created += 1;
                    } else if book.deleted {
                        report.deleted += 1;
                    } else {
                        report.updated += 1;
                    }
                    return Ok(behind);
                }
                Err(SyncError::Conflict(detail)) if !renamed && !book.deleted => {
                    let name = conflict_name(&book.name);
                    warn!(
                        "Book name '{}' is taken on the server ({}); renaming to '{}'",
                        book.name, detail, name
                    );
                    let tx = store.begin()?;
                    book = tx.mark_dirty_book(book.uuid, BookMutation::Rename(name))?;
                    tx.commit()?;
                    report.renamed += 1;
                    renamed = true;
                }
                Err(SyncError::NotFound(detail)) if !book.is_new() => {
                    warn!(
                        "Book {} no longer exists on the server ({}); removing it locally",
                        book.uuid, detail
                    );
                    let tx = store.begin()?;
                    tx.expunge_book(book.uuid)?;
                    tx.commit()?;
                    report.expunged += 1;
                    return Ok(false);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn push_note(
        &self,
        store: &mut LocalStore,
        note: Note,
        report: &mut SyncReport,
    ) -> SyncResult<bool> {
        if note.is_new() && note.deleted {
            debug!("Dropping never-synced note {}", note.uuid);
            let tx = store.begin()?;
            tx.expunge_note(note.uuid)?;
            tx.commit()?;
            report.dropped += 1;
            return Ok(false);
        }

        let result = if note.is_new() {
            self.transport.create_note(&CreateNoteRequest {
                book_uuid: note.book_uuid,
                content: note.body.clone(),
                added_on: Some(note.added_on),
                edited_on: Some(note.edited_on),
                public: Some(note.public),
            })
        } else if note.deleted {
            self.transport.delete_note(note.uuid)
        } else {
            self.transport.update_note(
                note.uuid,
                &UpdateNoteRequest {
                    book_uuid: Some(note.book_uuid),
                    content: Some(note.body.clone()),
                    public: Some(note.public),
                },
            )
        };

        match result {
            Ok(record) => {
                let tx = store.begin()?;
                tx.acknowledge_note(note.uuid, &record)?;
                let behind = advance_cursor(&tx, record.usn)?;
                tx.commit()?;

                if note.is_new() {
                    report.created += 1;
                } else if note.deleted {
                    report.deleted += 1;
                } else {
                    report.updated += 1;
                }
                Ok(behind)
            }
            Err(SyncError::NotFound(detail)) if !note.is_new() => {
                warn!(
                    "Note {} no longer exists on the server ({}); removing it locally",
                    note.uuid, detail
                );
                let tx = store.begin()?;
                tx.expunge_note(note.uuid)?;
                tx.commit()?;
                report.expunged += 1;
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}

/// Errors that concern one pushed row rather than the whole sync
///
/// `NotFound` only reaches here for creates; on updates and deletes it is
/// handled by expunging the local row.
fn is_row_rejection(err: &SyncError) -> bool {
    matches!(
        err,
        SyncError::Validation(_) | SyncError::Conflict(_) | SyncError::NotFound(_)
    )
}

fn apply_fragment(
    tx: &StoreTx<'_>,
    fragment: &SyncFragment,
    report: &mut SyncReport,
) -> SyncResult<()> {
    for uuid in &fragment.expunged_books {
        match tx.get_book(*uuid)? {
            Some(book) if book.dirty => {
                debug!("Keeping dirty book {} expunged on the server", uuid);
            }
            Some(_) => {
                tx.expunge_book(*uuid)?;
                report.expunged += 1;
            }
            None => {}
        }
    }

    for uuid in &fragment.expunged_notes {
        match tx.get_note(*uuid)? {
            Some(note) if note.dirty => {
                debug!("Keeping dirty note {} expunged on the server", uuid);
            }
            Some(_) => {
                tx.expunge_note(*uuid)?;
                report.expunged += 1;
            }
            None => {}
        }
    }

    for record in &fragment.books {
        tx.upsert_book_from_server(record)?;
        report.pulled_books += 1;
    }

    for record in &fragment.notes {
        tx.upsert_note_from_server(record)?;
        report.pulled_notes += 1;
    }

    Ok(())
}

/// Move `last_max_usn` forward if `usn` directly follows it
///
/// Returns true when `usn` skips ahead, meaning someone else wrote rows
/// this replica has not pulled yet.
fn advance_cursor(tx: &StoreTx<'_>, usn: i64) -> SyncResult<bool> {
    let last = tx.last_max_usn()?;
    if usn == last + 1 {
        tx.set_last_max_usn(usn)?;
        Ok(false)
    } else {
        Ok(usn > last)
    }
}

fn check_clock_drift(store: &LocalStore, state: &SyncStateResponse) {
    let drift = state.current_time - store.clock().now_secs();
    if drift.abs() > CLOCK_DRIFT_WARN_SECS {
        warn!(
            "Local clock differs from the server by {} seconds; timestamps may look out of order",
            drift
        );
    }
}

/// Disambiguated name for a book that lost a name conflict
fn conflict_name(name: &str) -> String {
    let suffix: u16 = rand::thread_rng().gen();
    format!("{}-{:04x}", name, suffix)
}

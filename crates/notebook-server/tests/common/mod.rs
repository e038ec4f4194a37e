//! Shared fixtures for end-to-end tests

#![allow(dead_code)]

use std::cell::Cell;
use std::sync::Arc;

use notebook_core::api::{
    BookRecord, CreateBookRequest, CreateNoteRequest, NoteRecord, SyncFragment,
    SyncStateResponse, UpdateBookRequest, UpdateNoteRequest,
};
use notebook_core::{FixedClock, LocalStore, SyncError, SyncResult, SyncTransport};
use notebook_server::{db, Backend, Config, ServiceError, User};
use uuid::Uuid;

pub const START_SECS: i64 = 1_700_000_000;

/// Calls the backend directly, the way the HTTP handlers do
pub struct InProcess {
    pub backend: Backend,
    pub user: User,
}

fn to_sync_error(err: ServiceError) -> SyncError {
    match err {
        ServiceError::Unauthorized | ServiceError::InvalidCredentials => {
            SyncError::Auth(err.to_string())
        }
        ServiceError::NotFound(_) => SyncError::NotFound(err.to_string()),
        ServiceError::Conflict(_) => SyncError::Conflict(err.to_string()),
        ServiceError::Validation(_) => SyncError::Validation(err.to_string()),
        ServiceError::Database(_) | ServiceError::Internal(_) => {
            SyncError::Transient(err.to_string())
        }
    }
}

impl SyncTransport for InProcess {
    fn get_sync_state(&self) -> SyncResult<SyncStateResponse> {
        self.backend.sync_state(&self.user).map_err(to_sync_error)
    }

    fn get_sync_fragment(&self, after_usn: i64) -> SyncResult<SyncFragment> {
        self.backend
            .sync_fragment(&self.user, after_usn)
            .map_err(to_sync_error)
    }

    fn create_book(&self, req: &CreateBookRequest) -> SyncResult<BookRecord> {
        self.backend
            .create_book(&self.user, &req.name)
            .map_err(to_sync_error)
    }

    fn update_book(&self, uuid: Uuid, req: &UpdateBookRequest) -> SyncResult<BookRecord> {
        self.backend
            .update_book(&self.user, uuid, req)
            .map_err(to_sync_error)
    }

    fn delete_book(&self, uuid: Uuid) -> SyncResult<BookRecord> {
        self.backend
            .delete_book(&self.user, uuid)
            .map_err(to_sync_error)
    }

    fn create_note(&self, req: &CreateNoteRequest) -> SyncResult<NoteRecord> {
        self.backend
            .create_note(&self.user, req)
            .map_err(to_sync_error)
    }

    fn update_note(&self, uuid: Uuid, req: &UpdateNoteRequest) -> SyncResult<NoteRecord> {
        self.backend
            .update_note(&self.user, uuid, req)
            .map_err(to_sync_error)
    }

    fn delete_note(&self, uuid: Uuid) -> SyncResult<NoteRecord> {
        self.backend
            .delete_note(&self.user, uuid)
            .map_err(to_sync_error)
    }
}

/// Forwards to `inner` until its call budget runs out, then fails every
/// request with `Transient` as if the connection dropped
pub struct Interrupting<T> {
    pub inner: T,
    remaining: Cell<usize>,
    calls: Cell<usize>,
}

impl<T> Interrupting<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            remaining: Cell::new(usize::MAX),
            calls: Cell::new(0),
        }
    }

    /// Let `budget` more requests through
    pub fn allow(&self, budget: usize) {
        self.remaining.set(budget);
    }

    /// Requests forwarded so far
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    fn tick(&self) -> SyncResult<()> {
        match self.remaining.get() {
            0 => Err(SyncError::Transient("connection reset".to_string())),
            n => {
                self.remaining.set(n - 1);
                self.calls.set(self.calls.get() + 1);
                Ok(())
            }
        }
    }
}

impl<T: SyncTransport> SyncTransport for Interrupting<T> {
    fn get_sync_state(&self) -> SyncResult<SyncStateResponse> {
        self.tick()?;
        self.inner.get_sync_state()
    }

    fn get_sync_fragment(&self, after_usn: i64) -> SyncResult<SyncFragment> {
        self.tick()?;
        self.inner.get_sync_fragment(after_usn)
    }

    fn create_book(&self, req: &CreateBookRequest) -> SyncResult<BookRecord> {
        self.tick()?;
        self.inner.create_book(req)
    }

    fn update_book(&self, uuid: Uuid, req: &UpdateBookRequest) -> SyncResult<BookRecord> {
        self.tick()?;
        self.inner.update_book(uuid, req)
    }

    fn delete_book(&self, uuid: Uuid) -> SyncResult<BookRecord> {
        self.tick()?;
        self.inner.delete_book(uuid)
    }

    fn create_note(&self, req: &CreateNoteRequest) -> SyncResult<NoteRecord> {
        self.tick()?;
        self.inner.create_note(req)
    }

    fn update_note(&self, uuid: Uuid, req: &UpdateNoteRequest) -> SyncResult<NoteRecord> {
        self.tick()?;
        self.inner.update_note(uuid, req)
    }

    fn delete_note(&self, uuid: Uuid) -> SyncResult<NoteRecord> {
        self.tick()?;
        self.inner.delete_note(uuid)
    }
}

pub fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::at_secs(START_SECS))
}

/// A fresh backend with one account
pub fn backend(clock: Arc<FixedClock>) -> (Backend, User) {
    backend_with(clock, &Config::default())
}

pub fn backend_with(clock: Arc<FixedClock>, config: &Config) -> (Backend, User) {
    let backend = Backend::new(db::open_in_memory().unwrap(), clock, config);
    let user = backend.create_user("alice@example.com", "secret").unwrap();
    (backend, user)
}

pub fn store(clock: Arc<FixedClock>) -> LocalStore {
    LocalStore::open_in_memory(clock).unwrap()
}

/// Every book and note of `user` as the server sees them
pub fn server_rows(backend: &Backend, user: &User) -> (Vec<BookRecord>, Vec<NoteRecord>) {
    let (mut books, mut notes) = (Vec::new(), Vec::new());
    let mut after_usn = 0;
    loop {
        let frag = backend.sync_fragment(user, after_usn).unwrap();
        let (frag_max_usn, user_max_usn) = (frag.frag_max_usn, frag.user_max_usn);
        books.extend(frag.books);
        notes.extend(frag.notes);
        if frag_max_usn >= user_max_usn {
            return (books, notes);
        }
        assert!(frag_max_usn > after_usn, "fragment after {} made no progress", after_usn);
        after_usn = frag_max_usn;
    }
}

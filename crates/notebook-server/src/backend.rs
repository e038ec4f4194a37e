//! Service facade
//!
//! `Backend` owns the database connection, the clock and the sync policy.
//! Every public method is one transaction: writers take the SQLite write
//! lock up front (`BEGIN IMMEDIATE`), so USN allocation for a user is
//! serialized and commits land in USN order. Methods are blocking; the HTTP
//! layer calls them from `spawn_blocking`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use notebook_core::api::{
    BookRecord, CreateNoteRequest, LoginResponse, NoteRecord, SyncFragment, SyncStateResponse,
    UpdateBookRequest, UpdateNoteRequest,
};
use notebook_core::Clock;
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{ServiceError, ServiceResult};
use crate::session::User;
use crate::{books, fragment, notes, session};

struct Inner {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
    fragment_limit: usize,
    session_ttl_secs: i64,
    full_sync_before: AtomicI64,
}

/// Shared handle to the server's storage and services
#[derive(Clone)]
pub struct Backend {
    inner: Arc<Inner>,
}

impl Backend {
    pub fn new(conn: Connection, clock: Arc<dyn Clock>, config: &Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                conn: Mutex::new(conn),
                clock,
                fragment_limit: config.fragment_limit,
                session_ttl_secs: config.session_ttl_secs,
                full_sync_before: AtomicI64::new(config.full_sync_before),
            }),
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        &*self.inner.clock
    }

    /// Force clients whose last sync is older than `epoch_secs` to full sync
    pub fn set_full_sync_before(&self, epoch_secs: i64) {
        self.inner
            .full_sync_before
            .store(epoch_secs, Ordering::SeqCst);
    }

    pub fn full_sync_before(&self) -> i64 {
        self.inner.full_sync_before.load(Ordering::SeqCst)
    }

    fn lock(&self) -> ServiceResult<MutexGuard<'_, Connection>> {
        self.inner
            .conn
            .lock()
            .map_err(|_| ServiceError::Internal("database lock poisoned".to_string()))
    }

    /// Run `f` in a write transaction, committing on success
    fn write<T>(
        &self,
        f: impl FnOnce(&Connection, &dyn Clock) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&*tx, self.clock())?;
        tx.commit()?;
        Ok(value)
    }

    // ==================== Accounts ====================

    pub fn create_user(&self, email: &str, password: &str) -> ServiceResult<User> {
        self.write(|conn, clock| session::create_user(conn, clock, email, password))
    }

    pub fn login(&self, email: &str, password: &str) -> ServiceResult<LoginResponse> {
        let ttl = self.inner.session_ttl_secs;
        self.write(|conn, clock| session::login(conn, clock, ttl, email, password))
    }

    pub fn authenticate(&self, key: &str) -> ServiceResult<User> {
        self.write(|conn, clock| session::authenticate(conn, clock, key))?
            .ok_or(ServiceError::Unauthorized)
    }

    pub fn logout(&self, key: &str) -> ServiceResult<()> {
        self.write(|conn, _| session::logout(conn, key))
    }

    // ==================== Sync reads ====================

    pub fn sync_state(&self, user: &User) -> ServiceResult<SyncStateResponse> {
        let conn = self.lock()?;
        fragment::state(&conn, self.clock(), user.id, self.full_sync_before())
    }

    pub fn sync_fragment(&self, user: &User, after_usn: i64) -> ServiceResult<SyncFragment> {
        let mut conn = self.lock()?;
        fragment::fragment(
            &mut conn,
            self.clock(),
            user.id,
            after_usn,
            self.inner.fragment_limit,
        )
    }

    // ==================== Books ====================

    pub fn create_book(&self, user: &User, name: &str) -> ServiceResult<BookRecord> {
        self.write(|conn, clock| books::create_book(conn, clock, user.id, name))
    }

    pub fn update_book(
        &self,
        user: &User,
        uuid: Uuid,
        req: &UpdateBookRequest,
    ) -> ServiceResult<BookRecord> {
        self.write(|conn, clock| books::update_book(conn, clock, user.id, uuid, req))
    }

    pub fn delete_book(&self, user: &User, uuid: Uuid) -> ServiceResult<BookRecord> {
        self.write(|conn, clock| books::delete_book(conn, clock, user.id, uuid))
    }

    // ==================== Notes ====================

    pub fn create_note(&self, user: &User, req: &CreateNoteRequest) -> ServiceResult<NoteRecord> {
        self.write(|conn, clock| notes::create_note(conn, clock, user.id, req))
    }

    pub fn update_note(
        &self,
        user: &User,
        uuid: Uuid,
        req: &UpdateNoteRequest,
    ) -> ServiceResult<NoteRecord> {
        self.write(|conn, clock| notes::update_note(conn, clock, user.id, uuid, req))
    }

    pub fn delete_note(&self, user: &User, uuid: Uuid) -> ServiceResult<NoteRecord> {
        self.write(|conn, clock| notes::delete_note(conn, clock, user.id, uuid))
    }
}

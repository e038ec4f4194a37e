//! Notebook Core Library
//!
//! This crate provides the client side of notebook, a personal store of
//! books and notes that lives in a local SQLite database and replicates to
//! a remote server through a delta sync protocol.
//!
//! # Architecture
//!
//! - **LocalStore**: SQLite replica of the user's books and notes, plus the
//!   `system` key/value table holding sync bookkeeping and the session.
//! - **SyncEngine**: pulls change fragments ordered by update sequence
//!   number (USN), merges them with dirty local rows, then pushes what is
//!   left dirty.
//!
//! # Quick Start
//!
//! ```text
//! let mut store = LocalStore::open(&config)?;
//!
//! let book = store.add_book("js")?;
//! store.add_note(book.uuid, "hello")?;
//!
//! let transport = HttpTransport::from_store(&config, &store)?;
//! let report = SyncEngine::new(transport).sync(&mut store)?;
//! ```
//!
//! # Modules
//!
//! - `store`: Local replica (main entry point)
//! - `models`: Books and notes as stored locally
//! - `api`: Wire types shared with the server
//! - `sync`: Sync engine and HTTP transport
//! - `clock`: Injectable time source
//! - `config`: Client configuration

pub mod api;
pub mod clock;
pub mod config;
pub mod models;
pub mod storage;
pub mod store;
pub mod sync;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use models::{Book, Note};
pub use storage::{StoreError, StoreResult};
pub use store::{LocalStore, Session, StoreTx};
pub use sync::{
    HttpTransport, SyncEngine, SyncError, SyncMode, SyncReport, SyncResult, SyncTransport,
};

//! Delta sync with the notebook server
//!
//! The client pulls change fragments ordered by update sequence number
//! (USN) and pushes its dirty rows over a small JSON API.
//!
//! ## Protocol
//!
//! 1. `GET /v1/sync/state` for the server's `max_usn` and clock
//! 2. `GET /v1/sync/fragment?after_usn=N` until caught up
//! 3. `POST`/`PATCH`/`DELETE` on `/v1/books` and `/v1/notes` per dirty row
//!
//! ## Usage
//!
//! ```ignore
//! let transport = HttpTransport::from_store(&config, &store)?;
//! let report = SyncEngine::new(transport).sync(&mut store)?;
//! ```

mod client;
mod engine;
mod error;

pub use client::{login, logout, HttpTransport, CLI_VERSION};
pub use engine::{SyncEngine, SyncMode, SyncReport, SyncTransport};
pub use error::{SyncError, SyncResult};

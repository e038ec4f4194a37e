//! Storage layer
//!
//! SQLite schema and typed errors for the local replica.
//!
//! ## Tables
//!
//! - `books` - Book rows, keyed by uuid
//! - `notes` - Note rows, keyed by uuid
//! - `system` - Key/value bookkeeping (schema version, sync cursor, session)

pub mod error;
pub mod schema;

pub use error::{StoreError, StoreResult};
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};

//! Sync server for notebook
//!
//! The server is the authority for every user's books and notes. Each
//! mutation takes the next update sequence number (USN) of its user, and
//! clients catch up by asking for the rows changed after the last USN they
//! saw.
//!
//! Layers, bottom up:
//! - [`db`]: SQLite schema
//! - [`usn`]: per-user USN allocator
//! - [`books`], [`notes`], [`session`]: entity and account services
//! - [`fragment`]: sync reads
//! - [`backend::Backend`]: transaction boundary shared by all requests
//! - [`http`]: axum routes and the session gate

pub mod backend;
pub mod books;
pub mod config;
pub mod db;
pub mod error;
pub mod fragment;
pub mod http;
pub mod notes;
pub mod server;
pub mod session;
pub mod state;
pub mod usn;

pub use backend::Backend;
pub use config::Config;
pub use error::{ServiceError, ServiceResult};
pub use server::{run_with_config_until_ctrl_c, Server};
pub use session::User;

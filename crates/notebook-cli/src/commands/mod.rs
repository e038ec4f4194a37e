//! Command handlers

pub mod config;
pub mod login;
pub mod logout;
pub mod status;
pub mod sync;

//! Shared state for the HTTP handlers

use crate::backend::Backend;

/// The shared app state.
#[derive(Clone)]
pub struct AppState {
    /// Storage and services
    pub backend: Backend,
}

impl AppState {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

//! Logout command handler

use anyhow::Result;
use notebook_core::sync::logout as remote_logout;
use notebook_core::{Config, LocalStore};
use tracing::warn;

use crate::output::Output;

/// Invalidate the session on the server and forget it locally
///
/// The local session is cleared even when the server cannot be reached.
pub fn logout(store: &mut LocalStore, config: &Config, output: &Output) -> Result<()> {
    let Some(session) = store.session()? else {
        output.message("Not logged in.");
        return Ok(());
    };

    if let Err(e) = remote_logout(config, &session.key) {
        warn!("Server logout failed: {}", e);
    }
    store.clear_session()?;

    output.success("Logged out");
    Ok(())
}

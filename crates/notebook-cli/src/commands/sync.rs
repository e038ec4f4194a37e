//! Sync command handler

use anyhow::Result;
use notebook_core::{Config, HttpTransport, LocalStore, SyncEngine};

use crate::output::Output;

/// Sync the local replica with the server
pub fn sync(store: &mut LocalStore, config: &Config, output: &Output) -> Result<()> {
    let transport = HttpTransport::from_store(config, store)?;

    output.message(&format!("Syncing with {}...", config.api_endpoint));
    let report = SyncEngine::new(transport).sync(store)?;

    output.print_report(&report, &serde_json::to_value(&report)?);
    Ok(())
}

//! Status command handler

use anyhow::Result;
use notebook_core::{Config, LocalStore};

use crate::output::{format_epoch, Output, OutputFormat};

/// Show login, sync and replica state
pub fn show(store: &LocalStore, config: &Config, output: &Output) -> Result<()> {
    let session = store.session()?;
    let now = store.clock().now_secs();
    let logged_in = session.as_ref().is_some_and(|s| !s.is_expired(now));
    let last_max_usn = store.last_max_usn()?;
    let last_sync_time = store.last_sync_time()?;
    let (dirty_books, dirty_notes) = store.dirty_counts()?;
    let books = store.book_count()?;
    let notes = store.note_count()?;

    match output.format {
        OutputFormat::Json => {
            output.json(&serde_json::json!({
                "api_endpoint": config.api_endpoint,
                "data_dir": config.data_dir,
                "logged_in": logged_in,
                "session_expires_at": session.as_ref().map(|s| s.expires_at),
                "last_max_usn": last_max_usn,
                "last_sync_time": last_sync_time,
                "counts": {
                    "books": books,
                    "notes": notes,
                },
                "pending": {
                    "books": dirty_books,
                    "notes": dirty_notes,
                }
            }));
        }
        OutputFormat::Quiet => {
            println!("{}", dirty_books + dirty_notes);
        }
        OutputFormat::Human => {
            println!("Notebook Status");
            println!("===============");
            println!();
            println!("Server:");
            println!("  Endpoint: {}", config.api_endpoint);
            match &session {
                Some(s) if logged_in => {
                    println!("  Session:  valid until {}", format_epoch(s.expires_at))
                }
                Some(_) => println!("  Session:  expired (run 'notebook login')"),
                None => println!("  Session:  not logged in"),
            }
            println!();
            println!("Sync:");
            println!("  Last sync:    {}", format_epoch(last_sync_time));
            println!("  Last max USN: {}", last_max_usn);
            println!("  Pending:      {} book(s), {} note(s)", dirty_books, dirty_notes);
            println!();
            println!("Storage:");
            println!("  Location: {}", config.database_path().display());
            println!("  Books:    {}", books);
            println!("  Notes:    {}", notes);
        }
    }

    Ok(())
}

//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use chrono::{DateTime, Utc};
use notebook_core::SyncReport;
use serde_json::Value;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a JSON document (pretty)
    pub fn json(&self, value: &Value) {
        println!("{:#}", value);
    }

    /// Print the result of a sync
    pub fn print_report(&self, report: &SyncReport, json: &Value) {
        match self.format {
            OutputFormat::Human => {
                println!(
                    "✓ Sync complete ({:?}): pulled {}, pushed {}",
                    report.mode,
                    report.pulled(),
                    report.pushed()
                );
                if report.pushed() > 0 {
                    println!(
                        "  Created: {}, Updated: {}, Deleted: {}",
                        report.created, report.updated, report.deleted
                    );
                }
                if report.renamed > 0 {
                    println!(
                        "  Renamed {} book(s) whose name was taken on the server",
                        report.renamed
                    );
                }
                if report.expunged > 0 {
                    println!("  Removed {} row(s) gone from the server", report.expunged);
                }
                if report.dropped > 0 {
                    println!("  Discarded {} never-synced deletion(s)", report.dropped);
                }
            }
            OutputFormat::Json => self.json(json),
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a failure to stderr, with a hint when there is one
    pub fn error(&self, message: &str, hint: Option<&str>) {
        match self.format {
            OutputFormat::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({"status": "error", "message": message, "hint": hint})
                );
            }
            _ => {
                eprintln!("Error: {}", message);
                if let Some(hint) = hint {
                    eprintln!("  {}", hint);
                }
            }
        }
    }
}

/// Render unix seconds for humans; `0` means never
pub fn format_epoch(secs: i64) -> String {
    if secs == 0 {
        return "never".to_string();
    }
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_format_epoch() {
        assert_eq!(format_epoch(0), "never");
        assert_eq!(format_epoch(1_700_000_000), "2023-11-14 22:13:20 UTC");
    }
}

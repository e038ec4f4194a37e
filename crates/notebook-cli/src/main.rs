//! notebook CLI
//!
//! Command-line interface for notebook: log in to a sync server and keep
//! the local replica of books and notes in sync with it.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use notebook_core::{Config, LocalStore, StoreError, SyncError};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "notebook")]
#[command(about = "notebook - books and notes, synced")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to the sync server
    Login {
        /// Account email (prompted if omitted)
        #[arg(long)]
        email: Option<String>,
        /// Account password (prompted if omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Log out and forget the session
    Logout,
    /// Sync with the server
    Sync,
    /// Show session and sync status
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, api_endpoint, timeout_secs)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("notebook_core=info,notebook_cli=info")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    match run(cli, &output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let hint = recovery_hint(&err);
            output.error(&format!("{:#}", err), hint);
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: Cli, output: &Output) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(Config::config_file_path);
    let config = Config::load_from_path(&config_path).context("Failed to load configuration")?;

    // Config commands don't need the store
    if let Commands::Config { command } = cli.command {
        return match command {
            Some(ConfigCommands::Show) | None => {
                commands::config::show(&config, &config_path, output)
            }
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(config, &key, &value, &config_path, output)
            }
        };
    }

    let mut store = LocalStore::open(&config)?;

    match cli.command {
        Commands::Login { email, password } => {
            commands::login::login(&mut store, &config, email, password, output)
        }
        Commands::Logout => commands::logout::logout(&mut store, &config, output),
        Commands::Sync => commands::sync::sync(&mut store, &config, output),
        Commands::Status => commands::status::show(&store, &config, output),
        Commands::Config { .. } => Ok(()),
    }
}

/// Process exit code: sync failures by class, store failures 6, else 1
fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(err) = err.downcast_ref::<SyncError>() {
        err.exit_code()
    } else if err.downcast_ref::<StoreError>().is_some() {
        6
    } else {
        1
    }
}

fn recovery_hint(err: &anyhow::Error) -> Option<&'static str> {
    if let Some(err) = err.downcast_ref::<SyncError>() {
        err.recovery_suggestion()
    } else if let Some(err) = err.downcast_ref::<StoreError>() {
        err.recovery_suggestion()
    } else {
        None
    }
}

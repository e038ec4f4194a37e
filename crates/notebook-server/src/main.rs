use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use notebook_core::SystemClock;
use notebook_server::{db, run_with_config_until_ctrl_c, Backend, Config};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// notebook sync server
#[derive(Parser, Debug)]
#[command(name = "notebook-server", version, about)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Override the configured listen address
        #[arg(long)]
        bind: Option<SocketAddr>,
    },

    /// Create an account
    AddUser {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("notebook_server=info,tower_http=info")),
        )
        .init();
    let args = Cli::parse();

    debug!("loading config from {:?}", args.config);
    let mut config = Config::load(args.config.as_deref())?;

    match args.command.unwrap_or(Commands::Serve { bind: None }) {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            run_with_config_until_ctrl_c(config).await
        }
        Commands::AddUser { email, password } => {
            let backend = Backend::new(
                db::open(&config.database_path)?,
                Arc::new(SystemClock),
                &config,
            );
            let user = backend.create_user(&email, &password)?;
            println!("Created user {} ({})", user.email, user.uuid);
            Ok(())
        }
    }
}

//! Server configuration
//!
//! Loaded from a TOML file with `NOTEBOOK_SERVER_*` environment overrides.
//! Missing files fall back to defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable prefix
const ENV_PREFIX: &str = "NOTEBOOK_SERVER";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_FRAGMENT_LIMIT: usize = 100;
const DEFAULT_SESSION_TTL_SECS: i64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the HTTP server listens on
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Maximum rows (books and notes together) per sync fragment
    #[serde(default = "default_fragment_limit")]
    pub fragment_limit: usize,

    /// Lifetime of a login session
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: i64,

    /// Clients whose last sync is older than this epoch second must full sync
    #[serde(default)]
    pub full_sync_before: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            database_path: default_database_path(),
            fragment_limit: DEFAULT_FRAGMENT_LIMIT,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            full_sync_before: 0,
        }
    }
}

impl Config {
    /// Load configuration from `path` (if it exists) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                Self::load_from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {:?}", path))?
            }
            _ => Self::default(),
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from TOML
    pub fn load_from_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var(format!("{}_BIND_ADDR", ENV_PREFIX)) {
            match addr.parse() {
                Ok(addr) => self.bind_addr = addr,
                Err(_) => warn!("Ignoring invalid {}_BIND_ADDR: {}", ENV_PREFIX, addr),
            }
        }

        if let Ok(path) = std::env::var(format!("{}_DATABASE_PATH", ENV_PREFIX)) {
            if !path.is_empty() {
                self.database_path = PathBuf::from(path);
            }
        }

        if let Ok(limit) = std::env::var(format!("{}_FRAGMENT_LIMIT", ENV_PREFIX)) {
            match limit.parse::<usize>() {
                Ok(limit) if limit > 0 => self.fragment_limit = limit,
                _ => warn!("Ignoring invalid {}_FRAGMENT_LIMIT: {}", ENV_PREFIX, limit),
            }
        }

        if let Ok(ttl) = std::env::var(format!("{}_SESSION_TTL_SECS", ENV_PREFIX)) {
            match ttl.parse() {
                Ok(ttl) => self.session_ttl_secs = ttl,
                Err(_) => warn!("Ignoring invalid {}_SESSION_TTL_SECS: {}", ENV_PREFIX, ttl),
            }
        }

        if let Ok(before) = std::env::var(format!("{}_FULL_SYNC_BEFORE", ENV_PREFIX)) {
            match before.parse() {
                Ok(before) => self.full_sync_before = before,
                Err(_) => warn!(
                    "Ignoring invalid {}_FULL_SYNC_BEFORE: {}",
                    ENV_PREFIX, before
                ),
            }
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    DEFAULT_BIND_ADDR
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 3000)))
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("notebook-server")
        .join("server.db")
}

fn default_fragment_limit() -> usize {
    DEFAULT_FRAGMENT_LIMIT
}

fn default_session_ttl_secs() -> i64 {
    DEFAULT_SESSION_TTL_SECS
}

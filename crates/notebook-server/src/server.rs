//! Server process: storage plus the HTTP listener

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use notebook_core::{Clock, SystemClock};
use tracing::info;

use crate::backend::Backend;
use crate::config::Config;
use crate::db;
use crate::http::HttpServer;
use crate::state::AppState;

/// A running sync server
pub struct Server {
    backend: Backend,
    http: HttpServer,
}

impl Server {
    /// Open the configured database and start serving
    pub async fn spawn(config: &Config) -> Result<Self> {
        let conn = db::open(&config.database_path)?;
        let backend = Backend::new(conn, Arc::new(SystemClock), config);
        Self::spawn_with(backend, config.bind_addr).await
    }

    /// Serve an existing backend
    pub async fn spawn_with(backend: Backend, bind_addr: SocketAddr) -> Result<Self> {
        let http = HttpServer::spawn(bind_addr, AppState::new(backend.clone())).await?;
        Ok(Self { backend, http })
    }

    /// An in-memory server on a random local port
    pub async fn spawn_for_tests(clock: Arc<dyn Clock>) -> Result<Self> {
        let config = Config::default();
        let backend = Backend::new(db::open_in_memory()?, clock, &config);
        Self::spawn_with(backend, ([127, 0, 0, 1], 0).into()).await
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn addr(&self) -> SocketAddr {
        self.http.addr()
    }

    /// Base URL for clients, e.g. `http://127.0.0.1:3000`
    pub fn url(&self) -> String {
        format!("http://{}", self.addr())
    }

    pub async fn shutdown(self) -> Result<()> {
        self.http.shutdown().await
    }

    pub async fn run_until_done(self) -> Result<()> {
        self.http.run_until_done().await
    }
}

/// Serve until the process receives ctrl-c
pub async fn run_with_config_until_ctrl_c(config: Config) -> Result<()> {
    let server = Server::spawn(&config).await?;
    tokio::signal::ctrl_c().await?;
    info!("shutdown");
    server.shutdown().await
}

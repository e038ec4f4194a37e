//! HTTP surface of the sync server

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::extract::Request;
use axum::routing::{get, patch, post};
use axum::Router;
use notebook_core::api::CLI_VERSION_HEADER;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, span, warn, Level};

mod auth;
mod books;
mod error;
mod notes;
mod session;
mod sync;

use crate::error::ServiceResult;
use crate::state::AppState;

pub use self::auth::AuthUser;
pub use self::error::{AppError, AppResult};

/// The running HTTP server
pub struct HttpServer {
    addr: SocketAddr,
    task: JoinHandle<std::io::Result<()>>,
    shutdown: oneshot::Sender<()>,
}

impl HttpServer {
    /// Bind `bind_addr` and serve in a background task
    pub async fn spawn(bind_addr: SocketAddr, state: AppState) -> Result<HttpServer> {
        let app = create_app(state);
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("failed to bind {bind_addr}"))?;
        let addr = listener.local_addr()?;
        let (shutdown, signal) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = signal.await;
                })
                .await
        });
        info!("HTTP server listening on {addr}");

        Ok(HttpServer {
            addr,
            task,
            shutdown,
        })
    }

    /// The bound address, with the real port when 0 was requested
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        Self::join(self.task).await
    }

    /// Wait for the server task to finish
    ///
    /// Runs forever unless the task fails.
    pub async fn run_until_done(self) -> Result<()> {
        let HttpServer { task, shutdown, .. } = self;
        let res = Self::join(task).await;
        drop(shutdown);
        res
    }

    async fn join(task: JoinHandle<std::io::Result<()>>) -> Result<()> {
        match task.await {
            Ok(Ok(())) => Ok(()),
            Err(err) if err.is_cancelled() => Ok(()),
            Ok(Err(err)) => {
                warn!(?err, "server failed");
                Err(err.into())
            }
            Err(err) => {
                warn!(?err, "server task panicked");
                Err(err.into())
            }
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        let cli_version = request
            .headers()
            .get(CLI_VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        span!(
            Level::DEBUG,
            "http_request",
            method = ?request.method(),
            uri = ?request.uri(),
            cli_version = %cli_version,
        )
    });

    Router::new()
        .route("/v1/login", post(session::login))
        .route("/v1/logout", post(session::logout))
        .route("/v1/sync/state", get(sync::get_state))
        .route("/v1/sync/fragment", get(sync::get_fragment))
        .route("/v1/books", post(books::create))
        .route("/v1/books/{uuid}", patch(books::update).delete(books::delete))
        .route("/v1/notes", post(notes::create))
        .route("/v1/notes/{uuid}", patch(notes::update).delete(notes::delete))
        .route("/healthcheck", get(|| async { "OK" }))
        .with_state(state)
        .layer(trace)
}

/// Run a blocking service call off the async runtime
pub(crate) async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> ServiceResult<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

//! HTTP transport
//!
//! Blocking JSON client for the sync server. Every request carries the
//! bearer session key and the client version header. Non-2xx responses
//! are mapped to `SyncError` by status code.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use super::engine::SyncTransport;
use super::error::{SyncError, SyncResult};
use crate::api::{
    BookRecord, CreateBookRequest, CreateNoteRequest, ErrorBody, LoginRequest, LoginResponse,
    NoteRecord, SyncFragment, SyncStateResponse, UpdateBookRequest, UpdateNoteRequest,
    CLI_VERSION_HEADER,
};
use crate::config::Config;
use crate::store::LocalStore;

/// Version sent in the `CLI-Version` header
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sync transport over HTTP
pub struct HttpTransport {
    client: Client,
    base_url: String,
    session_key: String,
}

impl HttpTransport {
    /// Create a transport authenticated with `session_key`
    pub fn new(config: &Config, session_key: impl Into<String>) -> SyncResult<Self> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.api_endpoint.trim_end_matches('/').to_string(),
            session_key: session_key.into(),
        })
    }

    /// Create a transport from the session stored locally
    ///
    /// Fails with `SyncError::Auth` without touching the network when
    /// there is no session or it has expired.
    pub fn from_store(config: &Config, store: &LocalStore) -> SyncResult<Self> {
        let session = store
            .session()?
            .ok_or_else(|| SyncError::Auth("not logged in".to_string()))?;

        if session.is_expired(store.clock().now_secs()) {
            return Err(SyncError::Auth("session expired".to_string()));
        }

        Self::new(config, session.key)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> SyncResult<T> {
        let response = request
            .bearer_auth(&self.session_key)
            .header(CLI_VERSION_HEADER, CLI_VERSION)
            .send()
            .map_err(transport_error)?;
        decode(response)
    }
}

impl SyncTransport for HttpTransport {
    fn get_sync_state(&self) -> SyncResult<SyncStateResponse> {
        debug!("GET /v1/sync/state");
        self.send(self.client.get(self.url("/v1/sync/state")))
    }

    fn get_sync_fragment(&self, after_usn: i64) -> SyncResult<SyncFragment> {
        debug!("GET /v1/sync/fragment?after_usn={}", after_usn);
        self.send(
            self.client
                .get(self.url("/v1/sync/fragment"))
                .query(&[("after_usn", after_usn)]),
        )
    }

    fn create_book(&self, req: &CreateBookRequest) -> SyncResult<BookRecord> {
        debug!("POST /v1/books");
        self.send(self.client.post(self.url("/v1/books")).json(req))
    }

    fn update_book(&self, uuid: Uuid, req: &UpdateBookRequest) -> SyncResult<BookRecord> {
        debug!("PATCH /v1/books/{}", uuid);
        self.send(
            self.client
                .patch(self.url(&format!("/v1/books/{}", uuid)))
                .json(req),
        )
    }

    fn delete_book(&self, uuid: Uuid) -> SyncResult<BookRecord> {
        debug!("DELETE /v1/books/{}", uuid);
        self.send(self.client.delete(self.url(&format!("/v1/books/{}", uuid))))
    }

    fn create_note(&self, req: &CreateNoteRequest) -> SyncResult<NoteRecord> {
        debug!("POST /v1/notes");
        self.send(self.client.post(self.url("/v1/notes")).json(req))
    }

    fn update_note(&self, uuid: Uuid, req: &UpdateNoteRequest) -> SyncResult<NoteRecord> {
        debug!("PATCH /v1/notes/{}", uuid);
        self.send(
            self.client
                .patch(self.url(&format!("/v1/notes/{}", uuid)))
                .json(req),
        )
    }

    fn delete_note(&self, uuid: Uuid) -> SyncResult<NoteRecord> {
        debug!("DELETE /v1/notes/{}", uuid);
        self.send(self.client.delete(self.url(&format!("/v1/notes/{}", uuid))))
    }
}

/// Exchange credentials for a session
pub fn login(config: &Config, req: &LoginRequest) -> SyncResult<LoginResponse> {
    let client = build_client(config)?;
    let url = format!("{}/v1/login", config.api_endpoint.trim_end_matches('/'));
    debug!("POST /v1/login as {}", req.email);

    let response = client
        .post(url)
        .header(CLI_VERSION_HEADER, CLI_VERSION)
        .json(req)
        .send()
        .map_err(transport_error)?;

    match decode(response) {
        Err(SyncError::Validation(detail)) => Err(SyncError::Auth(detail)),
        other => other,
    }
}

/// Invalidate a session on the server
pub fn logout(config: &Config, session_key: &str) -> SyncResult<()> {
    let client = build_client(config)?;
    let url = format!("{}/v1/logout", config.api_endpoint.trim_end_matches('/'));
    debug!("POST /v1/logout");

    let response = client
        .post(url)
        .bearer_auth(session_key)
        .header(CLI_VERSION_HEADER, CLI_VERSION)
        .send()
        .map_err(transport_error)?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(error_for_status(status, error_detail(response, status)))
    }
}

fn build_client(config: &Config) -> SyncResult<Client> {
    Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|e| SyncError::Transient(format!("failed to build HTTP client: {}", e)))
}

fn transport_error(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::Transient(format!("request timed out: {}", err))
    } else {
        SyncError::Transient(err.to_string())
    }
}

fn decode<T: DeserializeOwned>(response: Response) -> SyncResult<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .map_err(|e| SyncError::Transient(format!("invalid response body: {}", e)));
    }

    Err(error_for_status(status, error_detail(response, status)))
}

fn error_detail(response: Response, status: StatusCode) -> String {
    response
        .json::<ErrorBody>()
        .ok()
        .and_then(|body| body.detail)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string())
}

/// Classify a non-2xx status
pub(crate) fn error_for_status(status: StatusCode, detail: String) -> SyncError {
    match status {
        StatusCode::UNAUTHORIZED => SyncError::Auth(detail),
        StatusCode::NOT_FOUND => SyncError::NotFound(detail),
        StatusCode::CONFLICT => SyncError::Conflict(detail),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            SyncError::Validation(detail)
        }
        s if s.is_server_error() => {
            SyncError::Transient(format!("server error {}: {}", s.as_u16(), detail))
        }
        s => SyncError::Validation(format!("unexpected status {}: {}", s.as_u16(), detail)),
    }
}

//! Login and logout

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use notebook_core::api::{LoginRequest, LoginResponse};

use super::auth::AuthUser;
use super::blocking;
use super::error::AppResult;
use crate::state::AppState;

/// `POST /v1/login`
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let Json(req) = body?;
    let backend = state.backend;
    let session = blocking(move || backend.login(&req.email, &req.password)).await?;
    Ok(Json(session))
}

/// `POST /v1/logout`
pub async fn logout(
    State(state): State<AppState>,
    AuthUser { key, .. }: AuthUser,
) -> AppResult<StatusCode> {
    let backend = state.backend;
    blocking(move || backend.logout(&key)).await?;
    Ok(StatusCode::OK)
}

//! Sync read endpoints

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use notebook_core::api::{FragmentParams, SyncFragment, SyncStateResponse};

use super::auth::AuthUser;
use super::blocking;
use super::error::AppResult;
use crate::state::AppState;

/// `GET /v1/sync/state`
pub async fn get_state(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
) -> AppResult<Json<SyncStateResponse>> {
    let backend = state.backend;
    let response = blocking(move || backend.sync_state(&user)).await?;
    Ok(Json(response))
}

/// `GET /v1/sync/fragment?after_usn=N`
pub async fn get_fragment(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    params: Result<Query<FragmentParams>, QueryRejection>,
) -> AppResult<Json<SyncFragment>> {
    let Query(params) = params?;
    let backend = state.backend;
    let fragment = blocking(move || backend.sync_fragment(&user, params.after_usn)).await?;
    Ok(Json(fragment))
}

//! Note endpoints

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use notebook_core::api::{CreateNoteRequest, NoteRecord, UpdateNoteRequest};
use uuid::Uuid;

use super::auth::AuthUser;
use super::blocking;
use super::error::AppResult;
use crate::state::AppState;

/// `POST /v1/notes`
pub async fn create(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    body: Result<Json<CreateNoteRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<NoteRecord>)> {
    let Json(req) = body?;
    let backend = state.backend;
    let note = blocking(move || backend.create_note(&user, &req)).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// `PATCH /v1/notes/{uuid}`
pub async fn update(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    uuid: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateNoteRequest>, JsonRejection>,
) -> AppResult<Json<NoteRecord>> {
    let Path(uuid) = uuid?;
    let Json(req) = body?;
    let backend = state.backend;
    let note = blocking(move || backend.update_note(&user, uuid, &req)).await?;
    Ok(Json(note))
}

/// `DELETE /v1/notes/{uuid}`
pub async fn delete(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    uuid: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<NoteRecord>> {
    let Path(uuid) = uuid?;
    let backend = state.backend;
    let note = blocking(move || backend.delete_note(&user, uuid)).await?;
    Ok(Json(note))
}

//! Book endpoints

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use notebook_core::api::{BookRecord, CreateBookRequest, UpdateBookRequest};
use uuid::Uuid;

use super::auth::AuthUser;
use super::blocking;
use super::error::AppResult;
use crate::state::AppState;

/// `POST /v1/books`
pub async fn create(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    body: Result<Json<CreateBookRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<BookRecord>)> {
    let Json(req) = body?;
    let backend = state.backend;
    let book = blocking(move || backend.create_book(&user, &req.name)).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// `PATCH /v1/books/{uuid}`
pub async fn update(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    uuid: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateBookRequest>, JsonRejection>,
) -> AppResult<Json<BookRecord>> {
    let Path(uuid) = uuid?;
    let Json(req) = body?;
    let backend = state.backend;
    let book = blocking(move || backend.update_book(&user, uuid, &req)).await?;
    Ok(Json(book))
}

/// `DELETE /v1/books/{uuid}`
pub async fn delete(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    uuid: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<BookRecord>> {
    let Path(uuid) = uuid?;
    let backend = state.backend;
    let book = blocking(move || backend.delete_book(&user, uuid)).await?;
    Ok(Json(book))
}

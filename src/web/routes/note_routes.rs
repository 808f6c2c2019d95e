use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, patch, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::db::models::NotePage;
use crate::services::note_service;
use crate::web::models::{
    AuthenticatedUser, NoteListQuery, RenameNoteRequest, SaveFromChatRequest, UpdateNoteRequest,
    UploadNoteRequest,
};
use crate::web::{error::AppError, AppState};

async fn list_notes_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<NoteListQuery>,
) -> Result<Json<NotePage>, AppError> {
    let page = note_service::list_notes(app_state.store.as_ref(), authenticated_user.id, query).await?;
    Ok(Json(page))
}

async fn upload_note_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<UploadNoteRequest>,
) -> Result<Json<Value>, AppError> {
    let note = note_service::upload_note(
        app_state.store.as_ref(),
        &app_state.config,
        authenticated_user.id,
        payload,
    )
    .await?;
    Ok(Json(json!({ "success": true, "note": note })))
}

async fn save_from_chat_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<SaveFromChatRequest>,
) -> Result<Json<Value>, AppError> {
    let note = note_service::save_from_chat(
        app_state.store.as_ref(),
        &app_state.config,
        authenticated_user.id,
        payload,
    )
    .await?;
    Ok(Json(json!({ "success": true, "note": note })))
}

async fn update_note_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(note_id): Path<i32>,
    Json(payload): Json<UpdateNoteRequest>,
) -> Result<Json<Value>, AppError> {
    let note =
        note_service::update_note(app_state.store.as_ref(), authenticated_user.id, note_id, payload)
            .await?;
    Ok(Json(json!({ "success": true, "note": note })))
}

async fn rename_note_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(note_id): Path<i32>,
    Json(payload): Json<RenameNoteRequest>,
) -> Result<Json<Value>, AppError> {
    let note = note_service::rename_note(
        app_state.store.as_ref(),
        authenticated_user.id,
        note_id,
        payload.file_name,
    )
    .await?;
    Ok(Json(json!({ "success": true, "note": note })))
}

async fn delete_note_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(note_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    note_service::delete_note(app_state.store.as_ref(), authenticated_user.id, note_id).await?;
    Ok(Json(json!({ "success": true })))
}

pub fn create_note_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_notes_handler))
        .route("/upload", post(upload_note_handler))
        .route("/save-from-chat", post(save_from_chat_handler))
        .route("/{note_id}", put(update_note_handler).delete(delete_note_handler))
        .route("/{note_id}/rename", patch(rename_note_handler))
}

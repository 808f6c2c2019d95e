use axum::{
    extract::{Extension, Path, State},
    routing::put,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::services::chat_service;
use crate::web::models::{AuthenticatedUser, EditMessageRequest};
use crate::web::{error::AppError, AppState};

async fn edit_message_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(message_id): Path<i32>,
    Json(payload): Json<EditMessageRequest>,
) -> Result<Json<Value>, AppError> {
    let message = chat_service::edit_message(
        app_state.store.as_ref(),
        &app_state.broadcaster,
        authenticated_user.id,
        message_id,
        payload.content,
    )
    .await?;
    Ok(Json(json!({ "success": true, "message": message })))
}

async fn delete_message_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(message_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    chat_service::delete_message(
        app_state.store.as_ref(),
        &app_state.broadcaster,
        authenticated_user.id,
        message_id,
    )
    .await?;
    Ok(Json(json!({ "success": true })))
}

pub fn create_message_router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/{message_id}",
        put(edit_message_handler).delete(delete_message_handler),
    )
}

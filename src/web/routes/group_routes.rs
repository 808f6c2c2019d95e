use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::db::models::GroupState;
use crate::services::{chat_service, group_service, task_service};
use crate::web::models::{
    AuthenticatedUser, CreateTaskRequest, FormGroupRequest, FormGroupResponse, MessageSearchQuery,
    UpdateGroupRequest,
};
use crate::web::{error::AppError, AppState};

async fn form_group_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<FormGroupRequest>,
) -> Result<Json<FormGroupResponse>, AppError> {
    let group_id = group_service::form_group(
        app_state.store.as_ref(),
        &app_state.config,
        authenticated_user.id,
        payload,
    )
    .await?;
    Ok(Json(FormGroupResponse { group_id }))
}

async fn get_group_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(group_id): Path<i32>,
) -> Result<Json<GroupState>, AppError> {
    let state =
        group_service::get_group_state(app_state.store.as_ref(), authenticated_user.id, group_id)
            .await?;
    Ok(Json(state))
}

async fn update_group_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(group_id): Path<i32>,
    Json(payload): Json<UpdateGroupRequest>,
) -> Result<Json<Value>, AppError> {
    let group = group_service::update_group(
        app_state.store.as_ref(),
        &app_state.broadcaster,
        authenticated_user.id,
        group_id,
        payload,
    )
    .await?;
    Ok(Json(json!({ "success": true, "group": group })))
}

async fn search_messages_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(group_id): Path<i32>,
    Query(query): Query<MessageSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let messages = chat_service::search_messages(
        app_state.store.as_ref(),
        authenticated_user.id,
        group_id,
        query.search.as_deref(),
    )
    .await?;
    Ok(Json(json!({ "messages": messages })))
}

async fn clear_chat_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(group_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    chat_service::clear_chat(
        app_state.store.as_ref(),
        &app_state.broadcaster,
        authenticated_user.id,
        group_id,
    )
    .await?;
    Ok(Json(json!({ "success": true })))
}

async fn create_task_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(group_id): Path<i32>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<Json<Value>, AppError> {
    let task = task_service::create_task(
        app_state.store.as_ref(),
        authenticated_user.id,
        group_id,
        payload,
    )
    .await?;
    Ok(Json(json!({ "success": true, "task": task })))
}

async fn leave_group_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(group_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    group_service::leave_group(app_state.store.as_ref(), authenticated_user.id, group_id).await?;
    Ok(Json(json!({ "success": true })))
}

pub fn create_group_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/join", post(form_group_handler))
        .route(
            "/{group_id}",
            get(get_group_handler)
                .patch(update_group_handler)
                .put(update_group_handler),
        )
        .route(
            "/{group_id}/messages",
            get(search_messages_handler).delete(clear_chat_handler),
        )
        .route("/{group_id}/clear-chat", post(clear_chat_handler))
        .route("/{group_id}/tasks", post(create_task_handler))
        .route("/{group_id}/leave", post(leave_group_handler))
}

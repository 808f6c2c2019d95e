use axum::{
    extract::{Extension, Path, State},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::services::task_service;
use crate::web::models::AuthenticatedUser;
use crate::web::{error::AppError, AppState};

async fn complete_task_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(task_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let completion_count =
        task_service::complete_task(app_state.store.as_ref(), authenticated_user.id, task_id).await?;
    Ok(Json(json!({ "success": true, "completion_count": completion_count })))
}

pub fn create_task_router() -> Router<Arc<AppState>> {
    Router::new().route("/{task_id}/complete", post(complete_task_handler))
}

use axum::{
    extract::{Extension, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::db::models::UserProfile;
use crate::services::profile_service;
use crate::web::models::{AuthenticatedUser, SaveSubjectsRequest};
use crate::web::{error::AppError, AppState};

async fn get_profile_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = profile_service::get_profile(app_state.store.as_ref(), authenticated_user.id).await?;
    Ok(Json(profile))
}

async fn save_subjects_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<SaveSubjectsRequest>,
) -> Result<Json<Value>, AppError> {
    profile_service::save_subjects(app_state.store.as_ref(), authenticated_user.id, payload).await?;
    Ok(Json(json!({ "success": true })))
}

pub fn create_user_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profile", get(get_profile_handler))
        .route("/subjects", post(save_subjects_handler))
}

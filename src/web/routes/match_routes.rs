use axum::{
    extract::{Extension, State},
    Json,
};
use std::sync::Arc;

use crate::matching::{self, Recommendation};
use crate::web::models::AuthenticatedUser;
use crate::web::{error::AppError, AppState};

pub async fn match_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<Recommendation>>, AppError> {
    let ranked = matching::recommend(app_state.store.as_ref(), authenticated_user.id).await?;
    Ok(Json(ranked))
}

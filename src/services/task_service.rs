use tracing::info;

use crate::db::entities::task;
use crate::db::models::NewTask;
use crate::db::repository::{Store, StoreError};
use crate::services::group_service::require_member;
use crate::web::error::AppError;
use crate::web::models::CreateTaskRequest;

fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::InvalidInput(format!("Task {field} is required")))
}

pub async fn create_task(
    store: &dyn Store,
    user_id: i32,
    group_id: i32,
    req: CreateTaskRequest,
) -> Result<task::Model, AppError> {
    let subject = required(req.subject, "subject")?;
    let content = required(req.content, "content")?;
    require_member(store, user_id, group_id).await?;

    let task = store
        .insert_task(NewTask {
            group_id,
            creator_id: user_id,
            subject,
            content,
        })
        .await?;
    info!(task_id = task.id, group_id, "Created task.");
    Ok(task)
}

/// Marks the task done for `user_id` and returns the new completion count.
pub async fn complete_task(store: &dyn Store, user_id: i32, task_id: i32) -> Result<i64, AppError> {
    let task = store
        .find_task(task_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))?;
    require_member(store, user_id, task.group_id).await?;

    store.complete_task(task_id, user_id).await.map_err(|e| match e {
        StoreError::Conflict(_) => AppError::Conflict("Already completed".to_string()),
        other => other.into(),
    })?;
    Ok(store.completion_count(task_id).await?)
}

//! Group Formation plus the member-only group operations: state fetch,
//! rename/icon change and leaving.

use tracing::{info, warn};

use crate::db::models::{FormationRequest, GroupState};
use crate::db::repository::{Store, StoreError};
use crate::server::config::ServerConfig;
use crate::server::group_broadcaster::GroupBroadcaster;
use crate::web::error::AppError;
use crate::web::models::websocket_models::{GroupEvent, GroupInfo};
use crate::web::models::{FormGroupRequest, UpdateGroupRequest};

pub const DEFAULT_GROUP_NAME: &str = "New Study Group";

/// Fails with `AuthorizationDenied` unless `user_id` currently belongs to `group_id`.
pub async fn require_member(store: &dyn Store, user_id: i32, group_id: i32) -> Result<(), AppError> {
    if store.is_member(user_id, group_id).await? {
        Ok(())
    } else {
        Err(AppError::AuthorizationDenied("Not allowed".to_string()))
    }
}

/// Creates a group holding the caller and every listed member, all or nothing.
/// Returns the new group id.
pub async fn form_group(
    store: &dyn Store,
    config: &ServerConfig,
    caller_id: i32,
    req: FormGroupRequest,
) -> Result<i32, AppError> {
    let mut member_ids: Vec<i32> = Vec::with_capacity(req.member_ids.len());
    for id in req.member_ids {
        if id != caller_id && !member_ids.contains(&id) {
            member_ids.push(id);
        }
    }
    if member_ids.is_empty() {
        return Err(AppError::InvalidInput("At least one other member is required".to_string()));
    }

    let name = req
        .group_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_GROUP_NAME)
        .to_string();

    let request = FormationRequest {
        name,
        creator_id: caller_id,
        member_ids,
        require_ungrouped: config.enforce_ungrouped_members,
    };

    match store.create_group_with_members(&request).await {
        Ok(group) => {
            info!(
                group_id = group.id,
                creator_id = caller_id,
                members = request.member_ids.len() + 1,
                "Formed study group."
            );
            Ok(group.id)
        }
        Err(StoreError::Conflict(msg)) => Err(AppError::Conflict(msg)),
        Err(e) => {
            warn!(creator_id = caller_id, error = %e, "Group formation failed and was rolled back.");
            Err(AppError::AtomicityFailure(e.to_string()))
        }
    }
}

pub async fn get_group_state(
    store: &dyn Store,
    user_id: i32,
    group_id: i32,
) -> Result<GroupState, AppError> {
    let group = store
        .find_group(group_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Group not found".to_string()))?;
    require_member(store, user_id, group_id).await?;

    Ok(GroupState {
        id: group.id,
        name: group.name,
        icon_url: group.icon_url,
        members: store.list_members(group_id).await?,
        messages: store.list_group_messages(group_id).await?,
        tasks: store.list_tasks_with_counts(group_id).await?,
    })
}

/// Applies a rename and/or icon change and broadcasts `group-updated`.
///
/// `icon_url`: absent keeps the icon, null or blank clears it.
pub async fn update_group(
    store: &dyn Store,
    broadcaster: &GroupBroadcaster,
    user_id: i32,
    group_id: i32,
    req: UpdateGroupRequest,
) -> Result<GroupInfo, AppError> {
    require_member(store, user_id, group_id).await?;
    let existing = store
        .find_group(group_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Group not found".to_string()))?;

    let next_name = match req.name {
        Some(name) => name.trim().to_string(),
        None => existing.name.clone(),
    };
    if next_name.is_empty() {
        return Err(AppError::InvalidInput("Group name is required".to_string()));
    }
    let next_icon = match req.icon_url {
        None => existing.icon_url.clone(),
        Some(icon) => icon.map(|i| i.trim().to_string()).filter(|i| !i.is_empty()),
    };

    let updated: GroupInfo = store
        .update_group(group_id, &next_name, next_icon.as_deref())
        .await?
        .into();
    broadcaster.publish(GroupEvent::GroupUpdated(updated.clone()));
    Ok(updated)
}

pub async fn leave_group(store: &dyn Store, user_id: i32, group_id: i32) -> Result<(), AppError> {
    require_member(store, user_id, group_id).await?;
    store.set_user_group(user_id, None).await?;
    info!(user_id, group_id, "User left group.");
    Ok(())
}

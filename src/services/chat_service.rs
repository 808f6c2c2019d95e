//! Chat writes. Each operation persists first and only then publishes the
//! matching event on the group's channel.

use tracing::{debug, info};

use crate::db::entities::message;
use crate::db::enums::MessageType;
use crate::db::models::NewMessage;
use crate::db::repository::Store;
use crate::server::group_broadcaster::GroupBroadcaster;
use crate::services::group_service::require_member;
use crate::web::error::AppError;
use crate::web::models::AuthenticatedUser;
use crate::web::models::websocket_models::{GroupEvent, ValidatedSend};

pub const SEARCH_LIMIT: u64 = 100;

/// Persists a message sent over the realtime channel and broadcasts it.
///
/// The stored sender name is the authenticated user's, not the one in the frame.
pub async fn send_message(
    store: &dyn Store,
    broadcaster: &GroupBroadcaster,
    sender: &AuthenticatedUser,
    send: ValidatedSend,
) -> Result<message::Model, AppError> {
    if send.sender_id != sender.id {
        return Err(AppError::AuthorizationDenied(
            "Sender does not match the connection".to_string(),
        ));
    }
    require_member(store, sender.id, send.group_id).await?;

    let message = store
        .insert_message(NewMessage {
            group_id: send.group_id,
            sender_id: sender.id,
            sender_name: sender.name.clone(),
            content: send.content,
            message_type: send.message_type,
        })
        .await?;

    let receivers = broadcaster.publish(GroupEvent::NewMessage(message.clone()));
    debug!(message_id = message.id, group_id = message.group_id, receivers, "Message sent.");
    Ok(message)
}

pub async fn edit_message(
    store: &dyn Store,
    broadcaster: &GroupBroadcaster,
    user_id: i32,
    message_id: i32,
    content: Option<String>,
) -> Result<message::Model, AppError> {
    let content = content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Message content is required".to_string()))?;

    let existing = store
        .find_message(message_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found".to_string()))?;
    if existing.sender_id != user_id {
        return Err(AppError::AuthorizationDenied("Not allowed".to_string()));
    }
    if existing.message_type != MessageType::Text {
        return Err(AppError::InvalidInput("Only text messages can be edited".to_string()));
    }

    let updated = store.update_message_content(message_id, &content).await?;
    broadcaster.publish(GroupEvent::MessageUpdated(updated.clone()));
    Ok(updated)
}

/// Unsends one of the caller's own messages.
pub async fn delete_message(
    store: &dyn Store,
    broadcaster: &GroupBroadcaster,
    user_id: i32,
    message_id: i32,
) -> Result<(), AppError> {
    let existing = store
        .find_message(message_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found".to_string()))?;
    if existing.sender_id != user_id {
        return Err(AppError::AuthorizationDenied("Not allowed".to_string()));
    }

    if store.delete_message(message_id).await? == 0 {
        return Err(AppError::NotFound("Message not found".to_string()));
    }
    broadcaster.publish(GroupEvent::MessageDeleted {
        id: message_id,
        group_id: existing.group_id,
    });
    Ok(())
}

/// Deletes the whole history of a group. Any current member may do this.
pub async fn clear_chat(
    store: &dyn Store,
    broadcaster: &GroupBroadcaster,
    user_id: i32,
    group_id: i32,
) -> Result<u64, AppError> {
    require_member(store, user_id, group_id).await?;
    let removed = store.delete_group_messages(group_id).await?;
    broadcaster.publish(GroupEvent::ChatCleared { group_id });
    info!(group_id, user_id, removed, "Cleared group chat.");
    Ok(removed)
}

/// Newest first, at most `SEARCH_LIMIT`, optionally filtered by content.
pub async fn search_messages(
    store: &dyn Store,
    user_id: i32,
    group_id: i32,
    search: Option<&str>,
) -> Result<Vec<message::Model>, AppError> {
    require_member(store, user_id, group_id).await?;
    let term = search.map(str::trim).filter(|s| !s.is_empty());
    Ok(store.search_group_messages(group_id, term, SEARCH_LIMIT).await?)
}

use axum::{
    extract::{
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::services::{auth_service, chat_service};
use crate::web::models::websocket_models::{ClientWsMessage, GroupEvent};
use crate::web::models::AuthenticatedUser;
use crate::web::{error::AppError, AppState};

#[derive(Deserialize, Debug)]
pub struct WsAuthQuery {
    token: Option<String>,
}

/// The group a connection currently listens to. Joining another group
/// replaces it.
struct Subscription {
    group_id: i32,
    rx: broadcast::Receiver<GroupEvent>,
}

pub async fn group_ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<WsAuthQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let token = query
        .token
        .filter(|t| !t.is_empty())
        .or_else(|| jar.get("token").map(|c| c.value().to_string()))
        .ok_or(AppError::AuthenticationRequired)?;
    let user =
        auth_service::authenticate_token(app_state.store.as_ref(), &app_state.config.jwt_secret, &token)
            .await?;

    Ok(ws.on_upgrade(move |socket| handle_group_socket(socket, app_state, user)))
}

/// Resolves to the next event of the current subscription, or never when
/// the connection has not joined a group yet.
async fn next_event(subscription: &mut Option<Subscription>) -> Result<GroupEvent, RecvError> {
    match subscription {
        Some(sub) => sub.rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn handle_group_socket(mut socket: WebSocket, app_state: Arc<AppState>, user: AuthenticatedUser) {
    let mut subscription: Option<Subscription> = None;
    info!(user_id = user.id, "Chat client connected.");

    loop {
        tokio::select! {
            event = next_event(&mut subscription) => {
                match event {
                    Ok(event) => {
                        let payload = match serde_json::to_string(&event) {
                            Ok(payload) => payload,
                            Err(e) => {
                                warn!(error = %e, event = event.name(), "Failed to serialize group event.");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(Utf8Bytes::from(payload))).await.is_err() {
                            warn!(user_id = user.id, "Client disconnected or error sending event.");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(user_id = user.id, skipped, "Chat client lagged behind, events skipped.");
                    }
                    Err(RecvError::Closed) => {
                        debug!(user_id = user.id, "Group channel closed.");
                        subscription = None;
                    }
                }
            }
            incoming = socket.next() => {
                let Some(Ok(msg)) = incoming else {
                    info!(user_id = user.id, "Chat client disconnected.");
                    break;
                };
                match msg {
                    Message::Text(text) => {
                        if text.as_str() == "ping" {
                            if socket.send(Message::Text(Utf8Bytes::from_static("pong"))).await.is_err() {
                                break;
                            }
                            continue;
                        }
                        handle_client_frame(&app_state, &user, &mut subscription, text.as_str()).await;
                    }
                    Message::Binary(b) => {
                        debug!(bytes_len = b.len(), "Ignoring binary frame from chat client.");
                    }
                    Message::Ping(p) => {
                        if socket.send(Message::Pong(p)).await.is_err() {
                            warn!("Error sending pong to client.");
                            break;
                        }
                    }
                    Message::Pong(_) => {}
                    Message::Close(c) => {
                        if let Some(cf) = c {
                            info!(code = cf.code, reason = %cf.reason, "Chat client closed connection.");
                        } else {
                            info!("Chat client closed connection without close frame.");
                        }
                        break;
                    }
                }
            }
        }
    }
    info!(user_id = user.id, "Chat connection handler finished.");
}

async fn handle_client_frame(
    app_state: &AppState,
    user: &AuthenticatedUser,
    subscription: &mut Option<Subscription>,
    text: &str,
) {
    let frame = match serde_json::from_str::<ClientWsMessage>(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(user_id = user.id, error = %e, "Ignoring unrecognized chat frame.");
            return;
        }
    };

    match frame {
        ClientWsMessage::JoinGroup(group_id) => {
            if subscription.as_ref().is_some_and(|s| s.group_id == group_id) {
                return;
            }
            match app_state.store.is_member(user.id, group_id).await {
                Ok(true) => {
                    *subscription = Some(Subscription {
                        group_id,
                        rx: app_state.broadcaster.join(group_id),
                    });
                    info!(user_id = user.id, group_id, "Chat client joined group.");
                }
                Ok(false) => {
                    warn!(user_id = user.id, group_id, "Rejected join for non-member.");
                }
                Err(e) => {
                    warn!(user_id = user.id, group_id, error = %e, "Membership check failed.");
                }
            }
        }
        ClientWsMessage::SendMessage(payload) => {
            let Some(send) = payload.validate() else {
                debug!(user_id = user.id, "Dropping incomplete send-message frame.");
                return;
            };
            if let Err(e) =
                chat_service::send_message(app_state.store.as_ref(), &app_state.broadcaster, user, send).await
            {
                warn!(user_id = user.id, error = %e, "Failed to send chat message.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_store::MemoryStore;
    use crate::db::models::{FormationRequest, NewUser};
    use crate::db::repository::{GroupRepository, MessageRepository, UserRepository};
    use crate::server::config::ServerConfig;
    use serde_json::json;
    use tokio::sync::broadcast::error::TryRecvError;

    async fn member(store: &MemoryStore, name: &str) -> AuthenticatedUser {
        let u = store
            .create_user(NewUser {
                name: name.into(),
                branch: "CSE".into(),
                email: format!("{name}@example.com"),
                password_hash: "x".into(),
                goals: None,
            })
            .await
            .unwrap();
        AuthenticatedUser { id: u.id, name: u.name, email: u.email }
    }

    async fn form(store: &MemoryStore, creator: &AuthenticatedUser, other: &AuthenticatedUser) -> i32 {
        store
            .create_group_with_members(&FormationRequest {
                name: "G".into(),
                creator_id: creator.id,
                member_ids: vec![other.id],
                require_ungrouped: false,
            })
            .await
            .unwrap()
            .id
    }

    fn state(store: &Arc<MemoryStore>) -> AppState {
        AppState::new(store.clone(), Arc::new(ServerConfig::with_secret("s")))
    }

    fn join(group_id: i32) -> String {
        json!({ "event": "join-group", "data": group_id }).to_string()
    }

    #[tokio::test]
    async fn non_members_cannot_join() {
        let store = Arc::new(MemoryStore::new());
        let (ana, ben, eve) = (member(&store, "ana").await, member(&store, "ben").await, member(&store, "eve").await);
        let group_id = form(&store, &ana, &ben).await;
        let app_state = state(&store);

        let mut subscription = None;
        handle_client_frame(&app_state, &eve, &mut subscription, &join(group_id)).await;
        assert!(subscription.is_none());
        assert_eq!(app_state.broadcaster.receiver_count(group_id), 0);
    }

    #[tokio::test]
    async fn rejoining_the_same_group_keeps_one_subscription() {
        let store = Arc::new(MemoryStore::new());
        let (ana, ben) = (member(&store, "ana").await, member(&store, "ben").await);
        let group_id = form(&store, &ana, &ben).await;
        let app_state = state(&store);

        let mut subscription = None;
        handle_client_frame(&app_state, &ana, &mut subscription, &join(group_id)).await;
        handle_client_frame(&app_state, &ana, &mut subscription, &join(group_id)).await;
        assert_eq!(subscription.as_ref().map(|s| s.group_id), Some(group_id));
        assert_eq!(app_state.broadcaster.receiver_count(group_id), 1);
    }

    #[tokio::test]
    async fn joining_another_group_replaces_the_subscription() {
        let store = Arc::new(MemoryStore::new());
        let (ana, ben, cy) = (member(&store, "ana").await, member(&store, "ben").await, member(&store, "cy").await);
        let first = form(&store, &ana, &ben).await;
        let app_state = state(&store);

        let mut subscription = None;
        handle_client_frame(&app_state, &ana, &mut subscription, &join(first)).await;

        store.set_user_group(ana.id, None).await.unwrap();
        let second = form(&store, &ana, &cy).await;
        handle_client_frame(&app_state, &ana, &mut subscription, &join(second)).await;

        assert_eq!(subscription.as_ref().map(|s| s.group_id), Some(second));
        assert_eq!(app_state.broadcaster.receiver_count(first), 0);
        assert_eq!(app_state.broadcaster.receiver_count(second), 1);

        app_state.broadcaster.publish(GroupEvent::ChatCleared { group_id: first });
        let sub = subscription.as_mut().unwrap();
        assert!(matches!(sub.rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn incomplete_or_malformed_sends_are_dropped() {
        let store = Arc::new(MemoryStore::new());
        let (ana, ben) = (member(&store, "ana").await, member(&store, "ben").await);
        let group_id = form(&store, &ana, &ben).await;
        let app_state = state(&store);

        let mut subscription = None;
        handle_client_frame(&app_state, &ana, &mut subscription, &join(group_id)).await;

        let missing_type = json!({
            "event": "send-message",
            "data": { "groupId": group_id, "senderId": ana.id, "senderName": "ana", "content": "hi" }
        });
        handle_client_frame(&app_state, &ana, &mut subscription, &missing_type.to_string()).await;
        handle_client_frame(&app_state, &ana, &mut subscription, "{not json").await;

        assert!(store.list_group_messages(group_id).await.unwrap().is_empty());
        let sub = subscription.as_mut().unwrap();
        assert!(matches!(sub.rx.try_recv(), Err(TryRecvError::Empty)));

        let complete = json!({
            "event": "sendMessage",
            "data": { "group_id": group_id, "sender_id": ana.id, "sender": "ana", "content": "hi", "type": "text" }
        });
        handle_client_frame(&app_state, &ana, &mut subscription, &complete.to_string()).await;

        let stored = store.list_group_messages(group_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        let sub = subscription.as_mut().unwrap();
        assert_eq!(sub.rx.try_recv().unwrap(), GroupEvent::NewMessage(stored[0].clone()));
    }
}

use serde::{Deserialize, Serialize};

use crate::db::entities::{message, study_group};
use crate::db::enums::MessageType;

/// Group identity as broadcast in `group-updated` and returned by group edits.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GroupInfo {
    pub id: i32,
    pub name: String,
    pub icon_url: Option<String>,
}

impl From<study_group::Model> for GroupInfo {
    fn from(group: study_group::Model) -> Self {
        Self {
            id: group.id,
            name: group.name,
            icon_url: group.icon_url,
        }
    }
}

/// Server-to-client events, fanned out on a group's channel.
///
/// Serialized as `{"event": "new-message", "data": {...}}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum GroupEvent {
    NewMessage(message::Model),
    MessageUpdated(message::Model),
    MessageDeleted { id: i32, group_id: i32 },
    GroupUpdated(GroupInfo),
    ChatCleared { group_id: i32 },
}

impl GroupEvent {
    pub fn group_id(&self) -> i32 {
        match self {
            GroupEvent::NewMessage(m) | GroupEvent::MessageUpdated(m) => m.group_id,
            GroupEvent::MessageDeleted { group_id, .. } => *group_id,
            GroupEvent::GroupUpdated(g) => g.id,
            GroupEvent::ChatCleared { group_id } => *group_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GroupEvent::NewMessage(_) => "new-message",
            GroupEvent::MessageUpdated(_) => "message-updated",
            GroupEvent::MessageDeleted { .. } => "message-deleted",
            GroupEvent::GroupUpdated(_) => "group-updated",
            GroupEvent::ChatCleared { .. } => "chat-cleared",
        }
    }
}

/// Client-to-server frames.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "event", content = "data")]
pub enum ClientWsMessage {
    #[serde(rename = "join-group")]
    JoinGroup(i32),
    #[serde(rename = "send-message", alias = "sendMessage")]
    SendMessage(SendMessagePayload),
}

/// Loosely-shaped send request. Every field is optional here so that an
/// incomplete frame parses and can be dropped by `validate`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SendMessagePayload {
    #[serde(alias = "groupId")]
    pub group_id: Option<i32>,
    #[serde(alias = "senderId")]
    pub sender_id: Option<i32>,
    #[serde(alias = "senderName", alias = "sender")]
    pub sender_name: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub message_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSend {
    pub group_id: i32,
    pub sender_id: i32,
    pub sender_name: String,
    pub content: String,
    pub message_type: MessageType,
}

impl SendMessagePayload {
    /// `None` when a required field is missing or blank, or the type is unknown.
    pub fn validate(self) -> Option<ValidatedSend> {
        let sender_name = self.sender_name.filter(|s| !s.trim().is_empty())?;
        let content = self.content.filter(|c| !c.trim().is_empty())?;
        let message_type = self.message_type?.parse().ok()?;
        Some(ValidatedSend {
            group_id: self.group_id?,
            sender_id: self.sender_id?,
            sender_name,
            content,
            message_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn events_use_named_envelopes() {
        let event = GroupEvent::MessageDeleted { id: 4, group_id: 2 };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "message-deleted", "data": {"id": 4, "group_id": 2}})
        );
        assert_eq!(event.name(), "message-deleted");

        let message = message::Model {
            id: 1,
            group_id: 9,
            sender_id: 3,
            sender_name: "Ana".into(),
            content: "hi".into(),
            message_type: MessageType::Text,
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(GroupEvent::NewMessage(message)).unwrap();
        assert_eq!(value["event"], "new-message");
        assert_eq!(value["data"]["type"], "text");

        let cleared = serde_json::to_value(GroupEvent::ChatCleared { group_id: 9 }).unwrap();
        assert_eq!(cleared, json!({"event": "chat-cleared", "data": {"group_id": 9}}));
    }

    #[test]
    fn send_message_accepts_both_spellings() {
        let camel: ClientWsMessage = serde_json::from_value(json!({
            "event": "sendMessage",
            "data": {"groupId": 5, "senderId": 3, "sender": "Ana", "content": "hello", "type": "text"}
        }))
        .unwrap();
        let snake: ClientWsMessage = serde_json::from_value(json!({
            "event": "send-message",
            "data": {"group_id": 5, "sender_id": 3, "sender_name": "Ana", "content": "hello", "type": "text"}
        }))
        .unwrap();

        for frame in [camel, snake] {
            let ClientWsMessage::SendMessage(payload) = frame else {
                panic!("expected a send-message frame");
            };
            let valid = payload.validate().unwrap();
            assert_eq!(valid.group_id, 5);
            assert_eq!(valid.sender_name, "Ana");
        }
    }

    #[test]
    fn incomplete_send_is_rejected() {
        let payload = SendMessagePayload {
            group_id: Some(5),
            sender_id: Some(3),
            sender_name: Some("Ana".into()),
            content: Some("   ".into()),
            message_type: Some("text".into()),
        };
        assert!(payload.validate().is_none());

        let payload = SendMessagePayload {
            group_id: Some(5),
            sender_id: Some(3),
            sender_name: Some("Ana".into()),
            content: Some("hello".into()),
            message_type: None,
        };
        assert!(payload.validate().is_none());
    }

    #[test]
    fn join_group_carries_the_group_id() {
        let frame: ClientWsMessage =
            serde_json::from_value(json!({"event": "join-group", "data": 12})).unwrap();
        assert!(matches!(frame, ClientWsMessage::JoinGroup(12)));
    }
}

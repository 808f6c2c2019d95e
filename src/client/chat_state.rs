//! Client-side view of one group's chat.
//!
//! The canonical message list only changes through server data: a full
//! history load or a broadcast [`GroupEvent`]. Everything else here is a
//! local overlay (pending unsends, "delete for me", reactions and voice
//! playback rates) that is never persisted or sent anywhere.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::db::entities::message;
use crate::db::enums::MessageType;
use crate::web::models::websocket_models::{ClientWsMessage, GroupEvent, GroupInfo, SendMessagePayload};

/// Playback speeds offered for voice messages.
pub const PLAYBACK_RATES: [f32; 5] = [0.75, 1.0, 1.25, 1.5, 2.0];

#[derive(Debug, Error, PartialEq)]
pub enum ChatViewError {
    #[error("Message {0} is not in the view")]
    NotInView(i32),
    #[error("Message {0} already has an unsend in flight")]
    UnsendPending(i32),
    #[error("No unsend in flight for message {0}")]
    NoPendingUnsend(i32),
    #[error("Unsupported playback rate {0}")]
    UnsupportedRate(f32),
}

#[derive(Debug, Clone)]
pub struct ChatView {
    group: GroupInfo,
    messages: Vec<message::Model>,
    pending_unsends: HashMap<i32, message::Model>,
    hidden: HashSet<i32>,
    reactions: HashMap<i32, Vec<String>>,
    playback_rates: HashMap<i32, f32>,
}

fn order_key(m: &message::Model) -> (chrono::DateTime<chrono::Utc>, i32) {
    (m.timestamp, m.id)
}

impl ChatView {
    pub fn new(group: GroupInfo, history: Vec<message::Model>) -> Self {
        let mut view = Self {
            group,
            messages: Vec::new(),
            pending_unsends: HashMap::new(),
            hidden: HashSet::new(),
            reactions: HashMap::new(),
            playback_rates: HashMap::new(),
        };
        view.reload(history);
        view
    }

    /// Replaces the canonical list with a fresh history fetch. Local
    /// overlays survive; pending unsends are dropped from the new list.
    pub fn reload(&mut self, mut history: Vec<message::Model>) {
        history.retain(|m| m.group_id == self.group.id && !self.pending_unsends.contains_key(&m.id));
        history.sort_by_key(order_key);
        history.dedup_by_key(|m| m.id);
        self.messages = history;
    }

    pub fn group(&self) -> &GroupInfo {
        &self.group
    }

    /// Applies a broadcast event. Returns `false` for events of other groups.
    pub fn apply(&mut self, event: GroupEvent) -> bool {
        if event.group_id() != self.group.id {
            return false;
        }
        match event {
            GroupEvent::NewMessage(msg) => {
                self.pending_unsends.remove(&msg.id);
                self.upsert(msg);
            }
            GroupEvent::MessageUpdated(msg) => {
                if let Some(pending) = self.pending_unsends.get_mut(&msg.id) {
                    *pending = msg;
                } else if let Some(existing) = self.messages.iter_mut().find(|m| m.id == msg.id) {
                    *existing = msg;
                }
            }
            GroupEvent::MessageDeleted { id, .. } => {
                self.pending_unsends.remove(&id);
                self.messages.retain(|m| m.id != id);
                self.forget_local(id);
            }
            GroupEvent::GroupUpdated(info) => {
                self.group = info;
            }
            GroupEvent::ChatCleared { .. } => {
                self.messages.clear();
                self.pending_unsends.clear();
                self.reactions.clear();
                self.playback_rates.clear();
            }
        }
        true
    }

    fn upsert(&mut self, msg: message::Model) {
        if let Some(existing) = self.messages.iter_mut().find(|m| m.id == msg.id) {
            *existing = msg;
            return;
        }
        let key = order_key(&msg);
        let at = self.messages.partition_point(|m| order_key(m) <= key);
        self.messages.insert(at, msg);
    }

    fn forget_local(&mut self, id: i32) {
        self.reactions.remove(&id);
        self.playback_rates.remove(&id);
    }

    /// Builds the outbound send frame. Nothing is appended locally: the
    /// message shows up once its `new-message` broadcast arrives.
    pub fn compose(
        &self,
        sender_id: i32,
        sender_name: &str,
        content: &str,
        message_type: MessageType,
    ) -> ClientWsMessage {
        ClientWsMessage::SendMessage(SendMessagePayload {
            group_id: Some(self.group.id),
            sender_id: Some(sender_id),
            sender_name: Some(sender_name.to_string()),
            content: Some(content.to_string()),
            message_type: Some(message_type.to_string()),
        })
    }

    pub fn join_frame(&self) -> ClientWsMessage {
        ClientWsMessage::JoinGroup(self.group.id)
    }

    /// Optimistically removes a message ahead of the server's answer.
    pub fn begin_unsend(&mut self, message_id: i32) -> Result<(), ChatViewError> {
        if self.pending_unsends.contains_key(&message_id) {
            return Err(ChatViewError::UnsendPending(message_id));
        }
        let idx = self
            .messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or(ChatViewError::NotInView(message_id))?;
        let removed = self.messages.remove(idx);
        self.pending_unsends.insert(message_id, removed);
        Ok(())
    }

    pub fn confirm_unsend(&mut self, message_id: i32) -> Result<(), ChatViewError> {
        self.pending_unsends
            .remove(&message_id)
            .ok_or(ChatViewError::NoPendingUnsend(message_id))?;
        self.forget_local(message_id);
        Ok(())
    }

    /// Puts a message back after a failed unsend, at the position it
    /// would hold had the unsend never been attempted.
    pub fn rollback_unsend(&mut self, message_id: i32) -> Result<(), ChatViewError> {
        let msg = self
            .pending_unsends
            .remove(&message_id)
            .ok_or(ChatViewError::NoPendingUnsend(message_id))?;
        self.upsert(msg);
        Ok(())
    }

    /// Hides a message for this session only.
    pub fn delete_for_me(&mut self, message_id: i32) {
        self.hidden.insert(message_id);
    }

    pub fn visible_messages(&self) -> impl Iterator<Item = &message::Model> {
        self.messages.iter().filter(|m| !self.hidden.contains(&m.id))
    }

    pub fn add_reaction(&mut self, message_id: i32, emoji: &str) -> Result<(), ChatViewError> {
        if !self.messages.iter().any(|m| m.id == message_id) {
            return Err(ChatViewError::NotInView(message_id));
        }
        let list = self.reactions.entry(message_id).or_default();
        if !list.iter().any(|e| e == emoji) {
            list.push(emoji.to_string());
        }
        Ok(())
    }

    pub fn reactions(&self, message_id: i32) -> &[String] {
        self.reactions.get(&message_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_playback_rate(&mut self, message_id: i32, rate: f32) -> Result<(), ChatViewError> {
        if !PLAYBACK_RATES.contains(&rate) {
            return Err(ChatViewError::UnsupportedRate(rate));
        }
        if !self.messages.iter().any(|m| m.id == message_id) {
            return Err(ChatViewError::NotInView(message_id));
        }
        self.playback_rates.insert(message_id, rate);
        Ok(())
    }

    pub fn playback_rate(&self, message_id: i32) -> f32 {
        self.playback_rates.get(&message_id).copied().unwrap_or(1.0)
    }
}

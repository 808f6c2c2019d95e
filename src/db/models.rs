use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::entities::{message, note};
use crate::db::enums::{MessageType, NoteSource, NoteType};

/// A (subject, score) pair as used by profiles and the matching engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectScore {
    pub subject_name: String,
    pub score: i32,
}

impl SubjectScore {
    pub fn new(subject_name: impl Into<String>, score: i32) -> Self {
        Self {
            subject_name: subject_name.into(),
            score,
        }
    }
}

/// Fields required to create a user row. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub branch: String,
    pub email: String,
    pub password_hash: String,
    pub goals: Option<String>,
}

/// Public view of a user: what the profile endpoint and login return.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: i32,
    pub name: String,
    pub branch: String,
    pub email: String,
    pub goals: Option<String>,
    pub group_preference: i32,
    pub group_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<SubjectScore>,
}

/// Group member as listed in the group state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberSummary {
    pub id: i32,
    pub name: String,
    pub branch: String,
    pub email: String,
    pub goals: Option<String>,
}

/// Input for the all-or-nothing group formation write.
#[derive(Debug, Clone)]
pub struct FormationRequest {
    pub name: String,
    pub creator_id: i32,
    /// Additional members, deduplicated and never containing the creator.
    pub member_ids: Vec<i32>,
    /// Reject the whole formation if a listed member already belongs to a group.
    pub require_ungrouped: bool,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub group_id: i32,
    pub sender_id: i32,
    pub sender_name: String,
    pub content: String,
    pub message_type: MessageType,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub group_id: i32,
    pub creator_id: i32,
    pub subject: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskWithCount {
    pub id: i32,
    pub group_id: i32,
    pub creator_id: i32,
    pub creator_name: String,
    pub subject: String,
    pub content: String,
    pub completion_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Everything a client needs to (re)build its view of a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupState {
    pub id: i32,
    pub name: String,
    pub icon_url: Option<String>,
    pub members: Vec<MemberSummary>,
    pub messages: Vec<message::Model>,
    pub tasks: Vec<TaskWithCount>,
}

#[derive(Debug, Clone)]
pub struct NewNote {
    pub user_id: i32,
    pub group_id: Option<i32>,
    pub file_name: String,
    pub file_url: String,
    pub file_type: String,
    pub subject_tags: Vec<String>,
    pub note_type: NoteType,
    pub description: Option<String>,
    pub source: NoteSource,
    pub chat_message_id: Option<i32>,
    pub file_size: i64,
}

/// Identity used to reject a duplicate import, checked in the same write as the insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteDuplicateKey {
    Upload { file_name: String, file_size: i64 },
    ChatSave { file_url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteSort {
    #[default]
    Newest,
    Oldest,
}

#[derive(Debug, Clone, Default)]
pub struct NoteFilter {
    pub search: Option<String>,
    pub reviewed: Option<bool>,
    pub subject: Option<String>,
    pub note_type: Option<NoteType>,
    pub sort: NoteSort,
    pub page: u64,
    pub limit: u64,
}

impl NoteFilter {
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    /// In-memory equivalent of the SQL filter, shared by fake stores.
    pub fn matches(&self, note: &note::Model) -> bool {
        if let Some(search) = self.search.as_deref() {
            if !note.file_name.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }
        if let Some(reviewed) = self.reviewed {
            if note.reviewed != reviewed {
                return false;
            }
        }
        if let Some(note_type) = self.note_type {
            if note.note_type != note_type {
                return false;
            }
        }
        if let Some(subject) = self.subject.as_deref() {
            let subject = subject.to_lowercase();
            if !note.subject_tags.0.iter().any(|t| t.to_lowercase().contains(&subject)) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotePage {
    pub notes: Vec<note::Model>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    #[serde(rename = "totalPages")]
    pub total_pages: u64,
}

impl NotePage {
    pub fn new(notes: Vec<note::Model>, filter: &NoteFilter, total: u64) -> Self {
        let limit = filter.limit.max(1);
        Self {
            notes,
            page: filter.page,
            limit,
            total,
            total_pages: total.div_ceil(limit).max(1),
        }
    }
}

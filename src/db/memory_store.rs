//! In-memory `Store` used by service and router tests.
//!
//! Every write runs against a staged copy of the state which only replaces
//! the live state when the whole operation succeeds, so a failure injected
//! half-way through a formation leaves nothing behind.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;

use crate::db::entities::note::{Annotations, SubjectTags};
use crate::db::entities::{message, note, study_group, task, user};
use crate::db::models::{
    FormationRequest, MemberSummary, NewMessage, NewNote, NewTask, NewUser, NoteDuplicateKey,
    NoteFilter, NoteSort, SubjectScore, TaskWithCount,
};
use crate::db::repository::{
    GroupRepository, MessageRepository, NoteRepository, StoreError, TaskRepository,
    UserRepository,
};
use crate::db::enums::NoteSource;

#[derive(Clone, Default)]
struct MemoryState {
    users: BTreeMap<i32, user::Model>,
    subjects: HashMap<i32, Vec<SubjectScore>>,
    groups: BTreeMap<i32, study_group::Model>,
    messages: BTreeMap<i32, message::Model>,
    tasks: BTreeMap<i32, task::Model>,
    completions: HashSet<(i32, i32)>,
    notes: BTreeMap<i32, note::Model>,
    next_id: i32,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    /// Fail formation after this many member assignments.
    formation_failure_after: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_formation_failure_after(assignments: usize) -> Self {
        Self {
            formation_failure_after: Some(assignments),
            ..Self::default()
        }
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> Result<user::Model, StoreError> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Conflict("Email already exists".to_string()));
        }
        let id = state.allocate_id();
        let model = user::Model {
            id,
            name: new_user.name,
            branch: new_user.branch,
            email: new_user.email,
            password_hash: new_user.password_hash,
            goals: new_user.goals,
            group_preference: 3,
            group_id: None,
            created_at: Utc::now(),
        };
        state.users.insert(id, model.clone());
        Ok(model)
    }

    async fn find_user(&self, user_id: i32) -> Result<Option<user::Model>, StoreError> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<user::Model>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn subjects_for_user(&self, user_id: i32) -> Result<Vec<SubjectScore>, StoreError> {
        let state = self.state.lock().await;
        let mut subjects = state.subjects.get(&user_id).cloned().unwrap_or_default();
        subjects.sort_by(|a, b| a.subject_name.cmp(&b.subject_name));
        Ok(subjects)
    }

    async fn subjects_for_users(
        &self,
        user_ids: &[i32],
    ) -> Result<HashMap<i32, Vec<SubjectScore>>, StoreError> {
        let state = self.state.lock().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| state.subjects.get(id).map(|s| (*id, s.clone())))
            .collect())
    }

    async fn replace_subjects(
        &self,
        user_id: i32,
        subjects: &[SubjectScore],
        group_preference: i32,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let user = state.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        user.group_preference = group_preference;
        state.subjects.insert(user_id, subjects.to_vec());
        Ok(())
    }

    async fn list_ungrouped_users_except(&self, user_id: i32) -> Result<Vec<user::Model>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .filter(|u| u.id != user_id && u.group_id.is_none())
            .cloned()
            .collect())
    }

    async fn set_user_group(&self, user_id: i32, group_id: Option<i32>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let user = state.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        user.group_id = group_id;
        Ok(())
    }
}

#[async_trait]
impl GroupRepository for MemoryStore {
    async fn create_group_with_members(
        &self,
        request: &FormationRequest,
    ) -> Result<study_group::Model, StoreError> {
        let mut state = self.state.lock().await;
        let mut staged = state.clone();

        if request.require_ungrouped {
            if let Some(taken) = request
                .member_ids
                .iter()
                .find(|id| staged.users.get(id).is_some_and(|u| u.group_id.is_some()))
            {
                return Err(StoreError::Conflict(format!(
                    "User {taken} already belongs to a group"
                )));
            }
        }

        let group = study_group::Model {
            id: staged.allocate_id(),
            name: request.name.clone(),
            icon_url: None,
            created_at: Utc::now(),
        };
        staged.groups.insert(group.id, group.clone());

        let creator = staged
            .users
            .get_mut(&request.creator_id)
            .ok_or(StoreError::NotFound)?;
        creator.group_id = Some(group.id);

        for (assigned, member_id) in request.member_ids.iter().enumerate() {
            if self.formation_failure_after == Some(assigned) {
                return Err(StoreError::Database("injected formation failure".to_string()));
            }
            if let Some(member) = staged.users.get_mut(member_id) {
                member.group_id = Some(group.id);
            }
        }

        *state = staged;
        Ok(group)
    }

    async fn find_group(&self, group_id: i32) -> Result<Option<study_group::Model>, StoreError> {
        Ok(self.state.lock().await.groups.get(&group_id).cloned())
    }

    async fn update_group(
        &self,
        group_id: i32,
        name: &str,
        icon_url: Option<&str>,
    ) -> Result<study_group::Model, StoreError> {
        let mut state = self.state.lock().await;
        let group = state.groups.get_mut(&group_id).ok_or(StoreError::NotFound)?;
        group.name = name.to_string();
        group.icon_url = icon_url.map(str::to_string);
        Ok(group.clone())
    }

    async fn list_members(&self, group_id: i32) -> Result<Vec<MemberSummary>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .filter(|u| u.group_id == Some(group_id))
            .map(|u| MemberSummary {
                id: u.id,
                name: u.name.clone(),
                branch: u.branch.clone(),
                email: u.email.clone(),
                goals: u.goals.clone(),
            })
            .collect())
    }

    async fn is_member(&self, user_id: i32, group_id: i32) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .get(&user_id)
            .is_some_and(|u| u.group_id == Some(group_id)))
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn insert_message(&self, new_message: NewMessage) -> Result<message::Model, StoreError> {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let model = message::Model {
            id,
            group_id: new_message.group_id,
            sender_id: new_message.sender_id,
            sender_name: new_message.sender_name,
            content: new_message.content,
            message_type: new_message.message_type,
            timestamp: Utc::now(),
        };
        state.messages.insert(id, model.clone());
        Ok(model)
    }

    async fn find_message(&self, message_id: i32) -> Result<Option<message::Model>, StoreError> {
        Ok(self.state.lock().await.messages.get(&message_id).cloned())
    }

    async fn update_message_content(
        &self,
        message_id: i32,
        content: &str,
    ) -> Result<message::Model, StoreError> {
        let mut state = self.state.lock().await;
        let message = state.messages.get_mut(&message_id).ok_or(StoreError::NotFound)?;
        message.content = content.to_string();
        Ok(message.clone())
    }

    async fn delete_message(&self, message_id: i32) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.messages.remove(&message_id).map_or(0, |_| 1))
    }

    async fn delete_group_messages(&self, group_id: i32) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.messages.len();
        state.messages.retain(|_, m| m.group_id != group_id);
        Ok((before - state.messages.len()) as u64)
    }

    async fn list_group_messages(&self, group_id: i32) -> Result<Vec<message::Model>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .messages
            .values()
            .filter(|m| m.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn search_group_messages(
        &self,
        group_id: i32,
        search: Option<&str>,
        limit: u64,
    ) -> Result<Vec<message::Model>, StoreError> {
        let state = self.state.lock().await;
        let needle = search.map(str::to_lowercase);
        Ok(state
            .messages
            .values()
            .rev()
            .filter(|m| m.group_id == group_id)
            .filter(|m| {
                needle
                    .as_deref()
                    .is_none_or(|n| m.content.to_lowercase().contains(n))
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TaskRepository for MemoryStore {
    async fn insert_task(&self, new_task: NewTask) -> Result<task::Model, StoreError> {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let model = task::Model {
            id,
            group_id: new_task.group_id,
            creator_id: new_task.creator_id,
            subject: new_task.subject,
            content: new_task.content,
            created_at: Utc::now(),
        };
        state.tasks.insert(id, model.clone());
        Ok(model)
    }

    async fn find_task(&self, task_id: i32) -> Result<Option<task::Model>, StoreError> {
        Ok(self.state.lock().await.tasks.get(&task_id).cloned())
    }

    async fn complete_task(&self, task_id: i32, user_id: i32) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.completions.insert((task_id, user_id)) {
            return Err(StoreError::Conflict("Already completed".to_string()));
        }
        Ok(())
    }

    async fn completion_count(&self, task_id: i32) -> Result<i64, StoreError> {
        let state = self.state.lock().await;
        Ok(state.completions.iter().filter(|(t, _)| *t == task_id).count() as i64)
    }

    async fn list_tasks_with_counts(&self, group_id: i32) -> Result<Vec<TaskWithCount>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .tasks
            .values()
            .filter(|t| t.group_id == group_id)
            .map(|t| TaskWithCount {
                id: t.id,
                group_id: t.group_id,
                creator_id: t.creator_id,
                creator_name: state
                    .users
                    .get(&t.creator_id)
                    .map(|u| u.name.clone())
                    .unwrap_or_default(),
                subject: t.subject.clone(),
                content: t.content.clone(),
                completion_count: state.completions.iter().filter(|(id, _)| *id == t.id).count()
                    as i64,
                created_at: t.created_at,
            })
            .collect())
    }
}

#[async_trait]
impl NoteRepository for MemoryStore {
    async fn create_note(
        &self,
        new_note: NewNote,
        duplicate_key: Option<NoteDuplicateKey>,
    ) -> Result<note::Model, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(key) = duplicate_key {
            let duplicate = state.notes.values().any(|n| {
                n.user_id == new_note.user_id
                    && n.source == new_note.source
                    && match &key {
                        NoteDuplicateKey::Upload { file_name, file_size } => {
                            &n.file_name == file_name && n.file_size == *file_size
                        }
                        NoteDuplicateKey::ChatSave { file_url } => &n.file_url == file_url,
                    }
            });
            if duplicate {
                let message = match new_note.source {
                    NoteSource::Upload => "Duplicate upload detected",
                    NoteSource::Chat => "Already saved in notes",
                };
                return Err(StoreError::Conflict(message.to_string()));
            }
        }

        let id = state.allocate_id();
        let model = note::Model {
            id,
            user_id: new_note.user_id,
            group_id: new_note.group_id,
            file_name: new_note.file_name,
            file_url: new_note.file_url,
            file_type: new_note.file_type,
            subject_tags: SubjectTags(new_note.subject_tags),
            note_type: new_note.note_type,
            description: new_note.description,
            reviewed: false,
            annotations: Annotations::default(),
            source: new_note.source,
            chat_message_id: new_note.chat_message_id,
            file_size: new_note.file_size,
            created_at: Utc::now(),
        };
        state.notes.insert(id, model.clone());
        Ok(model)
    }

    async fn find_note_for_user(
        &self,
        note_id: i32,
        user_id: i32,
    ) -> Result<Option<note::Model>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.notes.get(&note_id).filter(|n| n.user_id == user_id).cloned())
    }

    async fn list_notes(
        &self,
        user_id: i32,
        filter: &NoteFilter,
    ) -> Result<(Vec<note::Model>, u64), StoreError> {
        let state = self.state.lock().await;
        let mut matching: Vec<note::Model> = state
            .notes
            .values()
            .filter(|n| n.user_id == user_id && filter.matches(n))
            .cloned()
            .collect();
        if filter.sort == NoteSort::Newest {
            matching.reverse();
        }
        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn save_note(&self, note: note::Model) -> Result<note::Model, StoreError> {
        let mut state = self.state.lock().await;
        match state.notes.get_mut(&note.id) {
            Some(existing) if existing.user_id == note.user_id => {
                *existing = note.clone();
                Ok(note)
            }
            _ => Err(StoreError::NotFound),
        }
    }

    async fn delete_note(&self, note_id: i32, user_id: i32) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        if state.notes.get(&note_id).is_some_and(|n| n.user_id == user_id) {
            state.notes.remove(&note_id);
            return Ok(1);
        }
        Ok(0)
    }
}

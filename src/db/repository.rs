//! Data-access contracts. Core logic only ever sees these traits, so the
//! sea-orm store and the in-memory store are interchangeable.

use async_trait::async_trait;
use sea_orm::{DbErr, RuntimeErr};
use std::collections::HashMap;
use thiserror::Error;

use crate::db::entities::{message, note, study_group, task, user};
use crate::db::models::{
    FormationRequest, MemberSummary, NewMessage, NewNote, NewTask, NewUser, NoteDuplicateKey,
    NoteFilter, SubjectScore, TaskWithCount,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match &err {
            DbErr::Query(RuntimeErr::SqlxError(sqlx_error)) | DbErr::Exec(RuntimeErr::SqlxError(sqlx_error)) => {
                if let sqlx::Error::Database(database_error) = sqlx_error {
                    if database_error.is_unique_violation() {
                        return StoreError::Conflict(database_error.message().to_string());
                    }
                }
                StoreError::Database(sqlx_error.to_string())
            }
            DbErr::RecordNotFound(_) | DbErr::RecordNotUpdated => StoreError::NotFound,
            _ => StoreError::Database(err.to_string()),
        }
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, new_user: NewUser) -> Result<user::Model, StoreError>;
    async fn find_user(&self, user_id: i32) -> Result<Option<user::Model>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<user::Model>, StoreError>;
    async fn subjects_for_user(&self, user_id: i32) -> Result<Vec<SubjectScore>, StoreError>;
    async fn subjects_for_users(
        &self,
        user_ids: &[i32],
    ) -> Result<HashMap<i32, Vec<SubjectScore>>, StoreError>;
    /// Deletes the user's subject set, inserts `subjects` and stores the
    /// preference, as one unit.
    async fn replace_subjects(
        &self,
        user_id: i32,
        subjects: &[SubjectScore],
        group_preference: i32,
    ) -> Result<(), StoreError>;
    /// Users with no group, excluding `user_id`, in ascending id order.
    async fn list_ungrouped_users_except(&self, user_id: i32) -> Result<Vec<user::Model>, StoreError>;
    async fn set_user_group(&self, user_id: i32, group_id: Option<i32>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Creates the group and assigns the creator and every listed member in a
    /// single transaction. On error nothing is visible.
    async fn create_group_with_members(
        &self,
        request: &FormationRequest,
    ) -> Result<study_group::Model, StoreError>;
    async fn find_group(&self, group_id: i32) -> Result<Option<study_group::Model>, StoreError>;
    async fn update_group(
        &self,
        group_id: i32,
        name: &str,
        icon_url: Option<&str>,
    ) -> Result<study_group::Model, StoreError>;
    async fn list_members(&self, group_id: i32) -> Result<Vec<MemberSummary>, StoreError>;
    async fn is_member(&self, user_id: i32, group_id: i32) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert_message(&self, new_message: NewMessage) -> Result<message::Model, StoreError>;
    async fn find_message(&self, message_id: i32) -> Result<Option<message::Model>, StoreError>;
    async fn update_message_content(
        &self,
        message_id: i32,
        content: &str,
    ) -> Result<message::Model, StoreError>;
    async fn delete_message(&self, message_id: i32) -> Result<u64, StoreError>;
    async fn delete_group_messages(&self, group_id: i32) -> Result<u64, StoreError>;
    /// Full history, oldest first.
    async fn list_group_messages(&self, group_id: i32) -> Result<Vec<message::Model>, StoreError>;
    /// Newest first, optionally filtered by a case-insensitive content substring.
    async fn search_group_messages(
        &self,
        group_id: i32,
        search: Option<&str>,
        limit: u64,
    ) -> Result<Vec<message::Model>, StoreError>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn insert_task(&self, new_task: NewTask) -> Result<task::Model, StoreError>;
    async fn find_task(&self, task_id: i32) -> Result<Option<task::Model>, StoreError>;
    /// Fails with `Conflict` when the pair already exists.
    async fn complete_task(&self, task_id: i32, user_id: i32) -> Result<(), StoreError>;
    async fn completion_count(&self, task_id: i32) -> Result<i64, StoreError>;
    async fn list_tasks_with_counts(&self, group_id: i32) -> Result<Vec<TaskWithCount>, StoreError>;
}

#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Inserts the note; when `duplicate_key` is given and a same-source note
    /// of the same user matches it, fails with `Conflict` and inserts nothing.
    async fn create_note(
        &self,
        new_note: NewNote,
        duplicate_key: Option<NoteDuplicateKey>,
    ) -> Result<note::Model, StoreError>;
    async fn find_note_for_user(
        &self,
        note_id: i32,
        user_id: i32,
    ) -> Result<Option<note::Model>, StoreError>;
    /// Returns one page of matching notes plus the total match count.
    async fn list_notes(
        &self,
        user_id: i32,
        filter: &NoteFilter,
    ) -> Result<(Vec<note::Model>, u64), StoreError>;
    async fn save_note(&self, note: note::Model) -> Result<note::Model, StoreError>;
    async fn delete_note(&self, note_id: i32, user_id: i32) -> Result<u64, StoreError>;
}

/// The full persistence surface the application runs against.
pub trait Store:
    UserRepository + GroupRepository + MessageRepository + TaskRepository + NoteRepository
{
}

impl<T> Store for T where
    T: UserRepository + GroupRepository + MessageRepository + TaskRepository + NoteRepository
{
}

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};

use super::SeaOrmStore;
use crate::db::entities::note::{self, Annotations, SubjectTags};
use crate::db::enums::NoteSource;
use crate::db::models::{NewNote, NoteDuplicateKey, NoteFilter, NoteSort};
use crate::db::repository::{NoteRepository, StoreError};

fn filtered(user_id: i32, filter: &NoteFilter) -> Select<note::Entity> {
    let mut query = note::Entity::find().filter(note::Column::UserId.eq(user_id));
    if let Some(search) = filter.search.as_deref() {
        query = query.filter(note::Column::FileName.contains(search));
    }
    if let Some(reviewed) = filter.reviewed {
        query = query.filter(note::Column::Reviewed.eq(reviewed));
    }
    if let Some(note_type) = filter.note_type {
        query = query.filter(note::Column::NoteType.eq(note_type));
    }
    if let Some(subject) = filter.subject.as_deref() {
        // Tags are a JSON array; a substring match on the text form mirrors `NoteFilter::matches`.
        query = query.filter(note::Column::SubjectTags.contains(subject));
    }
    query
}

#[async_trait]
impl NoteRepository for SeaOrmStore {
    async fn create_note(
        &self,
        new_note: NewNote,
        duplicate_key: Option<NoteDuplicateKey>,
    ) -> Result<note::Model, StoreError> {
        let txn = self.db.begin().await?;

        if let Some(key) = duplicate_key {
            let base = note::Entity::find()
                .filter(note::Column::UserId.eq(new_note.user_id))
                .filter(note::Column::Source.eq(new_note.source));
            let existing = match key {
                NoteDuplicateKey::Upload { file_name, file_size } => base
                    .filter(note::Column::FileName.eq(file_name))
                    .filter(note::Column::FileSize.eq(file_size))
                    .one(&txn)
                    .await?,
                NoteDuplicateKey::ChatSave { file_url } => base
                    .filter(note::Column::FileUrl.eq(file_url))
                    .one(&txn)
                    .await?,
            };
            if existing.is_some() {
                txn.rollback().await?;
                let message = match new_note.source {
                    NoteSource::Upload => "Duplicate upload detected",
                    NoteSource::Chat => "Already saved in notes",
                };
                return Err(StoreError::Conflict(message.to_string()));
            }
        }

        let model = note::ActiveModel {
            user_id: Set(new_note.user_id),
            group_id: Set(new_note.group_id),
            file_name: Set(new_note.file_name),
            file_url: Set(new_note.file_url),
            file_type: Set(new_note.file_type),
            subject_tags: Set(SubjectTags(new_note.subject_tags)),
            note_type: Set(new_note.note_type),
            description: Set(new_note.description),
            reviewed: Set(false),
            annotations: Set(Annotations::default()),
            source: Set(new_note.source),
            chat_message_id: Set(new_note.chat_message_id),
            file_size: Set(new_note.file_size),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(model)
    }

    async fn find_note_for_user(
        &self,
        note_id: i32,
        user_id: i32,
    ) -> Result<Option<note::Model>, StoreError> {
        Ok(note::Entity::find_by_id(note_id)
            .filter(note::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?)
    }

    async fn list_notes(
        &self,
        user_id: i32,
        filter: &NoteFilter,
    ) -> Result<(Vec<note::Model>, u64), StoreError> {
        let total = filtered(user_id, filter).count(&self.db).await?;

        let query = match filter.sort {
            NoteSort::Newest => filtered(user_id, filter)
                .order_by_desc(note::Column::CreatedAt)
                .order_by_desc(note::Column::Id),
            NoteSort::Oldest => filtered(user_id, filter)
                .order_by_asc(note::Column::CreatedAt)
                .order_by_asc(note::Column::Id),
        };
        let notes = query
            .offset(filter.offset())
            .limit(filter.limit)
            .all(&self.db)
            .await?;
        Ok((notes, total))
    }

    async fn save_note(&self, note: note::Model) -> Result<note::Model, StoreError> {
        let existing = note::Entity::find_by_id(note.id)
            .filter(note::Column::UserId.eq(note.user_id))
            .one(&self.db)
            .await?
            .ok_or(StoreError::NotFound)?;

        let mut active = existing.into_active_model();
        active.file_name = Set(note.file_name);
        active.subject_tags = Set(note.subject_tags);
        active.note_type = Set(note.note_type);
        active.description = Set(note.description);
        active.reviewed = Set(note.reviewed);
        active.annotations = Set(note.annotations);
        Ok(active.update(&self.db).await?)
    }

    async fn delete_note(&self, note_id: i32, user_id: i32) -> Result<u64, StoreError> {
        let result = note::Entity::delete_many()
            .filter(note::Column::Id.eq(note_id))
            .filter(note::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

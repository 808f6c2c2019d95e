use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use super::SeaOrmStore;
use crate::db::entities::message;
use crate::db::models::NewMessage;
use crate::db::repository::{MessageRepository, StoreError};

#[async_trait]
impl MessageRepository for SeaOrmStore {
    async fn insert_message(&self, new_message: NewMessage) -> Result<message::Model, StoreError> {
        let model = message::ActiveModel {
            group_id: Set(new_message.group_id),
            sender_id: Set(new_message.sender_id),
            sender_name: Set(new_message.sender_name),
            content: Set(new_message.content),
            message_type: Set(new_message.message_type),
            timestamp: Set(Utc::now()),
            ..Default::default()
        };
        Ok(model.insert(&self.db).await?)
    }

    async fn find_message(&self, message_id: i32) -> Result<Option<message::Model>, StoreError> {
        Ok(message::Entity::find_by_id(message_id).one(&self.db).await?)
    }

    async fn update_message_content(
        &self,
        message_id: i32,
        content: &str,
    ) -> Result<message::Model, StoreError> {
        let existing = message::Entity::find_by_id(message_id)
            .one(&self.db)
            .await?
            .ok_or(StoreError::NotFound)?;
        let mut active = existing.into_active_model();
        active.content = Set(content.to_string());
        Ok(active.update(&self.db).await?)
    }

    async fn delete_message(&self, message_id: i32) -> Result<u64, StoreError> {
        let result = message::Entity::delete_by_id(message_id).exec(&self.db).await?;
        Ok(result.rows_affected)
    }

    async fn delete_group_messages(&self, group_id: i32) -> Result<u64, StoreError> {
        let result = message::Entity::delete_many()
            .filter(message::Column::GroupId.eq(group_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn list_group_messages(&self, group_id: i32) -> Result<Vec<message::Model>, StoreError> {
        Ok(message::Entity::find()
            .filter(message::Column::GroupId.eq(group_id))
            .order_by_asc(message::Column::Timestamp)
            .order_by_asc(message::Column::Id)
            .all(&self.db)
            .await?)
    }

    async fn search_group_messages(
        &self,
        group_id: i32,
        search: Option<&str>,
        limit: u64,
    ) -> Result<Vec<message::Model>, StoreError> {
        let mut query = message::Entity::find().filter(message::Column::GroupId.eq(group_id));
        if let Some(term) = search {
            // SQLite LIKE is case-insensitive for ASCII.
            query = query.filter(message::Column::Content.contains(term));
        }
        Ok(query
            .order_by_desc(message::Column::Timestamp)
            .order_by_desc(message::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?)
    }
}

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::collections::HashMap;

use super::SeaOrmStore;
use crate::db::entities::{task, task_completion, user};
use crate::db::models::{NewTask, TaskWithCount};
use crate::db::repository::{StoreError, TaskRepository};

#[async_trait]
impl TaskRepository for SeaOrmStore {
    async fn insert_task(&self, new_task: NewTask) -> Result<task::Model, StoreError> {
        let model = task::ActiveModel {
            group_id: Set(new_task.group_id),
            creator_id: Set(new_task.creator_id),
            subject: Set(new_task.subject),
            content: Set(new_task.content),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        Ok(model.insert(&self.db).await?)
    }

    async fn find_task(&self, task_id: i32) -> Result<Option<task::Model>, StoreError> {
        Ok(task::Entity::find_by_id(task_id).one(&self.db).await?)
    }

    async fn complete_task(&self, task_id: i32, user_id: i32) -> Result<(), StoreError> {
        let existing = task_completion::Entity::find_by_id((task_id, user_id))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(StoreError::Conflict("Already completed".to_string()));
        }

        let completion = task_completion::ActiveModel {
            task_id: Set(task_id),
            user_id: Set(user_id),
            completed_at: Set(Utc::now()),
        };
        // A concurrent insert of the same pair still surfaces as a unique violation.
        task_completion::Entity::insert(completion)
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn completion_count(&self, task_id: i32) -> Result<i64, StoreError> {
        let count = task_completion::Entity::find()
            .filter(task_completion::Column::TaskId.eq(task_id))
            .count(&self.db)
            .await?;
        Ok(count as i64)
    }

    async fn list_tasks_with_counts(&self, group_id: i32) -> Result<Vec<TaskWithCount>, StoreError> {
        let tasks = task::Entity::find()
            .filter(task::Column::GroupId.eq(group_id))
            .order_by_asc(task::Column::CreatedAt)
            .order_by_asc(task::Column::Id)
            .all(&self.db)
            .await?;
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let task_ids: Vec<i32> = tasks.iter().map(|t| t.id).collect();
        let creator_ids: Vec<i32> = tasks.iter().map(|t| t.creator_id).collect();

        let creators: HashMap<i32, String> = user::Entity::find()
            .filter(user::Column::Id.is_in(creator_ids))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect();

        let mut counts: HashMap<i32, i64> = HashMap::new();
        for completion in task_completion::Entity::find()
            .filter(task_completion::Column::TaskId.is_in(task_ids))
            .all(&self.db)
            .await?
        {
            *counts.entry(completion.task_id).or_default() += 1;
        }

        Ok(tasks
            .into_iter()
            .map(|t| TaskWithCount {
                creator_name: creators.get(&t.creator_id).cloned().unwrap_or_default(),
                completion_count: counts.get(&t.id).copied().unwrap_or(0),
                id: t.id,
                group_id: t.group_id,
                creator_id: t.creator_id,
                subject: t.subject,
                content: t.content,
                created_at: t.created_at,
            })
            .collect())
    }
}

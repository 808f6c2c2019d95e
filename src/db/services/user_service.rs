use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    prelude::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::collections::HashMap;

use super::SeaOrmStore;
use crate::db::entities::{user, user_subject};
use crate::db::models::{NewUser, SubjectScore};
use crate::db::repository::{StoreError, UserRepository};

const DEFAULT_GROUP_PREFERENCE: i32 = 3;

fn to_subject_score(model: user_subject::Model) -> SubjectScore {
    SubjectScore {
        subject_name: model.subject_name,
        score: model.score,
    }
}

#[async_trait]
impl UserRepository for SeaOrmStore {
    async fn create_user(&self, new_user: NewUser) -> Result<user::Model, StoreError> {
        let existing = user::Entity::find()
            .filter(user::Column::Email.eq(&new_user.email))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(StoreError::Conflict("Email already exists".to_string()));
        }

        let model = user::ActiveModel {
            name: Set(new_user.name),
            branch: Set(new_user.branch),
            email: Set(new_user.email),
            password_hash: Set(new_user.password_hash),
            goals: Set(new_user.goals),
            group_preference: Set(DEFAULT_GROUP_PREFERENCE),
            group_id: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        Ok(model.insert(&self.db).await?)
    }

    async fn find_user(&self, user_id: i32) -> Result<Option<user::Model>, StoreError> {
        Ok(user::Entity::find_by_id(user_id).one(&self.db).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<user::Model>, StoreError> {
        Ok(user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await?)
    }

    async fn subjects_for_user(&self, user_id: i32) -> Result<Vec<SubjectScore>, StoreError> {
        let rows = user_subject::Entity::find()
            .filter(user_subject::Column::UserId.eq(user_id))
            .order_by_asc(user_subject::Column::SubjectName)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(to_subject_score).collect())
    }

    async fn subjects_for_users(
        &self,
        user_ids: &[i32],
    ) -> Result<HashMap<i32, Vec<SubjectScore>>, StoreError> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = user_subject::Entity::find()
            .filter(user_subject::Column::UserId.is_in(user_ids.to_vec()))
            .order_by_asc(user_subject::Column::UserId)
            .order_by_asc(user_subject::Column::SubjectName)
            .all(&self.db)
            .await?;

        let mut by_user: HashMap<i32, Vec<SubjectScore>> = HashMap::new();
        for row in rows {
            by_user.entry(row.user_id).or_default().push(to_subject_score(row));
        }
        Ok(by_user)
    }

    async fn replace_subjects(
        &self,
        user_id: i32,
        subjects: &[SubjectScore],
        group_preference: i32,
    ) -> Result<(), StoreError> {
        let txn = self.db.begin().await?;

        user_subject::Entity::delete_many()
            .filter(user_subject::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        if !subjects.is_empty() {
            let rows = subjects.iter().map(|s| user_subject::ActiveModel {
                user_id: Set(user_id),
                subject_name: Set(s.subject_name.clone()),
                score: Set(s.score),
            });
            user_subject::Entity::insert_many(rows).exec_without_returning(&txn).await?;
        }

        let updated = user::Entity::update_many()
            .col_expr(user::Column::GroupPreference, Expr::value(group_preference))
            .filter(user::Column::Id.eq(user_id))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            txn.rollback().await?;
            return Err(StoreError::NotFound);
        }

        txn.commit().await?;
        Ok(())
    }

    async fn list_ungrouped_users_except(&self, user_id: i32) -> Result<Vec<user::Model>, StoreError> {
        Ok(user::Entity::find()
            .filter(user::Column::Id.ne(user_id))
            .filter(user::Column::GroupId.is_null())
            .order_by_asc(user::Column::Id)
            .all(&self.db)
            .await?)
    }

    async fn set_user_group(&self, user_id: i32, group_id: Option<i32>) -> Result<(), StoreError> {
        let result = user::Entity::update_many()
            .col_expr(user::Column::GroupId, Expr::value(group_id))
            .filter(user::Column::Id.eq(user_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

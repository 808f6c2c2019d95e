use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    prelude::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::warn;

use super::SeaOrmStore;
use crate::db::entities::{study_group, user};
use crate::db::models::{FormationRequest, MemberSummary};
use crate::db::repository::{GroupRepository, StoreError};

#[async_trait]
impl GroupRepository for SeaOrmStore {
    async fn create_group_with_members(
        &self,
        request: &FormationRequest,
    ) -> Result<study_group::Model, StoreError> {
        let txn = self.db.begin().await?;

        if request.require_ungrouped && !request.member_ids.is_empty() {
            let taken = user::Entity::find()
                .filter(user::Column::Id.is_in(request.member_ids.clone()))
                .filter(user::Column::GroupId.is_not_null())
                .one(&txn)
                .await?;
            if let Some(taken) = taken {
                txn.rollback().await?;
                return Err(StoreError::Conflict(format!(
                    "User {} already belongs to a group",
                    taken.id
                )));
            }
        }

        let group = study_group::ActiveModel {
            name: Set(request.name.clone()),
            icon_url: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let creator = user::Entity::update_many()
            .col_expr(user::Column::GroupId, Expr::value(group.id))
            .filter(user::Column::Id.eq(request.creator_id))
            .exec(&txn)
            .await?;
        if creator.rows_affected != 1 {
            warn!(creator_id = request.creator_id, "Group creator missing. Rolling back formation.");
            txn.rollback().await?;
            return Err(StoreError::NotFound);
        }

        if !request.member_ids.is_empty() {
            user::Entity::update_many()
                .col_expr(user::Column::GroupId, Expr::value(group.id))
                .filter(user::Column::Id.is_in(request.member_ids.clone()))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(group)
    }

    async fn find_group(&self, group_id: i32) -> Result<Option<study_group::Model>, StoreError> {
        Ok(study_group::Entity::find_by_id(group_id).one(&self.db).await?)
    }

    async fn update_group(
        &self,
        group_id: i32,
        name: &str,
        icon_url: Option<&str>,
    ) -> Result<study_group::Model, StoreError> {
        let group = study_group::Entity::find_by_id(group_id)
            .one(&self.db)
            .await?
            .ok_or(StoreError::NotFound)?;

        let mut active = group.into_active_model();
        active.name = Set(name.to_string());
        active.icon_url = Set(icon_url.map(str::to_string));
        Ok(active.update(&self.db).await?)
    }

    async fn list_members(&self, group_id: i32) -> Result<Vec<MemberSummary>, StoreError> {
        let members = user::Entity::find()
            .filter(user::Column::GroupId.eq(group_id))
            .order_by_asc(user::Column::Id)
            .all(&self.db)
            .await?;
        Ok(members
            .into_iter()
            .map(|u| MemberSummary {
                id: u.id,
                name: u.name,
                branch: u.branch,
                email: u.email,
                goals: u.goals,
            })
            .collect())
    }

    async fn is_member(&self, user_id: i32, group_id: i32) -> Result<bool, StoreError> {
        let found = user::Entity::find_by_id(user_id)
            .filter(user::Column::GroupId.eq(group_id))
            .one(&self.db)
            .await?;
        Ok(found.is_some())
    }
}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::MessageType;

/// A chat message. `sender_name` is denormalized so history keeps the name
/// the sender had at send time.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub group_id: i32,
    pub sender_id: i32,
    pub sender_name: String,
    pub content: String,
    #[sea_orm(column_name = "type")]
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub timestamp: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::study_group::Entity",
        from = "Column::GroupId",
        to = "super::study_group::Column::Id",
        on_delete = "Cascade",
        on_update = "Cascade"
    )]
    StudyGroup,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::SenderId",
        to = "super::user::Column::Id",
        on_delete = "Cascade",
        on_update = "Cascade"
    )]
    Sender,
}

impl Related<super::study_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StudyGroup.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sender.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

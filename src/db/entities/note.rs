use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

use crate::db::enums::{NoteSource, NoteType};

/// Unordered subject labels attached to a note, stored as a JSON array.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct SubjectTags(pub Vec<String>);

/// Append-only annotation list, stored as a JSON array and replaced wholesale.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct Annotations(pub Vec<Annotation>);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Assigned on save when the client leaves it empty.
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub body: AnnotationBody,
    #[serde(rename = "createdAt")]
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnnotationBody {
    Comment { text: String },
    Drawing {
        #[serde(rename = "dataUrl")]
        data_url: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub group_id: Option<i32>,
    pub file_name: String,
    pub file_url: String,
    pub file_type: String,
    pub subject_tags: SubjectTags,
    #[sea_orm(column_name = "type")]
    #[serde(rename = "type")]
    pub note_type: NoteType,
    pub description: Option<String>,
    pub reviewed: bool,
    pub annotations: Annotations,
    pub source: NoteSource,
    pub chat_message_id: Option<i32>,
    pub file_size: i64,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade",
        on_update = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

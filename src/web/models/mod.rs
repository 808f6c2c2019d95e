use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::db::entities::note::Annotation;
use crate::db::models::UserProfile;

pub mod websocket_models;

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub branch: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub goals: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

// JWT Claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // email
    pub user_id: i32,
    pub exp: usize,
}

/// Struct to hold authenticated user details, to be passed as a request extension.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub id: i32,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveSubjectsRequest {
    /// Subject name to self-assessed score.
    pub subjects: BTreeMap<String, i32>,
    #[serde(rename = "groupPreference", alias = "group_preference")]
    pub group_preference: i32,
}

#[derive(Debug, Deserialize)]
pub struct FormGroupRequest {
    #[serde(rename = "memberIds", alias = "member_ids")]
    pub member_ids: Vec<i32>,
    #[serde(default, rename = "groupName", alias = "group_name")]
    pub group_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FormGroupResponse {
    #[serde(rename = "groupId")]
    pub group_id: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateGroupRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "iconUrl", deserialize_with = "double_option")]
    pub icon_url: Option<Option<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageSearchQuery {
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditMessageRequest {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Raw note-list query. Values are parsed leniently by the note service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteListQuery {
    pub search: Option<String>,
    pub reviewed: Option<String>,
    pub subject: Option<String>,
    #[serde(rename = "type")]
    pub note_type: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// Registers a file the storage collaborator already accepted.
#[derive(Debug, Deserialize)]
pub struct UploadNoteRequest {
    #[serde(rename = "fileUrl", alias = "file_url")]
    pub file_url: String,
    #[serde(rename = "originalName", alias = "original_name")]
    pub original_name: String,
    #[serde(default, rename = "fileName", alias = "file_name")]
    pub file_name: Option<String>,
    #[serde(default, rename = "fileType", alias = "file_type")]
    pub file_type: Option<String>,
    #[serde(rename = "fileSize", alias = "file_size")]
    pub file_size: i64,
    #[serde(default, rename = "subjectTags", alias = "subject_tags")]
    pub subject_tags: Option<Value>,
    #[serde(default, rename = "type")]
    pub note_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "groupId", alias = "group_id")]
    pub group_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateNoteRequest {
    #[serde(default)]
    pub reviewed: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, rename = "type")]
    pub note_type: Option<String>,
    #[serde(default, rename = "subjectTags", alias = "subject_tags", deserialize_with = "double_option")]
    pub subject_tags: Option<Option<Value>>,
    #[serde(default, deserialize_with = "double_option")]
    pub annotations: Option<Option<Vec<Annotation>>>,
    #[serde(default, rename = "fileName", alias = "file_name")]
    pub file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameNoteRequest {
    #[serde(default, rename = "fileName", alias = "file_name")]
    pub file_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaveFromChatRequest {
    #[serde(default, rename = "fileUrl", alias = "file_url")]
    pub file_url: Option<String>,
    #[serde(default, rename = "fileName", alias = "file_name")]
    pub file_name: Option<String>,
    #[serde(default, rename = "fileType", alias = "file_type")]
    pub file_type: Option<String>,
    #[serde(default, rename = "subjectTags", alias = "subject_tags")]
    pub subject_tags: Option<Value>,
    #[serde(default, rename = "type")]
    pub note_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "groupId", alias = "group_id")]
    pub group_id: Option<i32>,
    #[serde(default, rename = "chatMessageId", alias = "chat_message_id")]
    pub chat_message_id: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn icon_url_distinguishes_absent_from_null() {
        let absent: UpdateGroupRequest = serde_json::from_value(json!({"name": "X"})).unwrap();
        assert_eq!(absent.icon_url, None);

        let cleared: UpdateGroupRequest = serde_json::from_value(json!({"icon_url": null})).unwrap();
        assert_eq!(cleared.icon_url, Some(None));

        let set: UpdateGroupRequest =
            serde_json::from_value(json!({"iconUrl": "/uploads/g.png"})).unwrap();
        assert_eq!(set.icon_url, Some(Some("/uploads/g.png".to_string())));
    }

    #[test]
    fn formation_request_accepts_camel_case() {
        let req: FormGroupRequest =
            serde_json::from_value(json!({"memberIds": [7, 9], "groupName": "Algo"})).unwrap();
        assert_eq!(req.member_ids, vec![7, 9]);
        assert_eq!(req.group_name.as_deref(), Some("Algo"));

        let req: FormGroupRequest = serde_json::from_value(json!({"member_ids": [7]})).unwrap();
        assert!(req.group_name.is_none());
    }
}

//! Personal notes library: registering uploads, importing chat assets,
//! filtered listing and owner-only edits.

use axum::http::Uri;
use serde_json::Value;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::db::entities::note::{self, Annotations, SubjectTags};
use crate::db::enums::{NoteSource, NoteType};
use crate::db::models::{NewNote, NoteDuplicateKey, NoteFilter, NotePage, NoteSort};
use crate::db::repository::Store;
use crate::server::config::ServerConfig;
use crate::services::group_service::require_member;
use crate::web::error::AppError;
use crate::web::models::{
    NoteListQuery, SaveFromChatRequest, UpdateNoteRequest, UploadNoteRequest,
};

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 50;
pub const MAX_PAGE: u64 = 100_000;
const CHAT_FILE_FALLBACK: &str = "chat-file";
const UPLOADS_PREFIX: &str = "/uploads/";

/// Replaces characters that are unsafe in file names with `_` and trims.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn extension_of(name: &str) -> Option<&str> {
    Path::new(name).extension().and_then(|e| e.to_str())
}

/// Tags arrive as a JSON array, a string holding a JSON array, or a
/// comma-separated string.
pub fn parse_tags(input: Option<&Value>) -> Vec<String> {
    fn from_array(items: &[Value]) -> Vec<String> {
        items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .filter(|s| !s.is_empty())
            .collect()
    }

    match input {
        Some(Value::Array(items)) => from_array(items),
        Some(Value::String(s)) if !s.trim().is_empty() => {
            match serde_json::from_str::<Value>(s) {
                Ok(Value::Array(items)) => from_array(&items),
                Ok(_) => Vec::new(),
                Err(_) => s
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect(),
            }
        }
        _ => Vec::new(),
    }
}

/// Absolute URLs pointing into the uploads area are reduced to their path.
pub fn normalize_file_url(raw: &str) -> String {
    let raw = raw.trim();
    match raw.parse::<Uri>() {
        Ok(uri) if uri.scheme().is_some() && uri.path().starts_with(UPLOADS_PREFIX) => {
            uri.path().to_string()
        }
        _ => raw.to_string(),
    }
}

pub fn guess_file_type(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn parse_note_type(raw: Option<&str>) -> Result<NoteType, AppError> {
    match raw.map(str::trim).filter(|t| !t.is_empty()) {
        None => Ok(NoteType::default()),
        Some(t) => t.parse().map_err(AppError::InvalidInput),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Lenient query parsing: bad numbers fall back to defaults, page and page size are clamped.
pub fn build_filter(query: NoteListQuery) -> Result<NoteFilter, AppError> {
    let page = query
        .page
        .and_then(|p| p.trim().parse::<u64>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_PAGE);
    let limit = query
        .limit
        .and_then(|l| l.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let reviewed = match query.reviewed.as_deref() {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    };
    let note_type = match non_blank(query.note_type) {
        Some(t) => Some(t.parse().map_err(AppError::InvalidInput)?),
        None => None,
    };
    let sort = match query.sort.as_deref() {
        Some("oldest") => NoteSort::Oldest,
        _ => NoteSort::Newest,
    };

    Ok(NoteFilter {
        search: non_blank(query.search),
        reviewed,
        subject: non_blank(query.subject),
        note_type,
        sort,
        page,
        limit,
    })
}

async fn check_group(store: &dyn Store, user_id: i32, group_id: Option<i32>) -> Result<(), AppError> {
    if let Some(group_id) = group_id {
        require_member(store, user_id, group_id).await?;
    }
    Ok(())
}

pub async fn upload_note(
    store: &dyn Store,
    config: &ServerConfig,
    user_id: i32,
    req: UploadNoteRequest,
) -> Result<note::Model, AppError> {
    let original_name = req.original_name.trim();
    let file_url = req.file_url.trim();
    if original_name.is_empty() || file_url.is_empty() {
        return Err(AppError::InvalidInput("No file uploaded".to_string()));
    }
    if req.file_size < 0 {
        return Err(AppError::InvalidInput("File size cannot be negative".to_string()));
    }

    let requested = non_blank(req.file_name).unwrap_or_else(|| original_name.to_string());
    let mut file_name = sanitize_file_name(&requested);
    if file_name.is_empty() {
        file_name = original_name.to_string();
    }
    if extension_of(&file_name).is_none() {
        if let Some(ext) = extension_of(original_name) {
            file_name = format!("{file_name}.{ext}");
        }
    }

    let note_type = parse_note_type(req.note_type.as_deref())?;
    check_group(store, user_id, req.group_id).await?;

    let file_type = non_blank(req.file_type).unwrap_or_else(|| guess_file_type(&file_name));
    let duplicate_key = config.dedup_uploads.then(|| NoteDuplicateKey::Upload {
        file_name: file_name.clone(),
        file_size: req.file_size,
    });

    let note = store
        .create_note(
            NewNote {
                user_id,
                group_id: req.group_id,
                file_name,
                file_url: file_url.to_string(),
                file_type,
                subject_tags: parse_tags(req.subject_tags.as_ref()),
                note_type,
                description: non_blank(req.description),
                source: NoteSource::Upload,
                chat_message_id: None,
                file_size: req.file_size,
            },
            duplicate_key,
        )
        .await?;
    info!(note_id = note.id, user_id, "Registered uploaded note.");
    Ok(note)
}

pub async fn save_from_chat(
    store: &dyn Store,
    config: &ServerConfig,
    user_id: i32,
    req: SaveFromChatRequest,
) -> Result<note::Model, AppError> {
    let file_url = non_blank(req.file_url)
        .map(|u| normalize_file_url(&u))
        .ok_or_else(|| AppError::InvalidInput("Missing required fields".to_string()))?;

    let raw_name = non_blank(req.file_name).unwrap_or_else(|| {
        let path = file_url.split(['?', '#']).next().unwrap_or_default();
        path.rsplit('/').next().unwrap_or_default().to_string()
    });
    let mut file_name = sanitize_file_name(&raw_name);
    if file_name.is_empty() {
        file_name = CHAT_FILE_FALLBACK.to_string();
    }
    let file_type = non_blank(req.file_type).unwrap_or_else(|| guess_file_type(&file_name));
    let note_type = parse_note_type(req.note_type.as_deref())?;
    check_group(store, user_id, req.group_id).await?;

    let duplicate_key = config.dedup_chat_saves.then(|| NoteDuplicateKey::ChatSave {
        file_url: file_url.clone(),
    });

    let note = store
        .create_note(
            NewNote {
                user_id,
                group_id: req.group_id,
                file_name,
                file_url,
                file_type,
                subject_tags: parse_tags(req.subject_tags.as_ref()),
                note_type,
                description: non_blank(req.description),
                source: NoteSource::Chat,
                chat_message_id: req.chat_message_id,
                file_size: 0,
            },
            duplicate_key,
        )
        .await?;
    info!(note_id = note.id, user_id, "Saved chat asset to notes.");
    Ok(note)
}

pub async fn list_notes(
    store: &dyn Store,
    user_id: i32,
    query: NoteListQuery,
) -> Result<NotePage, AppError> {
    let filter = build_filter(query)?;
    let (notes, total) = store.list_notes(user_id, &filter).await?;
    Ok(NotePage::new(notes, &filter, total))
}

async fn owned_note(store: &dyn Store, user_id: i32, note_id: i32) -> Result<note::Model, AppError> {
    store
        .find_note_for_user(note_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Note not found".to_string()))
}

/// Partial update; absent fields keep their value, annotations are replaced wholesale.
pub async fn update_note(
    store: &dyn Store,
    user_id: i32,
    note_id: i32,
    req: UpdateNoteRequest,
) -> Result<note::Model, AppError> {
    let mut note = owned_note(store, user_id, note_id).await?;

    if let Some(reviewed) = req.reviewed {
        note.reviewed = reviewed;
    }
    if let Some(description) = req.description {
        note.description = description;
    }
    if let Some(raw_type) = req.note_type {
        note.note_type = raw_type.trim().parse().map_err(AppError::InvalidInput)?;
    }
    if let Some(tags) = req.subject_tags {
        note.subject_tags = SubjectTags(parse_tags(tags.as_ref()));
    }
    if let Some(annotations) = req.annotations {
        let mut annotations = annotations.unwrap_or_default();
        for annotation in annotations.iter_mut().filter(|a| a.id.trim().is_empty()) {
            annotation.id = Uuid::new_v4().to_string();
        }
        note.annotations = Annotations(annotations);
    }
    if let Some(name) = req.file_name {
        let sanitized = sanitize_file_name(&name);
        if !sanitized.is_empty() {
            note.file_name = sanitized;
        }
    }

    Ok(store.save_note(note).await?)
}

pub async fn rename_note(
    store: &dyn Store,
    user_id: i32,
    note_id: i32,
    file_name: Option<String>,
) -> Result<note::Model, AppError> {
    let mut note = owned_note(store, user_id, note_id).await?;
    let requested = non_blank(file_name)
        .ok_or_else(|| AppError::InvalidInput("File name is required".to_string()))?;
    let sanitized = sanitize_file_name(&requested);
    if sanitized.is_empty() {
        return Err(AppError::InvalidInput("Invalid file name".to_string()));
    }
    note.file_name = sanitized;
    Ok(store.save_note(note).await?)
}

pub async fn delete_note(store: &dyn Store, user_id: i32, note_id: i32) -> Result<(), AppError> {
    if store.delete_note(note_id, user_id).await? == 0 {
        return Err(AppError::NotFound("Note not found".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::note::{Annotation, AnnotationBody};
    use crate::db::memory_store::MemoryStore;
    use crate::db::models::NewUser;
    use crate::db::repository::UserRepository;
    use chrono::Utc;
    use serde_json::json;

    async fn user(store: &MemoryStore, name: &str) -> i32 {
        store
            .create_user(NewUser {
                name: name.into(),
                branch: "CSE".into(),
                email: format!("{name}@example.com"),
                password_hash: "x".into(),
                goals: None,
            })
            .await
            .unwrap()
            .id
    }

    fn upload(name: &str, size: i64) -> UploadNoteRequest {
        UploadNoteRequest {
            file_url: format!("/uploads/notes/{size}-{name}"),
            original_name: name.into(),
            file_name: None,
            file_type: None,
            file_size: size,
            subject_tags: Some(json!("DSA, Graphs")),
            note_type: None,
            description: None,
            group_id: None,
        }
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name(" a/b:c*?.pdf "), "a_b_c__.pdf");
        assert_eq!(sanitize_file_name("<|>"), "___");
        assert_eq!(sanitize_file_name("   "), "");
    }

    #[test]
    fn tags_parse_from_every_shape() {
        assert_eq!(parse_tags(Some(&json!(["DSA", "", "OS"]))), vec!["DSA", "OS"]);
        assert_eq!(parse_tags(Some(&json!("[\"DSA\",\"OS\"]"))), vec!["DSA", "OS"]);
        assert_eq!(parse_tags(Some(&json!("DSA, OS ,"))), vec!["DSA", "OS"]);
        assert!(parse_tags(Some(&json!("{\"a\":1}"))).is_empty());
        assert!(parse_tags(None).is_empty());
    }

    #[test]
    fn upload_urls_are_normalized() {
        assert_eq!(
            normalize_file_url("http://localhost:3000/uploads/chat/a.pdf"),
            "/uploads/chat/a.pdf"
        );
        assert_eq!(normalize_file_url("https://cdn.example.com/x.pdf"), "https://cdn.example.com/x.pdf");
        assert_eq!(normalize_file_url("/uploads/a.pdf"), "/uploads/a.pdf");
    }

    #[test]
    fn file_type_is_guessed_from_the_name() {
        assert_eq!(guess_file_type("lecture.pdf"), "application/pdf");
        assert_eq!(guess_file_type("chat-file"), "application/octet-stream");
    }

    #[test]
    fn list_query_is_clamped() {
        let filter = build_filter(NoteListQuery {
            page: Some("0".into()),
            limit: Some("500".into()),
            reviewed: Some("maybe".into()),
            sort: Some("oldest".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!((filter.page, filter.limit), (1, MAX_PAGE_SIZE));
        assert_eq!(filter.reviewed, None);
        assert_eq!(filter.sort, NoteSort::Oldest);

        let bad = build_filter(NoteListQuery { note_type: Some("Homework".into()), ..Default::default() });
        assert!(matches!(bad, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn duplicate_upload_conflicts_and_keeps_one_row() {
        let store = MemoryStore::new();
        let config = ServerConfig::with_secret("s");
        let id = user(&store, "ana").await;

        let first = upload_note(&store, &config, id, upload("notes.pdf", 1024)).await.unwrap();
        assert_eq!(first.subject_tags.0, vec!["DSA", "Graphs"]);
        assert_eq!(first.note_type, NoteType::Lecture);
        assert_eq!(first.file_type, "application/pdf");

        let second = upload_note(&store, &config, id, upload("notes.pdf", 1024)).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        let page = list_notes(&store, id, NoteListQuery::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn custom_upload_name_keeps_the_original_extension() {
        let store = MemoryStore::new();
        let config = ServerConfig::with_secret("s");
        let id = user(&store, "ana").await;
        let mut req = upload("scan.pdf", 10);
        req.file_name = Some("Week 3: Trees".into());
        let note = upload_note(&store, &config, id, req).await.unwrap();
        assert_eq!(note.file_name, "Week 3_ Trees.pdf");
    }

    #[tokio::test]
    async fn dedup_can_be_switched_off() {
        let store = MemoryStore::new();
        let mut config = ServerConfig::with_secret("s");
        config.dedup_uploads = false;
        let id = user(&store, "ana").await;
        upload_note(&store, &config, id, upload("a.pdf", 1)).await.unwrap();
        upload_note(&store, &config, id, upload("a.pdf", 1)).await.unwrap();
        assert_eq!(list_notes(&store, id, NoteListQuery::default()).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn chat_saves_dedupe_on_the_normalized_url() {
        let store = MemoryStore::new();
        let config = ServerConfig::with_secret("s");
        let id = user(&store, "ana").await;

        let saved = save_from_chat(
            &store,
            &config,
            id,
            SaveFromChatRequest {
                file_url: Some("http://localhost:3000/uploads/chat/graph.pdf".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(saved.file_url, "/uploads/chat/graph.pdf");
        assert_eq!(saved.file_name, "graph.pdf");
        assert_eq!(saved.source, NoteSource::Chat);

        let again = save_from_chat(
            &store,
            &config,
            id,
            SaveFromChatRequest { file_url: Some("/uploads/chat/graph.pdf".into()), ..Default::default() },
        )
        .await;
        assert!(matches!(again, Err(AppError::Conflict(_))));

        let missing = save_from_chat(&store, &config, id, SaveFromChatRequest::default()).await;
        assert!(matches!(missing, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn chat_save_into_foreign_group_is_denied() {
        let store = MemoryStore::new();
        let config = ServerConfig::with_secret("s");
        let id = user(&store, "ana").await;
        let result = save_from_chat(
            &store,
            &config,
            id,
            SaveFromChatRequest {
                file_url: Some("/uploads/chat/x.png".into()),
                group_id: Some(42),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::AuthorizationDenied(_))));
    }

    #[tokio::test]
    async fn owners_update_rename_and_delete() {
        let store = MemoryStore::new();
        let config = ServerConfig::with_secret("s");
        let owner = user(&store, "ana").await;
        let other = user(&store, "ben").await;
        let note = upload_note(&store, &config, owner, upload("a.pdf", 5)).await.unwrap();

        let annotation = Annotation {
            id: "n1".into(),
            body: AnnotationBody::Comment { text: "revisit".into() },
            created_at: Utc::now(),
        };
        let updated = update_note(
            &store,
            owner,
            note.id,
            UpdateNoteRequest {
                reviewed: Some(true),
                note_type: Some("Assignment".into()),
                annotations: Some(Some(vec![annotation.clone()])),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(updated.reviewed);
        assert_eq!(updated.note_type, NoteType::Assignment);
        assert_eq!(updated.annotations.0, vec![annotation]);
        assert_eq!(updated.subject_tags, note.subject_tags);

        let foreign = update_note(&store, other, note.id, UpdateNoteRequest::default()).await;
        assert!(matches!(foreign, Err(AppError::NotFound(_))));

        let renamed = rename_note(&store, owner, note.id, Some("final?.pdf".into())).await.unwrap();
        assert_eq!(renamed.file_name, "final_.pdf");
        assert!(matches!(
            rename_note(&store, owner, note.id, Some("  ".into())).await,
            Err(AppError::InvalidInput(_))
        ));

        assert!(matches!(delete_note(&store, other, note.id).await, Err(AppError::NotFound(_))));
        delete_note(&store, owner, note.id).await.unwrap();
        assert_eq!(list_notes(&store, owner, NoteListQuery::default()).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn annotations_without_id_get_one() {
        let store = MemoryStore::new();
        let config = ServerConfig::with_secret("s");
        let owner = user(&store, "ana").await;
        let note = upload_note(&store, &config, owner, upload("b.pdf", 9)).await.unwrap();

        let drawing = Annotation {
            id: String::new(),
            body: AnnotationBody::Drawing { data_url: "data:image/png;base64,AAAA".into() },
            created_at: Utc::now(),
        };
        let updated = update_note(
            &store,
            owner,
            note.id,
            UpdateNoteRequest {
                annotations: Some(Some(vec![drawing])),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(Uuid::parse_str(&updated.annotations.0[0].id).is_ok());

        let cleared = update_note(
            &store,
            owner,
            note.id,
            UpdateNoteRequest {
                annotations: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(cleared.annotations.0.is_empty());
    }

    #[tokio::test]
    async fn listing_filters_and_pages() {
        let store = MemoryStore::new();
        let config = ServerConfig::with_secret("s");
        let id = user(&store, "ana").await;
        for (i, name) in ["graphs.pdf", "trees.pdf", "heaps.pdf"].iter().enumerate() {
            upload_note(&store, &config, id, upload(name, i as i64)).await.unwrap();
        }

        let page = list_notes(
            &store,
            id,
            NoteListQuery { limit: Some("2".into()), page: Some("2".into()), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(page.notes.len(), 1);
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.notes[0].file_name, "graphs.pdf");

        let searched = list_notes(
            &store,
            id,
            NoteListQuery { search: Some("TREE".into()), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(searched.total, 1);
    }

    #[tokio::test]
    async fn huge_page_numbers_are_clamped() {
        let store = MemoryStore::new();
        let config = ServerConfig::with_secret("s");
        let id = user(&store, "ana").await;
        upload_note(&store, &config, id, upload("graphs.pdf", 1)).await.unwrap();

        let query = NoteListQuery {
            page: Some("400000000000000000".into()),
            limit: Some("50".into()),
            ..Default::default()
        };
        let filter = build_filter(query.clone()).unwrap();
        assert_eq!(filter.page, MAX_PAGE);
        assert_eq!(filter.offset(), (MAX_PAGE - 1) * 50);

        let page = list_notes(&store, id, query).await.unwrap();
        assert!(page.notes.is_empty());
        assert_eq!(page.page, MAX_PAGE);
        assert_eq!(page.total, 1);

        let unclamped = NoteFilter { page: u64::MAX, limit: 50, ..Default::default() };
        assert_eq!(unclamped.offset(), u64::MAX);
    }

    #[tokio::test]
    async fn subject_filter_ignores_case() {
        let store = MemoryStore::new();
        let config = ServerConfig::with_secret("s");
        let id = user(&store, "ana").await;
        upload_note(&store, &config, id, upload("graphs.pdf", 1)).await.unwrap();

        let page = list_notes(
            &store,
            id,
            NoteListQuery { subject: Some("graphs".into()), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 1);
    }
}

use sea_orm::{ConnectOptions, Database};

use super::SeaOrmStore;
use crate::db::enums::{MessageType, NoteSource, NoteType};
use crate::db::models::{
    FormationRequest, NewMessage, NewNote, NewTask, NewUser, NoteDuplicateKey, NoteFilter,
    SubjectScore,
};
use crate::db::repository::{
    GroupRepository, MessageRepository, NoteRepository, StoreError, TaskRepository,
    UserRepository,
};
use crate::db::schema::create_tables;

async fn store() -> SeaOrmStore {
    let mut options = ConnectOptions::new("sqlite::memory:");
    // Each pooled connection to :memory: would see its own empty database.
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    create_tables(&db).await.unwrap();
    SeaOrmStore::new(db)
}

fn new_user(email: &str) -> NewUser {
    NewUser {
        name: email.split('@').next().unwrap_or("user").to_string(),
        branch: "CSE".to_string(),
        email: email.to_string(),
        password_hash: "hash".to_string(),
        goals: None,
    }
}

fn upload(user_id: i32, name: &str, size: i64) -> NewNote {
    NewNote {
        user_id,
        group_id: None,
        file_name: name.to_string(),
        file_url: format!("/uploads/{name}"),
        file_type: "application/pdf".to_string(),
        subject_tags: vec!["DSA".to_string()],
        note_type: NoteType::Lecture,
        description: None,
        source: NoteSource::Upload,
        chat_message_id: None,
        file_size: size,
    }
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let store = store().await;
    store.create_user(new_user("ana@example.com")).await.unwrap();
    let err = store.create_user(new_user("ana@example.com")).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn replace_subjects_swaps_the_whole_set() {
    let store = store().await;
    let user = store.create_user(new_user("ana@example.com")).await.unwrap();
    assert_eq!(user.group_preference, 3);

    store
        .replace_subjects(user.id, &[SubjectScore::new("DSA", 3), SubjectScore::new("Python", 8)], 4)
        .await
        .unwrap();
    store
        .replace_subjects(user.id, &[SubjectScore::new("Maths", 9)], 5)
        .await
        .unwrap();

    let subjects = store.subjects_for_user(user.id).await.unwrap();
    assert_eq!(subjects, vec![SubjectScore::new("Maths", 9)]);
    let reloaded = store.find_user(user.id).await.unwrap().unwrap();
    assert_eq!(reloaded.group_preference, 5);
}

#[tokio::test]
async fn formation_assigns_creator_and_members_together() {
    let store = store().await;
    let a = store.create_user(new_user("a@example.com")).await.unwrap();
    let b = store.create_user(new_user("b@example.com")).await.unwrap();
    let c = store.create_user(new_user("c@example.com")).await.unwrap();

    let group = store
        .create_group_with_members(&FormationRequest {
            name: "Graph Gang".to_string(),
            creator_id: a.id,
            member_ids: vec![b.id],
            require_ungrouped: false,
        })
        .await
        .unwrap();

    let members = store.list_members(group.id).await.unwrap();
    assert_eq!(members.iter().map(|m| m.id).collect::<Vec<_>>(), vec![a.id, b.id]);
    assert!(store.is_member(b.id, group.id).await.unwrap());
    assert!(!store.is_member(c.id, group.id).await.unwrap());

    let ungrouped = store.list_ungrouped_users_except(a.id).await.unwrap();
    assert_eq!(ungrouped.iter().map(|u| u.id).collect::<Vec<_>>(), vec![c.id]);
}

#[tokio::test]
async fn formation_with_unknown_creator_leaves_no_trace() {
    let store = store().await;
    let b = store.create_user(new_user("b@example.com")).await.unwrap();

    let err = store
        .create_group_with_members(&FormationRequest {
            name: "Ghost".to_string(),
            creator_id: 999,
            member_ids: vec![b.id],
            require_ungrouped: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound));

    assert_eq!(store.find_user(b.id).await.unwrap().unwrap().group_id, None);
    assert!(store.find_group(1).await.unwrap().is_none());
}

#[tokio::test]
async fn formation_can_require_ungrouped_members() {
    let store = store().await;
    let a = store.create_user(new_user("a@example.com")).await.unwrap();
    let b = store.create_user(new_user("b@example.com")).await.unwrap();
    let c = store.create_user(new_user("c@example.com")).await.unwrap();
    store
        .create_group_with_members(&FormationRequest {
            name: "First".to_string(),
            creator_id: a.id,
            member_ids: vec![b.id],
            require_ungrouped: false,
        })
        .await
        .unwrap();

    let err = store
        .create_group_with_members(&FormationRequest {
            name: "Second".to_string(),
            creator_id: c.id,
            member_ids: vec![b.id],
            require_ungrouped: true,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    assert_eq!(store.find_user(c.id).await.unwrap().unwrap().group_id, None);
}

#[tokio::test]
async fn messages_list_oldest_first_and_search_newest_first() {
    let store = store().await;
    let a = store.create_user(new_user("a@example.com")).await.unwrap();
    let group = store
        .create_group_with_members(&FormationRequest {
            name: "G".to_string(),
            creator_id: a.id,
            member_ids: vec![],
            require_ungrouped: false,
        })
        .await
        .unwrap();

    for content in ["Hello graphs", "lunch?", "GRAPHS again"] {
        store
            .insert_message(NewMessage {
                group_id: group.id,
                sender_id: a.id,
                sender_name: a.name.clone(),
                content: content.to_string(),
                message_type: MessageType::Text,
            })
            .await
            .unwrap();
    }

    let history = store.list_group_messages(group.id).await.unwrap();
    assert_eq!(history.first().unwrap().content, "Hello graphs");

    let hits = store.search_group_messages(group.id, Some("graphs"), 100).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].content, "GRAPHS again");

    assert_eq!(store.delete_group_messages(group.id).await.unwrap(), 3);
    assert!(store.list_group_messages(group.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn completing_a_task_twice_conflicts() {
    let store = store().await;
    let a = store.create_user(new_user("a@example.com")).await.unwrap();
    let group = store
        .create_group_with_members(&FormationRequest {
            name: "G".to_string(),
            creator_id: a.id,
            member_ids: vec![],
            require_ungrouped: false,
        })
        .await
        .unwrap();
    let task = store
        .insert_task(NewTask {
            group_id: group.id,
            creator_id: a.id,
            subject: "DSA".to_string(),
            content: "Solve 5 DP problems".to_string(),
        })
        .await
        .unwrap();

    store.complete_task(task.id, a.id).await.unwrap();
    let err = store.complete_task(task.id, a.id).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    let tasks = store.list_tasks_with_counts(group.id).await.unwrap();
    assert_eq!(tasks[0].completion_count, 1);
    assert_eq!(tasks[0].creator_name, a.name);
}

#[tokio::test]
async fn notes_reject_duplicate_uploads_and_page_results() {
    let store = store().await;
    let a = store.create_user(new_user("a@example.com")).await.unwrap();

    for (name, size) in [("graphs.pdf", 10), ("trees.pdf", 20), ("sorting.pdf", 30)] {
        let key = NoteDuplicateKey::Upload { file_name: name.to_string(), file_size: size };
        store.create_note(upload(a.id, name, size), Some(key)).await.unwrap();
    }
    let key = NoteDuplicateKey::Upload { file_name: "graphs.pdf".to_string(), file_size: 10 };
    let err = store.create_note(upload(a.id, "graphs.pdf", 10), Some(key)).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    let filter = NoteFilter { page: 1, limit: 2, ..Default::default() };
    let (notes, total) = store.list_notes(a.id, &filter).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].file_name, "sorting.pdf");

    let filter = NoteFilter { search: Some("TREE".to_string()), page: 1, limit: 20, ..Default::default() };
    let (notes, total) = store.list_notes(a.id, &filter).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(notes[0].file_name, "trees.pdf");

    let mut note = notes.into_iter().next().unwrap();
    note.reviewed = true;
    let saved = store.save_note(note).await.unwrap();
    assert!(saved.reviewed);

    assert_eq!(store.delete_note(saved.id, a.id + 1).await.unwrap(), 0);
    assert_eq!(store.delete_note(saved.id, a.id).await.unwrap(), 1);
}

use tracing::info;

use crate::db::entities::user;
use crate::db::models::{SubjectScore, UserProfile};
use crate::db::repository::Store;
use crate::web::error::AppError;
use crate::web::models::SaveSubjectsRequest;

const MIN_SCORE: i32 = 0;
const MAX_SCORE: i32 = 10;

pub fn profile_of(user: user::Model, subjects: Vec<SubjectScore>) -> UserProfile {
    UserProfile {
        id: user.id,
        name: user.name,
        branch: user.branch,
        email: user.email,
        goals: user.goals,
        group_preference: user.group_preference,
        group_id: user.group_id,
        subjects,
    }
}

pub async fn get_profile(store: &dyn Store, user_id: i32) -> Result<UserProfile, AppError> {
    let user = store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let subjects = store.subjects_for_user(user_id).await?;
    Ok(profile_of(user, subjects))
}

/// Replaces the caller's whole subject set and group-size preference.
pub async fn save_subjects(
    store: &dyn Store,
    user_id: i32,
    req: SaveSubjectsRequest,
) -> Result<(), AppError> {
    if req.group_preference < 1 {
        return Err(AppError::InvalidInput("Group preference must be at least 1".to_string()));
    }

    let mut subjects = Vec::with_capacity(req.subjects.len());
    for (name, score) in req.subjects {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Subject names cannot be blank".to_string()));
        }
        if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
            return Err(AppError::InvalidInput(format!(
                "Score for {name} must be between {MIN_SCORE} and {MAX_SCORE}"
            )));
        }
        subjects.push(SubjectScore::new(name, score));
    }

    store
        .replace_subjects(user_id, &subjects, req.group_preference)
        .await?;
    info!(user_id, count = subjects.len(), "Saved subject proficiencies.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_store::MemoryStore;
    use crate::db::models::NewUser;
    use crate::db::repository::UserRepository;
    use std::collections::BTreeMap;

    async fn seeded() -> (MemoryStore, i32) {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser {
                name: "Ravi".into(),
                branch: "IT".into(),
                email: "ravi@example.com".into(),
                password_hash: "x".into(),
                goals: None,
            })
            .await
            .unwrap();
        (store, user.id)
    }

    #[tokio::test]
    async fn subjects_are_replaced_not_merged() {
        let (store, id) = seeded().await;
        let first = BTreeMap::from([("DSA".to_string(), 3), ("Python".to_string(), 9)]);
        save_subjects(&store, id, SaveSubjectsRequest { subjects: first, group_preference: 4 })
            .await
            .unwrap();
        let second = BTreeMap::from([("OS".to_string(), 6)]);
        save_subjects(&store, id, SaveSubjectsRequest { subjects: second, group_preference: 2 })
            .await
            .unwrap();

        let profile = get_profile(&store, id).await.unwrap();
        assert_eq!(profile.subjects, vec![SubjectScore::new("OS", 6)]);
        assert_eq!(profile.group_preference, 2);
    }

    #[tokio::test]
    async fn out_of_range_scores_change_nothing() {
        let (store, id) = seeded().await;
        let bad = BTreeMap::from([("DSA".to_string(), 11)]);
        let err = save_subjects(&store, id, SaveSubjectsRequest { subjects: bad, group_preference: 3 })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(get_profile(&store, id).await.unwrap().subjects.is_empty());
    }
}

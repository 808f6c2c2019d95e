use serde::Serialize;
use tracing::debug;

use crate::db::models::SubjectScore;
use crate::db::repository::{Store, StoreError};
use crate::matching::scorer::{compatibility, strongest_subjects};

pub const MAX_RECOMMENDATIONS: usize = 10;

/// One ranked candidate as returned by the match query.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Recommendation {
    pub id: i32,
    pub name: String,
    pub branch: String,
    pub goals: Option<String>,
    pub group_preference: i32,
    pub compatibility: u32,
    #[serde(rename = "strongestSubjects")]
    pub strongest_subjects: Vec<String>,
    #[serde(rename = "allSubjects")]
    pub all_subjects: Vec<SubjectScore>,
}

/// Ranks every other ungrouped user against `user_id`, best first.
///
/// The sort is stable so equal scores keep the pool's ascending-id order.
pub async fn recommend(store: &dyn Store, user_id: i32) -> Result<Vec<Recommendation>, StoreError> {
    let requester = store.find_user(user_id).await?.ok_or(StoreError::NotFound)?;
    let my_subjects = store.subjects_for_user(user_id).await?;

    let pool = store.list_ungrouped_users_except(user_id).await?;
    let pool_ids: Vec<i32> = pool.iter().map(|u| u.id).collect();
    let mut subjects_by_user = store.subjects_for_users(&pool_ids).await?;

    let mut ranked: Vec<Recommendation> = pool
        .into_iter()
        .map(|candidate| {
            let their_subjects = subjects_by_user.remove(&candidate.id).unwrap_or_default();
            Recommendation {
                compatibility: compatibility(
                    &my_subjects,
                    &their_subjects,
                    requester.group_preference,
                    candidate.group_preference,
                ),
                strongest_subjects: strongest_subjects(&their_subjects),
                all_subjects: their_subjects,
                id: candidate.id,
                name: candidate.name,
                branch: candidate.branch,
                goals: candidate.goals,
                group_preference: candidate.group_preference,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.compatibility.cmp(&a.compatibility));
    ranked.truncate(MAX_RECOMMENDATIONS);

    debug!(user_id, candidates = pool_ids.len(), returned = ranked.len(), "Computed match list.");
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_store::MemoryStore;
    use crate::db::models::{FormationRequest, NewUser};
    use crate::db::repository::{GroupRepository, UserRepository};

    async fn add_user(store: &MemoryStore, name: &str, subjects: &[(&str, i32)], pref: i32) -> i32 {
        let user = store
            .create_user(NewUser {
                name: name.to_string(),
                branch: "CSE".to_string(),
                email: format!("{name}@example.com"),
                password_hash: "x".to_string(),
                goals: None,
            })
            .await
            .unwrap();
        let scores: Vec<SubjectScore> =
            subjects.iter().map(|(n, s)| SubjectScore::new(*n, *s)).collect();
        store.replace_subjects(user.id, &scores, pref).await.unwrap();
        user.id
    }

    #[tokio::test]
    async fn returns_top_ten_in_descending_order() {
        let store = MemoryStore::new();
        let me = add_user(&store, "me", &[("Math", 2), ("Physics", 9)], 3).await;
        for i in 0..12 {
            let math = if i % 2 == 0 { 9 } else { 5 };
            let physics = if i % 3 == 0 { 1 } else { 6 };
            let pref = if i % 4 == 0 { 3 } else { 2 };
            add_user(&store, &format!("peer{i}"), &[("Math", math), ("Physics", physics)], pref).await;
        }

        let ranked = recommend(&store, me).await.unwrap();
        assert_eq!(ranked.len(), MAX_RECOMMENDATIONS);
        assert!(ranked.windows(2).all(|w| w[0].compatibility >= w[1].compatibility));
        assert!(ranked.iter().all(|r| r.id != me));
    }

    #[tokio::test]
    async fn grouped_users_are_never_candidates() {
        let store = MemoryStore::new();
        let me = add_user(&store, "me", &[("Math", 2)], 3).await;
        let grouped = add_user(&store, "grouped", &[("Math", 9)], 3).await;
        let other = add_user(&store, "other", &[("Math", 9)], 3).await;
        let free = add_user(&store, "free", &[("Math", 5)], 1).await;
        store
            .create_group_with_members(&FormationRequest {
                name: "Taken".to_string(),
                creator_id: grouped,
                member_ids: vec![other],
                require_ungrouped: false,
            })
            .await
            .unwrap();

        let ranked = recommend(&store, me).await.unwrap();
        assert_eq!(ranked.iter().map(|r| r.id).collect::<Vec<_>>(), vec![free]);
        assert_eq!(ranked[0].compatibility, 0);
    }

    #[tokio::test]
    async fn ties_keep_pool_order_and_carry_strongest_subjects() {
        let store = MemoryStore::new();
        let me = add_user(&store, "me", &[("Math", 2)], 3).await;
        let first = add_user(&store, "first", &[("Math", 9), ("OS", 8)], 3).await;
        let second = add_user(&store, "second", &[("Math", 8)], 3).await;

        let ranked = recommend(&store, me).await.unwrap();
        assert_eq!(ranked.iter().map(|r| r.id).collect::<Vec<_>>(), vec![first, second]);
        assert_eq!(ranked[0].compatibility, 15);
        assert_eq!(ranked[0].strongest_subjects, vec!["Math".to_string(), "OS".to_string()]);
        assert_eq!(ranked[0].all_subjects.len(), 2);
    }

    #[tokio::test]
    async fn empty_pool_is_an_empty_list() {
        let store = MemoryStore::new();
        let me = add_user(&store, "me", &[], 3).await;
        assert!(recommend(&store, me).await.unwrap().is_empty());
    }
}

use crate::db::models::SubjectScore;

/// Scores below this mark a subject as a weakness.
pub const WEAK_BELOW: i32 = 4;
/// Scores above this mark a subject as a strength.
pub const STRONG_ABOVE: i32 = 7;

const COMPLEMENT_POINTS: u32 = 10;
const PREFERENCE_POINTS: u32 = 5;

/// Compatibility of `candidate` for `current`.
///
/// Every subject both users rated earns `COMPLEMENT_POINTS` when one side is
/// weak and the other strong, checked once per direction. Equal group-size
/// preferences add `PREFERENCE_POINTS`.
pub fn compatibility(
    current: &[SubjectScore],
    candidate: &[SubjectScore],
    current_preference: i32,
    candidate_preference: i32,
) -> u32 {
    let mut score = 0;

    for mine in current {
        let Some(theirs) = candidate.iter().find(|s| s.subject_name == mine.subject_name) else {
            continue;
        };
        if mine.score < WEAK_BELOW && theirs.score > STRONG_ABOVE {
            score += COMPLEMENT_POINTS;
        }
        if mine.score > STRONG_ABOVE && theirs.score < WEAK_BELOW {
            score += COMPLEMENT_POINTS;
        }
    }

    if current_preference == candidate_preference {
        score += PREFERENCE_POINTS;
    }
    score
}

/// Subjects the user rated above `STRONG_ABOVE`, in input order.
pub fn strongest_subjects(subjects: &[SubjectScore]) -> Vec<String> {
    subjects
        .iter()
        .filter(|s| s.score > STRONG_ABOVE)
        .map(|s| s.subject_name.clone())
        .collect()
}

//! Peer matching: a pure pairwise scorer plus the engine that ranks the
//! ungrouped pool for one user.

pub mod engine;
pub mod scorer;

pub use engine::{recommend, Recommendation, MAX_RECOMMENDATIONS};
pub use scorer::compatibility;

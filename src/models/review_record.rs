//! Immutable audit entry written after every review.

use super::{Rating, ReviewOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub flashcard_id: i64,
    pub rating: Rating,
    pub interval_minutes: f64,
    /// Streak after the review was applied.
    pub streak: i32,
    pub reviewed_at: DateTime<Utc>,
}

impl ReviewRecord {
    pub fn from_outcome(flashcard_id: i64, outcome: &ReviewOutcome, reviewed_at: DateTime<Utc>) -> Self {
        Self {
            flashcard_id,
            rating: outcome.rating,
            interval_minutes: outcome.interval_minutes(),
            streak: outcome.state.streak,
            reviewed_at,
        }
    }
}

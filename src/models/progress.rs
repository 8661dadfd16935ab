//! Mastery snapshot for one card.
//!
//! Levels are discrete content tiers of a card. `current_level` is the highest
//! tier unlocked so far and `active_level` is the tier currently shown. The
//! review policy is the only thing that moves `current_level` or `streak`;
//! `level_up`/`level_down` only browse tiers that are already unlocked.

use super::error::{ReviewError, ReviewResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub current_level: i32,
    pub active_level: i32,
    /// Consecutive non-`again` ratings since the last `again`.
    pub streak: i32,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub next_review: DateTime<Utc>,
}

impl ProgressState {
    /// Fresh progress, due immediately.
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            current_level: 0,
            active_level: 0,
            streak: 0,
            last_reviewed: None,
            next_review: created_at,
        }
    }

    pub fn validate(&self, max_level: i32) -> ReviewResult<()> {
        if self.current_level < 0 {
            return Err(ReviewError::InvariantViolation(
                "current_level cannot be negative",
            ));
        }
        if self.active_level < 0 {
            return Err(ReviewError::InvariantViolation(
                "active_level cannot be negative",
            ));
        }
        if self.active_level > self.current_level {
            return Err(ReviewError::InvariantViolation(
                "active_level cannot exceed current_level",
            ));
        }
        if self.current_level > max_level {
            return Err(ReviewError::InvariantViolation(
                "current_level cannot exceed max_level",
            ));
        }
        if self.streak < 0 {
            return Err(ReviewError::InvariantViolation("streak cannot be negative"));
        }
        Ok(())
    }

    /// Shows the next unlocked tier. Returns whether anything changed.
    pub fn level_up(&mut self, max_level: i32) -> bool {
        if self.active_level < self.current_level.min(max_level) {
            self.active_level += 1;
            true
        } else {
            false
        }
    }

    /// Shows the previous tier. Returns whether anything changed.
    pub fn level_down(&mut self) -> bool {
        if self.active_level > 0 {
            self.active_level -= 1;
            true
        } else {
            false
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review <= now
    }

    pub fn is_at_frontier(&self) -> bool {
        self.active_level == self.current_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn state(current_level: i32, active_level: i32, streak: i32) -> ProgressState {
        ProgressState {
            current_level,
            active_level,
            streak,
            ..ProgressState::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        }
    }

    #[test]
    fn test_new_progress_starts_at_zero_and_is_due() {
        let now = Utc::now();
        let progress = ProgressState::new(now);
        assert_eq!(progress.current_level, 0);
        assert_eq!(progress.active_level, 0);
        assert_eq!(progress.streak, 0);
        assert!(progress.last_reviewed.is_none());
        assert!(progress.is_due(now));
        assert!(progress.validate(0).is_ok());
    }

    #[test]
    fn test_validate_reports_each_invariant() {
        assert_eq!(
            state(-1, 0, 0).validate(3),
            Err(ReviewError::InvariantViolation(
                "current_level cannot be negative"
            ))
        );
        assert_eq!(
            state(1, -1, 0).validate(3),
            Err(ReviewError::InvariantViolation(
                "active_level cannot be negative"
            ))
        );
        assert_eq!(
            state(1, 2, 0).validate(3),
            Err(ReviewError::InvariantViolation(
                "active_level cannot exceed current_level"
            ))
        );
        assert_eq!(
            state(4, 4, 0).validate(3),
            Err(ReviewError::InvariantViolation(
                "current_level cannot exceed max_level"
            ))
        );
        assert_eq!(
            state(1, 1, -2).validate(3),
            Err(ReviewError::InvariantViolation("streak cannot be negative"))
        );
        assert!(state(3, 1, 7).validate(3).is_ok());
    }

    #[test]
    fn test_level_navigation_stays_within_unlocked_tiers() {
        let mut progress = state(2, 0, 4);

        assert!(progress.level_up(5));
        assert!(progress.level_up(5));
        assert_eq!(progress.active_level, 2);
        // current_level is the ceiling
        assert!(!progress.level_up(5));
        assert_eq!(progress.active_level, 2);

        assert!(progress.level_down());
        assert!(progress.level_down());
        assert!(!progress.level_down());
        assert_eq!(progress.active_level, 0);

        assert_eq!(progress.current_level, 2);
        assert_eq!(progress.streak, 4);
    }

    #[test]
    fn test_level_up_respects_max_level() {
        let mut progress = state(3, 1, 0);
        assert!(!progress.level_up(1));
        assert_eq!(progress.active_level, 1);
    }

    #[test]
    fn test_is_due_compares_against_next_review() {
        let mut progress = state(0, 0, 0);
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        progress.next_review = now + Duration::minutes(1);
        assert!(!progress.is_due(now));
        assert!(progress.is_due(now + Duration::minutes(1)));
    }
}

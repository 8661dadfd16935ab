//! Per-learner tuning parameters for the review policy.

use super::error::{ReviewError, ReviewResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerSettings {
    /// Gap between reviews at level 0 with no streak (1440 = one day).
    pub base_interval_minutes: f64,
    /// How strongly the active level stretches the interval.
    pub level_factor: f64,
    /// How strongly the success streak stretches the interval.
    pub streak_factor: f64,
    /// Extra shortening applied on `again`, in (0, 1].
    pub again_penalty: f64,
}

impl Default for LearnerSettings {
    fn default() -> Self {
        Self {
            base_interval_minutes: 1440.0,
            level_factor: 1.0,
            streak_factor: 0.55,
            again_penalty: 0.3,
        }
    }
}

impl LearnerSettings {
    pub fn validate(&self) -> ReviewResult<()> {
        if !(self.base_interval_minutes.is_finite() && self.base_interval_minutes > 0.0) {
            return Err(ReviewError::InvariantViolation(
                "base_interval_minutes must be positive",
            ));
        }
        if !(self.level_factor.is_finite() && self.level_factor >= 0.0) {
            return Err(ReviewError::InvariantViolation(
                "level_factor cannot be negative",
            ));
        }
        if !(self.streak_factor.is_finite() && self.streak_factor >= 0.0) {
            return Err(ReviewError::InvariantViolation(
                "streak_factor cannot be negative",
            ));
        }
        if !(self.again_penalty > 0.0 && self.again_penalty <= 1.0) {
            return Err(ReviewError::InvariantViolation(
                "again_penalty must be in (0, 1]",
            ));
        }
        Ok(())
    }
}

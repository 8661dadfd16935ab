//! Learner's recall feedback for a single review attempt.

use super::error::ReviewError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered by strength of recall: `Again < Hard < Good < Easy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    /// Total failure, card goes back to a short interval and the streak resets.
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    /// Interval multiplier applied by the review policy.
    pub fn multiplier(self) -> f64 {
        match self {
            Rating::Again => 0.1,
            Rating::Hard => 0.6,
            Rating::Good => 1.0,
            Rating::Easy => 1.8,
        }
    }

    pub fn is_success(self) -> bool {
        self != Rating::Again
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rating::Again => "again",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        }
    }

    /// Button caption used by the review screen.
    pub fn label(self) -> &'static str {
        match self {
            Rating::Again => "Again",
            Rating::Hard => "Hard",
            Rating::Good => "Good",
            Rating::Easy => "Easy",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rating {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "again" => Ok(Rating::Again),
            "hard" => Ok(Rating::Hard),
            "good" => Ok(Rating::Good),
            "easy" => Ok(Rating::Easy),
            _ => Err(ReviewError::InvalidRating(s.to_string())),
        }
    }
}

/// Legacy numeric encoding: 0 = again, 1 = hard, 2 = good, 3 = easy.
impl TryFrom<i64> for Rating {
    type Error = ReviewError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Rating::Again),
            1 => Ok(Rating::Hard),
            2 => Ok(Rating::Good),
            3 => Ok(Rating::Easy),
            other => Err(ReviewError::InvalidRating(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_ratings() {
        assert_eq!("again".parse::<Rating>(), Ok(Rating::Again));
        assert_eq!(" Hard ".parse::<Rating>(), Ok(Rating::Hard));
        assert_eq!("GOOD".parse::<Rating>(), Ok(Rating::Good));
        assert_eq!("easy".parse::<Rating>(), Ok(Rating::Easy));
    }

    #[test]
    fn test_parse_unknown_rating_fails() {
        let err = "perfect".parse::<Rating>().unwrap_err();
        assert_eq!(err, ReviewError::InvalidRating("perfect".to_string()));
        assert!("".parse::<Rating>().is_err());
    }

    #[test]
    fn test_numeric_encoding() {
        assert_eq!(Rating::try_from(0), Ok(Rating::Again));
        assert_eq!(Rating::try_from(3), Ok(Rating::Easy));
        assert!(matches!(
            Rating::try_from(4),
            Err(ReviewError::InvalidRating(_))
        ));
        assert!(Rating::try_from(-1).is_err());
    }

    #[test]
    fn test_ordering_follows_recall_strength() {
        assert!(Rating::Again < Rating::Hard);
        assert!(Rating::Hard < Rating::Good);
        assert!(Rating::Good < Rating::Easy);

        let multipliers: Vec<f64> = Rating::ALL.iter().map(|r| r.multiplier()).collect();
        assert!(multipliers.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Rating::Easy).unwrap();
        assert_eq!(json, "\"easy\"");

        let parsed: Rating = serde_json::from_str("\"again\"").unwrap();
        assert_eq!(parsed, Rating::Again);

        assert!(serde_json::from_str::<Rating>("\"blackout\"").is_err());
    }
}

//! Errors raised by the review policy and the values it operates on.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReviewError {
    /// Rating text or number outside again/hard/good/easy.
    #[error("invalid rating: {0:?}")]
    InvalidRating(String),
    /// Progress state or learner settings broke one of their invariants.
    /// Indicates a caller bug or corrupted storage, never clamped.
    #[error("invariant violation: {0}")]
    InvariantViolation(&'static str),
}

pub type ReviewResult<T> = Result<T, ReviewError>;

pub mod config;
pub mod database;
pub mod export;
pub mod models;

pub use models::{
    Deck, DeckSet, Flashcard, LearnerSettings, LearningSession, ProgressState, Rating,
    ReviewError, ReviewOutcome, apply_review,
};

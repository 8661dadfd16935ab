//! Wrapper for flashcards that tracks progress within a learning session.
use super::{Flashcard, ProgressState};

#[derive(Debug, Clone)]
pub struct LearningCard {
    pub flashcard_id: i64,
    pub flashcard: Flashcard,
    pub progress: ProgressState,
    pub is_learned: bool,
}

impl LearningCard {
    pub fn new(flashcard_id: i64, flashcard: Flashcard, progress: ProgressState) -> Self {
        Self {
            flashcard_id,
            flashcard,
            progress,
            is_learned: false,
        }
    }

    pub fn mark_as_learned(&mut self) {
        self.is_learned = true;
    }

    /// Content for the level currently being presented.
    pub fn shown_content(&self) -> &str {
        self.flashcard.content_for_level(self.progress.active_level)
    }

    pub fn max_level(&self) -> i32 {
        self.flashcard.max_level()
    }
}

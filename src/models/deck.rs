//! Deck is a set of flashcards
use super::Flashcard;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    pub name: String,
    pub flashcards: Vec<Flashcard>,
}

impl Deck {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flashcards: Vec::new(),
        }
    }

    pub fn level_count(&self) -> usize {
        self.flashcards.iter().map(|f| f.levels.len()).sum()
    }
}

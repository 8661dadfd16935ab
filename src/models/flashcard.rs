//! Flashcard is a term with a definition and optional harder levels.
//! Level 0 shows the definition; level `n` shows `levels[n - 1]`.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub term: String,
    pub definition: String,
    #[serde(default)]
    pub levels: Vec<String>,
}

impl Flashcard {
    pub fn new(term: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            definition: definition.into(),
            levels: Vec::new(),
        }
    }

    pub fn with_level(mut self, content: impl Into<String>) -> Self {
        self.levels.push(content.into());
        self
    }

    /// Highest level this card can be promoted to.
    pub fn max_level(&self) -> i32 {
        i32::try_from(self.levels.len()).unwrap_or(i32::MAX)
    }

    /// Content shown at `level`, falling back to the definition when out of range.
    pub fn content_for_level(&self, level: i32) -> &str {
        usize::try_from(level)
            .ok()
            .and_then(|l| l.checked_sub(1))
            .and_then(|idx| self.levels.get(idx))
            .map(String::as_str)
            .unwrap_or(self.definition.as_str())
    }
}

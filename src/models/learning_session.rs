//! Learning session management for spaced repetition practice.
//! Handles multi-round review of due cards with the leveled review policy.

use super::review_policy::apply_review;
use super::{Flashcard, LearnerSettings, LearningCard, ProgressState, Rating, ReviewOutcome};
use crate::database::db::{self, DbError, DbResult};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Manages a learning session with multiple review rounds.
/// Cards rated `again` are repeated in subsequent rounds.
pub struct LearningSession {
    pub deck_name: String,
    pub all_cards: Vec<LearningCard>,
    pub current_round_cards: Vec<usize>,
    pub current_index: usize,
    pub show_definition: bool,
    pub conn: Arc<Mutex<Connection>>,
    pub round_number: usize,
    /// Used when the learner has no stored settings.
    pub default_settings: LearnerSettings,
}

impl LearningSession {
    /// Creates a new learning session from cards that are due for review.
    pub fn new_from_due_cards(
        deck_name: String,
        cards: Vec<(i64, Flashcard, ProgressState)>,
        conn: Arc<Mutex<Connection>>,
        default_settings: LearnerSettings,
    ) -> Self {
        let learning_cards: Vec<_> = cards
            .into_iter()
            .map(|(id, fc, progress)| LearningCard::new(id, fc, progress))
            .collect();

        let indices: Vec<usize> = (0..learning_cards.len()).collect();

        info!(deck = %deck_name, cards = indices.len(), "learning session started");

        Self {
            deck_name,
            all_cards: learning_cards,
            current_round_cards: indices,
            current_index: 0,
            show_definition: false,
            conn,
            round_number: 1,
            default_settings,
        }
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    fn current_position(&self) -> Option<usize> {
        self.current_round_cards.get(self.current_index).copied()
    }

    pub fn current_card(&self) -> Option<&LearningCard> {
        self.current_position()
            .and_then(|idx| self.all_cards.get(idx))
    }

    pub fn toggle_definition(&mut self) {
        self.show_definition = !self.show_definition;
    }

    pub fn next_card(&mut self) {
        if self.current_index + 1 < self.current_round_cards.len() {
            self.current_index += 1;
            self.show_definition = false;
        } else {
            self.start_next_round();
        }
    }

    /// Starts a new round with cards that were rated `again`.
    /// If no cards remain, the session is complete.
    fn start_next_round(&mut self) {
        let failed_indices: Vec<usize> = self
            .current_round_cards
            .iter()
            .copied()
            .filter(|&idx| {
                self.all_cards
                    .get(idx)
                    .map(|card| !card.is_learned)
                    .unwrap_or(false)
            })
            .collect();

        if !failed_indices.is_empty() {
            self.current_round_cards = failed_indices;
            self.current_index = 0;
            self.show_definition = false;
            self.round_number += 1;
            debug!(
                round = self.round_number,
                cards = self.current_round_cards.len(),
                "starting retry round"
            );
        }
    }

    /// Next due time the current card would get for `rating`, without saving anything.
    pub fn preview(&self, rating: Rating, settings: &LearnerSettings, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let card = self.current_card()?;
        apply_review(&card.progress, rating, settings, card.max_level(), now)
            .ok()
            .map(|outcome| outcome.next_review)
    }

    /// Rates the current card, persists the result and records it in the history.
    pub fn grade_current_card(&mut self, rating: Rating) -> DbResult<Option<ReviewOutcome>> {
        let Some(actual_idx) = self.current_position() else {
            return Ok(None);
        };
        let Some(flashcard_id) = self.all_cards.get(actual_idx).map(|c| c.flashcard_id) else {
            return Ok(None);
        };

        let outcome = {
            let conn = self.lock()?;
            let now = db::get_current_date(&conn)?;
            db::review_flashcard(flashcard_id, rating, &self.default_settings, now, &conn)?
        };

        if let Some(card) = self.all_cards.get_mut(actual_idx) {
            card.progress = outcome.state.clone();
            if rating.is_success() {
                card.mark_as_learned();
            } else {
                card.is_learned = false;
            }
        }

        Ok(Some(outcome))
    }

    /// Shows the next unlocked level of the current card.
    pub fn level_up_current(&mut self) -> DbResult<bool> {
        self.move_current_level(|progress, max_level| progress.level_up(max_level))
    }

    /// Shows the previous level of the current card.
    pub fn level_down_current(&mut self) -> DbResult<bool> {
        self.move_current_level(|progress, _| progress.level_down())
    }

    fn move_current_level(
        &mut self,
        step: impl FnOnce(&mut ProgressState, i32) -> bool,
    ) -> DbResult<bool> {
        let Some(actual_idx) = self.current_position() else {
            return Ok(false);
        };
        let Some(card) = self.all_cards.get(actual_idx) else {
            return Ok(false);
        };

        let mut progress = card.progress.clone();
        if !step(&mut progress, card.max_level()) {
            return Ok(false);
        }

        {
            let conn = self.lock()?;
            db::set_active_level(card.flashcard_id, progress.active_level, &conn)?;
        }

        if let Some(card) = self.all_cards.get_mut(actual_idx) {
            card.progress = progress;
        }
        Ok(true)
    }

    pub fn learned_count(&self) -> usize {
        self.current_round_cards
            .iter()
            .filter(|&&idx| {
                self.all_cards
                    .get(idx)
                    .map(|card| card.is_learned)
                    .unwrap_or(false)
            })
            .count()
    }

    pub fn total_count(&self) -> usize {
        self.current_round_cards.len()
    }

    pub fn remaining_count(&self) -> usize {
        self.total_count() - self.learned_count()
    }

    /// Returns true when all cards in the current round were rated above `again`.
    pub fn is_completed(&self) -> bool {
        self.current_round_cards.is_empty() || self.learned_count() == self.total_count()
    }

    pub fn phase_message(&self) -> String {
        if self.round_number == 1 {
            format!("Round {}: {} cards", self.round_number, self.total_count())
        } else {
            format!(
                "Round {} (Review): {} cards to retry",
                self.round_number,
                self.total_count()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_cards() -> LearningSession {
        let conn = db::init_in_memory().unwrap();
        db::new_deck("Polish", &conn).unwrap();
        db::add_flashcard("Polish", &Flashcard::new("cześć", "hello").with_level("Greet a friend"), &conn)
            .unwrap();
        db::add_flashcard("Polish", &Flashcard::new("dziękuję", "thank you"), &conn).unwrap();
        let due = db::get_flashcards_due_for_review("Polish", &conn).unwrap();
        LearningSession::new_from_due_cards(
            "Polish".to_string(),
            due,
            Arc::new(Mutex::new(conn)),
            LearnerSettings::default(),
        )
    }

    #[test]
    fn test_session_starts_with_due_cards() {
        let session = session_with_cards();
        assert_eq!(session.total_count(), 2);
        assert_eq!(session.learned_count(), 0);
        assert!(!session.is_completed());
        assert_eq!(session.phase_message(), "Round 1: 2 cards");
    }

    #[test]
    fn test_again_cards_are_retried_in_next_round() {
        let mut session = session_with_cards();

        session.grade_current_card(Rating::Again).unwrap();
        session.next_card();
        session.grade_current_card(Rating::Good).unwrap();
        session.next_card();

        assert_eq!(session.round_number, 2);
        assert_eq!(session.total_count(), 1);
        assert!(!session.is_completed());

        session.grade_current_card(Rating::Easy).unwrap();
        session.next_card();
        assert!(session.is_completed());
    }

    #[test]
    fn test_grading_persists_progress_and_history() {
        let mut session = session_with_cards();
        let card_id = session.current_card().unwrap().flashcard_id;

        let outcome = session.grade_current_card(Rating::Good).unwrap().unwrap();
        assert_eq!(outcome.state.current_level, 1);
        assert_eq!(outcome.state.streak, 1);

        let conn = session.conn.lock().unwrap();
        let stored = db::get_progress(card_id, &conn).unwrap();
        assert_eq!(stored, outcome.state);

        let history = db::get_review_history(card_id, &conn).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].rating, Rating::Good);
    }

    #[test]
    fn test_level_navigation_is_persisted() {
        let mut session = session_with_cards();
        session.grade_current_card(Rating::Good).unwrap();
        let card_id = session.current_card().unwrap().flashcard_id;

        assert!(session.level_down_current().unwrap());
        assert!(!session.level_down_current().unwrap());
        assert_eq!(session.current_card().unwrap().shown_content(), "hello");

        assert!(session.level_up_current().unwrap());
        assert!(!session.level_up_current().unwrap());
        assert_eq!(session.current_card().unwrap().shown_content(), "Greet a friend");

        let conn = session.conn.lock().unwrap();
        assert_eq!(db::get_progress(card_id, &conn).unwrap().active_level, 1);
    }

    #[test]
    fn test_preview_does_not_touch_storage() {
        let session = session_with_cards();
        let card_id = session.current_card().unwrap().flashcard_id;
        let now = Utc::now();

        let hard = session.preview(Rating::Hard, &LearnerSettings::default(), now).unwrap();
        let easy = session.preview(Rating::Easy, &LearnerSettings::default(), now).unwrap();
        assert!(hard < easy);

        let conn = session.conn.lock().unwrap();
        assert!(db::get_review_history(card_id, &conn).unwrap().is_empty());
    }
}

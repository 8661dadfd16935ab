pub mod deck;
pub mod deck_set;
pub mod error;
pub mod flashcard;
pub mod learner_settings;
pub mod learning_card;
pub mod learning_session;
pub mod progress;
pub mod rating;
pub mod review_policy;
pub mod review_record;

pub use deck::Deck;
pub use deck_set::DeckSet;
pub use error::{ReviewError, ReviewResult};
pub use flashcard::Flashcard;
pub use learner_settings::LearnerSettings;
pub use learning_card::LearningCard;
pub use learning_session::LearningSession;
pub use progress::ProgressState;
pub use rating::Rating;
pub use review_policy::{ReviewOutcome, apply_review};
pub use review_record::ReviewRecord;

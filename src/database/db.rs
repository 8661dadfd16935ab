//! Database operations for flashcard application
//!
//! Handles SQLite database initialization, CRUD operations for decks and flashcards,
//! per-card progress, learner settings and the append-only review history.
//! Timestamps are stored as Unix milliseconds.

use crate::models::{
    Deck, DeckSet, Flashcard, LearnerSettings, ProgressState, Rating, ReviewError, ReviewOutcome,
    ReviewRecord, apply_review,
};
use chrono::{DateTime, Duration, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Review(#[from] ReviewError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Opens (or creates) the database file and makes sure all tables exist
pub fn init_database(path: &Path) -> DbResult<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    create_schema(&conn)?;
    info!(path = %path.display(), "database opened");
    Ok(conn)
}

/// In-memory database with the full schema, used by tests
pub fn init_in_memory() -> DbResult<Connection> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS decks (
            name TEXT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS flashcards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            deck_name TEXT NOT NULL,
            term TEXT NOT NULL,
            definition TEXT NOT NULL,
            levels TEXT NOT NULL DEFAULT '[]',
            FOREIGN KEY (deck_name) REFERENCES decks(name) ON DELETE CASCADE,
            UNIQUE(deck_name, term)
        );

        CREATE TABLE IF NOT EXISTS card_progress (
            flashcard_id INTEGER PRIMARY KEY,
            current_level INTEGER NOT NULL DEFAULT 0 CHECK (current_level >= 0),
            active_level INTEGER NOT NULL DEFAULT 0 CHECK (active_level >= 0),
            streak INTEGER NOT NULL DEFAULT 0 CHECK (streak >= 0),
            last_reviewed INTEGER,
            next_review INTEGER NOT NULL,
            FOREIGN KEY (flashcard_id) REFERENCES flashcards(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS review_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            flashcard_id INTEGER NOT NULL,
            rating TEXT NOT NULL,
            interval_minutes REAL NOT NULL,
            streak INTEGER NOT NULL,
            reviewed_at INTEGER NOT NULL,
            FOREIGN KEY (flashcard_id) REFERENCES flashcards(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS learner_settings (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            base_interval_minutes REAL NOT NULL,
            level_factor REAL NOT NULL,
            streak_factor REAL NOT NULL,
            again_penalty REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS app_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_progress_next_review ON card_progress(next_review);
        CREATE INDEX IF NOT EXISTS idx_history_flashcard ON review_history(flashcard_id);
        "#,
    )?;

    // Simulated "today", advanced manually from the UI
    conn.execute(
        "INSERT OR IGNORE INTO app_state (key, value) VALUES ('current_date', ?1)",
        params![Utc::now().timestamp_millis().to_string()],
    )?;

    Ok(())
}

fn from_millis(millis: i64) -> DbResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| DbError::InvalidTimestamp(millis.to_string()))
}

/// Column conversion helper for use inside row mappers
fn millis_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            Box::new(DbError::InvalidTimestamp(millis.to_string())),
        )
    })
}

fn levels_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn rating_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Rating> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: ReviewError| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn progress_from_row(row: &Row<'_>, first: usize) -> rusqlite::Result<ProgressState> {
    let last_reviewed = match row.get::<_, Option<i64>>(first + 3)? {
        Some(_) => Some(millis_column(row, first + 3)?),
        None => None,
    };
    Ok(ProgressState {
        current_level: row.get(first)?,
        active_level: row.get(first + 1)?,
        streak: row.get(first + 2)?,
        last_reviewed,
        next_review: millis_column(row, first + 4)?,
    })
}

/// Retrieves current simulated date from database
pub fn get_current_date(conn: &Connection) -> DbResult<DateTime<Utc>> {
    let value: String = conn.query_row(
        "SELECT value FROM app_state WHERE key = 'current_date'",
        [],
        |row| row.get(0),
    )?;

    let millis = value
        .parse::<i64>()
        .map_err(|_| DbError::InvalidTimestamp(value.clone()))?;
    from_millis(millis)
}

/// Advances current date by 24 hours (for testing spaced repetition)
pub fn advance_day(conn: &Connection) -> DbResult<DateTime<Utc>> {
    let next_day = get_current_date(conn)? + Duration::days(1);

    conn.execute(
        "UPDATE app_state SET value = ?1 WHERE key = 'current_date'",
        params![next_day.timestamp_millis().to_string()],
    )?;

    debug!(date = %next_day, "advanced simulated date");
    Ok(next_day)
}

/// Creates a new deck in the database
pub fn new_deck(name: &str, conn: &Connection) -> DbResult<()> {
    conn.execute("INSERT INTO decks (name) VALUES (?1)", params![name])?;
    info!(deck = name, "deck created");
    Ok(())
}

/// Removes a deck together with its flashcards, progress and history
pub fn delete_deck(name: &str, conn: &Connection) -> DbResult<()> {
    let removed = conn.execute("DELETE FROM decks WHERE name = ?1", params![name])?;
    if removed == 0 {
        return Err(DbError::NotFound(format!("deck '{}'", name)));
    }
    info!(deck = name, "deck deleted");
    Ok(())
}

/// Adds a flashcard to a deck and creates its progress row
///
/// Returns the flashcard ID. Fails with `AlreadyExists` when the deck already
/// has a card with the same term.
pub fn add_flashcard(deck_name: &str, flashcard: &Flashcard, conn: &Connection) -> DbResult<i64> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM flashcards WHERE deck_name = ?1 AND term = ?2",
            params![deck_name, flashcard.term],
            |row| row.get(0),
        )
        .optional()?;
    if existing.is_some() {
        return Err(DbError::AlreadyExists(format!(
            "flashcard '{}' in deck '{}'",
            flashcard.term, deck_name
        )));
    }

    conn.execute(
        "INSERT INTO flashcards (deck_name, term, definition, levels) VALUES (?1, ?2, ?3, ?4)",
        params![
            deck_name,
            flashcard.term,
            flashcard.definition,
            serde_json::to_string(&flashcard.levels)?
        ],
    )?;
    let flashcard_id = conn.last_insert_rowid();

    // New cards are due right away
    let created = ProgressState::new(get_current_date(conn)?);
    conn.execute(
        "INSERT INTO card_progress (flashcard_id, current_level, active_level, streak, next_review)
         VALUES (?1, 0, 0, 0, ?2)",
        params![flashcard_id, created.next_review.timestamp_millis()],
    )?;

    debug!(deck = deck_name, term = %flashcard.term, flashcard_id, "flashcard added");
    Ok(flashcard_id)
}

/// Creates a deck with all of its flashcards, or nothing at all if any insert fails
pub fn import_deck(deck: &Deck, conn: &Connection) -> DbResult<()> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    new_deck(&deck.name, &tx)?;
    for flashcard in &deck.flashcards {
        add_flashcard(&deck.name, flashcard, &tx)?;
    }
    tx.commit()?;
    info!(deck = %deck.name, cards = deck.flashcards.len(), "deck imported");
    Ok(())
}

/// Removes a flashcard with its progress and history
pub fn delete_flashcard(flashcard_id: i64, conn: &Connection) -> DbResult<()> {
    let removed = conn.execute("DELETE FROM flashcards WHERE id = ?1", params![flashcard_id])?;
    if removed == 0 {
        return Err(DbError::NotFound(format!("flashcard {}", flashcard_id)));
    }
    debug!(flashcard_id, "flashcard deleted");
    Ok(())
}

/// Retrieves all flashcards for a given deck
///
/// Returns vector of (flashcard_id, Flashcard) tuples
pub fn get_flashcards_for_deck(deck_name: &str, conn: &Connection) -> DbResult<Vec<(i64, Flashcard)>> {
    let mut stmt = conn.prepare(
        "SELECT id, term, definition, levels FROM flashcards WHERE deck_name = ?1 ORDER BY id",
    )?;

    let flashcards = stmt
        .query_map(params![deck_name], |row| {
            Ok((
                row.get(0)?,
                Flashcard {
                    term: row.get(1)?,
                    definition: row.get(2)?,
                    levels: levels_column(row, 3)?,
                },
            ))
        })?
        .collect::<rusqlite::Result<Vec<(i64, Flashcard)>>>()?;

    Ok(flashcards)
}

/// Highest level a flashcard can reach
pub fn get_max_level(flashcard_id: i64, conn: &Connection) -> DbResult<i32> {
    let levels = conn
        .query_row(
            "SELECT levels FROM flashcards WHERE id = ?1",
            params![flashcard_id],
            |row| levels_column(row, 0),
        )
        .optional()?
        .ok_or_else(|| DbError::NotFound(format!("flashcard {}", flashcard_id)))?;
    Ok(i32::try_from(levels.len()).unwrap_or(i32::MAX))
}

/// Loads the progress row of a flashcard
pub fn get_progress(flashcard_id: i64, conn: &Connection) -> DbResult<ProgressState> {
    conn.query_row(
        "SELECT current_level, active_level, streak, last_reviewed, next_review
         FROM card_progress WHERE flashcard_id = ?1",
        params![flashcard_id],
        |row| progress_from_row(row, 0),
    )
    .optional()?
    .ok_or_else(|| DbError::NotFound(format!("progress for flashcard {}", flashcard_id)))
}

/// Writes a progress row after checking it against the card's max level
pub fn save_progress(
    flashcard_id: i64,
    progress: &ProgressState,
    max_level: i32,
    conn: &Connection,
) -> DbResult<()> {
    progress.validate(max_level)?;

    let updated = conn.execute(
        "UPDATE card_progress
         SET current_level = ?1, active_level = ?2, streak = ?3, last_reviewed = ?4, next_review = ?5
         WHERE flashcard_id = ?6",
        params![
            progress.current_level,
            progress.active_level,
            progress.streak,
            progress.last_reviewed.map(|t| t.timestamp_millis()),
            progress.next_review.timestamp_millis(),
            flashcard_id
        ],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("progress for flashcard {}", flashcard_id)));
    }
    Ok(())
}

/// Changes which unlocked level of a card is being presented
pub fn set_active_level(flashcard_id: i64, active_level: i32, conn: &Connection) -> DbResult<()> {
    let max_level = get_max_level(flashcard_id, conn)?;
    let mut progress = get_progress(flashcard_id, conn)?;
    progress.active_level = active_level;
    save_progress(flashcard_id, &progress, max_level, conn)?;
    debug!(flashcard_id, active_level, "active level changed");
    Ok(())
}

/// Appends an entry to the review history
pub fn append_review(record: &ReviewRecord, conn: &Connection) -> DbResult<()> {
    conn.execute(
        "INSERT INTO review_history (flashcard_id, rating, interval_minutes, streak, reviewed_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.flashcard_id,
            record.rating.as_str(),
            record.interval_minutes,
            record.streak,
            record.reviewed_at.timestamp_millis()
        ],
    )?;
    Ok(())
}

/// Rates a flashcard: loads its progress, applies the review policy, saves the
/// new progress and appends a history entry, all in one write transaction.
///
/// The IMMEDIATE transaction takes the write lock up front, so two reviews of
/// the same card cannot both read the old progress.
pub fn review_flashcard(
    flashcard_id: i64,
    rating: Rating,
    default_settings: &LearnerSettings,
    now: DateTime<Utc>,
    conn: &Connection,
) -> DbResult<ReviewOutcome> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let settings = load_learner_settings(default_settings, &tx)?;
    let max_level = get_max_level(flashcard_id, &tx)?;
    let progress = get_progress(flashcard_id, &tx)?;

    let outcome = apply_review(&progress, rating, &settings, max_level, now)?;

    save_progress(flashcard_id, &outcome.state, max_level, &tx)?;
    append_review(&ReviewRecord::from_outcome(flashcard_id, &outcome, now), &tx)?;
    tx.commit()?;

    info!(
        flashcard_id,
        rating = %rating,
        level = outcome.state.current_level,
        streak = outcome.state.streak,
        interval_minutes = outcome.interval_minutes(),
        "review recorded"
    );
    Ok(outcome)
}

/// Review history of one flashcard, oldest first
pub fn get_review_history(flashcard_id: i64, conn: &Connection) -> DbResult<Vec<ReviewRecord>> {
    let mut stmt = conn.prepare(
        "SELECT flashcard_id, rating, interval_minutes, streak, reviewed_at
         FROM review_history WHERE flashcard_id = ?1 ORDER BY id ASC",
    )?;
    let records = stmt
        .query_map(params![flashcard_id], review_record_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

/// Review history of every card in a deck, oldest first
pub fn get_deck_history(deck_name: &str, conn: &Connection) -> DbResult<Vec<ReviewRecord>> {
    let mut stmt = conn.prepare(
        "SELECT h.flashcard_id, h.rating, h.interval_minutes, h.streak, h.reviewed_at
         FROM review_history h
         JOIN flashcards f ON f.id = h.flashcard_id
         WHERE f.deck_name = ?1
         ORDER BY h.id ASC",
    )?;
    let records = stmt
        .query_map(params![deck_name], review_record_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

fn review_record_from_row(row: &Row<'_>) -> rusqlite::Result<ReviewRecord> {
    Ok(ReviewRecord {
        flashcard_id: row.get(0)?,
        rating: rating_column(row, 1)?,
        interval_minutes: row.get(2)?,
        streak: row.get(3)?,
        reviewed_at: millis_column(row, 4)?,
    })
}

/// Stored learner settings, or `defaults` when none were saved yet
pub fn load_learner_settings(defaults: &LearnerSettings, conn: &Connection) -> DbResult<LearnerSettings> {
    let stored = conn
        .query_row(
            "SELECT base_interval_minutes, level_factor, streak_factor, again_penalty
             FROM learner_settings WHERE id = 1",
            [],
            |row| {
                Ok(LearnerSettings {
                    base_interval_minutes: row.get(0)?,
                    level_factor: row.get(1)?,
                    streak_factor: row.get(2)?,
                    again_penalty: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(stored.unwrap_or(*defaults))
}

/// Saves learner settings after validating them
pub fn save_learner_settings(settings: &LearnerSettings, conn: &Connection) -> DbResult<()> {
    settings.validate()?;
    conn.execute(
        "INSERT INTO learner_settings (id, base_interval_minutes, level_factor, streak_factor, again_penalty)
         VALUES (1, ?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
            base_interval_minutes = excluded.base_interval_minutes,
            level_factor = excluded.level_factor,
            streak_factor = excluded.streak_factor,
            again_penalty = excluded.again_penalty",
        params![
            settings.base_interval_minutes,
            settings.level_factor,
            settings.streak_factor,
            settings.again_penalty
        ],
    )?;
    info!(?settings, "learner settings saved");
    Ok(())
}

/// Retrieves flashcards due for review in a deck
///
/// Returns flashcards where next_review <= current_date,
/// ordered by next_review (oldest first).
pub fn get_flashcards_due_for_review(
    deck_name: &str,
    conn: &Connection,
) -> DbResult<Vec<(i64, Flashcard, ProgressState)>> {
    let current_date = get_current_date(conn)?;

    let mut stmt = conn.prepare(
        "SELECT f.id, f.term, f.definition, f.levels,
                p.current_level, p.active_level, p.streak, p.last_reviewed, p.next_review
         FROM flashcards f
         JOIN card_progress p ON f.id = p.flashcard_id
         WHERE f.deck_name = ?1 AND p.next_review <= ?2
         ORDER BY p.next_review ASC, f.id ASC",
    )?;

    let flashcards = stmt
        .query_map(params![deck_name, current_date.timestamp_millis()], |row| {
            Ok((
                row.get(0)?,
                Flashcard {
                    term: row.get(1)?,
                    definition: row.get(2)?,
                    levels: levels_column(row, 3)?,
                },
                progress_from_row(row, 4)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(flashcards)
}

/// Retrieves all deck names from database
pub fn get_all_decks(conn: &Connection) -> DbResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM decks ORDER BY name")?;
    let decks = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(decks)
}

/// Loads all decks with their flashcards into memory
///
/// Does not load progress - that's fetched separately when starting a learning session.
pub fn load_all_decks(conn: &Connection) -> DbResult<DeckSet> {
    let mut decks = Vec::new();

    for deck_name in get_all_decks(conn)? {
        let flashcards = get_flashcards_for_deck(&deck_name, conn)?
            .into_iter()
            .map(|(_, fc)| fc)
            .collect();

        decks.push(Deck {
            name: deck_name,
            flashcards,
        });
    }

    Ok(DeckSet { decks })
}

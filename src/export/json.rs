//! JSON import/export module for flashcard decks.
//! Decks (with card levels) can be saved and loaded; review history can be
//! exported for auditing.

use crate::models::{Deck, ReviewRecord};
use serde::Serialize;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn write_pretty<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), ExportError> {
    let json_string = serde_json::to_string_pretty(value)?;
    fs::write(path, json_string)?;
    Ok(())
}

/// Exports a deck to a JSON file at the specified path.
pub fn export_json_to_path(deck: &Deck, path: &Path) -> Result<(), ExportError> {
    write_pretty(deck, path)?;
    info!(deck = %deck.name, path = %path.display(), "deck exported");
    Ok(())
}

/// Imports a deck from a JSON file.
/// Cards without a `levels` field get no extra levels.
pub fn import_json(path: &Path) -> Result<Deck, ExportError> {
    let contents = fs::read_to_string(path)?;
    let deck: Deck = serde_json::from_str(&contents)?;

    info!(deck = %deck.name, path = %path.display(), "deck imported");
    Ok(deck)
}

/// Writes review history entries as a JSON array.
pub fn export_history_to_path(records: &[ReviewRecord], path: &Path) -> Result<(), ExportError> {
    write_pretty(records, path)?;
    info!(entries = records.len(), path = %path.display(), "review history exported");
    Ok(())
}

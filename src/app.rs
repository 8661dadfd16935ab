//! Main application UI and state management.
//! Handles deck management, learner settings and review sessions.

use crate::config::Config;
use crate::database::db::{self, DbResult};
use crate::export::json::{export_history_to_path, export_json_to_path, import_json};
use crate::models::{Deck, DeckSet, Flashcard, LearnerSettings, LearningSession, Rating};
use chrono::{DateTime, Local, Utc};
use eframe::egui;
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, warn};

/// Application screen states
#[derive(Default)]
enum AppScreen {
    #[default]
    Main,
    LearningSession,
    Settings,
}

/// What the export dialog writes out
#[derive(Clone, Copy, PartialEq)]
enum ExportKind {
    Deck,
    History,
}

/// Main application state
pub struct MyApp {
    show_confirmation_dialog: bool,
    allowed_to_close: bool,
    all_decks: DeckSet,
    selected_deck_index: Option<usize>,
    current_term: String,
    current_definition: String,
    current_levels: String,
    new_deck_name: String,
    conn: Arc<Mutex<Connection>>,
    config: Config,

    current_screen: AppScreen,
    learning_session: Option<LearningSession>,

    current_date: Option<DateTime<Utc>>,
    settings_draft: LearnerSettings,

    export_kind: Option<ExportKind>,
    show_result_dialog: bool,
    result_message: String,
}

/// Formats a timestamp as local YYYY-MM-DD
fn format_date(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d").to_string()
}

/// Formats a timestamp as local date and time
fn format_date_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Splits the multi-line level editor into one entry per non-empty line
fn parse_levels(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

impl eframe::App for MyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        match self.current_screen {
            AppScreen::Main => self.render_main_screen(ctx),
            AppScreen::LearningSession => self.render_learning_screen(ctx),
            AppScreen::Settings => self.render_settings_screen(ctx),
        }

        // Handle window close requests with confirmation dialog
        if ctx.input(|i| i.viewport().close_requested()) && !self.allowed_to_close {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            self.show_confirmation_dialog = true;
        }

        if self.show_confirmation_dialog {
            egui::Window::new("Do you want to quit?")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.horizontal(|ui| {
                        if ui.button("No").clicked() {
                            self.show_confirmation_dialog = false;
                            self.allowed_to_close = false;
                        }

                        if ui.button("Yes").clicked() {
                            self.show_confirmation_dialog = false;
                            self.allowed_to_close = true;
                            ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
                        }
                    });
                });
        }

        if let Some(kind) = self.export_kind {
            let mut export_deck_index: Option<usize> = None;
            let mut should_cancel = false;
            let title = match kind {
                ExportKind::Deck => "Export Deck",
                ExportKind::History => "Export Review History",
            };

            egui::Window::new(title)
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label("Select a deck:");
                    ui.separator();

                    for (i, deck) in self.all_decks.decks.iter().enumerate() {
                        if ui
                            .button(format!("{} ({} cards)", deck.name, deck.flashcards.len()))
                            .clicked()
                        {
                            export_deck_index = Some(i);
                        }
                    }

                    ui.separator();

                    if ui.button("Cancel").clicked() {
                        should_cancel = true;
                    }
                });

            if let Some(i) = export_deck_index {
                self.handle_export(kind, i);
            }
            if should_cancel {
                self.export_kind = None;
            }
        }

        if self.show_result_dialog {
            egui::Window::new("Result")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label(&self.result_message);
                    ui.add_space(10.0);
                    if ui.button("OK").clicked() {
                        self.show_result_dialog = false;
                    }
                });
        }
    }
}

impl MyApp {
    /// Creates a new application instance with decks loaded from database
    pub fn new_with_deckset(deckset: DeckSet, conn: Connection, config: Config) -> Self {
        let current_date = db::get_current_date(&conn).ok();
        let settings_draft =
            db::load_learner_settings(&config.default_settings, &conn).unwrap_or_else(|e| {
                warn!(error = %e, "could not load learner settings");
                config.default_settings
            });
        let has_decks = !deckset.decks.is_empty();
        Self {
            all_decks: deckset,
            selected_deck_index: if has_decks { Some(0) } else { None },
            current_term: String::new(),
            current_definition: String::new(),
            current_levels: String::new(),
            new_deck_name: String::new(),
            show_confirmation_dialog: false,
            allowed_to_close: false,
            conn: Arc::new(Mutex::new(conn)),
            config,
            current_screen: AppScreen::Main,
            learning_session: None,
            current_date,
            settings_draft,
            export_kind: None,
            show_result_dialog: false,
            result_message: String::new(),
        }
    }

    fn show_result(&mut self, message: impl Into<String>) {
        self.result_message = message.into();
        self.show_result_dialog = true;
    }

    /// Runs a database operation, reporting failures in the result dialog
    fn with_db<T>(&mut self, what: &str, op: impl FnOnce(&Connection) -> DbResult<T>) -> Option<T> {
        let result = match self.conn.lock() {
            Ok(conn) => op(&conn),
            Err(_) => Err(db::DbError::LockPoisoned),
        };
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                error!(error = %e, "{} failed", what);
                self.show_result(format!("{} failed: {}", what, e));
                None
            }
        }
    }

    fn lock(&self) -> Option<MutexGuard<'_, Connection>> {
        self.conn.lock().ok()
    }

    /// Renders the main screen with deck management interface
    fn render_main_screen(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                let date_label = self
                    .current_date
                    .map(format_date)
                    .unwrap_or_else(|| "Unknown".to_string());
                ui.label(date_label);

                if ui.button("Next Day").clicked() {
                    if let Some(date) = self.with_db("Advancing the date", db::advance_day) {
                        self.current_date = Some(date);
                    }
                }

                if ui.button("Settings").clicked() {
                    self.current_screen = AppScreen::Settings;
                }
            });
            ui.separator();

            ui.horizontal(|ui| {
                if ui.button("Export Deck").clicked() {
                    self.export_kind = Some(ExportKind::Deck);
                }
                if ui.button("Import Deck").clicked() {
                    self.handle_import();
                }
                if ui.button("Export History").clicked() {
                    self.export_kind = Some(ExportKind::History);
                }
            });

            ui.separator();

            ui.heading("Create New Deck");
            ui.horizontal(|ui| {
                ui.label("Deck name:");
                ui.text_edit_singleline(&mut self.new_deck_name);
                if ui.button("Create Deck").clicked() && !self.new_deck_name.is_empty() {
                    let name = self.new_deck_name.clone();
                    if self.all_decks.contains(&name) {
                        self.show_result(format!("Deck '{}' already exists!", name));
                    } else if self
                        .with_db("Creating the deck", |conn| db::new_deck(&name, conn))
                        .is_some()
                    {
                        self.all_decks.decks.push(Deck::new(name));
                        self.new_deck_name.clear();
                    }
                }
            });

            ui.separator();

            ui.heading(format!("Decks ({})", self.all_decks.decks.len()));

            // Actions are applied after rendering to avoid borrowing conflicts
            let mut action_select: Option<usize> = None;
            let mut action_learn: Option<usize> = None;
            let mut action_delete: Option<usize> = None;

            egui::ScrollArea::vertical()
                .id_salt("decks_list")
                .max_height(150.0)
                .show(ui, |ui| {
                    for (i, deck) in self.all_decks.decks.iter().enumerate() {
                        let is_selected = self.selected_deck_index == Some(i);

                        ui.horizontal(|ui| {
                            if ui
                                .selectable_label(
                                    is_selected,
                                    format!(
                                        "{}. {} ({} cards, {} levels)",
                                        i + 1,
                                        deck.name,
                                        deck.flashcards.len(),
                                        deck.level_count()
                                    ),
                                )
                                .clicked()
                            {
                                action_select = Some(i);
                            }

                            if ui.button("Learn").clicked() {
                                action_learn = Some(i);
                            }
                            if ui.button("Delete").clicked() {
                                action_delete = Some(i);
                            }
                        });
                    }
                });

            if let Some(i) = action_select {
                self.selected_deck_index = Some(i);
            }
            if let Some(i) = action_learn {
                self.start_learning_session(i);
            }
            if let Some(i) = action_delete {
                self.delete_deck(i);
            }

            ui.separator();

            let Some(deck_index) = self.selected_deck_index else {
                ui.label("Select a deck to add flashcards");
                return;
            };
            let Some(deck_name) = self.all_decks.decks.get(deck_index).map(|d| d.name.clone())
            else {
                ui.label("Select a deck to add flashcards");
                return;
            };

            ui.heading(format!("Selected Deck: {}", deck_name));

            ui.horizontal(|ui| {
                ui.label("Term:");
                ui.text_edit_singleline(&mut self.current_term);
            });

            ui.horizontal(|ui| {
                ui.label("Definition:");
                ui.text_edit_singleline(&mut self.current_definition);
            });

            ui.label("Harder levels (one per line, optional):");
            ui.text_edit_multiline(&mut self.current_levels);

            if ui.button("Add Flashcard").clicked()
                && !self.current_term.is_empty()
                && !self.current_definition.is_empty()
            {
                let mut flashcard =
                    Flashcard::new(self.current_term.clone(), self.current_definition.clone());
                flashcard.levels = parse_levels(&self.current_levels);

                if self
                    .with_db("Adding the flashcard", |conn| {
                        db::add_flashcard(&deck_name, &flashcard, conn)
                    })
                    .is_some()
                {
                    if let Some(deck) = self.all_decks.decks.get_mut(deck_index) {
                        deck.flashcards.push(flashcard);
                    }
                    self.current_term.clear();
                    self.current_definition.clear();
                    self.current_levels.clear();
                }
            }

            ui.separator();

            if let Some(deck) = self.all_decks.decks.get(deck_index) {
                ui.heading(format!("Flashcards ({})", deck.flashcards.len()));

                egui::ScrollArea::vertical()
                    .id_salt("flashcards_list")
                    .max_height(200.0)
                    .show(ui, |ui| {
                        for (i, flashcard) in deck.flashcards.iter().enumerate() {
                            ui.group(|ui| {
                                ui.label(format!("{}. Term: {}", i + 1, flashcard.term));
                                ui.label(format!("   Definition: {}", flashcard.definition));
                                for (level, content) in flashcard.levels.iter().enumerate() {
                                    ui.label(format!("   Level {}: {}", level + 1, content));
                                }
                            });
                        }
                    });
            }
        });
    }

    /// Renders the learner settings editor
    fn render_settings_screen(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Learning Settings");
            ui.add_space(10.0);

            egui::Grid::new("settings_grid")
                .num_columns(2)
                .spacing([20.0, 8.0])
                .show(ui, |ui| {
                    ui.label("Base interval (minutes):");
                    ui.add(
                        egui::DragValue::new(&mut self.settings_draft.base_interval_minutes)
                            .speed(10.0)
                            .range(1.0..=525_600.0),
                    );
                    ui.end_row();

                    ui.label("Level factor:");
                    ui.add(
                        egui::DragValue::new(&mut self.settings_draft.level_factor)
                            .speed(0.05)
                            .range(0.0..=10.0),
                    );
                    ui.end_row();

                    ui.label("Streak factor:");
                    ui.add(
                        egui::DragValue::new(&mut self.settings_draft.streak_factor)
                            .speed(0.05)
                            .range(0.0..=10.0),
                    );
                    ui.end_row();

                    ui.label("Again penalty:");
                    ui.add(
                        egui::DragValue::new(&mut self.settings_draft.again_penalty)
                            .speed(0.01)
                            .range(0.01..=1.0),
                    );
                    ui.end_row();
                });

            ui.add_space(20.0);

            ui.horizontal(|ui| {
                if ui.button("Save").clicked() {
                    let settings = self.settings_draft;
                    if self
                        .with_db("Saving settings", |conn| {
                            db::save_learner_settings(&settings, conn)
                        })
                        .is_some()
                    {
                        self.current_screen = AppScreen::Main;
                    }
                }
                if ui.button("Reset to Defaults").clicked() {
                    self.settings_draft = self.config.default_settings;
                }
                if ui.button("Cancel").clicked() {
                    let defaults = self.config.default_settings;
                    if let Some(stored) = self.with_db("Loading settings", |conn| {
                        db::load_learner_settings(&defaults, conn)
                    }) {
                        self.settings_draft = stored;
                    }
                    self.current_screen = AppScreen::Main;
                }
            });
        });
    }

    /// Renders the learning session screen with flashcard review interface
    fn render_learning_screen(&mut self, ctx: &egui::Context) {
        let now = self.current_date.unwrap_or_else(Utc::now);
        let settings = self.settings_draft;
        let mut failure: Option<String> = None;
        let mut leave = false;

        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(session) = &mut self.learning_session else {
                leave = true;
                return;
            };

            ui.heading(format!("Learning: {}", session.deck_name));
            ui.label(session.phase_message());
            ui.label(format!(
                "Progress: {} / {} learned ({} remaining)",
                session.learned_count(),
                session.total_count(),
                session.remaining_count()
            ));

            ui.add_space(20.0);

            if session.is_completed() {
                ui.heading("Congratulations!");
                ui.label("You've reviewed all due cards in this deck!");
                ui.add_space(20.0);
                if ui.button("Back to Main Screen").clicked() {
                    leave = true;
                }
                return;
            }

            let Some(card) = session.current_card() else {
                leave = true;
                return;
            };

            // Clone values to avoid borrowing issues
            let show_def = session.show_definition;
            let is_learned = card.is_learned;
            let term = card.flashcard.term.clone();
            let content = card.shown_content().to_string();
            let progress = card.progress.clone();
            let max_level = card.max_level();

            ui.label(format!(
                "Level {} of {} (unlocked: {}), streak {}",
                progress.active_level, max_level, progress.current_level, progress.streak
            ));

            let mut action_level_down = false;
            let mut action_level_up = false;
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(progress.active_level > 0, egui::Button::new("< Easier level"))
                    .clicked()
                {
                    action_level_down = true;
                }
                if ui
                    .add_enabled(
                        progress.active_level < progress.current_level.min(max_level),
                        egui::Button::new("Harder level >"),
                    )
                    .clicked()
                {
                    action_level_up = true;
                }
            });

            ui.group(|ui| {
                ui.set_min_height(200.0);
                ui.vertical_centered(|ui| {
                    ui.add_space(20.0);

                    ui.heading("Term:");
                    ui.label(&term);

                    ui.add_space(20.0);

                    if show_def {
                        ui.heading("Answer:");
                        ui.label(&content);
                    } else {
                        ui.label("(Click 'Show Answer' to reveal)");
                    }

                    ui.add_space(20.0);
                });
            });

            ui.add_space(20.0);

            let mut action_toggle_def = false;
            let mut action_rating: Option<Rating> = None;

            if !show_def && ui.button("Show Answer").clicked() {
                action_toggle_def = true;
            }

            // Rating buttons, each showing when the card would come back
            if show_def && !is_learned {
                ui.label("How well did you recall it?");
                ui.horizontal(|ui| {
                    for rating in Rating::ALL {
                        let due = session
                            .preview(rating, &settings, now)
                            .map(format_date_time)
                            .unwrap_or_default();
                        if ui
                            .button(format!("{}\n{}", rating.label(), due))
                            .clicked()
                        {
                            action_rating = Some(rating);
                        }
                    }
                });
            }

            ui.add_space(20.0);

            if ui.button("Back to Main Screen").clicked() {
                leave = true;
            }

            if action_toggle_def {
                session.toggle_definition();
            }
            if action_level_down {
                if let Err(e) = session.level_down_current() {
                    failure = Some(format!("Changing level failed: {}", e));
                }
            }
            if action_level_up {
                if let Err(e) = session.level_up_current() {
                    failure = Some(format!("Changing level failed: {}", e));
                }
            }
            if let Some(rating) = action_rating {
                match session.grade_current_card(rating) {
                    Ok(_) => session.next_card(),
                    Err(e) => {
                        error!(error = %e, "review failed");
                        failure = Some(format!("Saving the review failed: {}", e));
                    }
                }
            }
        });

        if let Some(message) = failure {
            self.show_result(message);
        }
        if leave {
            self.current_screen = AppScreen::Main;
            self.learning_session = None;
        }
    }

    /// Starts a learning session with cards due for review
    fn start_learning_session(&mut self, deck_index: usize) {
        let Some(deck_name) = self.all_decks.decks.get(deck_index).map(|d| d.name.clone()) else {
            return;
        };

        let Some(due_cards) = self.with_db("Loading due cards", |conn| {
            db::get_flashcards_due_for_review(&deck_name, conn)
        }) else {
            return;
        };

        if due_cards.is_empty() {
            self.show_result(format!("No cards in '{}' are due today.", deck_name));
            return;
        }

        self.learning_session = Some(LearningSession::new_from_due_cards(
            deck_name,
            due_cards,
            Arc::clone(&self.conn),
            self.config.default_settings,
        ));
        self.current_screen = AppScreen::LearningSession;
    }

    fn delete_deck(&mut self, deck_index: usize) {
        let Some(name) = self.all_decks.decks.get(deck_index).map(|d| d.name.clone()) else {
            return;
        };
        if self
            .with_db("Deleting the deck", |conn| db::delete_deck(&name, conn))
            .is_some()
        {
            self.all_decks.remove(&name);
            self.selected_deck_index = if self.all_decks.decks.is_empty() {
                None
            } else {
                Some(0)
            };
        }
    }

    /// Handles deck or history export to a JSON file
    fn handle_export(&mut self, kind: ExportKind, deck_index: usize) {
        self.export_kind = None;
        let Some(deck) = self.all_decks.decks.get(deck_index).cloned() else {
            return;
        };

        let file_name = match kind {
            ExportKind::Deck => format!("{}.json", deck.name),
            ExportKind::History => format!("{}-history.json", deck.name),
        };
        let Some(path) = rfd::FileDialog::new()
            .set_file_name(file_name)
            .add_filter("JSON files", &["json"])
            .save_file()
        else {
            return;
        };

        let result = match kind {
            ExportKind::Deck => export_json_to_path(&deck, &path).map_err(|e| e.to_string()),
            ExportKind::History => {
                let history = match self.lock() {
                    Some(conn) => db::get_deck_history(&deck.name, &conn).map_err(|e| e.to_string()),
                    None => Err("database unavailable".to_string()),
                };
                history.and_then(|records| {
                    export_history_to_path(&records, &path).map_err(|e| e.to_string())
                })
            }
        };

        match result {
            Ok(()) => self.show_result(format!("'{}' exported successfully!", deck.name)),
            Err(e) => self.show_result(format!("Export failed: {}", e)),
        }
    }

    /// Handles deck import from a JSON file
    fn handle_import(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON files", &["json"])
            .pick_file()
        else {
            return;
        };

        let deck = match import_json(&path) {
            Ok(deck) => deck,
            Err(e) => {
                self.show_result(format!(
                    "Import failed: {}\n\nPlease check if the file has correct structure:\n{{\n  \"name\": \"Deck Name\",\n  \"flashcards\": [...]\n}}",
                    e
                ));
                return;
            }
        };

        if self.all_decks.contains(&deck.name) {
            self.show_result(format!(
                "Deck '{}' already exists! Please rename it in the JSON file.",
                deck.name
            ));
            return;
        }

        let imported = self.with_db("Importing the deck", |conn| db::import_deck(&deck, conn));

        if imported.is_some() {
            self.show_result(format!(
                "Deck '{}' imported successfully with {} cards!",
                deck.name,
                deck.flashcards.len()
            ));
            self.all_decks.decks.push(deck);
        }
    }
}

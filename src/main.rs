mod app;
use flashcards_app::*;

use app::MyApp;
use config::Config;
use database::db::{add_flashcard, get_all_decks, init_database, load_all_decks, new_deck};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> eframe::Result<()> {
    let config = Config::load();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_target(false)
        .init();

    let conn = init_database(&config.db_path()).expect("Failed to initialize database");

    if get_all_decks(&conn).unwrap_or_default().is_empty() {
        let sample = [
            Flashcard::new("cześć", "hello").with_level("Say 'hi, how are you?' in Polish"),
            Flashcard::new("dziękuję", "thank you").with_level("Say 'thank you very much' in Polish"),
            Flashcard::new("proszę", "please"),
        ];
        match new_deck("Polish Vocabulary", &conn) {
            Ok(()) => {
                for card in &sample {
                    if let Err(e) = add_flashcard("Polish Vocabulary", card, &conn) {
                        warn!(term = %card.term, error = %e, "could not add sample card");
                    }
                }
                info!("sample data created");
            }
            Err(e) => warn!(error = %e, "could not create sample deck"),
        }
    }

    let deck_set = load_all_decks(&conn).expect("Failed to load decks from database");

    info!(decks = deck_set.decks.len(), "decks loaded");
    for deck in &deck_set.decks {
        info!(deck = %deck.name, cards = deck.flashcards.len(), "deck available");
    }
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window.width, config.window.height]),
        ..Default::default()
    };
    eframe::run_native(
        "Flashcards App",
        options,
        Box::new(|_cc| Ok(Box::new(MyApp::new_with_deckset(deck_set, conn, config)))),
    )
}

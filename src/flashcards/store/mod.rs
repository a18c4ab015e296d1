//! Persistence contracts for decks, cards and review state
//!
//! Two backends implement every contract:
//! - [`SqliteStore`]: `decks`, `cards` and `srs_data` tables in one SQLite file
//! - [`FileStore`]: one directory per deck holding Markdown card files, a card
//!   index and a review state document
//!
//! The backend is chosen once at startup by [`open_backend`] and handed to the
//! service as a `Box<dyn Backend>`.

mod file;
mod sqlite;

#[cfg(test)]
mod contract_tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::Result;
use super::models::{CardWithState, Deck, Flashcard, ReviewState};
use crate::config::Config;

pub use file::FileStore;
pub use sqlite::SqliteStore;

/// Which persistence backend to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Sqlite,
    Files,
}

pub trait DeckStore: Send + Sync {
    /// Create an empty deck. Fails with `DeckExists` if the name is taken.
    fn create_deck(&self, name: &str) -> Result<Deck>;

    /// Load a deck with all of its cards
    fn load_deck(&self, name: &str) -> Result<Deck>;

    /// Load every deck, ordered by name
    fn load_all_decks(&self) -> Result<Vec<Deck>>;

    fn deck_exists(&self, name: &str) -> Result<bool>;

    /// Delete a deck, its cards and their review state.
    /// Fails with `DeckNotFound` if the deck does not exist.
    fn delete_deck(&self, name: &str) -> Result<()>;
}

pub trait CardStore: Send + Sync {
    /// Insert a new card. Fails with `CardExists` if the id is taken.
    fn add_card(&self, deck: &str, card: Flashcard) -> Result<Flashcard>;

    /// Insert a card, or replace title and content of the card with the same
    /// id. A card found in another deck is moved into `deck`.
    fn add_or_update_card(&self, deck: &str, card: Flashcard) -> Result<Flashcard>;

    /// Delete a card and its review state. Returns false when there was
    /// nothing to delete.
    fn delete_card(&self, deck: &str, card_id: &str) -> Result<bool>;

    fn find_card(&self, deck: &str, card_id: &str) -> Result<Option<Flashcard>>;
}

/// Per-card review state.
///
/// Timestamps are kept at whole-second precision: `put_state` stores
/// `state.at_second_precision()`, so a state read back equals the stored
/// state truncated to seconds.
pub trait ReviewStateStore: Send + Sync {
    /// Review state of a card, or the default state if it was never stored
    fn get_state(&self, card_id: &str) -> Result<ReviewState>;

    /// Insert or overwrite the review state of a card
    fn put_state(&self, card_id: &str, state: &ReviewState) -> Result<()>;

    /// Read, transform and write back the state of a card as one step.
    /// Concurrent updates of the same card never see the same prior state.
    /// Fails with `CardNotFound` for an unknown card.
    fn update_state(
        &self,
        card_id: &str,
        update: &dyn Fn(&ReviewState) -> ReviewState,
    ) -> Result<ReviewState>;

    /// Cards of `decks` (empty = all) that are due at `now`, in due
    /// priority order, at most `limit` of them
    fn query_due(
        &self,
        decks: &[String],
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Flashcard>>;

    /// Every card of `decks` (empty = all) with its review state
    fn review_pool(&self, decks: &[String]) -> Result<Vec<CardWithState>>;
}

/// A complete persistence backend
pub trait Backend: DeckStore + CardStore + ReviewStateStore {}

impl<T: DeckStore + CardStore + ReviewStateStore> Backend for T {}

/// Open the backend named in the configuration.
///
/// Returns the backend and whether it was freshly created (no prior data).
pub fn open_backend(config: &Config) -> Result<(Box<dyn Backend>, bool)> {
    let data_dir = config.data_dir();
    match config.backend {
        BackendKind::Sqlite => {
            let db_path = config.db_path();
            let fresh = !db_path.exists();
            let store = SqliteStore::open(&db_path, config.busy_timeout())?;
            log::info!("Opened SQLite flashcard store at {:?}", db_path);
            Ok((Box::new(store), fresh))
        }
        BackendKind::Files => {
            let decks_dir = data_dir.join("decks");
            let fresh = !decks_dir.exists();
            let store = FileStore::open(decks_dir.clone())?;
            log::info!("Opened file flashcard store at {:?}", decks_dir);
            Ok((Box::new(store), fresh))
        }
    }
}

use thiserror::Error;

/// Errors raised by the flashcard stores, the scheduler and the service.
///
/// The variants fall into four groups: not found (`DeckNotFound`,
/// `CardNotFound`), conflict (`DeckExists`, `CardExists`), invalid
/// configuration, and persistence failures that wrap their cause.
#[derive(Error, Debug)]
pub enum FlashcardError {
    #[error("Deck not found: {0}")]
    DeckNotFound(String),

    #[error("Card not found: {card_id} (deck {deck})")]
    CardNotFound { deck: String, card_id: String },

    #[error("Deck already exists: {0}")]
    DeckExists(String),

    #[error("Card already exists: {0}")]
    CardExists(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Failed to delete card {card_id} while deleting deck {deck}: {source}")]
    CascadeFailed {
        deck: String,
        card_id: String,
        #[source]
        source: Box<FlashcardError>,
    },
}

impl FlashcardError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::DeckNotFound(_) | Self::CardNotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::DeckExists(_) | Self::CardExists(_))
    }

    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(_)
                | Self::Io(_)
                | Self::Json(_)
                | Self::LockPoisoned
                | Self::CascadeFailed { .. }
        )
    }
}

impl<T> From<std::sync::PoisonError<T>> for FlashcardError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::LockPoisoned
    }
}

pub type Result<T> = std::result::Result<T, FlashcardError>;

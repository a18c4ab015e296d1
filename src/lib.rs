//! mdsrs: Markdown flashcards with spaced repetition

pub mod config;
pub mod flashcards;

pub use config::Config;
pub use flashcards::{FlashcardError, FlashcardService};

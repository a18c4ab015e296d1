//! Flashcards with spaced repetition
//!
//! This module provides:
//! - Deck and card models with review state kept apart from cards
//! - Ease-factor and interval-doubling scheduling
//! - SQLite and flat-file stores behind one set of store traits
//! - The `FlashcardService` facade used by the CLI

pub mod algorithm;
pub mod error;
pub mod models;
pub mod service;
pub mod store;

pub use algorithm::Scheduler;
pub use error::{FlashcardError, Result};
pub use models::*;
pub use service::FlashcardService;
pub use store::{open_backend, Backend, BackendKind, CardStore, DeckStore, ReviewStateStore};

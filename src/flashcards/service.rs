//! Deck and card facade used by the CLI and other hosts

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};

use super::algorithm::{backfill, preview_next_reviews, select_due, Scheduler};
use super::error::{FlashcardError, Result};
use super::models::{CardWithState, Deck, Flashcard, ReviewOutcome, ReviewState};
use super::store::{open_backend, Backend};
use crate::config::Config;

pub const SAMPLE_DECK_NAME: &str = "Getting Started";

const SAMPLE_CARDS: [(&str, &str); 3] = [
    (
        "Welcome to MDSRS!",
        "# Welcome to MDSRS!\n\n\
         This is your first card. MDSRS is a markdown-based spaced repetition system.\n\n\
         ## Key Features:\n- Write cards in Markdown\n- Spaced repetition learning\n\
         - Organize cards into decks\n\
         - Code syntax highlighting\n\n## Getting Started:\n1. Create a deck\n2. Add cards to it\n\
         3. Use markdown to format your cards\n4. Review cards regularly\n<card-back>\n\
         # back of card\n\nsome info\n\n</card-back>",
    ),
    (
        "Markdown Basics",
        "# Markdown Basics\n\n## Headers\n# H1\n## H2\n### H3\n\n## Lists\n- Bullet point\n\
         - Another point\n\n\
         1. Numbered list\n2. Second item\n\n## Code\n```python\nprint('Hello, World!')\n```\n\n\
         ## Links and Images\n[Link text](URL)\n![Image alt text](image URL)\n<card-back>\n\
         # back of card\n\nsome info\n\n</card-back>",
    ),
    (
        "Spaced Repetition",
        "# Spaced Repetition\n\n\
         Spaced repetition is a learning technique that incorporates increasing intervals \
         of time between subsequent review of previously learned material.\n\n## How it works:\n\
         1. Review a card\n\
         2. Rate your confidence\n\
         3. The card will reappear based on:\n   - Your confidence rating\n\
         - Previous review history\n   - Optimal spacing algorithm\n\n\
         This helps move information from short-term \
         to long-term memory efficiently.\n<card-back>\n# back of card\n\nsome info\n\n\
         </card-back>",
    ),
];

/// Source of the current time
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct FlashcardService {
    store: Box<dyn Backend>,
    scheduler: Scheduler,
    backfill: bool,
    cards_in_review: usize,
    excluded_decks: Vec<String>,
    clock: Clock,
}

impl FlashcardService {
    pub fn new(store: Box<dyn Backend>, config: &Config) -> Self {
        Self {
            store,
            scheduler: config.scheduler,
            backfill: config.backfill,
            cards_in_review: config.number_of_cards_in_review,
            excluded_decks: config.decks_excluded_from_review.clone(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Open the configured backend, seeding the sample deck into a fresh store
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        let (store, fresh) = open_backend(config)?;
        let service = Self::new(store, config);

        if fresh && config.seed_sample_deck {
            service.seed_sample_deck()?;
        }
        Ok(service)
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_backfill(mut self, enabled: bool) -> Self {
        self.backfill = enabled;
        self
    }

    pub fn scheduler(&self) -> Scheduler {
        self.scheduler
    }

    /// Current time at whole-second precision, the resolution every backend keeps
    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)().trunc_subsecs(0)
    }

    fn require_deck(&self, name: &str) -> Result<()> {
        if self.store.deck_exists(name)? {
            Ok(())
        } else {
            Err(FlashcardError::DeckNotFound(name.to_string()))
        }
    }

    // ===== Decks =====

    pub fn create_deck(&self, name: &str) -> Result<Deck> {
        self.store.create_deck(name)
    }

    pub fn delete_deck(&self, name: &str) -> Result<()> {
        self.store.delete_deck(name)
    }

    pub fn list_decks(&self) -> Result<Vec<Deck>> {
        self.store.load_all_decks()
    }

    pub fn get_deck(&self, name: &str) -> Result<Deck> {
        self.store.load_deck(name)
    }

    // ===== Cards =====

    /// Create a card, or update the card with `card_id`. A card that lives in
    /// another deck is moved into `deck` with its review state.
    pub fn add_or_update_card(
        &self,
        deck: &str,
        card_id: Option<&str>,
        title: &str,
        content: &str,
    ) -> Result<Flashcard> {
        let card = Flashcard::with_id(card_id.unwrap_or_default(), deck, title, content);
        let saved = self.store.add_or_update_card(deck, card)?;
        log::debug!("Saved card {} in deck {}", saved.id, deck);
        Ok(saved)
    }

    /// Delete a card. Returns false if the deck has no such card.
    pub fn delete_card(&self, deck: &str, card_id: &str) -> Result<bool> {
        self.require_deck(deck)?;
        self.store.delete_card(deck, card_id)
    }

    pub fn get_card(&self, deck: &str, card_id: &str) -> Result<Option<Flashcard>> {
        self.store.find_card(deck, card_id)
    }

    /// Markdown content of a card; `None` when the card does not exist
    pub fn get_card_content(&self, deck: &str, card_id: &str) -> Result<Option<String>> {
        Ok(self.store.find_card(deck, card_id)?.map(|card| card.content))
    }

    // ===== Reviews =====

    /// Apply a review outcome to a card and persist the new state. The read
    /// and the write happen as one store update, so concurrent outcomes for
    /// the same card are all counted.
    pub fn record_review_outcome(
        &self,
        deck: &str,
        card_id: &str,
        outcome: ReviewOutcome,
    ) -> Result<ReviewState> {
        if self.store.find_card(deck, card_id)?.is_none() {
            self.require_deck(deck)?;
            return Err(FlashcardError::CardNotFound {
                deck: deck.to_string(),
                card_id: card_id.to_string(),
            });
        }

        let now = self.now();
        let scheduler = self.scheduler;
        let next = self
            .store
            .update_state(card_id, &|state: &ReviewState| {
                scheduler.apply_outcome(state, outcome, now)
            })?;

        log::info!(
            "Recorded {} for card {} (reviews: {}, ease: {:.1}, next: {:?})",
            outcome,
            card_id,
            next.review_count,
            next.ease_factor,
            next.next_review
        );
        Ok(next)
    }

    /// Next review time for each outcome, without recording anything
    pub fn preview_outcomes(&self, card_id: &str) -> Result<[(ReviewOutcome, DateTime<Utc>); 3]> {
        let state = self.store.get_state(card_id)?;
        Ok(preview_next_reviews(self.scheduler, &state, self.now()))
    }

    /// Decks a session draws from. Requested decks are used as given;
    /// otherwise every deck except the excluded ones. `None` means no deck
    /// is eligible.
    fn session_decks(&self, requested: &[String]) -> Result<Option<Vec<String>>> {
        if !requested.is_empty() || self.excluded_decks.is_empty() {
            return Ok(Some(requested.to_vec()));
        }

        let eligible: Vec<String> = self
            .store
            .load_all_decks()?
            .into_iter()
            .map(|deck| deck.name)
            .filter(|name| !self.excluded_decks.contains(name))
            .collect();

        Ok(if eligible.is_empty() { None } else { Some(eligible) })
    }

    /// Cards to review now from `decks` (empty = every deck not excluded),
    /// most urgent first. With backfill enabled a short session is topped up.
    pub fn cards_due_for_review(&self, decks: &[String], limit: usize) -> Result<Vec<Flashcard>> {
        if limit == 0 {
            return Err(FlashcardError::InvalidConfiguration(
                "review limit must be positive".to_string(),
            ));
        }
        let Some(decks) = self.session_decks(decks)? else {
            return Ok(Vec::new());
        };

        let now = self.now();
        let cards = if self.backfill {
            let pool = self.store.review_pool(&decks)?;
            let selected = select_due(&pool, now, limit, &decks)?;
            backfill(selected, &pool, limit)
                .into_iter()
                .map(|entry| entry.card)
                .collect()
        } else {
            self.store.query_due(&decks, now, limit)?
        };

        log::debug!("{} cards due for review", cards.len());
        Ok(cards)
    }

    /// Due cards across the eligible decks, using the configured session size
    pub fn review_session(&self) -> Result<Vec<Flashcard>> {
        self.cards_due_for_review(&[], self.cards_in_review)
    }

    pub fn card_review_state(&self, card_id: &str) -> Result<ReviewState> {
        self.store.get_state(card_id)
    }

    /// Cards scheduled for a future review, soonest first
    pub fn upcoming_reviews(&self, decks: &[String]) -> Result<Vec<CardWithState>> {
        let now = self.now();
        let mut upcoming: Vec<CardWithState> = self
            .store
            .review_pool(decks)?
            .into_iter()
            .filter(|entry| entry.state.next_review.map_or(false, |next| next > now))
            .collect();
        upcoming.sort_by(|a, b| a.state.next_review.cmp(&b.state.next_review));
        Ok(upcoming)
    }

    /// Create the "Getting Started" deck with its sample cards, unless it
    /// already exists
    pub fn seed_sample_deck(&self) -> Result<Deck> {
        if self.store.deck_exists(SAMPLE_DECK_NAME)? {
            return self.store.load_deck(SAMPLE_DECK_NAME);
        }

        self.store.create_deck(SAMPLE_DECK_NAME)?;
        for (title, content) in SAMPLE_CARDS {
            self.store
                .add_card(SAMPLE_DECK_NAME, Flashcard::new(SAMPLE_DECK_NAME, title, content))?;
        }

        log::info!("Seeded sample deck {:?}", SAMPLE_DECK_NAME);
        self.store.load_deck(SAMPLE_DECK_NAME)
    }
}

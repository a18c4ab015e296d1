//! Data models for the flashcard system

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::FlashcardError;

/// Generate a fresh opaque card id (UUID v4, hyphenated)
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// A deck is a named collection of flashcards, in insertion order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub name: String,
    #[serde(default)]
    pub cards: Vec<Flashcard>,
}

impl Deck {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cards: Vec::new(),
        }
    }

    pub fn find_card(&self, card_id: &str) -> Option<&Flashcard> {
        self.cards.iter().find(|c| c.id == card_id)
    }
}

/// A Markdown-authored flashcard owned by exactly one deck
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: String,
    pub deck_id: String,
    pub title: String,
    pub content: String,
}

impl Flashcard {
    pub fn new(
        deck_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_id(),
            deck_id: deck_id.into(),
            title: title.into(),
            content: content.into(),
        }
    }

    /// Build a card with a caller-supplied id; an empty id is left for the
    /// store to fill in.
    pub fn with_id(
        id: impl Into<String>,
        deck_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            deck_id: deck_id.into(),
            title: title.into(),
            content: content.into(),
        }
    }
}

pub const DEFAULT_EASE_FACTOR: f64 = 1.0;
pub const MIN_EASE_FACTOR: f64 = 0.1;
pub const MAX_EASE_FACTOR: f64 = 2.5;
pub const DEFAULT_REVIEW_INTERVAL: i64 = 1;

/// Spaced repetition state for a single card.
///
/// Stored apart from the card itself and keyed by card id. A card that was
/// never reviewed has the default state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    /// When the last outcome was recorded (None = never reviewed)
    #[serde(default, alias = "lastReviewed")]
    pub last_review: Option<DateTime<Utc>>,
    /// Not due before this instant (None = due immediately)
    #[serde(default)]
    pub next_review: Option<DateTime<Utc>>,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default = "default_ease_factor")]
    pub ease_factor: f64,
    /// Interval in days, used by the interval-doubling strategy
    #[serde(default = "default_review_interval")]
    pub review_interval: i64,
}

fn default_ease_factor() -> f64 {
    DEFAULT_EASE_FACTOR
}

fn default_review_interval() -> i64 {
    DEFAULT_REVIEW_INTERVAL
}

impl Default for ReviewState {
    fn default() -> Self {
        Self {
            last_review: None,
            next_review: None,
            review_count: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            review_interval: DEFAULT_REVIEW_INTERVAL,
        }
    }
}

impl ReviewState {
    /// True when no outcome was ever recorded for the card
    pub fn is_new(&self) -> bool {
        self.review_count == 0 && self.last_review.is_none()
    }

    /// A card is due when its next review is unset or not in the future
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.next_review {
            None => true,
            Some(next) => next <= now,
        }
    }

    /// The same state with timestamps truncated to whole seconds, the
    /// precision every store keeps
    pub fn at_second_precision(&self) -> Self {
        Self {
            last_review: self.last_review.map(|t| t.trunc_subsecs(0)),
            next_review: self.next_review.map(|t| t.trunc_subsecs(0)),
            ..self.clone()
        }
    }
}

/// A card with its current state, used for review sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardWithState {
    pub card: Flashcard,
    pub state: ReviewState,
}

/// Self-reported recall confidence after viewing a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewOutcome {
    Hard,
    Medium,
    Easy,
}

impl ReviewOutcome {
    pub const ALL: [ReviewOutcome; 3] = [Self::Hard, Self::Medium, Self::Easy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hard => "hard",
            Self::Medium => "medium",
            Self::Easy => "easy",
        }
    }
}

impl fmt::Display for ReviewOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric confidence codes: 0 = hard, 1 = medium, 2 = easy
impl TryFrom<i32> for ReviewOutcome {
    type Error = FlashcardError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Hard),
            1 => Ok(Self::Medium),
            2 => Ok(Self::Easy),
            other => Err(FlashcardError::InvalidConfiguration(format!(
                "unknown review outcome code: {}",
                other
            ))),
        }
    }
}

impl FromStr for ReviewOutcome {
    type Err = FlashcardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i32>() {
            return Self::try_from(code);
        }
        match trimmed.to_lowercase().as_str() {
            "hard" => Ok(Self::Hard),
            "medium" => Ok(Self::Medium),
            "easy" => Ok(Self::Easy),
            _ => Err(FlashcardError::InvalidConfiguration(format!(
                "unknown review outcome: {:?}",
                s
            ))),
        }
    }
}

/// Check a deck name before it is used as a key or directory name
pub fn validate_deck_name(name: &str) -> Result<(), FlashcardError> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(FlashcardError::InvalidConfiguration(format!(
            "invalid deck name: {:?}",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_review_state_is_new_and_due() {
        let state = ReviewState::default();
        assert!(state.is_new());
        assert!(state.is_due(Utc::now()));
        assert_eq!(state.ease_factor, 1.0);
        assert_eq!(state.review_interval, 1);
    }

    #[test]
    fn test_second_precision_keeps_epoch_and_drops_fraction() {
        use chrono::TimeZone;

        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        let state = ReviewState {
            last_review: Some(epoch),
            next_review: Some(Utc.timestamp_opt(1_700_000_000, 500_000_000).unwrap()),
            review_count: 1,
            ..ReviewState::default()
        };

        let truncated = state.at_second_precision();
        assert_eq!(truncated.last_review, Some(epoch));
        assert_eq!(truncated.next_review, Utc.timestamp_opt(1_700_000_000, 0).single());
        assert_eq!(truncated.review_count, 1);
    }

    #[test]
    fn test_parse_outcome() {
        assert_eq!("Easy".parse::<ReviewOutcome>().unwrap(), ReviewOutcome::Easy);
        assert_eq!(" medium ".parse::<ReviewOutcome>().unwrap(), ReviewOutcome::Medium);
        assert_eq!("0".parse::<ReviewOutcome>().unwrap(), ReviewOutcome::Hard);
        assert_eq!("2".parse::<ReviewOutcome>().unwrap(), ReviewOutcome::Easy);

        let err = "sometimes".parse::<ReviewOutcome>().unwrap_err();
        assert!(matches!(err, FlashcardError::InvalidConfiguration(_)));
        assert!(ReviewOutcome::try_from(3).is_err());
    }

    #[test]
    fn test_review_state_accepts_legacy_field_names() {
        let json = r#"{"reviewInterval": 4, "lastReviewed": "2024-01-02T03:04:05Z"}"#;
        let state: ReviewState = serde_json::from_str(json).unwrap();
        assert_eq!(state.review_interval, 4);
        assert!(state.last_review.is_some());
        assert_eq!(state.ease_factor, 1.0);
        assert_eq!(state.review_count, 0);
    }

    #[test]
    fn test_validate_deck_name() {
        assert!(validate_deck_name("Japanese N5").is_ok());
        assert!(validate_deck_name("").is_err());
        assert!(validate_deck_name("   ").is_err());
        assert!(validate_deck_name("..").is_err());
        assert!(validate_deck_name("a/b").is_err());
    }
}

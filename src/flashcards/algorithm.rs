//! Spaced repetition scheduling
//!
//! Two interchangeable strategies compute the next review state from a
//! review outcome:
//!
//! - **Ease factor**: an easy recall grows the ease factor (capped at 2.5)
//!   and pushes the next review out by `1 day × ease × review count`; a
//!   medium recall waits one day; a hard recall lowers the ease factor
//!   (floored at 0.1) and re-queues the card after 30 minutes.
//! - **Interval doubling**: hard halves the day interval, medium keeps it,
//!   easy doubles it.
//!
//! Selection of due cards is shared by both strategies and by both storage
//! backends.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::{FlashcardError, Result};
use super::models::{
    CardWithState, Flashcard, ReviewOutcome, ReviewState, MAX_EASE_FACTOR, MIN_EASE_FACTOR,
};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Ease factor change for an easy recall
const EASY_EASE_STEP: f64 = 0.1;

/// Ease factor change for a hard recall
const HARD_EASE_STEP: f64 = 0.2;

/// Re-queue delay after a hard recall
const HARD_REQUEUE_MINUTES: i64 = 30;

/// Upper bound on any scheduled interval, about a century
const MAX_INTERVAL_DAYS: i64 = 36_500;

/// Never-reviewed cards that backfill may add beyond the requested limit
pub const BACKFILL_EXTRA_NEW_CARDS: usize = 3;

/// Scheduling strategy, chosen in configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Scheduler {
    #[default]
    EaseFactor,
    IntervalDoubling,
}

impl Scheduler {
    /// Compute the state that follows `outcome` at time `now`
    pub fn apply_outcome(
        &self,
        state: &ReviewState,
        outcome: ReviewOutcome,
        now: DateTime<Utc>,
    ) -> ReviewState {
        match self {
            Self::EaseFactor => apply_ease_factor(state, outcome, now),
            Self::IntervalDoubling => apply_interval_doubling(state, outcome, now),
        }
    }
}

/// Ease-factor transition.
///
/// The review count is incremented before the easy interval is computed, so
/// a first easy review already schedules `1 day × ease`.
pub fn apply_ease_factor(
    state: &ReviewState,
    outcome: ReviewOutcome,
    now: DateTime<Utc>,
) -> ReviewState {
    let mut next = state.clone();
    next.review_count = state.review_count.saturating_add(1);
    next.last_review = Some(now);

    let delay = match outcome {
        ReviewOutcome::Easy => {
            next.ease_factor = (state.ease_factor + EASY_EASE_STEP).min(MAX_EASE_FACTOR);
            let seconds = SECONDS_PER_DAY * next.ease_factor * f64::from(next.review_count);
            capped_seconds(seconds)
        }
        ReviewOutcome::Medium => Duration::days(1),
        ReviewOutcome::Hard => {
            next.ease_factor = (state.ease_factor - HARD_EASE_STEP).max(MIN_EASE_FACTOR);
            Duration::minutes(HARD_REQUEUE_MINUTES)
        }
    };

    next.next_review = Some(now + delay);
    next
}

/// Interval-doubling transition
pub fn apply_interval_doubling(
    state: &ReviewState,
    outcome: ReviewOutcome,
    now: DateTime<Utc>,
) -> ReviewState {
    let mut next = state.clone();
    next.review_count = state.review_count.saturating_add(1);
    next.last_review = Some(now);

    let current = state.review_interval.max(1);
    next.review_interval = match outcome {
        ReviewOutcome::Hard => (current / 2).max(1),
        ReviewOutcome::Medium => current,
        ReviewOutcome::Easy => current.saturating_mul(2).min(MAX_INTERVAL_DAYS),
    };

    next.next_review = Some(now + Duration::days(next.review_interval));
    next
}

fn capped_seconds(seconds: f64) -> Duration {
    let max = MAX_INTERVAL_DAYS as f64 * SECONDS_PER_DAY;
    Duration::seconds(seconds.clamp(0.0, max).round() as i64)
}

/// Next review time each outcome would produce, in Hard, Medium, Easy order.
/// Used to show the user what each answer would do.
pub fn preview_next_reviews(
    scheduler: Scheduler,
    state: &ReviewState,
    now: DateTime<Utc>,
) -> [(ReviewOutcome, DateTime<Utc>); 3] {
    ReviewOutcome::ALL.map(|outcome| {
        let next = scheduler.apply_outcome(state, outcome, now);
        (outcome, next.next_review.unwrap_or(now))
    })
}

/// Due priority band: never scheduled, then overdue, then due right now
fn priority_band(state: &ReviewState, now: DateTime<Utc>) -> u8 {
    match state.next_review {
        None => 0,
        Some(next) if next < now => 1,
        Some(_) => 2,
    }
}

/// Ordering of due cards: band first, then soonest next review, then fewest
/// reviews. Equal entries keep their pool order.
pub fn compare_due_priority(
    a: &CardWithState,
    b: &CardWithState,
    now: DateTime<Utc>,
) -> Ordering {
    priority_band(&a.state, now)
        .cmp(&priority_band(&b.state, now))
        .then_with(|| a.state.next_review.cmp(&b.state.next_review))
        .then_with(|| a.state.review_count.cmp(&b.state.review_count))
}

fn in_decks(card: &Flashcard, decks: &[String]) -> bool {
    decks.is_empty() || decks.iter().any(|d| *d == card.deck_id)
}

/// Pick at most `limit` due cards from `pool`, restricted to `decks`
/// (empty means every deck).
pub fn select_due(
    pool: &[CardWithState],
    now: DateTime<Utc>,
    limit: usize,
    decks: &[String],
) -> Result<Vec<CardWithState>> {
    if limit == 0 {
        return Err(FlashcardError::InvalidConfiguration(
            "review limit must be positive".to_string(),
        ));
    }

    let mut due: Vec<&CardWithState> = pool
        .iter()
        .filter(|c| in_decks(&c.card, decks))
        .filter(|c| c.state.is_due(now))
        .collect();

    due.sort_by(|a, b| compare_due_priority(a, b, now));

    Ok(due.into_iter().take(limit).cloned().collect())
}

/// Top up a short review session.
///
/// While fewer than `limit` cards are selected, the most recently reviewed
/// cards of `pool` are appended. Then up to [`BACKFILL_EXTRA_NEW_CARDS`]
/// never-reviewed cards are appended beyond `limit`. `pool` must already be
/// restricted to the session's decks.
pub fn backfill(
    selected: Vec<CardWithState>,
    pool: &[CardWithState],
    limit: usize,
) -> Vec<CardWithState> {
    let mut session = selected;

    if session.len() < limit {
        let mut reviewed: Vec<&CardWithState> = pool
            .iter()
            .filter(|c| c.state.last_review.is_some())
            .collect();
        reviewed.sort_by(|a, b| b.state.last_review.cmp(&a.state.last_review));

        for candidate in reviewed {
            if session.len() >= limit {
                break;
            }
            if !contains_card(&session, &candidate.card.id) {
                session.push(candidate.clone());
            }
        }
    }

    let cap = limit + BACKFILL_EXTRA_NEW_CARDS;
    for candidate in pool.iter().filter(|c| c.state.is_new()) {
        if session.len() >= cap {
            break;
        }
        if !contains_card(&session, &candidate.card.id) {
            session.push(candidate.clone());
        }
    }

    session
}

fn contains_card(cards: &[CardWithState], card_id: &str) -> bool {
    cards.iter().any(|c| c.card.id == card_id)
}

/// Format a delay as a short human-readable string
pub fn format_interval(delay: Duration) -> String {
    let minutes = delay.num_minutes();
    if minutes <= 0 {
        return "now".to_string();
    }
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = delay.num_hours();
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = delay.num_days();
    if days < 7 {
        format!("{}d", days)
    } else if days < 30 {
        format!("{}w", days / 7)
    } else if days < 365 {
        format!("{}mo", days / 30)
    } else {
        format!("{}y", days / 365)
    }
}

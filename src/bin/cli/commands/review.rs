use anyhow::{Context, Result};

use mdsrs_lib::flashcards::ReviewOutcome;

use crate::app::App;
use crate::render::terminal::{self, Color};
use crate::OutputFormat;

pub fn run_due(
    app: &App,
    decks: &[String],
    limit: Option<usize>,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let decks = app.resolve_decks(decks)?;
    let limit = limit.unwrap_or(app.config.number_of_cards_in_review);
    let cards = app.service.cards_due_for_review(&decks, limit)
        .context("Failed to get cards due for review")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&cards)?);
        }
        OutputFormat::Plain => {
            if cards.is_empty() {
                println!("No cards due for review");
            }
            for (i, card) in cards.iter().enumerate() {
                println!(
                    "{:>3}. {}  {}  {}",
                    i + 1,
                    card.title,
                    terminal::paint(&card.deck_id, Color::CYAN, use_color),
                    terminal::paint(&card.id, Color::GRAY, use_color),
                );
            }
        }
    }

    Ok(())
}

pub fn run_rate(
    app: &App,
    deck_name: &str,
    key: &str,
    outcome: &str,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let outcome: ReviewOutcome = outcome.parse()?;
    let deck = app.find_deck(deck_name)?;
    let card = app.find_card(&deck, key)?;

    let state = app.service.record_review_outcome(&deck.name, &card.id, outcome)
        .with_context(|| format!("Failed to record review of '{}'", card.title))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        OutputFormat::Plain => {
            let now = app.service.now();
            let next = state.next_review
                .map(|t| terminal::relative_time(t, now))
                .unwrap_or_else(|| "now".to_string());
            println!("Rated \"{}\" {}", card.title, outcome_label(outcome, use_color));
            println!("  Next review: {}", next);
            println!("  Reviews: {}  Ease: {:.1}", state.review_count, state.ease_factor);
        }
    }

    Ok(())
}

pub fn run_state(
    app: &App,
    deck_name: &str,
    key: &str,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let deck = app.find_deck(deck_name)?;
    let card = app.find_card(&deck, key)?;
    let state = app.service.card_review_state(&card.id)?;
    let preview = app.service.preview_outcomes(&card.id)?;
    let now = app.service.now();

    match format {
        OutputFormat::Json => {
            let preview: serde_json::Map<String, serde_json::Value> = preview.iter()
                .map(|(outcome, at)| (outcome.to_string(), serde_json::json!(at.to_rfc3339())))
                .collect();
            let output = serde_json::json!({
                "id": card.id,
                "state": state,
                "scheduler": app.service.scheduler(),
                "preview": preview,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("{}", terminal::paint(&card.title, Color::BOLD, use_color));
            match state.last_review {
                Some(last) => println!("  Last review: {}", terminal::relative_time(last, now)),
                None => println!("  Last review: never"),
            }
            match state.next_review {
                Some(next) => println!("  Next review: {}", terminal::relative_time(next, now)),
                None => println!("  Next review: now"),
            }
            println!("  Reviews: {}", state.review_count);
            println!("  Ease: {:.1}  Interval: {}d", state.ease_factor, state.review_interval);
            println!();
            for (outcome, at) in preview {
                let when = terminal::relative_time(at, now);
                println!("  {:<8} {}", outcome_label(outcome, use_color), when);
            }
        }
    }

    Ok(())
}

pub fn run_upcoming(
    app: &App,
    decks: &[String],
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let decks = app.resolve_decks(decks)?;
    let upcoming = app.service.upcoming_reviews(&decks)
        .context("Failed to list upcoming reviews")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&upcoming)?);
        }
        OutputFormat::Plain => {
            if upcoming.is_empty() {
                println!("No upcoming reviews");
            }
            let now = app.service.now();
            for entry in &upcoming {
                let when = entry.state.next_review
                    .map(|t| terminal::relative_time(t, now))
                    .unwrap_or_default();
                println!(
                    "{:<10} {}  {}",
                    when,
                    entry.card.title,
                    terminal::paint(&entry.card.deck_id, Color::CYAN, use_color),
                );
            }
        }
    }

    Ok(())
}

fn outcome_label(outcome: ReviewOutcome, use_color: bool) -> String {
    let color = match outcome {
        ReviewOutcome::Hard => Color::RED,
        ReviewOutcome::Medium => Color::YELLOW,
        ReviewOutcome::Easy => Color::GREEN,
    };
    terminal::paint(outcome.as_str(), color, use_color)
}

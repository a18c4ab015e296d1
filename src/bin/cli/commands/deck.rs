use anyhow::{Context, Result};

use crate::app::App;
use crate::render::terminal::{self, Color};
use crate::OutputFormat;

pub fn run_new(app: &App, name: &str, format: &OutputFormat) -> Result<()> {
    let deck = app.service.create_deck(name)
        .with_context(|| format!("Failed to create deck '{}'", name))?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({ "name": deck.name, "cardCount": 0 });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => println!("Created deck \"{}\"", deck.name),
    }

    Ok(())
}

pub fn run_rm(app: &App, name: &str, format: &OutputFormat) -> Result<()> {
    let deck = app.find_deck(name)?;
    app.service.delete_deck(&deck.name)
        .with_context(|| format!("Failed to delete deck '{}'", deck.name))?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({ "deleted": deck.name, "cardCount": deck.cards.len() });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Deleted deck \"{}\" ({} cards)", deck.name, deck.cards.len());
        }
    }

    Ok(())
}

pub fn run_ls(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let decks = app.service.list_decks().context("Failed to list decks")?;

    match format {
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = decks.iter().map(|deck| {
                serde_json::json!({
                    "name": deck.name,
                    "cardCount": deck.cards.len(),
                    "excludedFromReview":
                        app.config.decks_excluded_from_review.contains(&deck.name),
                })
            }).collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if decks.is_empty() {
                println!("(no decks)");
            }
            for deck in &decks {
                let excluded = if app.config.decks_excluded_from_review.contains(&deck.name) {
                    terminal::paint(" [excluded]", Color::GRAY, use_color)
                } else {
                    String::new()
                };
                println!("{} ({} cards){}", deck.name, deck.cards.len(), excluded);
            }
        }
    }

    Ok(())
}

pub fn run_show(app: &App, name: &str, format: &OutputFormat, use_color: bool) -> Result<()> {
    let deck = app.find_deck(name)?;

    match format {
        OutputFormat::Json => {
            let mut cards = Vec::new();
            for card in &deck.cards {
                let state = app.service.card_review_state(&card.id)?;
                cards.push(serde_json::json!({
                    "id": card.id,
                    "title": card.title,
                    "reviewCount": state.review_count,
                    "nextReview": state.next_review.map(|t| t.to_rfc3339()),
                }));
            }
            let output = serde_json::json!({ "name": deck.name, "cards": cards });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("{}", terminal::paint(&deck.name, Color::BOLD, use_color));
            if deck.cards.is_empty() {
                println!("  (no cards)");
            }
            let now = app.service.now();
            for card in &deck.cards {
                let state = app.service.card_review_state(&card.id)?;
                let due = match state.next_review {
                    None => terminal::paint("new", Color::GREEN, use_color),
                    Some(next) if next <= now => terminal::paint("due", Color::YELLOW, use_color),
                    Some(next) => terminal::relative_time(next, now),
                };
                let id = terminal::paint(&card.id, Color::GRAY, use_color);
                println!("  {}  {}  {}", card.title, id, due);
            }
        }
    }

    Ok(())
}

pub fn run_seed(app: &App, format: &OutputFormat) -> Result<()> {
    let deck = app.service.seed_sample_deck().context("Failed to create sample deck")?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({ "name": deck.name, "cardCount": deck.cards.len() });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Sample deck \"{}\" has {} cards", deck.name, deck.cards.len());
        }
    }

    Ok(())
}

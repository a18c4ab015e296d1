use anyhow::{Context, Result};

use crate::app::App;
use crate::render::terminal::{self, Color};
use crate::OutputFormat;

pub fn run_add(
    app: &App,
    deck_name: &str,
    title: &str,
    card_id: Option<&str>,
    content: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let deck = app.find_deck(deck_name)?;

    // Updating without new content keeps the existing content
    let content = match (content, card_id) {
        (Some(text), _) => text,
        (None, Some(id)) => app.service.get_card(&deck.name, id)?
            .map(|card| card.content)
            .unwrap_or_default(),
        (None, None) => String::new(),
    };

    let card = app.service.add_or_update_card(&deck.name, card_id, title, &content)
        .with_context(|| format!("Failed to save card '{}'", title))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&card)?);
        }
        OutputFormat::Plain => {
            let verb = if card_id.is_some() { "Saved" } else { "Created" };
            println!("{} card \"{}\" in deck \"{}\"", verb, card.title, card.deck_id);
            println!("  ID: {}", card.id);
        }
    }

    Ok(())
}

pub fn run_rm(app: &App, deck_name: &str, key: &str, format: &OutputFormat) -> Result<()> {
    let deck = app.find_deck(deck_name)?;
    let card = app.find_card(&deck, key)?;
    let removed = app.service.delete_card(&deck.name, &card.id)
        .context("Failed to delete card")?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({ "id": card.id, "deleted": removed });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Deleted card \"{}\" from deck \"{}\"", card.title, deck.name)
        }
    }

    Ok(())
}

pub fn run_show(
    app: &App,
    deck_name: &str,
    key: &str,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let deck = app.find_deck(deck_name)?;
    let card = app.find_card(&deck, key)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&card)?);
        }
        OutputFormat::Plain => {
            println!("{}", terminal::paint(&card.title, Color::BOLD, use_color));
            println!("{}", terminal::paint(&card.id, Color::GRAY, use_color));
            println!();
            println!("{}", terminal::render_card(&card.content, use_color));
        }
    }

    Ok(())
}

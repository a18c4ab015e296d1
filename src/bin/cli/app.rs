use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use mdsrs_lib::flashcards::{Deck, Flashcard};
use mdsrs_lib::{Config, FlashcardService};

/// Resolve the config file location and load it, writing defaults on first run
pub fn load_config(path: Option<&Path>) -> Result<(PathBuf, Config)> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => Config::default_path().context("Failed to get config directory")?,
    };
    let config = Config::load_or_create(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    Ok((path, config))
}

/// Shared application state for CLI commands
pub struct App {
    pub config: Config,
    pub service: FlashcardService,
}

impl App {
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let (_, config) = load_config(config_path)?;
        let service = FlashcardService::open(&config)
            .context("Failed to open flashcard store")?;
        Ok(Self { config, service })
    }

    /// Find a deck by name (case-insensitive prefix match)
    pub fn find_deck(&self, name: &str) -> Result<Deck> {
        let decks = self.service.list_decks().context("Failed to list decks")?;
        let name_lower = name.to_lowercase();

        // Exact match first
        if let Some(deck) = decks.iter().find(|d| d.name == name) {
            return Ok(deck.clone());
        }
        if let Some(deck) = decks.iter().find(|d| d.name.to_lowercase() == name_lower) {
            return Ok(deck.clone());
        }

        let matches: Vec<&Deck> = decks.iter()
            .filter(|d| d.name.to_lowercase().starts_with(&name_lower))
            .collect();

        match matches.len() {
            0 => bail!("No deck matching '{}'. Available decks:\n{}", name,
                decks.iter().map(|d| format!("  - {}", d.name)).collect::<Vec<_>>().join("\n")),
            1 => Ok(matches[0].clone()),
            _ => bail!("Ambiguous deck name '{}'. Matches:\n{}", name,
                matches.iter().map(|d| format!("  - {}", d.name)).collect::<Vec<_>>().join("\n")),
        }
    }

    /// Find a card in a deck by id, or by title (case-insensitive prefix match)
    pub fn find_card(&self, deck: &Deck, key: &str) -> Result<Flashcard> {
        if let Some(card) = deck.find_card(key) {
            return Ok(card.clone());
        }

        let key_lower = key.to_lowercase();
        if let Some(card) = deck.cards.iter().find(|c| c.title.to_lowercase() == key_lower) {
            return Ok(card.clone());
        }

        let matches: Vec<&Flashcard> = deck.cards.iter()
            .filter(|c| {
                c.title.to_lowercase().starts_with(&key_lower) || c.id.starts_with(key)
            })
            .collect();

        match matches.len() {
            0 => bail!("No card matching '{}' in deck '{}'", key, deck.name),
            1 => Ok(matches[0].clone()),
            _ => {
                let listing: Vec<String> = matches
                    .iter()
                    .map(|c| format!("  - {} ({})", c.title, c.id))
                    .collect();
                bail!("Ambiguous card '{}'. Matches:\n{}", key, listing.join("\n"))
            }
        }
    }

    /// Resolve deck names given on the command line
    pub fn resolve_decks(&self, names: &[String]) -> Result<Vec<String>> {
        names.iter().map(|n| self.find_deck(n).map(|d| d.name)).collect()
    }
}

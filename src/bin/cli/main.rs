mod app;
mod commands;
mod render;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mdsrs-cli", about = "Markdown flashcards with spaced repetition", version)]
struct Cli {
    /// Config file (default: <config dir>/mdsrs/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Create, delete and inspect decks
    #[command(subcommand)]
    Deck(DeckCommand),

    /// Add, delete and show cards
    #[command(subcommand)]
    Card(CardCommand),

    /// Review sessions and scheduling
    #[command(subcommand)]
    Review(ReviewCommand),

    /// Show or change the configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
enum DeckCommand {
    /// Create an empty deck
    New {
        name: String,
    },

    /// Delete a deck with all of its cards
    Rm {
        /// Deck name (case-insensitive prefix match)
        name: String,
    },

    /// List decks with card counts
    Ls,

    /// List the cards of a deck
    Show {
        /// Deck name (case-insensitive prefix match)
        name: String,
    },

    /// Create the "Getting Started" sample deck
    Seed,
}

#[derive(Subcommand)]
enum CardCommand {
    /// Add a card, or update the card with --id
    Add {
        /// Deck name (case-insensitive prefix match)
        deck: String,
        /// Card title
        title: String,
        /// Id of an existing card to update (or move into this deck)
        #[arg(long)]
        id: Option<String>,
        /// Markdown content (use "-" to read from stdin)
        #[arg(long)]
        content: Option<String>,
    },

    /// Delete a card
    Rm {
        deck: String,
        /// Card id or title (case-insensitive prefix match)
        card: String,
    },

    /// Print a card's Markdown content
    Show {
        deck: String,
        /// Card id or title (case-insensitive prefix match)
        card: String,
    },
}

#[derive(Subcommand)]
enum ReviewCommand {
    /// List cards due for review
    Due {
        /// Restrict to a deck (repeatable, default: all but excluded decks)
        #[arg(long = "deck")]
        decks: Vec<String>,
        /// Maximum cards (default: numberOfCardsInReview)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Record how well a card was recalled
    Rate {
        deck: String,
        /// Card id or title (case-insensitive prefix match)
        card: String,
        /// hard, medium, easy (or 0, 1, 2)
        outcome: String,
    },

    /// Show a card's review state and what each outcome would schedule
    State {
        deck: String,
        /// Card id or title (case-insensitive prefix match)
        card: String,
    },

    /// List cards scheduled for later, soonest first
    Upcoming {
        /// Restrict to a deck (repeatable)
        #[arg(long = "deck")]
        decks: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the configuration
    Show,

    /// Print the config file location
    Path,

    /// Update fields from a JSON object, e.g. '{"numberOfCardsInReview": 10}'
    Set {
        /// camelCase fields to change
        json: String,
    },
}

/// Read content from stdin if piped, or resolve "-" as stdin
fn resolve_content(content: Option<String>) -> Option<String> {
    match content.as_deref() {
        Some("-") => {
            let mut buf = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf).ok();
            Some(buf)
        }
        Some(_) => content,
        None => {
            // Auto-detect piped stdin
            if !std::io::stdin().is_terminal() {
                let mut buf = String::new();
                std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf).ok();
                if buf.is_empty() { None } else { Some(buf) }
            } else {
                None
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && std::io::stdout().is_terminal();
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Config(subcmd) => {
            let (path, config) = app::load_config(config_path)?;
            match subcmd {
                ConfigCommand::Show => commands::config::run_show(&config, &cli.format)?,
                ConfigCommand::Path => commands::config::run_path(&path)?,
                ConfigCommand::Set { json } => {
                    commands::config::run_set(&path, &json, &cli.format)?
                }
            }
        }
        Command::Deck(subcmd) => {
            let app = app::App::new(config_path)?;
            match subcmd {
                DeckCommand::New { name } => commands::deck::run_new(&app, &name, &cli.format)?,
                DeckCommand::Rm { name } => commands::deck::run_rm(&app, &name, &cli.format)?,
                DeckCommand::Ls => commands::deck::run_ls(&app, &cli.format, use_color)?,
                DeckCommand::Show { name } => {
                    commands::deck::run_show(&app, &name, &cli.format, use_color)?
                }
                DeckCommand::Seed => commands::deck::run_seed(&app, &cli.format)?,
            }
        }
        Command::Card(subcmd) => {
            let app = app::App::new(config_path)?;
            match subcmd {
                CardCommand::Add { deck, title, id, content } => {
                    let content = resolve_content(content);
                    commands::card::run_add(
                        &app,
                        &deck,
                        &title,
                        id.as_deref(),
                        content,
                        &cli.format,
                    )?;
                }
                CardCommand::Rm { deck, card } => {
                    commands::card::run_rm(&app, &deck, &card, &cli.format)?
                }
                CardCommand::Show { deck, card } => {
                    commands::card::run_show(&app, &deck, &card, &cli.format, use_color)?
                }
            }
        }
        Command::Review(subcmd) => {
            let app = app::App::new(config_path)?;
            match subcmd {
                ReviewCommand::Due { decks, limit } => {
                    commands::review::run_due(&app, &decks, limit, &cli.format, use_color)?
                }
                ReviewCommand::Rate { deck, card, outcome } => {
                    let format = &cli.format;
                    commands::review::run_rate(&app, &deck, &card, &outcome, format, use_color)?
                }
                ReviewCommand::State { deck, card } => {
                    commands::review::run_state(&app, &deck, &card, &cli.format, use_color)?
                }
                ReviewCommand::Upcoming { decks } => {
                    commands::review::run_upcoming(&app, &decks, &cli.format, use_color)?
                }
            }
        }
    }

    Ok(())
}

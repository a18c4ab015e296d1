use std::path::Path;

use anyhow::{Context, Result};

use mdsrs_lib::Config;

use crate::OutputFormat;

pub fn run_show(config: &Config, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        OutputFormat::Plain => {
            let backend = serde_json::to_value(config.backend)?;
            let scheduler = serde_json::to_value(config.scheduler)?;
            println!("Backend:            {}", backend.as_str().unwrap_or_default());
            println!("Data directory:     {}", config.data_dir.display());
            println!("Database:           {}", config.db_path().display());
            println!("Cards per review:   {}", config.number_of_cards_in_review);
            println!("Scheduler:          {}", scheduler.as_str().unwrap_or_default());
            println!("Backfill:           {}", config.backfill);
            println!("Seed sample deck:   {}", config.seed_sample_deck);
            println!("Busy timeout:       {}ms", config.busy_timeout_ms);
            if config.decks_excluded_from_review.is_empty() {
                println!("Excluded decks:     (none)");
            } else {
                println!("Excluded decks:     {}", config.decks_excluded_from_review.join(", "));
            }
        }
    }

    Ok(())
}

pub fn run_path(path: &Path) -> Result<()> {
    println!("{}", path.display());
    Ok(())
}

pub fn run_set(path: &Path, json: &str, format: &OutputFormat) -> Result<()> {
    let config = Config::update_file(path, json)
        .with_context(|| format!("Config at {} was not changed", path.display()))?;

    match format {
        OutputFormat::Json => run_show(&config, format)?,
        OutputFormat::Plain => println!("Updated {}", path.display()),
    }
    Ok(())
}

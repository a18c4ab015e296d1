//! Application configuration, stored as camelCase JSON

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::flashcards::algorithm::Scheduler;
use crate::flashcards::error::{FlashcardError, Result};
use crate::flashcards::store::BackendKind;

const APP_DIR: &str = "mdsrs";
const CONFIG_FILE: &str = "config.json";

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn default_db_file() -> String {
    "mdsrs.db".to_string()
}

fn default_cards_in_review() -> usize {
    20
}

fn default_true() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_db_file")]
    pub db_file: String,
    #[serde(default = "default_cards_in_review")]
    pub number_of_cards_in_review: usize,
    /// Decks left out of sessions that do not name their decks
    #[serde(default)]
    pub decks_excluded_from_review: Vec<String>,
    #[serde(default)]
    pub scheduler: Scheduler,
    /// Top up short sessions with recently reviewed and new cards
    #[serde(default)]
    pub backfill: bool,
    /// Create the "Getting Started" deck in a fresh store
    #[serde(default = "default_true")]
    pub seed_sample_deck: bool,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            data_dir: default_data_dir(),
            db_file: default_db_file(),
            number_of_cards_in_review: default_cards_in_review(),
            decks_excluded_from_review: Vec::new(),
            scheduler: Scheduler::default(),
            backfill: false,
            seed_sample_deck: true,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Config {
    /// Default config file location: `<config_dir>/mdsrs/config.json`
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            FlashcardError::InvalidConfiguration("could not find config directory".to_string())
        })?;
        Ok(config_dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load the config at `path`, writing the defaults there first if the
    /// file does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            log::info!("Wrote default configuration to {:?}", path);
            return Ok(config);
        }

        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Overlay the camelCase fields of `json` on this config and validate the
    /// result. Unknown field names are rejected.
    pub fn update_from_json(&self, json: &str) -> Result<Self> {
        let serde_json::Value::Object(fields) = serde_json::from_str(json)? else {
            return Err(FlashcardError::InvalidConfiguration(
                "config update must be a JSON object".to_string(),
            ));
        };

        let mut merged = serde_json::to_value(self)?;
        if let serde_json::Value::Object(current) = &mut merged {
            for (key, value) in fields {
                if !current.contains_key(&key) {
                    return Err(FlashcardError::InvalidConfiguration(format!(
                        "unknown config field: {}",
                        key
                    )));
                }
                current.insert(key, value);
            }
        }

        let updated: Self = serde_json::from_value(merged)?;
        updated.validate()?;
        Ok(updated)
    }

    /// Apply a JSON update to the config file at `path`. The file is only
    /// rewritten when the updated config is valid.
    pub fn update_file(path: &Path, json: &str) -> Result<Self> {
        let updated = Self::load_or_create(path)?.update_from_json(json)?;
        updated.save(path)?;
        log::info!("Updated configuration at {:?}", path);
        Ok(updated)
    }

    pub fn validate(&self) -> Result<()> {
        if self.number_of_cards_in_review == 0 {
            return Err(FlashcardError::InvalidConfiguration(
                "numberOfCardsInReview must be positive".to_string(),
            ));
        }
        if self.busy_timeout_ms == 0 {
            return Err(FlashcardError::InvalidConfiguration(
                "busyTimeoutMs must be positive".to_string(),
            ));
        }
        if self.db_file.trim().is_empty() {
            return Err(FlashcardError::InvalidConfiguration(
                "dbFile must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

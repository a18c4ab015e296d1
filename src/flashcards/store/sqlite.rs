//! SQLite flashcard store.
//!
//! Schema:
//! - `decks(name PK)`
//! - `cards(id PK, deck_id FK, title, content)`, insertion order is the rowid
//! - `srs_data(card_id PK FK, last_review, next_review, review_count,
//!   ease_factor, review_interval)`, timestamps in Unix seconds
//!
//! One connection behind a mutex serializes every operation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior,
};

use super::{CardStore, DeckStore, ReviewStateStore};
use crate::flashcards::error::{FlashcardError, Result};
use crate::flashcards::models::{
    generate_id, validate_deck_name, CardWithState, Deck, Flashcard, ReviewState,
    DEFAULT_EASE_FACTOR, DEFAULT_REVIEW_INTERVAL,
};

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS decks (
        name TEXT PRIMARY KEY
    );

    CREATE TABLE IF NOT EXISTS cards (
        id TEXT PRIMARY KEY,
        deck_id TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        FOREIGN KEY (deck_id) REFERENCES decks(name) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS srs_data (
        card_id TEXT PRIMARY KEY,
        last_review INTEGER,
        next_review INTEGER,
        review_count INTEGER NOT NULL DEFAULT 0,
        ease_factor REAL NOT NULL DEFAULT 1.0,
        review_interval INTEGER NOT NULL DEFAULT 1,
        FOREIGN KEY (card_id) REFERENCES cards(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_cards_deck_id ON cards(deck_id);
    CREATE INDEX IF NOT EXISTS idx_srs_data_next_review ON srs_data(next_review);
"#;

const CARD_COLUMNS: &str = "c.id, c.deck_id, c.title, c.content";

const STATE_COLUMNS: &str =
    "s.card_id, s.last_review, s.next_review, s.review_count, s.ease_factor, s.review_interval";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        log::debug!("SQLite journal mode: {}", mode);

        Self::with_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        Ok(self.conn.lock()?)
    }
}

/// Bring databases written before `review_interval` existed up to date
fn migrate(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('srs_data')")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    if !columns.iter().any(|c| c == "review_interval") {
        log::info!("Adding review_interval column to srs_data");
        conn.execute(
            "ALTER TABLE srs_data ADD COLUMN review_interval INTEGER NOT NULL DEFAULT 1",
            [],
        )?;
    }
    Ok(())
}

fn to_unix(ts: Option<DateTime<Utc>>) -> Option<i64> {
    ts.map(|t| t.timestamp())
}

fn from_unix(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| Utc.timestamp_opt(s, 0).single())
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<Flashcard> {
    Ok(Flashcard {
        id: row.get(0)?,
        deck_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
    })
}

/// Read the state columns starting at `offset`; a NULL `card_id` (no row in
/// the left join) gives the default state.
fn state_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<ReviewState> {
    let card_id: Option<String> = row.get(offset)?;
    if card_id.is_none() {
        return Ok(ReviewState::default());
    }

    let review_count = row.get::<_, Option<u32>>(offset + 3)?.unwrap_or(0);
    // Older databases wrote 0 rather than NULL for a card never reviewed
    let last_review = row
        .get::<_, Option<i64>>(offset + 1)?
        .filter(|s| *s != 0 || review_count > 0);

    Ok(ReviewState {
        last_review: from_unix(last_review),
        next_review: from_unix(row.get(offset + 2)?),
        review_count,
        ease_factor: row
            .get::<_, Option<f64>>(offset + 4)?
            .unwrap_or(DEFAULT_EASE_FACTOR),
        review_interval: row
            .get::<_, Option<i64>>(offset + 5)?
            .unwrap_or(DEFAULT_REVIEW_INTERVAL),
    })
}

fn deck_exists(conn: &Connection, name: &str) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM decks WHERE name = ?1", params![name], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn require_deck(conn: &Connection, name: &str) -> Result<()> {
    if deck_exists(conn, name)? {
        Ok(())
    } else {
        Err(FlashcardError::DeckNotFound(name.to_string()))
    }
}

fn require_card(conn: &Connection, card_id: &str) -> Result<()> {
    let found = conn
        .query_row("SELECT 1 FROM cards WHERE id = ?1", params![card_id], |_| Ok(()))
        .optional()?;
    if found.is_none() {
        return Err(FlashcardError::CardNotFound {
            deck: String::new(),
            card_id: card_id.to_string(),
        });
    }
    Ok(())
}

fn read_state(conn: &Connection, card_id: &str) -> Result<ReviewState> {
    let state = conn
        .query_row(
            &format!("SELECT {} FROM srs_data s WHERE s.card_id = ?1", STATE_COLUMNS),
            params![card_id],
            |row| state_from_row(row, 0),
        )
        .optional()?;
    Ok(state.unwrap_or_default())
}

fn write_state(conn: &Connection, card_id: &str, state: &ReviewState) -> Result<()> {
    conn.execute(
        "INSERT INTO srs_data
            (card_id, last_review, next_review, review_count, ease_factor, review_interval)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(card_id) DO UPDATE SET
            last_review = excluded.last_review,
            next_review = excluded.next_review,
            review_count = excluded.review_count,
            ease_factor = excluded.ease_factor,
            review_interval = excluded.review_interval",
        params![
            card_id,
            to_unix(state.last_review),
            to_unix(state.next_review),
            state.review_count,
            state.ease_factor,
            state.review_interval,
        ],
    )?;
    Ok(())
}

fn load_cards(conn: &Connection, deck: &str) -> Result<Vec<Flashcard>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM cards c WHERE c.deck_id = ?1 ORDER BY c.rowid",
        CARD_COLUMNS
    ))?;
    let cards = stmt
        .query_map(params![deck], card_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(cards)
}

/// Append `AND c.deck_id IN (...)` for a non-empty deck filter, binding the
/// names after the existing parameters.
fn deck_filter(decks: &[String], values: &mut Vec<Value>) -> String {
    if decks.is_empty() {
        return String::new();
    }
    let placeholders: Vec<String> = decks
        .iter()
        .map(|deck| {
            values.push(Value::Text(deck.clone()));
            format!("?{}", values.len())
        })
        .collect();
    format!(" AND c.deck_id IN ({})", placeholders.join(", "))
}

impl DeckStore for SqliteStore {
    fn create_deck(&self, name: &str) -> Result<Deck> {
        validate_deck_name(name)?;
        let conn = self.conn()?;

        let inserted = conn.execute(
            "INSERT INTO decks (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![name],
        )?;
        if inserted == 0 {
            return Err(FlashcardError::DeckExists(name.to_string()));
        }

        log::info!("Created deck {}", name);
        Ok(Deck::new(name))
    }

    fn load_deck(&self, name: &str) -> Result<Deck> {
        let conn = self.conn()?;
        require_deck(&conn, name)?;
        Ok(Deck {
            name: name.to_string(),
            cards: load_cards(&conn, name)?,
        })
    }

    fn load_all_decks(&self) -> Result<Vec<Deck>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name FROM decks ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        names
            .into_iter()
            .map(|name| {
                let cards = load_cards(&conn, &name)?;
                Ok(Deck { name, cards })
            })
            .collect()
    }

    fn deck_exists(&self, name: &str) -> Result<bool> {
        let conn = self.conn()?;
        deck_exists(&conn, name)
    }

    fn delete_deck(&self, name: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        require_deck(&tx, name)?;

        let states = tx.execute(
            "DELETE FROM srs_data WHERE card_id IN (SELECT id FROM cards WHERE deck_id = ?1)",
            params![name],
        )?;
        let cards = tx.execute("DELETE FROM cards WHERE deck_id = ?1", params![name])?;
        tx.execute("DELETE FROM decks WHERE name = ?1", params![name])?;
        tx.commit()?;

        log::info!(
            "Deleted deck {} ({} cards, {} review states)",
            name,
            cards,
            states
        );
        Ok(())
    }
}

impl CardStore for SqliteStore {
    fn add_card(&self, deck: &str, mut card: Flashcard) -> Result<Flashcard> {
        let conn = self.conn()?;
        require_deck(&conn, deck)?;

        if card.id.is_empty() {
            card.id = generate_id();
        }
        card.deck_id = deck.to_string();

        let taken = conn
            .query_row("SELECT 1 FROM cards WHERE id = ?1", params![card.id], |_| Ok(()))
            .optional()?;
        if taken.is_some() {
            return Err(FlashcardError::CardExists(card.id));
        }

        conn.execute(
            "INSERT INTO cards (id, deck_id, title, content) VALUES (?1, ?2, ?3, ?4)",
            params![card.id, card.deck_id, card.title, card.content],
        )?;
        Ok(card)
    }

    fn add_or_update_card(&self, deck: &str, mut card: Flashcard) -> Result<Flashcard> {
        let conn = self.conn()?;
        require_deck(&conn, deck)?;

        if card.id.is_empty() {
            card.id = generate_id();
        }
        card.deck_id = deck.to_string();

        conn.execute(
            "INSERT INTO cards (id, deck_id, title, content) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                deck_id = excluded.deck_id,
                title = excluded.title,
                content = excluded.content",
            params![card.id, card.deck_id, card.title, card.content],
        )?;
        Ok(card)
    }

    fn delete_card(&self, deck: &str, card_id: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM srs_data
             WHERE card_id IN (SELECT id FROM cards WHERE id = ?1 AND deck_id = ?2)",
            params![card_id, deck],
        )?;
        let removed = tx.execute(
            "DELETE FROM cards WHERE id = ?1 AND deck_id = ?2",
            params![card_id, deck],
        )?;
        tx.commit()?;

        Ok(removed > 0)
    }

    fn find_card(&self, deck: &str, card_id: &str) -> Result<Option<Flashcard>> {
        let conn = self.conn()?;
        let card = conn
            .query_row(
                &format!(
                    "SELECT {} FROM cards c WHERE c.id = ?1 AND c.deck_id = ?2",
                    CARD_COLUMNS
                ),
                params![card_id, deck],
                card_from_row,
            )
            .optional()?;
        Ok(card)
    }
}

impl ReviewStateStore for SqliteStore {
    fn get_state(&self, card_id: &str) -> Result<ReviewState> {
        let conn = self.conn()?;
        read_state(&conn, card_id)
    }

    fn put_state(&self, card_id: &str, state: &ReviewState) -> Result<()> {
        let conn = self.conn()?;
        require_card(&conn, card_id)?;
        write_state(&conn, card_id, &state.at_second_precision())
    }

    fn update_state(
        &self,
        card_id: &str,
        update: &dyn Fn(&ReviewState) -> ReviewState,
    ) -> Result<ReviewState> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        require_card(&tx, card_id)?;

        let next = update(&read_state(&tx, card_id)?).at_second_precision();
        write_state(&tx, card_id, &next)?;
        tx.commit()?;
        Ok(next)
    }

    fn query_due(
        &self,
        decks: &[String],
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Flashcard>> {
        if limit == 0 {
            return Err(FlashcardError::InvalidConfiguration(
                "review limit must be positive".to_string(),
            ));
        }

        let mut values = vec![
            Value::Integer(now.timestamp()),
            Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)),
        ];
        let filter = deck_filter(decks, &mut values);

        let sql = format!(
            "SELECT {}
             FROM cards c
             LEFT JOIN srs_data s ON c.id = s.card_id
             WHERE (s.next_review IS NULL OR s.next_review <= ?1){}
             ORDER BY
                CASE
                    WHEN s.next_review IS NULL THEN 0
                    WHEN s.next_review < ?1 THEN 1
                    ELSE 2
                END,
                s.next_review ASC,
                COALESCE(s.review_count, 0) ASC,
                c.deck_id ASC,
                c.rowid ASC
             LIMIT ?2",
            CARD_COLUMNS, filter
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let cards = stmt
            .query_map(params_from_iter(values.iter()), card_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cards)
    }

    fn review_pool(&self, decks: &[String]) -> Result<Vec<CardWithState>> {
        let mut values = Vec::new();
        let filter = deck_filter(decks, &mut values);

        let sql = format!(
            "SELECT {}, {}
             FROM cards c
             LEFT JOIN srs_data s ON c.id = s.card_id
             WHERE 1 = 1{}
             ORDER BY c.deck_id ASC, c.rowid ASC",
            CARD_COLUMNS, STATE_COLUMNS, filter
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let pool = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok(CardWithState {
                    card: card_from_row(row)?,
                    state: state_from_row(row, 4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pool)
    }
}

//! Flat-file flashcard store.
//!
//! Directory structure:
//! ```text
//! decks/
//! └── {deck-name}/
//!     ├── cards.json        # [{id, title, file}] in insertion order
//!     ├── srs_data.json     # {card-id: review state}
//!     └── {Card_Title}.md   # card content
//! ```
//!
//! The card id is the primary key; the file name is derived from the title
//! and follows it through renames. All decks are indexed in memory behind an
//! `RwLock`, and every file is replaced by writing a `.tmp` sibling and
//! renaming it over the target.

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CardStore, DeckStore, ReviewStateStore};
use crate::flashcards::algorithm::select_due;
use crate::flashcards::error::{FlashcardError, Result};
use crate::flashcards::models::{
    generate_id, validate_deck_name, CardWithState, Deck, Flashcard, ReviewState,
};

const INDEX_FILE: &str = "cards.json";
const STATES_FILE: &str = "srs_data.json";
const CARD_EXTENSION: &str = "md";

/// Separator that replaces whitespace in card file names
const TITLE_SEPARATOR: char = '_';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardEntry {
    id: String,
    title: String,
    file: String,
}

#[derive(Debug, Clone)]
struct StoredCard {
    entry: CardEntry,
    content: String,
}

impl StoredCard {
    fn to_card(&self, deck: &str) -> Flashcard {
        Flashcard::with_id(&self.entry.id, deck, &self.entry.title, &self.content)
    }
}

/// In-memory image of one deck directory
#[derive(Debug)]
struct DeckFiles {
    dir: PathBuf,
    cards: Vec<StoredCard>,
    states: BTreeMap<String, ReviewState>,
}

/// Turn a card title into a file stem: whitespace and path separators become
/// `_`, an empty result becomes `untitled`.
pub(crate) fn sanitize_title(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, '/' | '\\' | '\0') {
                TITLE_SEPARATOR
            } else {
                c
            }
        })
        .collect();

    if stem.is_empty() || stem == "." || stem == ".." {
        "untitled".to_string()
    } else {
        stem
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write to a temporary sibling, flush it to disk, then rename it into place
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    let written = File::create(&tmp).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    if let Err(err) = written.and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    write_atomic(path, json.as_bytes())
}

fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

fn is_card_file(path: &Path) -> bool {
    path.is_file() && path.extension().map_or(false, |ext| ext == CARD_EXTENSION)
}

impl DeckFiles {
    fn create(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        let deck = Self {
            dir,
            cards: Vec::new(),
            states: BTreeMap::new(),
        };
        deck.save_index()?;
        deck.save_states()?;
        Ok(deck)
    }

    /// Read a deck directory, rebuilding the index from the Markdown files
    /// when it is missing or stale.
    fn load(dir: PathBuf, name: &str) -> Result<Self> {
        let index_path = dir.join(INDEX_FILE);
        let mut index_dirty = !index_path.exists();
        let entries: Vec<CardEntry> = if index_dirty {
            Vec::new()
        } else {
            serde_json::from_str(&fs::read_to_string(&index_path)?)?
        };

        let mut cards: Vec<StoredCard> = Vec::with_capacity(entries.len());
        for entry in entries {
            match fs::read_to_string(dir.join(&entry.file)) {
                Ok(content) => cards.push(StoredCard { entry, content }),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    log::warn!(
                        "Card file {} of deck {} is missing, dropping card {}",
                        entry.file,
                        name,
                        entry.id
                    );
                    index_dirty = true;
                }
                Err(err) => return Err(err.into()),
            }
        }

        let mut unindexed: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_card_file(path))
            .collect();
        unindexed.sort();

        for path in unindexed {
            let (Some(file), Some(stem)) = (
                path.file_name().and_then(|n| n.to_str()),
                path.file_stem().and_then(|s| s.to_str()),
            ) else {
                continue;
            };
            if cards.iter().any(|c| c.entry.file == file) {
                continue;
            }

            let id = if cards.iter().any(|c| c.entry.id == stem) {
                generate_id()
            } else {
                stem.to_string()
            };
            cards.push(StoredCard {
                entry: CardEntry {
                    id,
                    title: stem.replace(TITLE_SEPARATOR, " "),
                    file: file.to_string(),
                },
                content: fs::read_to_string(&path)?,
            });
            index_dirty = true;
        }

        let states_path = dir.join(STATES_FILE);
        let mut states: BTreeMap<String, ReviewState> = if states_path.exists() {
            serde_json::from_str(&fs::read_to_string(&states_path)?)?
        } else {
            BTreeMap::new()
        };
        let known_states = states.len();
        states.retain(|id, _| cards.iter().any(|c| c.entry.id == *id));
        let states_dirty = !states_path.exists() || states.len() != known_states;

        let deck = Self { dir, cards, states };
        if index_dirty {
            log::info!("Rebuilt card index for deck {} ({} cards)", name, deck.cards.len());
            deck.save_index()?;
        }
        if states_dirty {
            deck.save_states()?;
        }
        Ok(deck)
    }

    fn save_index(&self) -> Result<()> {
        self.write_index(self.cards.iter().map(|c| &c.entry))
    }

    /// Write `entries` as the card index without touching the in-memory one
    fn write_index<'a>(&self, entries: impl IntoIterator<Item = &'a CardEntry>) -> Result<()> {
        let entries: Vec<&CardEntry> = entries.into_iter().collect();
        write_json(&self.dir.join(INDEX_FILE), &entries)
    }

    fn save_states(&self) -> Result<()> {
        write_json(&self.dir.join(STATES_FILE), &self.states)
    }

    fn position(&self, card_id: &str) -> Option<usize> {
        self.cards.iter().position(|c| c.entry.id == card_id)
    }

    fn to_deck(&self, name: &str) -> Deck {
        Deck {
            name: name.to_string(),
            cards: self.cards.iter().map(|c| c.to_card(name)).collect(),
        }
    }

    /// File name for a card, unique within the deck. A name already used by
    /// another card gets the card id appended.
    fn file_name_for(&self, title: &str, card_id: &str) -> String {
        let stem = sanitize_title(title);
        let id_prefix = sanitize_title(&card_id.chars().take(8).collect::<String>());

        let taken = |file: &str| {
            self.cards.iter().any(|c| {
                c.entry.id != card_id && c.entry.file.eq_ignore_ascii_case(file)
            })
        };

        let mut attempt = 0;
        loop {
            let candidate = match attempt {
                0 => format!("{}.{}", stem, CARD_EXTENSION),
                1 => format!("{}-{}.{}", stem, id_prefix, CARD_EXTENSION),
                n => format!("{}-{}-{}.{}", stem, id_prefix, n, CARD_EXTENSION),
            };
            if !taken(&candidate) {
                return candidate;
            }
            attempt += 1;
        }
    }

    /// Index entries with the one at `pos` replaced by `entry`
    fn entries_with<'a>(
        &'a self,
        pos: usize,
        entry: &'a CardEntry,
    ) -> impl Iterator<Item = &'a CardEntry> {
        self.cards
            .iter()
            .enumerate()
            .map(move |(i, c)| if i == pos { entry } else { &c.entry })
    }

    /// Index entries without the one at `pos`
    fn entries_without(&self, pos: usize) -> impl Iterator<Item = &CardEntry> {
        self.cards
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != pos)
            .map(|(_, c)| &c.entry)
    }

    fn insert(&mut self, card: &Flashcard) -> Result<()> {
        let entry = CardEntry {
            id: card.id.clone(),
            title: card.title.clone(),
            file: self.file_name_for(&card.title, &card.id),
        };
        let path = self.dir.join(&entry.file);
        write_atomic(&path, card.content.as_bytes())?;

        let entries = self.cards.iter().map(|c| &c.entry).chain(std::iter::once(&entry));
        if let Err(err) = self.write_index(entries) {
            let _ = fs::remove_file(&path);
            return Err(err);
        }

        self.cards.push(StoredCard {
            entry,
            content: card.content.clone(),
        });
        Ok(())
    }

    /// Replace title and content of the card at `pos`, moving its file when
    /// the title changes. Memory is only touched once the index is written;
    /// on failure the previous file is put back.
    fn update(&mut self, pos: usize, card: &Flashcard) -> Result<()> {
        let previous = self.cards[pos].clone();
        let entry = CardEntry {
            id: card.id.clone(),
            title: card.title.clone(),
            file: self.file_name_for(&card.title, &card.id),
        };
        let old_path = self.dir.join(&previous.entry.file);
        let new_path = self.dir.join(&entry.file);

        let renamed = entry.file != previous.entry.file;
        let relocated = renamed && old_path.exists();
        if relocated {
            fs::rename(&old_path, &new_path)?;
            log::debug!("Renamed card file {} to {}", previous.entry.file, entry.file);
        }

        let written = write_atomic(&new_path, card.content.as_bytes())
            .and_then(|_| self.write_index(self.entries_with(pos, &entry)));
        if let Err(err) = written {
            if renamed && !relocated {
                let _ = fs::remove_file(&new_path);
            } else {
                let _ = write_atomic(&new_path, previous.content.as_bytes());
                if relocated {
                    let _ = fs::rename(&new_path, &old_path);
                }
            }
            return Err(err);
        }

        self.cards[pos] = StoredCard {
            entry,
            content: card.content.clone(),
        };
        Ok(())
    }

    /// Drop the card at `pos`: index first, then its file, then its state
    fn remove(&mut self, pos: usize) -> Result<()> {
        self.write_index(self.entries_without(pos))?;

        let path = self.dir.join(&self.cards[pos].entry.file);
        if let Err(err) = remove_file_if_exists(&path) {
            let _ = self.save_index();
            return Err(err.into());
        }

        let stored = self.cards.remove(pos);
        if self.states.remove(&stored.entry.id).is_some() {
            if let Err(err) = self.save_states() {
                // Orphaned states are pruned the next time the deck is loaded
                log::warn!("Failed to drop review state of card {}: {}", stored.entry.id, err);
            }
        }
        Ok(())
    }

    /// Store a card's review state, restoring the previous one if the write fails
    fn set_state(&mut self, card_id: &str, state: ReviewState) -> Result<()> {
        let previous = self.states.insert(card_id.to_string(), state);
        if let Err(err) = self.save_states() {
            match previous {
                Some(old) => self.states.insert(card_id.to_string(), old),
                None => self.states.remove(card_id),
            };
            return Err(err);
        }
        Ok(())
    }
}

/// Card ids must be unique across decks; ids recovered from file names can
/// collide, so later duplicates get fresh ids.
fn ensure_unique_ids(decks: &mut BTreeMap<String, DeckFiles>) -> Result<()> {
    let mut seen = HashSet::new();
    for (name, deck) in decks.iter_mut() {
        let mut changed = false;
        for stored in deck.cards.iter_mut() {
            if seen.insert(stored.entry.id.clone()) {
                continue;
            }
            let fresh = generate_id();
            log::warn!(
                "Card id {} in deck {} is already in use, reassigning to {}",
                stored.entry.id,
                name,
                fresh
            );
            if let Some(state) = deck.states.remove(&stored.entry.id) {
                deck.states.insert(fresh.clone(), state);
            }
            stored.entry.id = fresh.clone();
            seen.insert(fresh);
            changed = true;
        }
        if changed {
            deck.save_index()?;
            deck.save_states()?;
        }
    }
    Ok(())
}

/// Deck name and position of a card, searching every deck
fn locate(decks: &BTreeMap<String, DeckFiles>, card_id: &str) -> Option<(String, usize)> {
    decks
        .iter()
        .find_map(|(name, deck)| deck.position(card_id).map(|pos| (name.clone(), pos)))
}

/// The deck holding `card_id`, or `CardNotFound`
fn owning_deck<'a>(
    decks: &'a mut BTreeMap<String, DeckFiles>,
    card_id: &str,
) -> Result<&'a mut DeckFiles> {
    decks
        .values_mut()
        .find(|deck| deck.position(card_id).is_some())
        .ok_or_else(|| FlashcardError::CardNotFound {
            deck: String::new(),
            card_id: card_id.to_string(),
        })
}

fn collect_pool(decks: &BTreeMap<String, DeckFiles>, filter: &[String]) -> Vec<CardWithState> {
    decks
        .iter()
        .filter(|(name, _)| filter.is_empty() || filter.iter().any(|f| f == *name))
        .flat_map(|(name, deck)| {
            deck.cards.iter().map(move |stored| CardWithState {
                card: stored.to_card(name),
                state: deck.states.get(&stored.entry.id).cloned().unwrap_or_default(),
            })
        })
        .collect()
}

pub struct FileStore {
    root: PathBuf,
    decks: RwLock<BTreeMap<String, DeckFiles>>,
}

impl FileStore {
    /// Open the decks directory, creating it if needed, and index every deck
    pub fn open(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)?;

        let mut decks = BTreeMap::new();
        for entry in fs::read_dir(&root)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                log::warn!("Skipping deck directory with a non UTF-8 name: {:?}", path);
                continue;
            };
            let deck = DeckFiles::load(path, &name)?;
            decks.insert(name, deck);
        }
        ensure_unique_ids(&mut decks)?;

        log::debug!("Indexed {} decks under {:?}", decks.len(), root);
        Ok(Self {
            root,
            decks: RwLock::new(decks),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, DeckFiles>>> {
        Ok(self.decks.read()?)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, DeckFiles>>> {
        Ok(self.decks.write()?)
    }
}

/// Move a card file and its review state from one deck to another. Both
/// indexes are written before either deck changes in memory.
fn move_card(
    decks: &mut BTreeMap<String, DeckFiles>,
    from: &str,
    pos: usize,
    to: &str,
    card: &Flashcard,
) -> Result<()> {
    let source = decks
        .get(from)
        .ok_or_else(|| FlashcardError::DeckNotFound(from.to_string()))?;
    let old_path = source.dir.join(&source.cards[pos].entry.file);
    let old_content = source.cards[pos].content.clone();
    let source_entries: Vec<CardEntry> = source.entries_without(pos).cloned().collect();
    let state = source.states.get(&card.id).cloned();

    let target = decks
        .get_mut(to)
        .ok_or_else(|| FlashcardError::DeckNotFound(to.to_string()))?;
    let entry = CardEntry {
        id: card.id.clone(),
        title: card.title.clone(),
        file: target.file_name_for(&card.title, &card.id),
    };
    let new_path = target.dir.join(&entry.file);

    let relocated = old_path.exists();
    if relocated {
        fs::rename(&old_path, &new_path)?;
    }
    let undo_file = || {
        if relocated {
            let _ = write_atomic(&new_path, old_content.as_bytes());
            let _ = fs::rename(&new_path, &old_path);
        } else {
            let _ = fs::remove_file(&new_path);
        }
    };

    let entries = target.cards.iter().map(|c| &c.entry).chain(std::iter::once(&entry));
    let written = write_atomic(&new_path, card.content.as_bytes())
        .and_then(|_| target.write_index(entries));
    if let Err(err) = written {
        undo_file();
        return Err(err);
    }

    let source_written = decks
        .get(from)
        .map_or(Ok(()), |source| source.write_index(&source_entries));
    if let Err(err) = source_written {
        if let Some(target) = decks.get(to) {
            let _ = target.save_index();
        }
        undo_file();
        return Err(err);
    }

    if let Some(target) = decks.get_mut(to) {
        target.cards.push(StoredCard {
            entry,
            content: card.content.clone(),
        });
        if let Some(state) = state {
            target.set_state(&card.id, state)?;
        }
    }
    if let Some(source) = decks.get_mut(from) {
        source.cards.remove(pos);
        if source.states.remove(&card.id).is_some() {
            source.save_states()?;
        }
    }

    log::info!("Moved card {} from deck {} to {}", card.id, from, to);
    Ok(())
}

impl DeckStore for FileStore {
    fn create_deck(&self, name: &str) -> Result<Deck> {
        validate_deck_name(name)?;
        let mut decks = self.write()?;
        if decks.contains_key(name) {
            return Err(FlashcardError::DeckExists(name.to_string()));
        }

        let deck = DeckFiles::create(self.root.join(name))?;
        decks.insert(name.to_string(), deck);

        log::info!("Created deck {}", name);
        Ok(Deck::new(name))
    }

    fn load_deck(&self, name: &str) -> Result<Deck> {
        let decks = self.read()?;
        decks
            .get(name)
            .map(|deck| deck.to_deck(name))
            .ok_or_else(|| FlashcardError::DeckNotFound(name.to_string()))
    }

    fn load_all_decks(&self) -> Result<Vec<Deck>> {
        let decks = self.read()?;
        Ok(decks.iter().map(|(name, deck)| deck.to_deck(name)).collect())
    }

    fn deck_exists(&self, name: &str) -> Result<bool> {
        Ok(self.read()?.contains_key(name))
    }

    fn delete_deck(&self, name: &str) -> Result<()> {
        let mut decks = self.write()?;
        let deck = decks
            .get_mut(name)
            .ok_or_else(|| FlashcardError::DeckNotFound(name.to_string()))?;

        let card_count = deck.cards.len();
        while let Some(stored) = deck.cards.last() {
            let card_id = stored.entry.id.clone();
            let path = deck.dir.join(&stored.entry.file);

            if let Err(err) = remove_file_if_exists(&path) {
                // Keep the index in step with the files already removed
                let _ = deck.save_index();
                let _ = deck.save_states();
                return Err(FlashcardError::CascadeFailed {
                    deck: name.to_string(),
                    card_id,
                    source: Box::new(err.into()),
                });
            }

            deck.cards.pop();
            deck.states.remove(&card_id);
        }

        match fs::remove_dir_all(&deck.dir) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => {
                let _ = deck.save_index();
                let _ = deck.save_states();
                return Err(err.into());
            }
            _ => {}
        }
        decks.remove(name);

        log::info!("Deleted deck {} ({} cards)", name, card_count);
        Ok(())
    }
}

impl CardStore for FileStore {
    fn add_card(&self, deck: &str, mut card: Flashcard) -> Result<Flashcard> {
        let mut decks = self.write()?;
        if !decks.contains_key(deck) {
            return Err(FlashcardError::DeckNotFound(deck.to_string()));
        }

        if card.id.is_empty() {
            card.id = generate_id();
        }
        card.deck_id = deck.to_string();

        if locate(&decks, &card.id).is_some() {
            return Err(FlashcardError::CardExists(card.id));
        }

        if let Some(target) = decks.get_mut(deck) {
            target.insert(&card)?;
        }
        Ok(card)
    }

    fn add_or_update_card(&self, deck: &str, mut card: Flashcard) -> Result<Flashcard> {
        let mut decks = self.write()?;
        if !decks.contains_key(deck) {
            return Err(FlashcardError::DeckNotFound(deck.to_string()));
        }

        if card.id.is_empty() {
            card.id = generate_id();
        }
        card.deck_id = deck.to_string();

        match locate(&decks, &card.id) {
            Some((current, pos)) if current != deck => {
                move_card(&mut decks, &current, pos, deck, &card)?;
            }
            Some((_, pos)) => {
                if let Some(target) = decks.get_mut(deck) {
                    target.update(pos, &card)?;
                }
            }
            None => {
                if let Some(target) = decks.get_mut(deck) {
                    target.insert(&card)?;
                }
            }
        }
        Ok(card)
    }

    fn delete_card(&self, deck: &str, card_id: &str) -> Result<bool> {
        let mut decks = self.write()?;
        let Some(target) = decks.get_mut(deck) else {
            return Ok(false);
        };
        let Some(pos) = target.position(card_id) else {
            return Ok(false);
        };

        target.remove(pos)?;
        Ok(true)
    }

    fn find_card(&self, deck: &str, card_id: &str) -> Result<Option<Flashcard>> {
        let decks = self.read()?;
        Ok(decks.get(deck).and_then(|d| {
            d.position(card_id).map(|pos| d.cards[pos].to_card(deck))
        }))
    }
}

impl ReviewStateStore for FileStore {
    fn get_state(&self, card_id: &str) -> Result<ReviewState> {
        let decks = self.read()?;
        let state = decks
            .values()
            .find_map(|deck| deck.states.get(card_id))
            .cloned();
        Ok(state.unwrap_or_default())
    }

    fn put_state(&self, card_id: &str, state: &ReviewState) -> Result<()> {
        let mut decks = self.write()?;
        let deck = owning_deck(&mut decks, card_id)?;
        deck.set_state(card_id, state.at_second_precision())
    }

    fn update_state(
        &self,
        card_id: &str,
        update: &dyn Fn(&ReviewState) -> ReviewState,
    ) -> Result<ReviewState> {
        let mut decks = self.write()?;
        let deck = owning_deck(&mut decks, card_id)?;

        let current = deck.states.get(card_id).cloned().unwrap_or_default();
        let next = update(&current).at_second_precision();
        deck.set_state(card_id, next.clone())?;
        Ok(next)
    }

    fn query_due(
        &self,
        decks: &[String],
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Flashcard>> {
        let index = self.read()?;
        let pool = collect_pool(&index, decks);
        let selected = select_due(&pool, now, limit, decks)?;
        Ok(selected.into_iter().map(|c| c.card).collect())
    }

    fn review_pool(&self, decks: &[String]) -> Result<Vec<CardWithState>> {
        let index = self.read()?;
        Ok(collect_pool(&index, decks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flashcards::store::contract_tests;
    use tempfile::TempDir;

    fn create_test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path().join("decks")).unwrap();
        (store, temp_dir)
    }

    fn card(id: &str, deck: &str, title: &str, content: &str) -> Flashcard {
        Flashcard::with_id(id, deck, title, content)
    }

    #[test]
    fn test_backend_contract() {
        contract_tests::run_all(create_test_store);
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("Welcome to MDSRS!"), "Welcome_to_MDSRS!");
        assert_eq!(sanitize_title("  tabs\tand\nlines "), "tabs_and_lines");
        assert_eq!(sanitize_title("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_title("   "), "untitled");
        assert_eq!(sanitize_title(".."), "untitled");
    }

    #[test]
    fn test_card_written_as_markdown_file() {
        let (store, _temp) = create_test_store();
        store.create_deck("Verbs").unwrap();
        store
            .add_or_update_card("Verbs", card("v1", "Verbs", "To be", "ser / estar"))
            .unwrap();

        let path = store.root().join("Verbs").join("To_be.md");
        assert_eq!(fs::read_to_string(path).unwrap(), "ser / estar");

        let index = fs::read_to_string(store.root().join("Verbs").join(INDEX_FILE)).unwrap();
        assert!(index.contains("\"id\": \"v1\""));
        assert!(!store.root().join("Verbs").join("To_be.md.tmp").exists());
    }

    #[test]
    fn test_title_change_moves_file_and_keeps_identity() {
        let (store, _temp) = create_test_store();
        store.create_deck("Deck").unwrap();
        store
            .add_or_update_card("Deck", card("c1", "Deck", "Old title", "body"))
            .unwrap();
        store
            .put_state("c1", &ReviewState { review_count: 3, ..ReviewState::default() })
            .unwrap();

        store
            .add_or_update_card("Deck", card("c1", "Deck", "New title", "new body"))
            .unwrap();

        let dir = store.root().join("Deck");
        assert!(!dir.join("Old_title.md").exists());
        assert_eq!(fs::read_to_string(dir.join("New_title.md")).unwrap(), "new body");

        let found = store.find_card("Deck", "c1").unwrap().unwrap();
        assert_eq!(found.title, "New title");
        assert_eq!(store.get_state("c1").unwrap().review_count, 3);
        assert_eq!(store.load_deck("Deck").unwrap().cards.len(), 1);
    }

    #[test]
    fn test_same_title_gets_distinct_files() {
        let (store, _temp) = create_test_store();
        store.create_deck("Deck").unwrap();
        store
            .add_or_update_card("Deck", card("aaaaaaaa-1", "Deck", "Same", "first"))
            .unwrap();
        store
            .add_or_update_card("Deck", card("bbbbbbbb-2", "Deck", "Same", "second"))
            .unwrap();

        let dir = store.root().join("Deck");
        assert_eq!(fs::read_to_string(dir.join("Same.md")).unwrap(), "first");
        assert_eq!(fs::read_to_string(dir.join("Same-bbbbbbbb.md")).unwrap(), "second");
    }

    #[test]
    fn test_reopen_restores_decks_states_and_order() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("decks");
        {
            let store = FileStore::open(root.clone()).unwrap();
            store.create_deck("Empty").unwrap();
            store.create_deck("Words").unwrap();
            for (id, title) in [("w2", "Zebra"), ("w1", "Apple")] {
                store
                    .add_or_update_card("Words", card(id, "Words", title, title))
                    .unwrap();
            }
            store
                .put_state("w1", &ReviewState { ease_factor: 2.1, ..ReviewState::default() })
                .unwrap();
        }

        let store = FileStore::open(root).unwrap();
        assert!(store.load_deck("Empty").unwrap().cards.is_empty());
        let ids: Vec<String> = store
            .load_deck("Words")
            .unwrap()
            .cards
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["w2", "w1"]);
        assert_eq!(store.get_state("w1").unwrap().ease_factor, 2.1);

        let srs = fs::read_to_string(store.root().join("Words").join(STATES_FILE)).unwrap();
        assert!(srs.contains("\"easeFactor\": 2.1"));
    }

    #[test]
    fn test_index_rebuilt_from_markdown_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("decks");
        let deck_dir = root.join("Legacy");
        fs::create_dir_all(&deck_dir).unwrap();
        fs::write(deck_dir.join("Spaced_Repetition.md"), "# Spaced").unwrap();
        fs::write(deck_dir.join("notes.txt"), "ignored").unwrap();

        let store = FileStore::open(root).unwrap();
        let deck = store.load_deck("Legacy").unwrap();
        assert_eq!(deck.cards.len(), 1);
        assert_eq!(deck.cards[0].id, "Spaced_Repetition");
        assert_eq!(deck.cards[0].title, "Spaced Repetition");
        assert_eq!(deck.cards[0].content, "# Spaced");
        assert!(deck_dir.join(INDEX_FILE).exists());
    }

    #[test]
    fn test_recovered_ids_unique_across_decks() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("decks");
        for deck in ["One", "Two"] {
            fs::create_dir_all(root.join(deck)).unwrap();
            fs::write(root.join(deck).join("Intro.md"), deck).unwrap();
        }

        let store = FileStore::open(root).unwrap();
        let one = store.load_deck("One").unwrap();
        let two = store.load_deck("Two").unwrap();
        assert_eq!(one.cards[0].id, "Intro");
        assert_ne!(two.cards[0].id, "Intro");
        assert_eq!(two.cards[0].content, "Two");
    }

    #[test]
    fn test_missing_card_file_is_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("decks");
        {
            let store = FileStore::open(root.clone()).unwrap();
            store.create_deck("Deck").unwrap();
            store
                .add_or_update_card("Deck", card("gone", "Deck", "Gone", "x"))
                .unwrap();
            store
                .add_or_update_card("Deck", card("kept", "Deck", "Kept", "y"))
                .unwrap();
        }
        fs::remove_file(root.join("Deck").join("Gone.md")).unwrap();

        let store = FileStore::open(root).unwrap();
        let deck = store.load_deck("Deck").unwrap();
        assert_eq!(deck.cards.len(), 1);
        assert_eq!(deck.cards[0].id, "kept");
    }

    #[test]
    fn test_failed_index_write_leaves_card_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("decks");
        let dir = root.join("Deck");
        let store = FileStore::open(root.clone()).unwrap();
        store.create_deck("Deck").unwrap();
        store
            .add_or_update_card("Deck", card("c1", "Deck", "Old title", "old body"))
            .unwrap();
        store
            .put_state("c1", &ReviewState { review_count: 2, ..ReviewState::default() })
            .unwrap();

        // A directory where the temporary index goes makes every index write fail
        let blocker = dir.join(format!("{}.tmp", INDEX_FILE));
        fs::create_dir(&blocker).unwrap();

        let err = store
            .add_or_update_card("Deck", card("c1", "Deck", "New title", "new body"))
            .unwrap_err();
        assert!(err.is_persistence());
        assert!(store.delete_card("Deck", "c1").unwrap_err().is_persistence());
        assert!(store.add_card("Deck", card("c2", "Deck", "Other", "x")).is_err());

        let found = store.find_card("Deck", "c1").unwrap().unwrap();
        assert_eq!(found.title, "Old title");
        assert_eq!(found.content, "old body");
        assert_eq!(store.load_deck("Deck").unwrap().cards.len(), 1);
        assert_eq!(fs::read_to_string(dir.join("Old_title.md")).unwrap(), "old body");
        assert!(!dir.join("New_title.md").exists());
        assert!(!dir.join("Other.md").exists());

        fs::remove_dir(&blocker).unwrap();
        drop(store);

        let store = FileStore::open(root).unwrap();
        let found = store.find_card("Deck", "c1").unwrap().unwrap();
        assert_eq!(found.title, "Old title");
        assert_eq!(store.get_state("c1").unwrap().review_count, 2);
        assert_eq!(store.load_deck("Deck").unwrap().cards.len(), 1);
    }

    #[test]
    fn test_delete_deck_removes_directory() {
        let (store, _temp) = create_test_store();
        store.create_deck("Gone").unwrap();
        store
            .add_or_update_card("Gone", card("g1", "Gone", "G", "g"))
            .unwrap();

        store.delete_deck("Gone").unwrap();
        assert!(!store.root().join("Gone").exists());
    }
}

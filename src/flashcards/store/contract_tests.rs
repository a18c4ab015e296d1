//! Behaviour every backend must share, run by each backend's test module

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::Backend;
use crate::flashcards::error::FlashcardError;
use crate::flashcards::models::{Flashcard, ReviewState};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
}

fn card(id: &str, deck: &str, title: &str) -> Flashcard {
    Flashcard::with_id(id, deck, title, format!("# {}\n\nbody", title))
}

fn reviewed(next: DateTime<Utc>, count: u32) -> ReviewState {
    ReviewState {
        last_review: Some(next - Duration::days(2)),
        next_review: Some(next),
        review_count: count,
        ease_factor: 1.3,
        review_interval: 2,
    }
}

pub fn run_all<S: Backend, G>(make: impl Fn() -> (S, G)) {
    let (store, _guard) = make();
    decks_create_load_and_conflict(&store);

    let (store, _guard) = make();
    cards_add_generates_ids_and_rejects_duplicates(&store);

    let (store, _guard) = make();
    add_or_update_is_idempotent(&store);

    let (store, _guard) = make();
    delete_card_is_a_noop_when_absent(&store);

    let (store, _guard) = make();
    review_state_round_trip(&store);

    let (store, _guard) = make();
    delete_deck_cascades(&store);

    let (store, _guard) = make();
    query_due_orders_and_filters(&store);

    let (store, _guard) = make();
    move_card_between_decks(&store);

    let (store, _guard) = make();
    review_pool_lists_cards_with_state(&store);

    let (store, _guard) = make();
    update_state_reads_and_writes_in_one_step(&store);

    let (store, _guard) = make();
    concurrent_updates_are_not_lost(&store);

    let (store, _guard) = make();
    states_kept_at_second_precision(&store);
}

fn decks_create_load_and_conflict<S: Backend>(store: &S) {
    let deck = store.create_deck("Spanish").unwrap();
    assert_eq!(deck.name, "Spanish");
    assert!(deck.cards.is_empty());

    let loaded = store.load_deck("Spanish").unwrap();
    assert!(loaded.cards.is_empty());
    assert!(store.deck_exists("Spanish").unwrap());
    assert!(!store.deck_exists("French").unwrap());

    let err = store.create_deck("Spanish").unwrap_err();
    assert!(err.is_conflict());

    let err = store.load_deck("French").unwrap_err();
    assert!(matches!(err, FlashcardError::DeckNotFound(_)));

    let err = store.create_deck("../escape").unwrap_err();
    assert!(matches!(err, FlashcardError::InvalidConfiguration(_)));

    store.create_deck("Arabic").unwrap();
    let names: Vec<String> = store
        .load_all_decks()
        .unwrap()
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(names, vec!["Arabic", "Spanish"]);
}

fn cards_add_generates_ids_and_rejects_duplicates<S: Backend>(store: &S) {
    store.create_deck("Rust").unwrap();

    let first = store
        .add_card("Rust", Flashcard::with_id("", "", "Ownership", "Each value has one owner"))
        .unwrap();
    assert_eq!(first.id.len(), 36);
    assert_eq!(first.deck_id, "Rust");

    store.add_card("Rust", card("b", "Rust", "Borrowing")).unwrap();
    let err = store.add_card("Rust", card("b", "Rust", "Borrowing again")).unwrap_err();
    assert!(matches!(err, FlashcardError::CardExists(_)));

    let err = store.add_card("Go", card("c", "Go", "Goroutines")).unwrap_err();
    assert!(matches!(err, FlashcardError::DeckNotFound(_)));

    let deck = store.load_deck("Rust").unwrap();
    let titles: Vec<&str> = deck.cards.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Ownership", "Borrowing"]);

    let found = store.find_card("Rust", &first.id).unwrap().unwrap();
    assert_eq!(found, first);
    assert!(store.find_card("Rust", "missing").unwrap().is_none());
}

fn add_or_update_is_idempotent<S: Backend>(store: &S) {
    store.create_deck("Japanese").unwrap();
    let c1 = card("c1", "Japanese", "Hiragana a");
    let c2 = card("c2", "Japanese", "Hiragana i");

    store.add_or_update_card("Japanese", c1.clone()).unwrap();
    store.add_or_update_card("Japanese", c2.clone()).unwrap();
    let once = store.load_deck("Japanese").unwrap();

    store.add_or_update_card("Japanese", c1.clone()).unwrap();
    let twice = store.load_deck("Japanese").unwrap();
    assert_eq!(once.cards.len(), 2);
    assert_eq!(twice.cards.len(), 2);
    for card in &once.cards {
        assert_eq!(twice.find_card(&card.id), Some(card));
    }

    let mut edited = c1.clone();
    edited.content = "あ".to_string();
    store.add_or_update_card("Japanese", edited).unwrap();
    let found = store.find_card("Japanese", "c1").unwrap().unwrap();
    assert_eq!(found.content, "あ");
    assert_eq!(found.title, "Hiragana a");
    assert_eq!(store.load_deck("Japanese").unwrap().cards.len(), 2);
}

fn delete_card_is_a_noop_when_absent<S: Backend>(store: &S) {
    store.create_deck("Math").unwrap();
    store.add_or_update_card("Math", card("m1", "Math", "Pythagoras")).unwrap();
    store.put_state("m1", &reviewed(now(), 1)).unwrap();

    assert!(!store.delete_card("Math", "nope").unwrap());
    assert!(store.delete_card("Math", "m1").unwrap());
    assert!(!store.delete_card("Math", "m1").unwrap());

    assert!(store.find_card("Math", "m1").unwrap().is_none());
    assert_eq!(store.get_state("m1").unwrap(), ReviewState::default());
    assert!(store.load_deck("Math").unwrap().cards.is_empty());
}

fn review_state_round_trip<S: Backend>(store: &S) {
    store.create_deck("History").unwrap();
    store.add_or_update_card("History", card("h1", "History", "1066")).unwrap();

    assert_eq!(store.get_state("h1").unwrap(), ReviewState::default());
    assert_eq!(store.get_state("unknown").unwrap(), ReviewState::default());

    let state = reviewed(now(), 4);
    store.put_state("h1", &state).unwrap();
    assert_eq!(store.get_state("h1").unwrap(), state);

    let updated = ReviewState {
        ease_factor: 2.5,
        review_count: 5,
        ..state
    };
    store.put_state("h1", &updated).unwrap();
    store.put_state("h1", &updated).unwrap();
    assert_eq!(store.get_state("h1").unwrap(), updated);

    let err = store.put_state("ghost", &updated).unwrap_err();
    assert!(err.is_not_found());
}

fn delete_deck_cascades<S: Backend>(store: &S) {
    store.create_deck("Biology").unwrap();
    store.create_deck("Keep").unwrap();
    for id in ["b1", "b2", "b3"] {
        store.add_or_update_card("Biology", card(id, "Biology", id)).unwrap();
        store.put_state(id, &reviewed(now(), 2)).unwrap();
    }
    store.add_or_update_card("Keep", card("k1", "Keep", "k1")).unwrap();
    store.put_state("k1", &reviewed(now(), 7)).unwrap();

    store.delete_deck("Biology").unwrap();

    assert!(!store.deck_exists("Biology").unwrap());
    for id in ["b1", "b2", "b3"] {
        assert_eq!(store.get_state(id).unwrap(), ReviewState::default());
    }
    assert_eq!(store.get_state("k1").unwrap().review_count, 7);

    let err = store.delete_deck("Biology").unwrap_err();
    assert!(err.is_not_found());

    // The name can be reused and starts empty
    store.create_deck("Biology").unwrap();
    assert!(store.load_deck("Biology").unwrap().cards.is_empty());
}

fn query_due_orders_and_filters<S: Backend>(store: &S) {
    let now = now();
    assert!(store.query_due(&[], now, 5).unwrap().is_empty());

    store.create_deck("A").unwrap();
    store.create_deck("B").unwrap();
    store.add_or_update_card("A", card("Z", "A", "Zeta")).unwrap();
    store.add_or_update_card("A", card("Y", "A", "Ypsilon")).unwrap();
    store.add_or_update_card("A", card("X", "A", "Xi")).unwrap();
    store.add_or_update_card("B", card("W", "B", "Omega")).unwrap();

    store.put_state("Z", &reviewed(now + Duration::weeks(1), 1)).unwrap();
    store.put_state("Y", &reviewed(now - Duration::days(1), 1)).unwrap();

    let due = store.query_due(&["A".to_string()], now, 2).unwrap();
    let ids: Vec<&str> = due.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["X", "Y"]);

    let due = store.query_due(&["A".to_string()], now, 10).unwrap();
    assert_eq!(due.len(), 2);

    let all = store.query_due(&[], now, 10).unwrap();
    let ids: Vec<&str> = all.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["X", "W", "Y"]);

    let only_b = store.query_due(&["B".to_string()], now, 10).unwrap();
    assert!(only_b.iter().all(|c| c.deck_id == "B"));

    assert!(store.query_due(&["Nope".to_string()], now, 10).unwrap().is_empty());

    let err = store.query_due(&[], now, 0).unwrap_err();
    assert!(matches!(err, FlashcardError::InvalidConfiguration(_)));
}

fn move_card_between_decks<S: Backend>(store: &S) {
    store.create_deck("Inbox").unwrap();
    store.create_deck("Chemistry").unwrap();
    store.add_or_update_card("Inbox", card("mv", "Inbox", "Avogadro")).unwrap();
    store.put_state("mv", &reviewed(now(), 3)).unwrap();

    store.add_or_update_card("Chemistry", card("mv", "Chemistry", "Avogadro")).unwrap();

    assert!(store.find_card("Inbox", "mv").unwrap().is_none());
    let moved = store.find_card("Chemistry", "mv").unwrap().unwrap();
    assert_eq!(moved.deck_id, "Chemistry");
    assert_eq!(store.get_state("mv").unwrap().review_count, 3);
    assert!(store.load_deck("Inbox").unwrap().cards.is_empty());
}

fn review_pool_lists_cards_with_state<S: Backend>(store: &S) {
    store.create_deck("Pool").unwrap();
    store.create_deck("Other").unwrap();
    store.add_or_update_card("Pool", card("p1", "Pool", "one")).unwrap();
    store.add_or_update_card("Pool", card("p2", "Pool", "two")).unwrap();
    store.add_or_update_card("Other", card("o1", "Other", "three")).unwrap();
    store.put_state("p2", &reviewed(now(), 6)).unwrap();

    let pool = store.review_pool(&["Pool".to_string()]).unwrap();
    assert_eq!(pool.len(), 2);
    assert_eq!(pool[0].card.id, "p1");
    assert!(pool[0].state.is_new());
    assert_eq!(pool[1].state.review_count, 6);

    assert_eq!(store.review_pool(&[]).unwrap().len(), 3);
}

fn update_state_reads_and_writes_in_one_step<S: Backend>(store: &S) {
    store.create_deck("Geo").unwrap();
    store.add_or_update_card("Geo", card("g1", "Geo", "Capitals")).unwrap();
    store.put_state("g1", &reviewed(now(), 2)).unwrap();

    let next = store
        .update_state("g1", &|state: &ReviewState| ReviewState {
            review_count: state.review_count + 1,
            ease_factor: 2.0,
            ..state.clone()
        })
        .unwrap();
    assert_eq!(next.review_count, 3);
    assert_eq!(store.get_state("g1").unwrap(), next);

    let err = store
        .update_state("ghost", &|state: &ReviewState| state.clone())
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(store.get_state("ghost").unwrap(), ReviewState::default());
}

fn concurrent_updates_are_not_lost<S: Backend>(store: &S) {
    store.create_deck("Busy").unwrap();
    store.add_or_update_card("Busy", card("hot", "Busy", "Hot")).unwrap();
    store.add_or_update_card("Busy", card("cold", "Busy", "Cold")).unwrap();

    let bump = |state: &ReviewState| ReviewState {
        review_count: state.review_count + 1,
        last_review: Some(now()),
        ..state.clone()
    };

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..50 {
                    store.update_state("hot", &bump).unwrap();
                }
            });
        }
        scope.spawn(|| {
            for _ in 0..50 {
                let count = store.get_state("hot").unwrap().review_count;
                assert!(count <= 400);
                assert_eq!(store.review_pool(&[]).unwrap().len(), 2);
                store.put_state("cold", &reviewed(now(), count)).unwrap();
            }
        });
    });

    assert_eq!(store.get_state("hot").unwrap().review_count, 400);
    assert!(store.get_state("cold").unwrap().review_count <= 400);
}

fn states_kept_at_second_precision<S: Backend>(store: &S) {
    store.create_deck("Time").unwrap();
    store.add_or_update_card("Time", card("t1", "Time", "Epoch")).unwrap();

    let precise = ReviewState {
        last_review: Some(now() + Duration::milliseconds(250)),
        next_review: Some(now() + Duration::days(1) + Duration::milliseconds(999)),
        ..reviewed(now(), 1)
    };
    store.put_state("t1", &precise).unwrap();
    let stored = store.get_state("t1").unwrap();
    assert_eq!(stored, precise.at_second_precision());
    assert_eq!(stored.last_review, Some(now()));

    let epoch = ReviewState {
        last_review: Utc.timestamp_opt(0, 0).single(),
        next_review: Utc.timestamp_opt(86_400, 0).single(),
        review_count: 1,
        ..ReviewState::default()
    };
    store.put_state("t1", &epoch).unwrap();
    assert_eq!(store.get_state("t1").unwrap(), epoch);
}

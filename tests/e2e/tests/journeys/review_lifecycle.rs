//! Journey: a card from first sight through graduation, lapse and recovery
//!
//! Exercises the engine over an in-memory store and catalog, with explicit
//! review timestamps so every due date can be checked exactly.

use std::sync::Arc;

use cadence_core::prelude::*;
use cadence_core::ReviewStats;
use cadence_e2e_tests::harness::init_tracing;
use cadence_e2e_tests::mocks::CardFixtures;
use chrono::{DateTime, Duration, TimeZone, Utc};

type MemoryEngine = ReviewEngine<Arc<InMemoryStore>, Arc<InMemoryStore>>;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap()
}

fn engine(cards: &[&str]) -> MemoryEngine {
    engine_with(cards, SchedulerConfig::default())
}

fn engine_with(cards: &[&str], config: SchedulerConfig) -> MemoryEngine {
    init_tracing();
    let store = Arc::new(InMemoryStore::with_cards(cards.iter().copied()));
    ReviewEngine::new(config, Arc::clone(&store), store).expect("valid config")
}

#[test]
fn test_new_card_good_enters_first_learning_step() {
    let engine = engine(&["c1"]);
    let id = CardId::from("c1");

    let state = engine.review(&id, Rating::Good, t0()).unwrap();

    assert_eq!(state.state, LearningState::Learning { step: 1 });
    assert_eq!(state.due, t0() + Duration::minutes(1));
    assert_eq!(state.last_review, Some(t0()));
    assert_eq!(engine.store().get(&id).unwrap(), Some(state));
}

#[test]
fn test_full_lifecycle_graduation_lapse_recovery() {
    let engine = engine(&["c1"]);
    let id = CardId::from("c1");

    // Learning ladder: 1 min, then 10 min
    let s1 = engine.review(&id, Rating::Good, t0()).unwrap();
    let s2 = engine.review(&id, Rating::Good, s1.due).unwrap();
    assert_eq!(s2.state, LearningState::Learning { step: 2 });
    assert_eq!(s2.due, s1.due + Duration::minutes(10));

    // Graduation
    let s3 = engine.review(&id, Rating::Good, s2.due).unwrap();
    assert_eq!(s3.state, LearningState::Review);
    assert!(s3.due - s2.due >= Duration::days(1));

    // A few successful reviews grow the interval
    let s4 = engine.review(&id, Rating::Good, s3.due).unwrap();
    let s5 = engine.review(&id, Rating::Good, s4.due).unwrap();
    assert!(s5.stability > s4.stability);
    assert!(s5.due - s4.due > s4.due - s3.due);

    // Lapse
    let lapsed = engine.review(&id, Rating::Again, s5.due).unwrap();
    assert_eq!(lapsed.state, LearningState::Relearning { step: 1 });
    assert!(lapsed.stability < s5.stability);
    assert!(lapsed.difficulty > s5.difficulty);
    assert_eq!(lapsed.due, s5.due + Duration::minutes(10));

    // Recovery through the single relearning step
    let recovered = engine.review(&id, Rating::Good, lapsed.due).unwrap();
    assert_eq!(recovered.state, LearningState::Review);
    assert!(recovered.due - lapsed.due >= Duration::days(1));
}

#[test]
fn test_easy_review_after_nine_days_extends_interval() {
    let engine = engine(&["c1"]);
    let id = CardId::from("c1");
    let previous = CardFixtures::review("c1", 10.0, 5.0, 9, t0());
    let previous_interval = previous.due - previous.last_review.unwrap();
    engine.store().upsert(&id, &previous).unwrap();

    let state = engine.review(&id, Rating::Easy, t0()).unwrap();

    assert_eq!(state.state, LearningState::Review);
    assert!(state.stability > 10.0);
    assert!(state.due - t0() > previous_interval);
}

#[test]
fn test_lapse_from_review_enters_relearning() {
    let engine = engine(&["c1"]);
    let id = CardId::from("c1");
    engine
        .store()
        .upsert(&id, &CardFixtures::review("c1", 25.0, 6.0, 30, t0()))
        .unwrap();

    let state = engine.review(&id, Rating::Again, t0()).unwrap();
    assert_eq!(state.state, LearningState::Relearning { step: 1 });
    assert!(state.stability >= engine.scheduler().config().stability_floor);
}

#[test]
fn test_again_on_ladder_restarts_same_ladder() {
    let engine = engine(&["a", "b"]);
    let now = t0();

    let learning = CardFixtures::learning("a", 2, now);
    engine.store().upsert(&CardId::from("a"), &learning).unwrap();
    let state = engine.review(&CardId::from("a"), Rating::Again, now).unwrap();
    assert_eq!(state.state, LearningState::Learning { step: 1 });
    assert_eq!(state.stability, learning.stability);

    let relearning = CardFixtures::relearning("b", 1, now);
    engine.store().upsert(&CardId::from("b"), &relearning).unwrap();
    let state = engine.review(&CardId::from("b"), Rating::Again, now).unwrap();
    assert_eq!(state.state, LearningState::Relearning { step: 1 });
    assert_eq!(state.stability, relearning.stability);
}

#[test]
fn test_preview_matches_committed_review() {
    let engine = engine(&["c1"]);
    let id = CardId::from("c1");
    engine
        .store()
        .upsert(&id, &CardFixtures::review("c1", 6.0, 4.0, 6, t0()))
        .unwrap();

    let preview = engine.preview(&id, t0()).unwrap();
    assert!(preview.again.interval < preview.hard.interval);
    assert!(preview.hard.interval <= preview.good.interval);
    assert!(preview.good.interval <= preview.easy.interval);

    let committed = engine.review(&id, Rating::Good, t0()).unwrap();
    assert_eq!(committed, preview.good.state);
}

#[test]
fn test_retrievability_diagnostic_decays() {
    let engine = engine(&["c1"]);
    let id = CardId::from("c1");
    assert_eq!(engine.retrievability(&id, t0()).unwrap(), None);

    let state = engine.review(&id, Rating::Good, t0()).unwrap();
    let at_review = engine.retrievability(&id, t0()).unwrap().unwrap();
    let a_week_later = engine
        .retrievability(&id, t0() + Duration::days(7))
        .unwrap()
        .unwrap();

    assert_eq!(at_review, 1.0);
    assert!(a_week_later < at_review);
    assert!(state.stability > 0.0);
}

#[test]
fn test_submit_request_from_json() {
    let engine = engine(&["42"]);
    let request: ReviewRequest = serde_json::from_str(r#"{"cardId": "42", "rating": 4}"#).unwrap();

    let state = engine.submit(&request, t0()).unwrap();
    assert_eq!(state.card_id, CardId::from(42_i64));
    assert_eq!(state.state, LearningState::Learning { step: 1 });
}

#[test]
fn test_due_queue_pages_in_due_order() {
    let ids = ["a", "b", "c", "d", "e"];
    let engine = engine(&ids);

    for (i, id) in ids.iter().enumerate() {
        engine
            .review(&CardId::from(*id), Rating::Good, t0() + Duration::seconds(i as i64))
            .unwrap();
    }

    let later = t0() + Duration::hours(1);
    let first: Vec<String> = engine
        .due_cards(later, 2, 0)
        .unwrap()
        .into_iter()
        .map(|s| s.card_id.to_string())
        .collect();
    let second: Vec<String> = engine
        .due_cards(later, 2, 2)
        .unwrap()
        .into_iter()
        .map(|s| s.card_id.to_string())
        .collect();

    assert_eq!(first, vec!["a", "b"]);
    assert_eq!(second, vec!["c", "d"]);
    assert!(engine.due_cards(t0(), 10, 0).unwrap().is_empty());

    let stats: ReviewStats = engine.store().stats(later).unwrap();
    assert_eq!(stats.total_cards, 5);
    assert_eq!(stats.learning, 5);
    assert_eq!(stats.due_now, 5);
}

#[test]
fn test_custom_ladders_are_followed() {
    let config = SchedulerConfig {
        learning_steps: vec![5, 30, 120],
        relearning_steps: vec![15, 60],
        ..Default::default()
    };
    let engine = engine_with(&["c1"], config);
    let id = CardId::from("c1");

    let s1 = engine.review(&id, Rating::Hard, t0()).unwrap();
    assert_eq!(s1.due, t0() + Duration::minutes(5));
    let s2 = engine.review(&id, Rating::Hard, s1.due).unwrap();
    assert_eq!(s2.due, s1.due + Duration::minutes(30));
    let s3 = engine.review(&id, Rating::Good, s2.due).unwrap();
    assert_eq!(s3.state, LearningState::Learning { step: 3 });
    assert_eq!(s3.due, s2.due + Duration::minutes(120));
    let s4 = engine.review(&id, Rating::Good, s3.due).unwrap();
    assert_eq!(s4.state, LearningState::Review);

    let lapsed = engine.review(&id, Rating::Again, s4.due).unwrap();
    assert_eq!(lapsed.due, s4.due + Duration::minutes(15));
    let step2 = engine.review(&id, Rating::Good, lapsed.due).unwrap();
    assert_eq!(step2.state, LearningState::Relearning { step: 2 });
    assert_eq!(step2.due, lapsed.due + Duration::minutes(60));
}

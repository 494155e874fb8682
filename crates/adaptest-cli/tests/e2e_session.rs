//! End-to-end session tests: engine wired to the JSON bank and in-memory stores.

use std::collections::HashSet;
use std::sync::Arc;

use rand::SeedableRng;
use rand_pcg::Pcg64;

use adaptest_core::engine::{Collaborators, EngineConfig, NextQuestionRequest, SubmitRequest};
use adaptest_core::estimation::AbilityEstimator;
use adaptest_core::model::{AbilityKey, Observation, Response};
use adaptest_core::selection::ItemSelector;
use adaptest_core::traits::{AbilityStore, ItemPool};
use adaptest_core::{CatEngine, CatError, StoreError};
use adaptest_store::bank::parse_bank_str;
use adaptest_store::{InMemoryAbilityStore, InMemoryEventLog, InMemoryResultStore, JsonItemBank};

const FIVE_ITEM_BANK: &str = r#"[
  {"id": "q1", "question": "one", "options": ["a", "b"], "answer": "a",
   "param_a": 1.0, "param_b": -1.5, "param_c": 0.2},
  {"id": "q2", "question": "two", "options": ["a", "b"], "answer": "a",
   "param_a": 1.2, "param_b": -0.5, "param_c": 0.2},
  {"id": "q3", "question": "three", "options": ["a", "b"], "answer": "a",
   "param_a": 1.4, "param_b": 0.0, "param_c": 0.2},
  {"id": "q4", "question": "four", "options": ["a", "b"], "answer": "a",
   "param_a": 1.1, "param_b": 0.7, "param_c": 0.2},
  {"id": "q5", "question": "five", "options": ["a", "b"], "answer": "a",
   "param_a": 0.9, "param_b": 1.5, "param_c": 0.2},
  {"id": "draft", "question": "uncalibrated", "options": ["a", "b"], "answer": "a",
   "param_a": 2.5, "param_c": 0.2}
]"#;

struct Harness {
    engine: CatEngine,
    pool: Arc<JsonItemBank>,
    abilities: Arc<InMemoryAbilityStore>,
    events: Arc<InMemoryEventLog>,
    results: Arc<InMemoryResultStore>,
}

fn harness(seed: u64) -> Harness {
    let pool = Arc::new(JsonItemBank::from_banks([
        parse_bank_str(FIVE_ITEM_BANK, "quiz-1").unwrap()
    ]));
    let abilities = Arc::new(InMemoryAbilityStore::new());
    let events = Arc::new(InMemoryEventLog::new());
    let results = Arc::new(InMemoryResultStore::new());
    let collaborators = Collaborators {
        pool: pool.clone(),
        abilities: abilities.clone(),
        events: events.clone(),
        results: results.clone(),
    };
    let config = EngineConfig {
        seed: Some(seed),
        ..EngineConfig::default()
    };
    Harness {
        engine: CatEngine::new(collaborators, config),
        pool,
        abilities,
        events,
        results,
    }
}

fn next_request(answered: &[&str], responses: &[Response]) -> NextQuestionRequest {
    NextQuestionRequest {
        examinee_id: "ex-1".into(),
        course_id: "course-1".into(),
        assignment_id: "quiz-1".into(),
        answered_item_ids: answered.iter().map(|s| s.to_string()).collect(),
        responses: responses.to_vec(),
        current_theta: None,
    }
}

fn submit_request(answered: &[&str], responses: &[Response], alpha: f64) -> SubmitRequest {
    SubmitRequest {
        examinee_id: "ex-1".into(),
        course_id: "course-1".into(),
        assignment_id: "quiz-1".into(),
        answered_item_ids: answered.iter().map(|s| s.to_string()).collect(),
        responses: responses.to_vec(),
        smoothing_alpha: alpha,
    }
}

fn key() -> AbilityKey {
    AbilityKey::new("ex-1", "course-1")
}

#[tokio::test]
async fn five_item_session() {
    let h = harness(11);
    let mut answered: Vec<String> = Vec::new();
    let mut responses = Vec::new();

    for _ in 0..3 {
        let ids: Vec<&str> = answered.iter().map(String::as_str).collect();
        let next = h
            .engine
            .next_question(&next_request(&ids, &responses))
            .await
            .unwrap();
        assert!(!answered.contains(&next.item_id));
        answered.push(next.item_id);
        responses.push(Response::Correct);
    }

    let ids: Vec<&str> = answered.iter().map(String::as_str).collect();
    let fourth = h
        .engine
        .next_question(&next_request(&ids, &responses))
        .await
        .unwrap();
    let remaining: HashSet<&str> = ["q1", "q2", "q3", "q4", "q5"]
        .into_iter()
        .filter(|id| !ids.contains(id))
        .collect();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.contains(fourth.item_id.as_str()));

    let outcome = h
        .engine
        .submit(&submit_request(&ids, &responses, 0.2))
        .await
        .unwrap();

    // same estimator, run standalone over the same history
    let items = h.pool.items_for("quiz-1").await.unwrap();
    let history: Vec<Observation> = ids
        .iter()
        .map(|id| Observation {
            params: items.iter().find(|i| i.id == *id).unwrap().params,
            response: Response::Correct,
        })
        .collect();
    let standalone = AbilityEstimator::default().estimate(&history, 0.0);
    assert!((outcome.final_theta - standalone.theta).abs() < 1e-9);
    assert!((outcome.updated_stored_theta - outcome.final_theta * 0.2).abs() < 1e-9);
    assert_eq!(outcome.correct_count, 3);
    assert_eq!(outcome.total_count, 3);

    assert!((h.abilities.get(&key()).await.unwrap() - outcome.updated_stored_theta).abs() < 1e-12);
    let results = h.results.results().await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].theta_before, 0.0);
    // one event per request that carried responses
    assert_eq!(h.events.len().await, 3);
}

#[tokio::test]
async fn incomplete_item_is_never_served() {
    let h = harness(3);
    for _ in 0..200 {
        let next = h
            .engine
            .next_question(&next_request(&[], &[]))
            .await
            .unwrap();
        assert_ne!(next.item_id, "draft");
    }
}

#[tokio::test]
async fn submit_ignores_answers_outside_the_pool() {
    let h = harness(5);
    let outcome = h
        .engine
        .submit(&submit_request(
            &["q3", "draft"],
            &[Response::Correct, Response::Incorrect],
            0.2,
        ))
        .await
        .unwrap();
    assert_eq!(outcome.total_count, 1);
    assert_eq!(outcome.correct_count, 1);
}

#[tokio::test]
async fn rejected_requests_mutate_nothing() {
    let h = harness(5);

    let err = h
        .engine
        .submit(&submit_request(&["q1", "q2"], &[Response::Correct], 0.2))
        .await
        .unwrap_err();
    assert!(matches!(err, CatError::Validation(_)));

    let err = h
        .engine
        .submit(&submit_request(&["q1"], &[Response::Correct], -0.1))
        .await
        .unwrap_err();
    assert!(matches!(err, CatError::Validation(_)));

    let err = h
        .engine
        .next_question(&next_request(
            &["q1", "q2", "q3", "q4", "q5"],
            &[Response::Correct; 5],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, CatError::ExhaustedPool { .. }));
    assert!(err.is_client_error());

    assert!(h.abilities.snapshot().await.is_empty());
    assert_eq!(h.events.len().await, 0);
    assert!(h.results.results().await.is_empty());
}

#[tokio::test]
async fn failed_result_write_leaves_ability_unchanged() {
    let h = harness(4);
    h.abilities.compare_and_swap(&key(), None, 0.5).await.unwrap();
    h.results.set_unavailable(true);

    for _ in 0..2 {
        let err = h
            .engine
            .submit(&submit_request(&["q3"], &[Response::Correct], 0.2))
            .await
            .unwrap_err();
        assert!(matches!(err, CatError::Store(StoreError::Unavailable(_))));
    }

    // retried submissions must not blend twice
    assert_eq!(h.abilities.get(&key()).await.unwrap(), 0.5);
    assert!(h.results.results().await.is_empty());

    h.results.set_unavailable(false);
    let outcome = h
        .engine
        .submit(&submit_request(&["q3"], &[Response::Correct], 0.2))
        .await
        .unwrap();
    assert!((outcome.updated_stored_theta - (0.5 * 0.8 + 0.8 * 0.2)).abs() < 1e-12);
    assert_eq!(h.results.results().await[0].theta_before, 0.5);
}

#[tokio::test]
async fn answer_outside_the_pool_is_not_logged() {
    let h = harness(6);
    h.engine
        .next_question(&next_request(
            &["q1", "draft"],
            &[Response::Correct, Response::Incorrect],
        ))
        .await
        .unwrap();
    assert_eq!(h.events.len().await, 0);

    h.engine
        .next_question(&next_request(
            &["draft", "q1"],
            &[Response::Incorrect, Response::Correct],
        ))
        .await
        .unwrap();
    let events = h.events.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].item_id, "q1");
}

#[tokio::test]
async fn stored_ability_seeds_the_session() {
    let h = harness(9);
    h.abilities.compare_and_swap(&key(), None, 1.0).await.unwrap();

    let next = h
        .engine
        .next_question(&next_request(&["q1"], &[Response::Incorrect]))
        .await
        .unwrap();
    // short history: one bounded step down from the stored 1.0
    assert!((next.temp_theta - 0.7).abs() < 1e-12);

    let mut request = next_request(&["q1"], &[Response::Incorrect]);
    request.current_theta = Some(-1.0);
    let next = h.engine.next_question(&request).await.unwrap();
    assert!((next.temp_theta + 1.3).abs() < 1e-12);
}

#[tokio::test]
async fn store_outage_surfaces_as_store_error() {
    let h = harness(1);
    h.abilities.set_unavailable(true);
    let err = h
        .engine
        .next_question(&next_request(&[], &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, CatError::Store(StoreError::Unavailable(_))));
    assert!(!err.is_client_error());
}

#[tokio::test]
async fn concurrent_submissions_both_apply() {
    let h = Arc::new(harness(2));
    let mut handles = Vec::new();
    for _ in 0..2 {
        let h = Arc::clone(&h);
        handles.push(tokio::spawn(async move {
            h.engine
                .submit(&submit_request(&["q3"], &[Response::Correct], 0.5))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // 0.0 -> 0.15 -> 0.3, whichever order the submissions land in
    let stored = h.abilities.load(&key()).await.unwrap().unwrap();
    assert_eq!(stored.version, 2);
    let mut befores: Vec<f64> = h
        .results
        .results()
        .await
        .iter()
        .map(|r| r.theta_before)
        .collect();
    befores.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(befores[0], 0.0);
    assert!((befores[1] - 0.15).abs() < 1e-12);
    assert!((stored.theta - (0.15 * 0.5 + 0.45 * 0.5)).abs() < 1e-12);
}

#[test]
fn seeded_selection_is_reproducible() {
    let bank = parse_bank_str(FIVE_ITEM_BANK, "quiz-1").unwrap();
    let items = bank.eligible_items();
    let selector = ItemSelector::default();
    let answered = HashSet::new();

    let picks = |seed| {
        let mut rng = Pcg64::seed_from_u64(seed);
        (0..20)
            .map(|_| {
                selector
                    .select_next(&items, &answered, 0.0, &mut rng)
                    .unwrap()
                    .id
                    .clone()
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(picks(42), picks(42));
}

//! Trait contract tests for RecordStore.
//!
//! Every scenario runs against the in-memory fake and the in-memory SurrealDB
//! backend. Any conforming implementation must pass these.

use chrono::NaiveDate;
use fitcache_state::fakes::MemoryRecordStore;
use fitcache_state::storage_traits::*;
use fitcache_state::{RecordError, SurrealRecordStore};

// ===========================================================================
// Helpers
// ===========================================================================

fn hash(c: char) -> Fingerprint {
    Fingerprint::try_from(c.to_string().repeat(64)).expect("valid fingerprint")
}

fn new_model(c: char, params: serde_json::Value) -> NewModel {
    NewModel {
        model_hash: hash(c),
        model_type: "fitcache.linear.LogisticRegression".to_string(),
        model_parameters: params,
    }
}

fn importance(feature: &str, importance: f64) -> FeatureImportanceRow {
    FeatureImportanceRow {
        feature: feature.to_string(),
        importance,
    }
}

fn prediction(c: char, entity_id: i64, rank: u64) -> PredictionRow {
    PredictionRow {
        model_hash: hash(c),
        entity_id,
        as_of_date: NaiveDate::from_ymd_opt(2016, 1, 1).unwrap(),
        score: 1.0 / rank as f64,
        label: entity_id % 2 == 0,
        rank,
    }
}

async fn surreal() -> SurrealRecordStore {
    SurrealRecordStore::in_memory()
        .await
        .expect("in-memory surreal")
}

// ===========================================================================
// Scenarios
// ===========================================================================

async fn record_then_get_round_trip(store: &dyn RecordStore) {
    let recorded = store
        .record_model(
            new_model('a', serde_json::json!({"l2": 0.5})),
            vec![importance("age", 0.25), importance("visits", -1.5)],
        )
        .await
        .unwrap();

    let fetched = store.get_model(&recorded.model_id).await.unwrap();
    assert_eq!(fetched.model_hash, hash('a'));
    assert_eq!(fetched.model_parameters, serde_json::json!({"l2": 0.5}));

    let importances = store
        .get_feature_importances(&recorded.model_id)
        .await
        .unwrap();
    assert_eq!(
        importances,
        vec![importance("age", 0.25), importance("visits", -1.5)]
    );
}

async fn rerecord_same_hash_keeps_single_row(store: &dyn RecordStore) {
    let first = store
        .record_model(
            new_model('b', serde_json::json!({"max_iter": 10})),
            vec![importance("age", 1.0)],
        )
        .await
        .unwrap();
    let second = store
        .record_model(
            new_model('b', serde_json::json!({"max_iter": 10})),
            vec![importance("age", 2.0)],
        )
        .await
        .unwrap();

    assert_eq!(first.model_id, second.model_id);

    let found = store.find_model_by_hash(&hash('b')).await.unwrap().unwrap();
    assert_eq!(found.model_id, first.model_id);

    let importances = store.get_feature_importances(&first.model_id).await.unwrap();
    assert_eq!(importances, vec![importance("age", 2.0)]);
}

async fn get_model_not_found(store: &dyn RecordStore) {
    let err = store
        .get_model(&ModelId("missing".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, RecordError::ModelNotFound { .. }));
}

async fn find_missing_hash_is_none(store: &dyn RecordStore) {
    assert!(store.find_model_by_hash(&hash('f')).await.unwrap().is_none());
}

async fn predictions_come_back_in_rank_order(store: &dyn RecordStore) {
    store
        .write_predictions(vec![
            prediction('c', 30, 3),
            prediction('c', 10, 1),
            prediction('c', 20, 2),
        ])
        .await
        .unwrap();

    let rows = store.get_predictions(&hash('c')).await.unwrap();
    let entities: Vec<i64> = rows.iter().map(|r| r.entity_id).collect();
    assert_eq!(entities, vec![10, 20, 30]);
}

async fn duplicate_prediction_rejected(store: &dyn RecordStore) {
    store
        .write_predictions(vec![prediction('d', 1, 1)])
        .await
        .unwrap();
    let result = store.write_predictions(vec![prediction('d', 1, 1)]).await;
    assert!(result.is_err());

    let rows = store.get_predictions(&hash('d')).await.unwrap();
    assert_eq!(rows.len(), 1);
}

async fn experiment_save_is_idempotent(store: &dyn RecordStore) {
    let config = serde_json::json!({"one": "two"});
    let first = store
        .save_experiment(&hash('e'), config.clone())
        .await
        .unwrap();
    let second = store
        .save_experiment(&hash('e'), config.clone())
        .await
        .unwrap();

    assert_eq!(first.experiment_hash, second.experiment_hash);
    assert_eq!(first.created_at, second.created_at);

    let fetched = store.get_experiment(&hash('e')).await.unwrap().unwrap();
    assert_eq!(fetched.config, config);
}

// ===========================================================================
// MemoryRecordStore
// ===========================================================================

#[tokio::test]
async fn memory_record_then_get_round_trip() {
    record_then_get_round_trip(&MemoryRecordStore::new()).await;
}

#[tokio::test]
async fn memory_rerecord_same_hash_keeps_single_row() {
    let store = MemoryRecordStore::new();
    rerecord_same_hash_keeps_single_row(&store).await;
    assert_eq!(store.model_count(), 1);
}

#[tokio::test]
async fn memory_get_model_not_found() {
    get_model_not_found(&MemoryRecordStore::new()).await;
}

#[tokio::test]
async fn memory_find_missing_hash_is_none() {
    find_missing_hash_is_none(&MemoryRecordStore::new()).await;
}

#[tokio::test]
async fn memory_predictions_come_back_in_rank_order() {
    predictions_come_back_in_rank_order(&MemoryRecordStore::new()).await;
}

#[tokio::test]
async fn memory_duplicate_prediction_rejected() {
    duplicate_prediction_rejected(&MemoryRecordStore::new()).await;
}

#[tokio::test]
async fn memory_duplicate_within_batch_rejects_whole_batch() {
    let store = MemoryRecordStore::new();
    let err = store
        .write_predictions(vec![prediction('g', 5, 1), prediction('g', 5, 2)])
        .await
        .unwrap_err();
    assert!(matches!(err, RecordError::DuplicatePrediction { entity_id: 5, .. }));
    assert!(store.get_predictions(&hash('g')).await.unwrap().is_empty());
}

#[tokio::test]
async fn memory_experiment_save_is_idempotent() {
    experiment_save_is_idempotent(&MemoryRecordStore::new()).await;
}

// ===========================================================================
// SurrealRecordStore
// ===========================================================================

#[tokio::test]
async fn surreal_record_then_get_round_trip() {
    record_then_get_round_trip(&surreal().await).await;
}

#[tokio::test]
async fn surreal_rerecord_same_hash_keeps_single_row() {
    rerecord_same_hash_keeps_single_row(&surreal().await).await;
}

#[tokio::test]
async fn surreal_get_model_not_found() {
    get_model_not_found(&surreal().await).await;
}

#[tokio::test]
async fn surreal_find_missing_hash_is_none() {
    find_missing_hash_is_none(&surreal().await).await;
}

#[tokio::test]
async fn surreal_predictions_come_back_in_rank_order() {
    predictions_come_back_in_rank_order(&surreal().await).await;
}

#[tokio::test]
async fn surreal_duplicate_prediction_rejected() {
    duplicate_prediction_rejected(&surreal().await).await;
}

#[tokio::test]
async fn surreal_experiment_save_is_idempotent() {
    experiment_save_is_idempotent(&surreal().await).await;
}

//! Observability tests for the grid training lifecycle.
//!
//! These tests verify that structured tracing events are emitted for the
//! cache decisions a run makes: training, skipped, recorded and failed.

use std::sync::Arc;

use fitcache_core::obs::{
    emit_failed, emit_predictions_written, emit_recorded, emit_skipped, emit_training,
    grid_point_span,
};
use fitcache_core::{
    FeatureMatrix, GridSpec, MatrixStore, MemoryObjectClient, ModelTrainer, ObjectArtifactStore,
};
use fitcache_state::fakes::MemoryRecordStore;
use serde_json::{json, Map};
use tracing_test::traced_test;

fn trainer() -> ModelTrainer {
    let matrix = FeatureMatrix::new(
        vec![1, 2, 3, 4],
        vec!["x".into(), "label".into()],
        vec![
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![3.0, 1.0],
            vec![4.0, 1.0],
        ],
    )
    .expect("matrix");
    let store = MatrixStore::in_memory(matrix, json!({ "label_name": "label", "end_time": "2016-01-01" }))
        .expect("matrix store");
    ModelTrainer::new(
        "demo",
        Arc::new(store),
        Arc::new(ObjectArtifactStore::new(MemoryObjectClient::new(), "demo")),
        Arc::new(MemoryRecordStore::new()),
    )
}

#[traced_test]
#[test]
fn test_emit_training_logs_parameters() {
    let mut params = Map::new();
    params.insert("min_samples_leaf".into(), json!(2));
    emit_training("fitcache.tree.DecisionStump", &params, "demo/trained_models/abc");

    assert!(logs_contain("grid_point.training"));
    assert!(logs_contain(r#"{"min_samples_leaf":2}"#));
}

#[traced_test]
#[test]
fn test_emit_skipped_logs_parameters_and_location() {
    let mut params = Map::new();
    params.insert("learning_rate".into(), json!(0.05));
    emit_skipped("fitcache.linear.LogisticRegression", &params, "demo/trained_models/abc");
    assert!(logs_contain("grid_point.skipped"));
    assert!(logs_contain(r#"{"learning_rate":0.05}"#));
    assert!(logs_contain("demo/trained_models/abc"));
}

#[traced_test]
#[test]
fn test_emit_recorded_and_predictions_written() {
    emit_recorded("model-1", 3, 12);
    emit_predictions_written("abcdef012345", "2016-01-01", 4);
    assert!(logs_contain("grid_point.recorded"));
    assert!(logs_contain("predictions.written"));
}

#[traced_test]
#[test]
fn test_emit_failed_logs_warning() {
    emit_failed("fitcache.linear.LogisticRegression", &Map::new(), &"diverged");
    assert!(logs_contain("WARN"));
    assert!(logs_contain("grid_point.failed"));
}

#[traced_test]
#[test]
fn test_grid_point_span_tags_events() {
    grid_point_span("fitcache.baseline.PriorRate", "abc123").in_scope(|| emit_recorded("model-2", 1, 1));
    assert!(logs_contain("fitcache.grid_point"));
    assert!(logs_contain("abc123"));
}

#[traced_test]
#[tokio::test]
async fn test_cache_hit_is_logged_on_second_run() {
    let trainer = trainer();
    let grid = GridSpec::from_value(json!({ "fitcache.baseline.PriorRate": {} })).expect("grid");

    trainer.train_models(&grid, false).await.expect("first run");
    assert!(logs_contain("grid_point.training"));
    assert!(logs_contain("grid_point.recorded"));
    assert!(!logs_contain("grid_point.skipped"));

    trainer.train_models(&grid, false).await.expect("second run");
    assert!(logs_contain("grid_point.skipped"));
}

#[traced_test]
#[tokio::test]
async fn test_every_point_event_carries_the_grid_point_span() {
    let trainer = trainer();
    let grid = GridSpec::from_value(json!({ "fitcache.linear.LogisticRegression": { "max_iter": [0, 5] } }))
        .expect("grid");

    trainer.train_models(&grid, false).await.expect("first run");
    trainer.train_models(&grid, false).await.expect("second run");

    logs_assert(|lines: &[&str]| {
        for event in [
            "grid_point.training",
            "grid_point.recorded",
            "grid_point.failed",
            "grid_point.skipped",
        ] {
            let tagged = lines
                .iter()
                .filter(|line| line.contains(event))
                .all(|line| line.contains("fitcache.grid_point{"));
            let seen = lines.iter().any(|line| line.contains(event));
            if !seen || !tagged {
                return Err(format!("{event} missing or outside the grid point span"));
            }
        }
        Ok(())
    });
}

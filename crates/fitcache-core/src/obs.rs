//! Structured observability hooks for the training and scoring lifecycle.
//!
//! This module provides:
//! - A grid-point-scoped tracing span via `grid_point_span`
//! - Emission functions for key events: training, skipped (cache hit),
//!   recorded, failed, predictions written
//!
//! Events are emitted at `info!` level (`warn!` for failures); filter with
//! `RUST_LOG` and switch to JSON lines with `--json`.

use serde_json::{Map, Value};
use tracing::{info, warn};

/// Span tagged with one grid point's identity.
///
/// Async steps attach it with `Instrument::instrument`; synchronous events
/// use `Span::in_scope`.
///
/// # Example
///
/// ```ignore
/// let span = grid_point_span("fitcache.tree.DecisionStump", fingerprint.short());
/// train(point).instrument(span).await
/// ```
pub fn grid_point_span(model_type: &str, model_hash: &str) -> tracing::Span {
    tracing::info_span!(
        "fitcache.grid_point",
        model_type = %model_type,
        model_hash = %model_hash,
    )
}

fn params_text(parameters: &Map<String, Value>) -> String {
    Value::Object(parameters.clone()).to_string()
}

/// Emit event: cache miss (or replace), training begins.
pub fn emit_training(model_type: &str, parameters: &Map<String, Value>, location: &str) {
    info!(
        event = "grid_point.training",
        model_type = %model_type,
        parameters = %params_text(parameters),
        location = %location,
    );
}

/// Emit event: artifact already stored, point skipped.
pub fn emit_skipped(model_type: &str, parameters: &Map<String, Value>, location: &str) {
    info!(
        event = "grid_point.skipped",
        model_type = %model_type,
        parameters = %params_text(parameters),
        location = %location,
    );
}

/// Emit event: model row recorded after its artifact was written.
pub fn emit_recorded(model_id: &str, importances: usize, duration_ms: u64) {
    info!(
        event = "grid_point.recorded",
        model_id = %model_id,
        importances = importances,
        duration_ms = duration_ms,
    );
}

/// Emit event: grid point failed; the run continues (warning level).
pub fn emit_failed(model_type: &str, parameters: &Map<String, Value>, error: &dyn std::fmt::Display) {
    warn!(
        event = "grid_point.failed",
        model_type = %model_type,
        parameters = %params_text(parameters),
        error = %error,
    );
}

/// Emit event: ranked predictions persisted.
pub fn emit_predictions_written(model_hash: &str, as_of_date: &str, rows: usize) {
    info!(
        event = "predictions.written",
        model_hash = %model_hash,
        as_of_date = %as_of_date,
        rows = rows,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_point_span_create() {
        let span = grid_point_span("fitcache.baseline.PriorRate", "abc123");
        span.in_scope(|| emit_recorded("model-1", 0, 1));
    }

    #[test]
    fn test_params_text_is_compact_json() {
        let mut params = Map::new();
        params.insert("max_iter".into(), Value::from(10));
        assert_eq!(params_text(&params), r#"{"max_iter":10}"#);
    }
}

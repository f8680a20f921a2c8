//! Scoring a recorded model against a matrix and persisting ranked predictions.

use std::sync::Arc;

use fitcache_state::{Fingerprint, ModelId, PredictionRow, RecordStore};
use tracing::debug;

use crate::domain::error::{FitcacheError, Result};
use crate::matrix::MatrixStore;
use crate::obs;
use crate::ranking;
use crate::store::{ArtifactStore, StoreError, StoredArtifact};

/// Generates predictions for recorded models and stores them ranked.
pub struct Predictor {
    artifact_store: Arc<dyn ArtifactStore>,
    record_store: Arc<dyn RecordStore>,
}

impl Predictor {
    pub fn new(artifact_store: Arc<dyn ArtifactStore>, record_store: Arc<dyn RecordStore>) -> Self {
        Self {
            artifact_store,
            record_store,
        }
    }

    async fn load_model(&self, model_id: &ModelId) -> Result<(Fingerprint, StoredArtifact)> {
        let record = self.record_store.get_model(model_id).await?;
        let artifact = self
            .artifact_store
            .load(&record.model_hash)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(location) => FitcacheError::StorageNotFound { location },
                other => FitcacheError::Storage(other.to_string()),
            })?;
        Ok((record.model_hash, artifact))
    }

    /// Score every entity of `matrix_store` with the model recorded as
    /// `model_id` and write one prediction row per entity, ranked with `seed`.
    ///
    /// Returns the scores in the matrix's row order. A model row whose
    /// artifact is missing yields [`FitcacheError::StorageNotFound`].
    pub async fn predict(
        &self,
        model_id: &ModelId,
        matrix_store: &MatrixStore,
        seed: u64,
    ) -> Result<Vec<f64>> {
        let (model_hash, artifact) = self.load_model(model_id).await?;
        let matrix = matrix_store.matrix();
        let scores = artifact.model.predict(matrix)?;
        let labels = matrix_store.labels();
        debug!(model_id = %model_id, rows = scores.len(), "scored matrix");

        let as_of_date = matrix_store.as_of_date();
        let rows: Vec<PredictionRow> = ranking::rank_order(&scores, seed)
            .into_iter()
            .enumerate()
            .map(|(position, i)| PredictionRow {
                model_hash: model_hash.clone(),
                entity_id: matrix.entity_ids[i],
                as_of_date,
                score: scores[i],
                label: labels[i],
                rank: position as u64 + 1,
            })
            .collect();
        let n_rows = rows.len();
        self.record_store.write_predictions(rows).await?;

        obs::emit_predictions_written(model_hash.short(), &as_of_date.to_string(), n_rows);
        Ok(scores)
    }
}

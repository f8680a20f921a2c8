//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryRecordStore`, which satisfies the `RecordStore` contract
//! without any external dependencies.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::RecordError;
use crate::storage_traits::*;

#[derive(Debug, Default)]
struct State {
    /// model_id -> model row
    models: HashMap<String, ModelRecord>,
    /// model_hash -> model_id
    by_hash: HashMap<String, String>,
    /// model_id -> importances
    importances: HashMap<String, Vec<FeatureImportanceRow>>,
    predictions: Vec<PredictionRow>,
    experiments: HashMap<String, ExperimentRecord>,
}

/// In-memory record store backed by a handful of `HashMap`s.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    state: Mutex<State>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of model rows currently held.
    pub fn model_count(&self) -> usize {
        self.state.lock().unwrap().models.len()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn record_model(
        &self,
        model: NewModel,
        importances: Vec<FeatureImportanceRow>,
    ) -> RecordResult<ModelRecord> {
        let mut state = self.state.lock().unwrap();
        let model_id = state
            .by_hash
            .get(model.model_hash.as_str())
            .cloned()
            .map(ModelId)
            .unwrap_or_default();

        let record = ModelRecord {
            model_id: model_id.clone(),
            model_hash: model.model_hash.clone(),
            model_type: model.model_type,
            model_parameters: model.model_parameters,
            run_time: Utc::now(),
        };
        state
            .by_hash
            .insert(model.model_hash.as_str().to_string(), model_id.0.clone());
        state.models.insert(model_id.0.clone(), record.clone());
        state.importances.insert(model_id.0, importances);
        Ok(record)
    }

    async fn get_model(&self, model_id: &ModelId) -> RecordResult<ModelRecord> {
        let state = self.state.lock().unwrap();
        state
            .models
            .get(&model_id.0)
            .cloned()
            .ok_or_else(|| RecordError::ModelNotFound {
                model_id: model_id.0.clone(),
            })
    }

    async fn find_model_by_hash(
        &self,
        model_hash: &Fingerprint,
    ) -> RecordResult<Option<ModelRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .by_hash
            .get(model_hash.as_str())
            .and_then(|id| state.models.get(id))
            .cloned())
    }

    async fn get_feature_importances(
        &self,
        model_id: &ModelId,
    ) -> RecordResult<Vec<FeatureImportanceRow>> {
        let state = self.state.lock().unwrap();
        if !state.models.contains_key(&model_id.0) {
            return Err(RecordError::ModelNotFound {
                model_id: model_id.0.clone(),
            });
        }
        Ok(state
            .importances
            .get(&model_id.0)
            .cloned()
            .unwrap_or_default())
    }

    async fn write_predictions(&self, rows: Vec<PredictionRow>) -> RecordResult<()> {
        let mut state = self.state.lock().unwrap();

        // Validate the whole batch before touching state so the write is atomic.
        let mut seen: HashSet<(String, i64, chrono::NaiveDate)> = state
            .predictions
            .iter()
            .map(|p| (p.model_hash.as_str().to_string(), p.entity_id, p.as_of_date))
            .collect();
        for row in &rows {
            let key = (
                row.model_hash.as_str().to_string(),
                row.entity_id,
                row.as_of_date,
            );
            if !seen.insert(key) {
                return Err(RecordError::DuplicatePrediction {
                    model_hash: row.model_hash.as_str().to_string(),
                    entity_id: row.entity_id,
                    as_of_date: row.as_of_date.to_string(),
                });
            }
        }

        state.predictions.extend(rows);
        Ok(())
    }

    async fn get_predictions(&self, model_hash: &Fingerprint) -> RecordResult<Vec<PredictionRow>> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<PredictionRow> = state
            .predictions
            .iter()
            .filter(|p| &p.model_hash == model_hash)
            .cloned()
            .collect();
        rows.sort_by_key(|p| (p.as_of_date, p.rank));
        Ok(rows)
    }

    async fn save_experiment(
        &self,
        experiment_hash: &Fingerprint,
        config: serde_json::Value,
    ) -> RecordResult<ExperimentRecord> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .experiments
            .entry(experiment_hash.as_str().to_string())
            .or_insert_with(|| ExperimentRecord {
                experiment_hash: experiment_hash.clone(),
                config,
                created_at: Utc::now(),
            });
        Ok(record.clone())
    }

    async fn get_experiment(
        &self,
        experiment_hash: &Fingerprint,
    ) -> RecordResult<Option<ExperimentRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state.experiments.get(experiment_hash.as_str()).cloned())
    }
}

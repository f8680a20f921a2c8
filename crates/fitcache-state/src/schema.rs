//! Row definitions for the fitcache SurrealDB tables
//!
//! Tables:
//! - models: one row per trained artifact identity
//! - feature_importances: per-feature importance of a model
//! - predictions: ranked scores per entity and as-of date
//! - experiments: saved experiment configs keyed by hash
//!
//! Rows hold plain strings for identities; conversion to the validated
//! `storage_traits` types happens at the boundary.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;
use crate::storage_traits::{
    ExperimentRecord, FeatureImportanceRow, Fingerprint, ModelId, ModelRecord, PredictionRow,
    RecordResult,
};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Row of the `models` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRow {
    pub model_id: String,
    pub model_hash: String,
    pub model_type: String,
    pub model_parameters: serde_json::Value,
    #[serde(with = "surreal_datetime")]
    pub run_time: DateTime<Utc>,
}

impl ModelRow {
    pub fn into_record(self) -> RecordResult<ModelRecord> {
        Ok(ModelRecord {
            model_id: ModelId(self.model_id),
            model_hash: Fingerprint::try_from(self.model_hash)?,
            model_type: self.model_type,
            model_parameters: self.model_parameters,
            run_time: self.run_time,
        })
    }
}

/// Row of the `feature_importances` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportanceDbRow {
    pub model_id: String,
    /// Position of the feature in the model's feature order
    pub position: u64,
    pub feature: String,
    pub importance: f64,
}

impl FeatureImportanceDbRow {
    pub fn new(model_id: &ModelId, position: usize, row: FeatureImportanceRow) -> Self {
        FeatureImportanceDbRow {
            model_id: model_id.0.clone(),
            position: position as u64,
            feature: row.feature,
            importance: row.importance,
        }
    }

    pub fn into_row(self) -> FeatureImportanceRow {
        FeatureImportanceRow {
            feature: self.feature,
            importance: self.importance,
        }
    }
}

/// Row of the `predictions` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionDbRow {
    pub model_hash: String,
    pub entity_id: i64,
    /// `YYYY-MM-DD`
    pub as_of_date: String,
    pub score: f64,
    pub label: bool,
    /// 1-based rank within the scoring run
    pub ordinal: u64,
}

impl From<PredictionRow> for PredictionDbRow {
    fn from(row: PredictionRow) -> Self {
        PredictionDbRow {
            model_hash: row.model_hash.into(),
            entity_id: row.entity_id,
            as_of_date: row.as_of_date.format("%Y-%m-%d").to_string(),
            score: row.score,
            label: row.label,
            ordinal: row.rank,
        }
    }
}

impl PredictionDbRow {
    pub fn into_row(self) -> RecordResult<PredictionRow> {
        let as_of_date = NaiveDate::parse_from_str(&self.as_of_date, "%Y-%m-%d")
            .map_err(|e| RecordError::Backend(format!("bad as_of_date {}: {e}", self.as_of_date)))?;
        Ok(PredictionRow {
            model_hash: Fingerprint::try_from(self.model_hash)?,
            entity_id: self.entity_id,
            as_of_date,
            score: self.score,
            label: self.label,
            rank: self.ordinal,
        })
    }
}

/// Row of the `experiments` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentRow {
    pub experiment_hash: String,
    pub config: serde_json::Value,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ExperimentRow {
    pub fn into_record(self) -> RecordResult<ExperimentRecord> {
        Ok(ExperimentRecord {
            experiment_hash: Fingerprint::try_from(self.experiment_hash)?,
            config: self.config,
            created_at: self.created_at,
        })
    }
}

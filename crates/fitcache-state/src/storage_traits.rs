//! Storage trait definitions for fitcache
//!
//! - `Fingerprint`: validated hex identity shared by artifacts and records
//! - `RecordStore`: model, feature-importance, prediction and experiment rows
//!
//! The trait is async and backend-agnostic. An in-memory fake is provided for
//! testing via the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// Result type for record store operations
pub type RecordResult<T> = std::result::Result<T, RecordError>;

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// Deterministic identity of a configuration (lowercase hex digest).
///
/// The inner field is private so the string is always lowercase hex, either
/// produced by `from_digest` or validated via `TryFrom<String>` (64 chars for
/// SHA-256, 128 for SHA-512).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Build a fingerprint from raw digest bytes.
    pub fn from_digest(bytes: &[u8]) -> Self {
        Fingerprint(hex::encode(bytes))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = RecordError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        let valid_len = s.len() == 64 || s.len() == 128;
        if !valid_len || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RecordError::InvalidFingerprint { value: s });
        }
        Ok(Fingerprint(s.to_ascii_lowercase()))
    }
}

impl From<Fingerprint> for String {
    fn from(f: Fingerprint) -> Self {
        f.0
    }
}

impl std::str::FromStr for Fingerprint {
    type Err = RecordError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Fingerprint::try_from(s.to_string())
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Record rows
// ---------------------------------------------------------------------------

/// Database identifier of a recorded model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelId(pub String);

impl ModelId {
    /// Generate a new random ModelId
    pub fn new() -> Self {
        ModelId(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for ModelId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A model about to be recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewModel {
    /// Artifact identity
    pub model_hash: Fingerprint,
    /// Model family identifier (e.g. "fitcache.linear.LogisticRegression")
    pub model_type: String,
    /// Concrete hyperparameters
    pub model_parameters: serde_json::Value,
}

/// A recorded model row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub model_id: ModelId,
    pub model_hash: Fingerprint,
    pub model_type: String,
    pub model_parameters: serde_json::Value,
    pub run_time: DateTime<Utc>,
}

/// Importance of one feature for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportanceRow {
    pub feature: String,
    pub importance: f64,
}

/// One scored entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    /// Identity of the artifact that produced the score
    pub model_hash: Fingerprint,
    pub entity_id: i64,
    pub as_of_date: NaiveDate,
    pub score: f64,
    pub label: bool,
    /// 1-based position in the ranked prediction set
    pub rank: u64,
}

/// A saved experiment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub experiment_hash: Fingerprint,
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

/// Persistence of training and scoring results.
///
/// Guarantees:
/// - At most one model row per `model_hash`. Recording an existing hash
///   replaces its parameters, run time and importances but keeps its id.
/// - `record_model` and `write_predictions` are atomic per call.
/// - `(model_hash, as_of_date, entity_id)` is unique across prediction rows.
/// - `save_experiment` is idempotent per hash.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Record a trained model together with its feature importances.
    async fn record_model(
        &self,
        model: NewModel,
        importances: Vec<FeatureImportanceRow>,
    ) -> RecordResult<ModelRecord>;

    /// Fetch a model row by id. Returns `RecordError::ModelNotFound` if absent.
    async fn get_model(&self, model_id: &ModelId) -> RecordResult<ModelRecord>;

    /// Look up the model row for an artifact identity, if any.
    async fn find_model_by_hash(&self, model_hash: &Fingerprint)
        -> RecordResult<Option<ModelRecord>>;

    /// Feature importances of a model, in recorded order.
    async fn get_feature_importances(
        &self,
        model_id: &ModelId,
    ) -> RecordResult<Vec<FeatureImportanceRow>>;

    /// Persist a batch of prediction rows.
    async fn write_predictions(&self, rows: Vec<PredictionRow>) -> RecordResult<()>;

    /// Predictions of a model, ordered by as-of date then rank.
    async fn get_predictions(&self, model_hash: &Fingerprint) -> RecordResult<Vec<PredictionRow>>;

    /// Store an experiment config under its hash, returning the stored row.
    async fn save_experiment(
        &self,
        experiment_hash: &Fingerprint,
        config: serde_json::Value,
    ) -> RecordResult<ExperimentRecord>;

    /// Fetch a saved experiment, if any.
    async fn get_experiment(
        &self,
        experiment_hash: &Fingerprint,
    ) -> RecordResult<Option<ExperimentRecord>>;
}

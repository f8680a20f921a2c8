//! SurrealDB-backed RecordStore implementation
//!
//! Uses the `schema` row types for persistence, converting to/from
//! `storage_traits` types at the boundary.

use async_trait::async_trait;
use chrono::Utc;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::{RecordError, StateError};
use crate::migrations;
use crate::schema::{ExperimentRow, FeatureImportanceDbRow, ModelRow, PredictionDbRow};
use crate::storage_traits::{
    ExperimentRecord, FeatureImportanceRow, Fingerprint, ModelId, ModelRecord, NewModel,
    PredictionRow, RecordResult, RecordStore,
};

const NAMESPACE: &str = "fitcache";
const DATABASE: &str = "main";
const DEFAULT_LOCAL_PATH: &str = ".fitcache/db";

const MODEL_FIELDS: &str = "model_id, model_hash, model_type, model_parameters, run_time";

/// SurrealDB-backed implementation of [`RecordStore`].
pub struct SurrealRecordStore {
    db: Surreal<Any>,
}

impl SurrealRecordStore {
    /// Create an in-memory instance for testing.
    ///
    /// Connects to `mem://`, selects `fitcache/main`, and runs `init_schema`.
    pub async fn in_memory() -> crate::Result<Self> {
        let store = Self::connect("mem://").await?;
        info!("SurrealRecordStore connected (in-memory)");
        Ok(store)
    }

    /// Connect to any SurrealDB endpoint (`mem://`, `surrealkv://path`, `ws://host`).
    pub async fn connect(url: &str) -> crate::Result<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::init_schema(&db)
            .await
            .map_err(|e| StateError::SchemaSetup(e.to_string()))?;
        Ok(Self { db })
    }

    /// Create from environment variables.
    ///
    /// Uses `SURREALDB_URL` when set, otherwise local persistence under
    /// `.fitcache/db`.
    pub async fn from_env() -> crate::Result<Self> {
        if let Ok(url) = std::env::var("SURREALDB_URL") {
            let store = Self::connect(&url).await?;
            info!("SurrealRecordStore connected ({})", url);
            return Ok(store);
        }

        std::fs::create_dir_all(DEFAULT_LOCAL_PATH).map_err(|e| {
            StateError::Connection(format!(
                "Failed to create database directory {}: {}",
                DEFAULT_LOCAL_PATH, e
            ))
        })?;
        let url = format!("surrealkv://{}", DEFAULT_LOCAL_PATH);
        info!("No SURREALDB_URL found, using local persistence: {}", url);
        Self::connect(&url).await
    }

    // -- private helpers -----------------------------------------------------

    async fn fetch_model_by_hash(&self, model_hash: &str) -> RecordResult<Option<ModelRow>> {
        let hash_owned = model_hash.to_string();
        let mut res = self
            .db
            .query(format!(
                "SELECT {MODEL_FIELDS} FROM models WHERE model_hash = $hash"
            ))
            .bind(("hash", hash_owned))
            .await?;

        let rows: Vec<ModelRow> = res.take(0)?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl RecordStore for SurrealRecordStore {
    async fn record_model(
        &self,
        model: NewModel,
        importances: Vec<FeatureImportanceRow>,
    ) -> RecordResult<ModelRecord> {
        let existing = self.fetch_model_by_hash(model.model_hash.as_str()).await?;
        let model_id = existing
            .map(|row| ModelId(row.model_id))
            .unwrap_or_default();

        let row = ModelRow {
            model_id: model_id.0.clone(),
            model_hash: model.model_hash.as_str().to_string(),
            model_type: model.model_type,
            model_parameters: model.model_parameters,
            run_time: Utc::now(),
        };
        let importance_rows: Vec<FeatureImportanceDbRow> = importances
            .into_iter()
            .enumerate()
            .map(|(i, r)| FeatureImportanceDbRow::new(&model_id, i, r))
            .collect();

        debug!(model_hash = %model.model_hash.short(), model_id = %model_id, "recording model");

        let mut sql = String::from(
            "BEGIN TRANSACTION;
             DELETE models WHERE model_hash = $hash;
             DELETE feature_importances WHERE model_id = $mid;
             CREATE models CONTENT $model;",
        );
        if !importance_rows.is_empty() {
            sql.push_str("\n             INSERT INTO feature_importances $importances;");
        }
        sql.push_str("\n             COMMIT TRANSACTION;");

        self.db
            .query(sql)
            .bind(("hash", row.model_hash.clone()))
            .bind(("mid", model_id.0.clone()))
            .bind(("model", row.clone()))
            .bind(("importances", importance_rows))
            .await?
            .check()?;

        row.into_record()
    }

    async fn get_model(&self, model_id: &ModelId) -> RecordResult<ModelRecord> {
        let mid_owned = model_id.0.clone();
        let mut res = self
            .db
            .query(format!("SELECT {MODEL_FIELDS} FROM models WHERE model_id = $mid"))
            .bind(("mid", mid_owned))
            .await?;

        let rows: Vec<ModelRow> = res.take(0)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RecordError::ModelNotFound {
                model_id: model_id.0.clone(),
            })?
            .into_record()
    }

    async fn find_model_by_hash(
        &self,
        model_hash: &Fingerprint,
    ) -> RecordResult<Option<ModelRecord>> {
        self.fetch_model_by_hash(model_hash.as_str())
            .await?
            .map(ModelRow::into_record)
            .transpose()
    }

    async fn get_feature_importances(
        &self,
        model_id: &ModelId,
    ) -> RecordResult<Vec<FeatureImportanceRow>> {
        // Verify model exists
        self.get_model(model_id).await?;

        let mid_owned = model_id.0.clone();
        let mut res = self
            .db
            .query(
                "SELECT model_id, position, feature, importance FROM feature_importances \
                 WHERE model_id = $mid ORDER BY position ASC",
            )
            .bind(("mid", mid_owned))
            .await?;

        let rows: Vec<FeatureImportanceDbRow> = res.take(0)?;
        Ok(rows.into_iter().map(FeatureImportanceDbRow::into_row).collect())
    }

    async fn write_predictions(&self, rows: Vec<PredictionRow>) -> RecordResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let db_rows: Vec<PredictionDbRow> = rows.into_iter().map(PredictionDbRow::from).collect();
        debug!(rows = db_rows.len(), "writing predictions");

        self.db
            .query(
                "BEGIN TRANSACTION;
                 INSERT INTO predictions $rows;
                 COMMIT TRANSACTION;",
            )
            .bind(("rows", db_rows))
            .await?
            .check()?;
        Ok(())
    }

    async fn get_predictions(&self, model_hash: &Fingerprint) -> RecordResult<Vec<PredictionRow>> {
        let hash_owned = model_hash.as_str().to_string();
        let mut res = self
            .db
            .query(
                "SELECT model_hash, entity_id, as_of_date, score, label, ordinal FROM predictions \
                 WHERE model_hash = $hash ORDER BY as_of_date ASC, ordinal ASC",
            )
            .bind(("hash", hash_owned))
            .await?;

        let rows: Vec<PredictionDbRow> = res.take(0)?;
        rows.into_iter().map(PredictionDbRow::into_row).collect()
    }

    async fn save_experiment(
        &self,
        experiment_hash: &Fingerprint,
        config: serde_json::Value,
    ) -> RecordResult<ExperimentRecord> {
        if let Some(existing) = self.get_experiment(experiment_hash).await? {
            return Ok(existing);
        }

        let row = ExperimentRow {
            experiment_hash: experiment_hash.as_str().to_string(),
            config,
            created_at: Utc::now(),
        };
        let _created: Option<ExperimentRow> = self
            .db
            .create("experiments")
            .content(row.clone())
            .await?;

        row.into_record()
    }

    async fn get_experiment(
        &self,
        experiment_hash: &Fingerprint,
    ) -> RecordResult<Option<ExperimentRecord>> {
        let hash_owned = experiment_hash.as_str().to_string();
        let mut res = self
            .db
            .query(
                "SELECT experiment_hash, config, created_at FROM experiments \
                 WHERE experiment_hash = $hash",
            )
            .bind(("hash", hash_owned))
            .await?;

        let rows: Vec<ExperimentRow> = res.take(0)?;
        rows.into_iter()
            .next()
            .map(ExperimentRow::into_record)
            .transpose()
    }
}

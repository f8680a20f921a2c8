//! Cache-or-train orchestration over a hyperparameter grid.
//!
//! Every grid point is fingerprinted together with the project path and the
//! training matrix's metadata. A point whose artifact is already stored is
//! skipped; otherwise it is fitted, written to the artifact store and then
//! recorded, in that order. Fit and write failures are collected per point;
//! configuration, lookup and record-store failures abort the run.

use std::sync::Arc;
use std::time::Instant;

use fitcache_state::{Fingerprint, ModelRecord, NewModel, RecordStore};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::Instrument;

use crate::domain::digest::Fingerprinter;
use crate::domain::error::{FitcacheError, Result};
use crate::domain::grid::{GridPoint, GridSpec};
use crate::matrix::MatrixStore;
use crate::model::ModelCatalog;
use crate::obs;
use crate::store::{ArtifactStore, StoreError, StoredArtifact};

/// Everything that makes two trained models interchangeable.
#[derive(Serialize)]
struct ModelIdentity<'a> {
    model_type: &'a str,
    parameters: &'a Map<String, Value>,
    project_path: &'a str,
    training_metadata: &'a Map<String, Value>,
}

/// A grid point that could not be trained.
#[derive(Debug)]
pub struct GridPointFailure {
    pub model_type: String,
    pub parameters: Map<String, Value>,
    pub error: FitcacheError,
}

/// Outcome of one [`ModelTrainer::train_models`] call.
#[derive(Debug, Default)]
pub struct TrainReport {
    /// Identities trained (and recorded) by this call, in grid order.
    pub trained: Vec<Fingerprint>,
    /// Model rows recorded for `trained`, same order.
    pub records: Vec<ModelRecord>,
    /// Identities already in the artifact store.
    pub skipped: Vec<Fingerprint>,
    pub failures: Vec<GridPointFailure>,
}

impl TrainReport {
    /// Trained and skipped identities together.
    pub fn identities(&self) -> impl Iterator<Item = &Fingerprint> {
        self.trained.iter().chain(&self.skipped)
    }
}

/// Trains every point of a grid against one matrix, reusing cached artifacts.
pub struct ModelTrainer {
    project_path: String,
    matrix_store: Arc<MatrixStore>,
    artifact_store: Arc<dyn ArtifactStore>,
    record_store: Arc<dyn RecordStore>,
    catalog: ModelCatalog,
    fingerprinter: Fingerprinter,
}

impl ModelTrainer {
    pub fn new(
        project_path: impl Into<String>,
        matrix_store: Arc<MatrixStore>,
        artifact_store: Arc<dyn ArtifactStore>,
        record_store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            project_path: project_path.into(),
            matrix_store,
            artifact_store,
            record_store,
            catalog: ModelCatalog::builtin(),
            fingerprinter: Fingerprinter::default(),
        }
    }

    pub fn with_catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_fingerprinter(mut self, fingerprinter: Fingerprinter) -> Self {
        self.fingerprinter = fingerprinter;
        self
    }

    /// Identity of the model `point` would produce on this trainer's matrix.
    pub fn model_hash(&self, point: &GridPoint) -> Result<Fingerprint> {
        self.fingerprinter.fingerprint(&ModelIdentity {
            model_type: &point.model_type,
            parameters: &point.parameters,
            project_path: &self.project_path,
            training_metadata: self.matrix_store.metadata(),
        })
    }

    /// Train and store every configuration in `grid`.
    ///
    /// With `replace == false` a point whose artifact already exists is
    /// skipped without re-recording; with `replace == true` every point is
    /// retrained and its record replaced.
    pub async fn train_models(&self, grid: &GridSpec, replace: bool) -> Result<TrainReport> {
        for model_type in grid.model_types() {
            self.catalog.resolve(model_type)?;
        }

        let mut report = TrainReport::default();
        for point in grid.expand() {
            let model_hash = self.model_hash(&point)?;
            let location = self.artifact_store.locate(&model_hash);
            let span = obs::grid_point_span(&point.model_type, model_hash.short());

            if !replace
                && self
                    .artifact_store
                    .exists(&model_hash)
                    .instrument(span.clone())
                    .await
                    .map_err(storage_err)?
            {
                span.in_scope(|| obs::emit_skipped(&point.model_type, &point.parameters, &location));
                report.skipped.push(model_hash);
                continue;
            }

            span.in_scope(|| obs::emit_training(&point.model_type, &point.parameters, &location));
            match self
                .train_and_store(&point, &model_hash)
                .instrument(span.clone())
                .await
            {
                Ok(record) => {
                    report.trained.push(model_hash);
                    report.records.push(record);
                }
                Err(e) if e.is_point_local() => {
                    span.in_scope(|| obs::emit_failed(&point.model_type, &point.parameters, &e));
                    report.failures.push(GridPointFailure {
                        model_type: point.model_type,
                        parameters: point.parameters,
                        error: e,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    async fn train_and_store(
        &self,
        point: &GridPoint,
        model_hash: &Fingerprint,
    ) -> Result<ModelRecord> {
        let started = Instant::now();
        let family = self.catalog.resolve(&point.model_type)?;

        let fitted = family
            .fit(
                self.matrix_store.matrix(),
                self.matrix_store.labels(),
                &point.parameters,
            )
            .map_err(|e| FitcacheError::Fit {
                model_type: point.model_type.clone(),
                parameters: Value::Object(point.parameters.clone()),
                reason: e.to_string(),
            })?;

        let artifact = StoredArtifact {
            model_type: point.model_type.clone(),
            model: fitted,
        };
        self.artifact_store
            .write(model_hash, &artifact)
            .await
            .map_err(|e| match e {
                StoreError::Write { location, reason } => {
                    FitcacheError::StorageWrite { location, reason }
                }
                other => FitcacheError::StorageWrite {
                    location: self.artifact_store.locate(model_hash),
                    reason: other.to_string(),
                },
            })?;

        let importances = artifact
            .model
            .feature_importances()
            .into_rows(artifact.feature_names());
        let n_importances = importances.len();
        let record = self
            .record_store
            .record_model(
                NewModel {
                    model_hash: model_hash.clone(),
                    model_type: point.model_type.clone(),
                    model_parameters: Value::Object(point.parameters.clone()),
                },
                importances,
            )
            .await?;

        obs::emit_recorded(
            &record.model_id.0,
            n_importances,
            started.elapsed().as_millis() as u64,
        );
        Ok(record)
    }
}

/// A failed lookup leaves the cache decision unknown: fatal for the run.
fn storage_err(e: StoreError) -> FitcacheError {
    FitcacheError::Storage(e.to_string())
}

//! fitcache Core Library
//!
//! Reproducible training over a hyperparameter grid: every configuration is
//! fingerprinted, trained at most once per dataset, stored content-addressed,
//! and scored into a ranked prediction set with seeded tie-breaking.

pub mod domain;
pub mod experiment;
pub mod matrix;
pub mod model;
pub mod obs;
pub mod predictor;
pub mod ranking;
pub mod store;
pub mod telemetry;
pub mod trainer;

pub use domain::{
    canonical_json, fingerprint, DigestAlgorithm, Fingerprinter, FitcacheError, GridPoint,
    GridPoints, GridSpec, Result,
};

pub use experiment::{save_experiment_and_get_hash, save_experiment_with};
pub use matrix::{FeatureMatrix, MatrixStore};
pub use model::{
    DecisionStump, Estimator, FeatureImportances, FitError, FittedModel, LogisticRegression,
    ModelCatalog, ModelFamily, PriorRate,
};
pub use predictor::Predictor;
pub use ranking::{rank, rank_order};
pub use store::fs::FsArtifactStore;
pub use store::object::{
    HttpObjectClient, MemoryObjectClient, ObjectArtifactStore, ObjectClient, ObjectStoreConfig,
};
pub use store::{ArtifactStore, StoreError, StoredArtifact};
pub use telemetry::init_tracing;
pub use trainer::{GridPointFailure, ModelTrainer, TrainReport};

pub use fitcache_state::{Fingerprint, ModelId, RecordStore, SurrealRecordStore};

//! fitcache-state: record persistence for fitcache
//!
//! This crate owns every row the training pipeline writes outside of the
//! artifact store: model metadata, feature importances, ranked predictions
//! and saved experiment configs.
//!
//! ## Key Components
//!
//! - `Fingerprint`: validated hex identity shared with the artifact store
//! - `RecordStore`: backend-agnostic async trait
//! - `SurrealRecordStore`: SurrealDB implementation (in-memory, local or remote)
//! - `fakes::MemoryRecordStore`: in-memory implementation for tests

mod error;
pub mod fakes;
mod migrations;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{RecordError, StateError};
pub use storage_traits::{
    ExperimentRecord, FeatureImportanceRow, Fingerprint, ModelId, ModelRecord, NewModel,
    PredictionRow, RecordResult, RecordStore,
};
pub use surreal_store::SurrealRecordStore;

/// Result type for connection and schema setup
pub type Result<T> = std::result::Result<T, StateError>;

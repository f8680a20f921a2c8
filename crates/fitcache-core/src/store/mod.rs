//! Content-addressed artifact storage.
//!
//! Trained models are stored under their fingerprint. Two backends are
//! provided:
//! - [`fs::FsArtifactStore`]: `<project_path>/trained_models/<fingerprint>`
//! - [`object::ObjectArtifactStore`]: key `<prefix>/trained_models/<fingerprint>`
//!   on any [`object::ObjectClient`]

pub mod fs;
pub mod object;

use async_trait::async_trait;
use fitcache_state::Fingerprint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::FittedModel;

/// Directory (or key segment) that holds every artifact.
pub const TRAINED_MODELS_DIR: &str = "trained_models";

/// Errors from artifact store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("write to {location} failed: {reason}")]
    Write { location: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(String),

    #[error("artifact codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Http(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// What a store holds for one fingerprint: the fitted model and its family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArtifact {
    pub model_type: String,
    pub model: FittedModel,
}

impl StoredArtifact {
    /// Feature order the model was trained on.
    pub fn feature_names(&self) -> &[String] {
        &self.model.feature_names
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Fingerprint-keyed artifact store.
///
/// Artifacts are immutable once written; writing the same fingerprint again
/// replaces the whole artifact (last writer wins).
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Where `fingerprint` lives, for logs and diagnostics.
    fn locate(&self, fingerprint: &Fingerprint) -> String;

    /// Whether an artifact exists. Never mutates the store.
    async fn exists(&self, fingerprint: &Fingerprint) -> Result<bool>;

    /// Durably persist `artifact` under `fingerprint`.
    async fn write(&self, fingerprint: &Fingerprint, artifact: &StoredArtifact) -> Result<()>;

    /// Load the artifact; [`StoreError::NotFound`] if none was written.
    async fn load(&self, fingerprint: &Fingerprint) -> Result<StoredArtifact>;
}

//! Domain-level error taxonomy for fitcache.

use crate::store::StoreError;

/// fitcache domain errors.
///
/// `Fit` and `StorageWrite` only fail the grid point that raised them; every
/// other variant aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum FitcacheError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("fit failed for {model_type} with {parameters}: {reason}")]
    Fit {
        model_type: String,
        parameters: serde_json::Value,
        reason: String,
    },

    #[error("no artifact at {location}")]
    StorageNotFound { location: String },

    #[error("artifact write failed at {location}: {reason}")]
    StorageWrite { location: String, reason: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("record store error: {0}")]
    RecordStore(#[from] fitcache_state::RecordError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FitcacheError {
    /// Whether the error only invalidates the grid point that produced it.
    pub fn is_point_local(&self) -> bool {
        matches!(
            self,
            FitcacheError::Fit { .. } | FitcacheError::StorageWrite { .. }
        )
    }
}

impl From<StoreError> for FitcacheError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(location) => FitcacheError::StorageNotFound { location },
            StoreError::Write { location, reason } => {
                FitcacheError::StorageWrite { location, reason }
            }
            other => FitcacheError::Storage(other.to_string()),
        }
    }
}

/// Result type for fitcache domain operations.
pub type Result<T> = std::result::Result<T, FitcacheError>;

//! Domain models for fitcache.
//!
//! Canonical definitions for the pipeline's leaf components:
//! - `Fingerprinter`: configuration → stable identity
//! - `GridSpec`: validated hyperparameter grid with lazy expansion
//! - `FitcacheError`: error taxonomy shared by every stage

pub mod digest;
pub mod error;
pub mod grid;

// Re-export main types and errors
pub use digest::{canonical_json, fingerprint, DigestAlgorithm, Fingerprinter};
pub use error::{FitcacheError, Result};
pub use grid::{GridPoint, GridPoints, GridSpec};

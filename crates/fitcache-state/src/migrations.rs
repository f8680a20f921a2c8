//! SurrealDB schema migrations and initialization
//!
//! Sets up the record tables with their uniqueness constraints and indexes.

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all fitcache tables in SurrealDB
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing fitcache SurrealDB schema");

    init_models_table(db).await?;
    init_feature_importances_table(db).await?;
    init_predictions_table(db).await?;
    init_experiments_table(db).await?;

    info!("fitcache schema initialization complete");
    Ok(())
}

/// Initialize `models` table
///
/// Schema:
/// ```text
/// TABLE models {
///   model_id:          STRING (unique)
///   model_hash:        STRING (unique, artifact identity)
///   model_type:        STRING (indexed)
///   model_parameters:  OBJECT
///   run_time:          DATETIME
/// }
/// ```
///
/// Constraints:
/// - `model_hash` is unique: at most one authoritative row per identity
async fn init_models_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing models table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS models SCHEMALESS;

        DEFINE INDEX IF NOT EXISTS idx_model_id ON TABLE models COLUMNS model_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_model_hash ON TABLE models COLUMNS model_hash UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_model_type ON TABLE models COLUMNS model_type;
    "#;

    db.query(sql).await?.check()?;
    debug!("models table initialized");
    Ok(())
}

/// Initialize `feature_importances` table
///
/// Schema:
/// ```text
/// TABLE feature_importances {
///   model_id:    STRING (foreign key to models.model_id)
///   position:    INT (feature order within the model)
///   feature:     STRING
///   importance:  FLOAT
/// }
/// ```
async fn init_feature_importances_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing feature_importances table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS feature_importances SCHEMALESS;

        DEFINE INDEX IF NOT EXISTS idx_fi_model_feature ON TABLE feature_importances COLUMNS model_id, feature UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_fi_model_id ON TABLE feature_importances COLUMNS model_id;
    "#;

    db.query(sql).await?.check()?;
    debug!("feature_importances table initialized");
    Ok(())
}

/// Initialize `predictions` table
///
/// Schema:
/// ```text
/// TABLE predictions {
///   model_hash:  STRING (artifact identity)
///   entity_id:   INT
///   as_of_date:  STRING (YYYY-MM-DD)
///   score:       FLOAT
///   label:       BOOL
///   ordinal:     INT (1-based rank)
/// }
/// ```
///
/// Constraints:
/// - `(model_hash, as_of_date, entity_id)` is unique
async fn init_predictions_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing predictions table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS predictions SCHEMALESS;

        DEFINE INDEX IF NOT EXISTS idx_prediction_key ON TABLE predictions COLUMNS model_hash, as_of_date, entity_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_prediction_model ON TABLE predictions COLUMNS model_hash;
    "#;

    db.query(sql).await?.check()?;
    debug!("predictions table initialized");
    Ok(())
}

/// Initialize `experiments` table
async fn init_experiments_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing experiments table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS experiments SCHEMALESS;

        DEFINE INDEX IF NOT EXISTS idx_experiment_hash ON TABLE experiments COLUMNS experiment_hash UNIQUE;
    "#;

    db.query(sql).await?.check()?;
    debug!("experiments table initialized");
    Ok(())
}

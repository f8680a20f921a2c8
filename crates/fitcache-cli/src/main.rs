//! fitcache - reproducible model training cache CLI
//!
//! The `fitcache` command trains hyperparameter grids at most once per
//! dataset and scores recorded models into ranked prediction sets.
//!
//! ## Commands
//!
//! - `fingerprint`: Print the stable identity of a JSON config
//! - `expand`: List every configuration a grid expands to
//! - `save-experiment`: Store an experiment config under its hash
//! - `train`: Train every grid point whose artifact is not cached yet
//! - `predict`: Score a recorded model and store ranked predictions

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fitcache_core::{
    ArtifactStore, DigestAlgorithm, Fingerprinter, FsArtifactStore, GridSpec, MatrixStore,
    ModelTrainer, ObjectArtifactStore, ObjectStoreConfig, Predictor, TrainReport,
};
use fitcache_state::{Fingerprint, ModelId, ModelRecord, RecordStore, SurrealRecordStore};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "fitcache")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Reproducible model training cache", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Algorithm {
    Sha256,
    Sha512,
}

impl From<Algorithm> for DigestAlgorithm {
    fn from(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Sha256 => DigestAlgorithm::Sha256,
            Algorithm::Sha512 => DigestAlgorithm::Sha512,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the fingerprint of a JSON config file
    Fingerprint {
        /// Path to the config (JSON)
        path: PathBuf,

        /// Digest used for the fingerprint
        #[arg(long, value_enum, default_value_t = Algorithm::Sha256)]
        algorithm: Algorithm,
    },

    /// List every configuration a grid expands to, one JSON object per line
    Expand {
        /// Path to the grid (JSON)
        grid: PathBuf,
    },

    /// Save an experiment config and print its hash
    SaveExperiment {
        /// Path to the experiment config (JSON)
        config: PathBuf,
    },

    /// Train every grid point not already in the artifact store
    Train {
        /// Path to the grid (JSON)
        #[arg(long)]
        grid: PathBuf,

        /// Path to the feature matrix (JSON, label column included)
        #[arg(long)]
        matrix: PathBuf,

        /// Path to the matrix metadata (JSON)
        #[arg(long)]
        metadata: PathBuf,

        /// Project path; artifacts go to <project-path>/trained_models
        #[arg(long, env = "FITCACHE_PROJECT_PATH", default_value = ".")]
        project_path: String,

        /// Retrain and re-record points that are already cached
        #[arg(long)]
        replace: bool,

        /// Use the object store configured by FITCACHE_OBJECT_* instead of the filesystem
        #[arg(long)]
        object_store: bool,
    },

    /// Score a recorded model and store its ranked predictions
    Predict {
        /// Model id returned by `train`
        #[arg(long)]
        model_id: String,

        /// Path to the feature matrix (JSON, label column included)
        #[arg(long)]
        matrix: PathBuf,

        /// Path to the matrix metadata (JSON)
        #[arg(long)]
        metadata: PathBuf,

        /// Project path the model was trained under
        #[arg(long, env = "FITCACHE_PROJECT_PATH", default_value = ".")]
        project_path: String,

        /// Seed for breaking score ties
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Use the object store configured by FITCACHE_OBJECT_* instead of the filesystem
        #[arg(long)]
        object_store: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    fitcache_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Fingerprint { path, algorithm } => {
            cmd_fingerprint(&path, algorithm.into()).map(|_| ())
        }
        Commands::Expand { grid } => cmd_expand(&grid).map(|_| ()),
        Commands::SaveExperiment { config } => {
            let records = open_records().await?;
            cmd_save_experiment(&records, &config).await.map(|_| ())
        }
        Commands::Train {
            grid,
            matrix,
            metadata,
            project_path,
            replace,
            object_store,
        } => {
            let records = Arc::new(open_records().await?);
            let artifacts =
                open_artifacts(&project_path, object_store, ObjectStoreConfig::from_env())?;
            let outcome = cmd_train(
                records,
                artifacts,
                &grid,
                &matrix,
                &metadata,
                &project_path,
                replace,
            )
            .await?;
            if !outcome.report.failures.is_empty() {
                bail!("{} grid point(s) failed to train", outcome.report.failures.len());
            }
            Ok(())
        }
        Commands::Predict {
            model_id,
            matrix,
            metadata,
            project_path,
            seed,
            object_store,
        } => {
            let records = Arc::new(open_records().await?);
            let artifacts =
                open_artifacts(&project_path, object_store, ObjectStoreConfig::from_env())?;
            cmd_predict(records, artifacts, &model_id, &matrix, &metadata, seed)
                .await
                .map(|_| ())
        }
    }
}

// ----- Setup -----

async fn open_records() -> Result<SurrealRecordStore> {
    SurrealRecordStore::from_env()
        .await
        .context("Failed to connect to fitcache database")
}

/// Filesystem store under `project_path`, or the object store when requested.
///
/// An object store without a prefix of its own is keyed by `project_path`.
fn open_artifacts(
    project_path: &str,
    object_store: bool,
    config: Option<ObjectStoreConfig>,
) -> Result<Arc<dyn ArtifactStore>> {
    if !object_store {
        let store = FsArtifactStore::new(project_path)
            .with_context(|| format!("Failed to open artifact store at {}", project_path))?;
        return Ok(Arc::new(store));
    }

    let Some(mut config) = config else {
        bail!("--object-store needs FITCACHE_OBJECT_ENDPOINT and FITCACHE_OBJECT_BUCKET");
    };
    if config.prefix.is_empty() {
        config.prefix = project_path.to_string();
    }
    info!(endpoint = %config.endpoint, bucket = %config.bucket, "using object store");
    let store = ObjectArtifactStore::from_config(config).context("Failed to build object client")?;
    Ok(Arc::new(store))
}

fn read_json(path: &Path) -> Result<Value> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_slice(&bytes).with_context(|| format!("{:?} is not valid JSON", path))
}

// ----- Commands -----

fn cmd_fingerprint(path: &Path, algorithm: DigestAlgorithm) -> Result<Fingerprint> {
    let config = read_json(path)?;
    let fingerprint = Fingerprinter::new(algorithm).fingerprint(&config)?;
    println!("{}", fingerprint);
    Ok(fingerprint)
}

fn cmd_expand(path: &Path) -> Result<usize> {
    let grid = GridSpec::from_value(read_json(path)?)?;
    for point in &grid {
        println!("{}", serde_json::to_string(&point)?);
    }
    info!(points = grid.len(), "grid expanded");
    Ok(grid.len())
}

async fn cmd_save_experiment(records: &dyn RecordStore, path: &Path) -> Result<Fingerprint> {
    let config = read_json(path)?;
    let hash = fitcache_core::save_experiment_and_get_hash(&config, records).await?;
    println!("{}", hash);
    Ok(hash)
}

/// Result of `train`: the run report plus the model rows of cached points.
struct TrainOutcome {
    report: TrainReport,
    /// Rows for `report.skipped`, same order. `None` when an artifact has no row.
    cached: Vec<Option<ModelRecord>>,
}

async fn cmd_train(
    records: Arc<dyn RecordStore>,
    artifacts: Arc<dyn ArtifactStore>,
    grid_path: &Path,
    matrix_path: &Path,
    metadata_path: &Path,
    project_path: &str,
    replace: bool,
) -> Result<TrainOutcome> {
    let grid = GridSpec::from_value(read_json(grid_path)?)?;
    let matrix_store = MatrixStore::from_json_files(matrix_path, metadata_path)
        .with_context(|| format!("Failed to load matrix {:?}", matrix_path))?;

    let trainer = ModelTrainer::new(
        project_path,
        Arc::new(matrix_store),
        artifacts,
        records.clone(),
    );
    let report = trainer.train_models(&grid, replace).await?;

    let mut cached = Vec::with_capacity(report.skipped.len());
    for hash in &report.skipped {
        cached.push(records.find_model_by_hash(hash).await?);
    }

    for record in &report.records {
        println!(
            "trained  {}  {}  {}",
            record.model_id,
            record.model_hash.short(),
            record.model_type
        );
    }
    for (hash, record) in report.skipped.iter().zip(&cached) {
        match record {
            Some(record) => println!(
                "cached   {}  {}  {}",
                record.model_id,
                hash.short(),
                record.model_type
            ),
            None => println!("cached   (unrecorded)  {}", hash.short()),
        }
    }
    for failure in &report.failures {
        println!("failed   {}  {}", failure.model_type, failure.error);
    }
    println!(
        "\n{} trained, {} cached, {} failed",
        report.trained.len(),
        report.skipped.len(),
        report.failures.len()
    );
    Ok(TrainOutcome { report, cached })
}

async fn cmd_predict(
    records: Arc<dyn RecordStore>,
    artifacts: Arc<dyn ArtifactStore>,
    model_id: &str,
    matrix_path: &Path,
    metadata_path: &Path,
    seed: u64,
) -> Result<Vec<f64>> {
    let matrix_store = MatrixStore::from_json_files(matrix_path, metadata_path)
        .with_context(|| format!("Failed to load matrix {:?}", matrix_path))?;

    let predictor = Predictor::new(artifacts, records);
    let model_id = ModelId(model_id.to_string());
    let scores = predictor.predict(&model_id, &matrix_store, seed).await?;

    println!(
        "Wrote {} predictions for model {} as of {}",
        scores.len(),
        model_id,
        matrix_store.as_of_date()
    );
    Ok(scores)
}

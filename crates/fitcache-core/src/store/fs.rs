use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fitcache_state::Fingerprint;
use tempfile::NamedTempFile;
use tracing::debug;

use super::{ArtifactStore, Result, StoreError, StoredArtifact, TRAINED_MODELS_DIR};

/// Filesystem-backed artifact store.
///
/// Layout: `<project_path>/trained_models/<fingerprint>`
pub struct FsArtifactStore {
    models_dir: PathBuf,
}

impl FsArtifactStore {
    /// Create a store rooted at `project_path`. Creates `trained_models/` if needed.
    pub fn new(project_path: impl AsRef<Path>) -> Result<Self> {
        let models_dir = project_path.as_ref().join(TRAINED_MODELS_DIR);
        fs::create_dir_all(&models_dir)?;
        Ok(Self { models_dir })
    }

    fn artifact_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.models_dir.join(fingerprint.as_str())
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    fn locate(&self, fingerprint: &Fingerprint) -> String {
        self.artifact_path(fingerprint).display().to_string()
    }

    async fn exists(&self, fingerprint: &Fingerprint) -> Result<bool> {
        Ok(self.artifact_path(fingerprint).try_exists()?)
    }

    async fn write(&self, fingerprint: &Fingerprint, artifact: &StoredArtifact) -> Result<()> {
        let path = self.artifact_path(fingerprint);
        let bytes = artifact.to_bytes()?;
        let write_err = |e: std::io::Error| StoreError::Write {
            location: path.display().to_string(),
            reason: e.to_string(),
        };

        // Atomic write: temp file in the same directory, fsync, then rename.
        let mut tmp = NamedTempFile::new_in(&self.models_dir).map_err(write_err)?;
        tmp.write_all(&bytes).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
        Ok(())
    }

    async fn load(&self, fingerprint: &Fingerprint) -> Result<StoredArtifact> {
        let path = self.artifact_path(fingerprint);
        let bytes = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(path.display().to_string())
            } else {
                StoreError::Io(e)
            }
        })?;
        StoredArtifact::from_bytes(&bytes)
    }
}

//! Durable single-slot storage for the model artifact

use super::ModelArtifact;
use crate::error::{EstimatorError, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Reads and writes the artifact at one well-known path
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    path: PathBuf,
}

impl ArtifactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the artifact from the slot.
    ///
    /// Missing, unreadable and malformed slots all surface as
    /// `ArtifactUnavailable`; the caller decides how to degrade.
    pub fn load(&self) -> Result<ModelArtifact> {
        let bytes = fs::read(&self.path).map_err(|e| {
            EstimatorError::ArtifactUnavailable(format!(
                "cannot read {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let artifact = ModelArtifact::from_bytes(&bytes).map_err(|e| {
            EstimatorError::ArtifactUnavailable(format!("{}: {}", self.path.display(), e))
        })?;

        info!(
            path = %self.path.display(),
            fingerprint = %artifact.fingerprint(),
            mae = artifact.mae(),
            "Loaded model artifact"
        );
        Ok(artifact)
    }

    /// Overwrite the slot. Either the new artifact is fully on disk or the
    /// previous file is left as it was.
    pub fn save(&self, artifact: &ModelArtifact) -> Result<()> {
        let bytes = artifact.to_bytes()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                EstimatorError::ArtifactUnavailable(format!(
                    "cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let temp_path = self.temp_path();
        if let Err(e) = write_synced(&temp_path, &bytes) {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                debug!(
                    path = %temp_path.display(),
                    error = %cleanup,
                    "No temp artifact to clean up"
                );
            }
            return Err(EstimatorError::ArtifactUnavailable(format!(
                "cannot write {}: {}",
                temp_path.display(),
                e
            )));
        }

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                warn!(
                    path = %temp_path.display(),
                    error = %cleanup,
                    "Failed to remove temp artifact"
                );
            }
            return Err(EstimatorError::ArtifactUnavailable(format!(
                "cannot rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            )));
        }

        info!(
            path = %self.path.display(),
            fingerprint = %artifact.fingerprint(),
            size = bytes.len(),
            "Saved model artifact"
        );
        Ok(())
    }

    /// Parse and validate uploaded artifact bytes without touching the slot
    pub fn decode(bytes: &[u8]) -> Result<ModelArtifact> {
        ModelArtifact::from_bytes(bytes)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

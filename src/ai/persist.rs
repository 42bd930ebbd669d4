//! Model artifact persistence
//!
//! Trained models serialize to a versioned JSON artifact. Writes go to a
//! temp file and rename into place, so a reader never loads a half-written
//! artifact.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::anomaly::AnomalyDetector;
use super::classifier::CentroidClassifier;
use super::maintenance::MaintenancePredictor;

/// Bump when the serialized model layout changes incompatibly.
pub const ARTIFACT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    pub trained_at: DateTime<Utc>,
    pub anomaly: AnomalyDetector,
    pub maintenance: MaintenancePredictor,
    pub classifier: CentroidClassifier,
}

impl ModelArtifact {
    /// Write atomically: temp file in the same directory, then rename.
    pub fn save_atomic(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create model directory")?;
        }

        let serialized =
            serde_json::to_vec_pretty(self).context("Failed to serialize model artifact")?;

        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, serialized)
            .with_context(|| format!("Failed to write temp artifact {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to move artifact into place at {}", path.display()))?;

        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model artifact {}", path.display()))?;
        let artifact: ModelArtifact =
            serde_json::from_str(&raw).context("Failed to parse model artifact")?;

        if artifact.version != ARTIFACT_VERSION {
            bail!(
                "Model artifact version {} is not supported (expected {})",
                artifact.version,
                ARTIFACT_VERSION
            );
        }

        Ok(artifact)
    }
}

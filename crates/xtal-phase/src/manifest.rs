use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use xtal_core::{ErrorInfo, PhaseError, RunProvenance, SchemaVersion};
use xtal_map::Fidelity;

use crate::config::PhaseConfig;

/// Structured record of a completed phasing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Schema of this manifest.
    #[serde(default)]
    pub schema: SchemaVersion,
    /// Configuration used for the run.
    pub config: PhaseConfig,
    /// Hashes, seed and schedule of the run.
    pub provenance: RunProvenance,
    /// Feedback parameter of the difference map.
    pub beta: f64,
    /// Number of recorded iterations.
    pub iterations: usize,
    /// Last modulus error, if any iteration ran.
    pub final_emod: Option<f64>,
    /// Last consistency error, if any iteration ran.
    pub final_econ: Option<f64>,
    /// Agreement with the reference solid unit, when one was available.
    pub fidelity: Option<Fidelity>,
    /// Container holding the results.
    pub output_store: PathBuf,
    /// Group inside the container.
    pub group: String,
    /// Datasets written under `group`.
    pub datasets: Vec<String>,
    /// Snapshot container written beside the output, if any.
    pub snapshot: Option<PathBuf>,
    /// Error trace CSV.
    pub metrics_file: Option<PathBuf>,
}

impl RunManifest {
    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), PhaseError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                PhaseError::Storage(
                    ErrorInfo::new("manifest-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            PhaseError::Storage(
                ErrorInfo::new("manifest-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            PhaseError::Storage(
                ErrorInfo::new("manifest-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, PhaseError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            PhaseError::Storage(
                ErrorInfo::new("manifest-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            PhaseError::Storage(
                ErrorInfo::new("manifest-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

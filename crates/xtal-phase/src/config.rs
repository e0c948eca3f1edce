use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use xtal_core::{ErrorInfo, PhaseError};
use xtal_map::SpaceGroup;

use crate::algorithms::DEFAULT_BETA;
use crate::serde::from_yaml_slice;

/// YAML-configurable parameters of a phasing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PhaseConfig {
    /// Where the measured data and optional inputs live.
    #[serde(default)]
    pub input: InputConfig,
    /// Mapper parameters.
    #[serde(default)]
    pub mapper: MapperConfig,
    /// Iteration schedule.
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Result layout.
    #[serde(default)]
    pub output: OutputConfig,
    /// Master seed.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
}

impl PhaseConfig {
    /// Reads a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, PhaseError> {
        let bytes = fs::read(path).map_err(|err| {
            PhaseError::Configuration(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        from_yaml_slice(&bytes)
    }

    /// Container receiving the results: `output.store`, then the fallback
    /// (usually the CLI `--store`), then `input.store`.
    pub fn output_store(&self, fallback: Option<&Path>) -> Result<PathBuf, PhaseError> {
        self.output
            .store
            .clone()
            .or_else(|| fallback.map(Path::to_path_buf))
            .or_else(|| self.input.store.clone())
            .ok_or_else(|| {
                PhaseError::Configuration(
                    ErrorInfo::new("no-output-store", "no output store configured")
                        .with_hint("set output.store or input.store, or pass --store"),
                )
            })
    }

    /// Container holding the inputs: `input.store`, else the output store.
    pub fn input_store(&self, fallback: Option<&Path>) -> Result<PathBuf, PhaseError> {
        match &self.input.store {
            Some(store) => Ok(store.clone()),
            None => self.output_store(fallback),
        }
    }
}

/// Dataset names of the run inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Container holding the inputs.
    #[serde(default)]
    pub store: Option<PathBuf>,
    /// Measured intensity.
    #[serde(default = "default_data")]
    pub data: String,
    /// Starting solid unit.
    #[serde(default)]
    pub solid_unit: Option<String>,
    /// Detector mask.
    #[serde(default)]
    pub mask: Option<String>,
    /// Initial support.
    #[serde(default)]
    pub support: Option<String>,
    /// Coherent weights.
    #[serde(default)]
    pub bragg_weighting: Option<String>,
    /// Incoherent weights.
    #[serde(default)]
    pub diffuse_weighting: Option<String>,
    /// Reference solid unit for the fidelity report; skipped when absent.
    #[serde(default = "default_truth")]
    pub truth: Option<String>,
}

fn default_data() -> String {
    "/data".to_string()
}

fn default_truth() -> Option<String> {
    Some("/forward_model/solid_unit".to_string())
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            store: None,
            data: default_data(),
            solid_unit: None,
            mask: None,
            support: None,
            bragg_weighting: None,
            diffuse_weighting: None,
            truth: default_truth(),
        }
    }
}

/// Mapper tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MapperConfig {
    /// Voxels kept by the adaptive support; fixed support when absent.
    #[serde(default)]
    pub voxels: Option<usize>,
    /// Support blur width in voxels.
    #[serde(default)]
    pub voxel_sup_blur: Option<f64>,
    /// Blur multiplier applied after each support update.
    #[serde(default)]
    pub voxel_sup_blur_frac: Option<f64>,
    /// Support projections between support updates.
    #[serde(default)]
    pub support_update_freq: Option<usize>,
    /// Unit-cell edge lengths.
    #[serde(default)]
    pub unit_cell: Option<[f64; 3]>,
    /// Space group name such as `P1` or `P 21 21 21`.
    #[serde(default)]
    pub space_group: Option<String>,
    /// Modulus regulariser.
    #[serde(default)]
    pub alpha: Option<f64>,
}

impl MapperConfig {
    /// Parsed space group, `P1` when unset.
    pub fn space_group(&self) -> Result<SpaceGroup, PhaseError> {
        match &self.space_group {
            Some(name) => name.parse(),
            None => Ok(SpaceGroup::default()),
        }
    }
}

/// Iteration schedule and feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Schedule string, e.g. `100DM 100ERA 1cheshire`.
    #[serde(default = "default_iters")]
    pub iters: String,
    /// Difference-map feedback parameter.
    #[serde(default = "default_beta")]
    pub beta: f64,
}

fn default_iters() -> String {
    "100DM 100ERA".to_string()
}

fn default_beta() -> f64 {
    DEFAULT_BETA
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            iters: default_iters(),
            beta: default_beta(),
        }
    }
}

/// Result layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Container receiving the results.
    #[serde(default)]
    pub store: Option<PathBuf>,
    /// Group the results are written under.
    #[serde(default = "default_group")]
    pub group: String,
    /// Error trace CSV, relative to the output container.
    #[serde(default = "default_metrics_filename")]
    pub metrics_file: PathBuf,
    /// Manifest JSON, relative to the output container.
    #[serde(default = "default_manifest_filename")]
    pub manifest_file: PathBuf,
    /// Also write a numbered snapshot container beside the output.
    #[serde(default)]
    pub snapshot: bool,
}

fn default_group() -> String {
    "/phase".to_string()
}

fn default_metrics_filename() -> PathBuf {
    PathBuf::from("errors.csv")
}

fn default_manifest_filename() -> PathBuf {
    PathBuf::from("manifest.json")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            store: None,
            group: default_group(),
            metrics_file: default_metrics_filename(),
            manifest_file: default_manifest_filename(),
            snapshot: false,
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the starting density and snapshot numbering.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded in the manifest.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

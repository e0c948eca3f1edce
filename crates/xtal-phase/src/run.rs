use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{info, warn};
use xtal_core::{Dataset, PhaseError, RngHandle, RunProvenance, SchemaVersion};
use xtal_map::{best_fidelity, CrystalMapper, Fidelity, MapperParams};

use crate::config::PhaseConfig;
use crate::driver::{phase, PhaseOutcome};
use crate::manifest::RunManifest;
use crate::serde::stable_hash_string;
use crate::store::ArrayStore;
use crate::trace::write_trace;

const SNAPSHOT_SUBSTREAM: u64 = 2;

/// Paths and results of a finished run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Object and diagnostics returned by the driver.
    pub outcome: PhaseOutcome,
    /// Agreement with the reference solid unit, if one was found.
    pub fidelity: Option<Fidelity>,
    /// Container the results were written to.
    pub output_store: PathBuf,
    /// Datasets written under the output group.
    pub datasets: Vec<String>,
    /// Error trace CSV.
    pub metrics_path: PathBuf,
    /// Manifest JSON.
    pub manifest_path: PathBuf,
    /// Snapshot container, when requested.
    pub snapshot: Option<PathBuf>,
}

fn load_optional<T>(
    store: &ArrayStore,
    name: &Option<String>,
    loader: impl Fn(&ArrayStore, &str) -> Result<T, PhaseError>,
) -> Result<Option<T>, PhaseError> {
    name.as_deref().map(|name| loader(store, name)).transpose()
}

fn dataset_path(group: &str, name: &str) -> String {
    format!("{}/{}", group.trim_end_matches('/'), name)
}

fn snapshot_path(output: &Path, number: u32) -> PathBuf {
    let name = format!("O_{number:05}");
    match output.parent() {
        Some(parent) if output.file_name().is_some() => parent.join(name),
        _ => output.join(name),
    }
}

/// Loads the inputs named by `config`, phases them and writes every result.
///
/// Nothing is written unless phasing succeeds. `store_override` stands in for
/// the output container when the configuration does not name one, and
/// `config_path` is copied next to the results when given.
pub fn run_phase(
    config: &PhaseConfig,
    config_path: Option<&Path>,
    store_override: Option<&Path>,
) -> Result<RunSummary, PhaseError> {
    let output_root = config.output_store(store_override)?;
    let input = ArrayStore::open(config.input_store(store_override)?)?;
    let seed = config.seed_policy.master_seed;

    let intensity = input.load_real3(&config.input.data)?;
    let data_hash = stable_hash_string(&intensity)?;
    let params = MapperParams {
        solid_unit: load_optional(&input, &config.input.solid_unit, ArrayStore::load_complex3)?,
        mask: load_optional(&input, &config.input.mask, ArrayStore::load_mask3)?,
        support: load_optional(&input, &config.input.support, ArrayStore::load_mask3)?,
        bragg_weighting: load_optional(&input, &config.input.bragg_weighting, ArrayStore::load_real3)?,
        diffuse_weighting: load_optional(
            &input,
            &config.input.diffuse_weighting,
            ArrayStore::load_real3,
        )?,
        voxels: config.mapper.voxels,
        voxel_sup_blur: config.mapper.voxel_sup_blur,
        voxel_sup_blur_frac: config.mapper.voxel_sup_blur_frac,
        support_update_freq: config.mapper.support_update_freq,
        unit_cell: config.mapper.unit_cell,
        space_group: config.mapper.space_group()?,
        alpha: config.mapper.alpha,
        seed,
    };
    let mut mapper = CrystalMapper::new(intensity, params)?;
    info!(
        input = %input.root().display(),
        schedule = %config.schedule.iters,
        beta = config.schedule.beta,
        "phasing started"
    );
    let outcome = phase(&mut mapper, &config.schedule.iters, config.schedule.beta)?;

    let fidelity = match &config.input.truth {
        Some(name) if input.contains(name) => {
            let truth = input.load_complex3(name)?;
            let fidelity = best_fidelity(&mapper, &truth, &outcome.object)?;
            info!(
                fidelity = fidelity.fidelity,
                fidelity_trans = fidelity.fidelity_trans,
                "fidelity against reference"
            );
            Some(fidelity)
        }
        _ => None,
    };

    let output = ArrayStore::create(&output_root)?;
    let group = &config.output.group;
    let mut written = BTreeMap::new();
    written.insert(
        "solid_unit".to_string(),
        Dataset::Complex(outcome.object.clone().into_dyn()),
    );
    written.insert("eMod".to_string(), Dataset::Series(outcome.info.emod.clone()));
    written.insert("eCon".to_string(), Dataset::Series(outcome.info.econ.clone()));
    written.insert(
        "crystal".to_string(),
        Dataset::Complex(mapper.crystal(&outcome.object).into_dyn()),
    );
    if let Some(cell) = &outcome.info.unit_cell {
        written.insert("unit_cell".to_string(), Dataset::Complex(cell.clone().into_dyn()));
    }
    if let Some(map) = &outcome.info.cheshire_error_map {
        written.insert(
            "Cheshire_error_map".to_string(),
            Dataset::Real(map.clone().into_dyn()),
        );
    }
    for (key, value) in &outcome.info.extra {
        written.entry(key.clone()).or_insert_with(|| value.clone());
    }
    if let Some(fid) = &fidelity {
        written.insert("fidelity".to_string(), Dataset::Scalar(fid.fidelity));
        written.insert("fidelity_trans".to_string(), Dataset::Scalar(fid.fidelity_trans));
    }
    let mut datasets = Vec::with_capacity(written.len());
    for (key, value) in &written {
        let name = dataset_path(group, key);
        output.store(&name, value)?;
        datasets.push(name);
    }

    let snapshot = if config.output.snapshot {
        let number = RngHandle::substream(seed, SNAPSHOT_SUBSTREAM).gen_range(0..100_000u32);
        let path = snapshot_path(&output_root, number);
        let store = ArrayStore::create(&path)?;
        for key in ["solid_unit", "eMod", "eCon"] {
            if let Some(value) = written.get(key) {
                store.store(&format!("/{key}"), value)?;
            }
        }
        info!(path = %path.display(), "snapshot written");
        Some(path)
    } else {
        None
    };

    let metrics_path = output_root.join(&config.output.metrics_file);
    write_trace(&metrics_path, &outcome.info)?;

    let mut tool_versions = BTreeMap::new();
    tool_versions.insert(
        env!("CARGO_PKG_NAME").to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    let manifest = RunManifest {
        schema: SchemaVersion::default(),
        config: config.clone(),
        provenance: RunProvenance {
            config_hash: stable_hash_string(config)?,
            data_hash,
            object_hash: stable_hash_string(&outcome.object)?,
            seed,
            schedule: config.schedule.iters.clone(),
            tool_versions,
        },
        beta: config.schedule.beta,
        iterations: outcome.info.emod.len(),
        final_emod: outcome.info.emod.last().copied(),
        final_econ: outcome.info.econ.last().copied(),
        fidelity,
        output_store: output_root.clone(),
        group: group.clone(),
        datasets: datasets.clone(),
        snapshot: snapshot.clone(),
        metrics_file: Some(config.output.metrics_file.clone()),
    };
    let manifest_path = output_root.join(&config.output.manifest_file);
    manifest.write(&manifest_path)?;

    if let Some(source) = config_path {
        copy_config(source, &output_root);
    }
    info!(
        output = %output_root.display(),
        datasets = datasets.len(),
        "results written"
    );

    Ok(RunSummary {
        outcome,
        fidelity,
        output_store: output_root,
        datasets,
        metrics_path,
        manifest_path,
        snapshot,
    })
}

fn copy_config(source: &Path, output_root: &Path) {
    let Some(file_name) = source.file_name() else {
        warn!(path = %source.display(), "config path has no file name; not copied");
        return;
    };
    let target = output_root.join(file_name);
    if let Err(err) = fs::copy(source, &target) {
        warn!(
            source = %source.display(),
            target = %target.display(),
            error = %err,
            "could not copy config next to the results"
        );
    }
}

/// Writes every named dataset of a synthetic or prepared input into `store`.
pub fn write_datasets(
    store: &ArrayStore,
    datasets: &[(String, Dataset)],
) -> Result<(), PhaseError> {
    for (name, dataset) in datasets {
        store.store(name, dataset)?;
    }
    Ok(())
}


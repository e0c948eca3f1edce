use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use xtal_map::Fidelity;
use xtal_phase::serde::to_canonical_json_bytes;
use xtal_phase::{run_phase, PhaseConfig};

#[derive(Args, Debug)]
pub struct PhaseArgs {
    /// YAML configuration describing inputs, mapper, schedule and outputs.
    #[arg(long)]
    pub config: PathBuf,
    /// Array store used when the configuration names none.
    #[arg(long)]
    pub store: Option<PathBuf>,
    /// Override the schedule, e.g. "100DM 100ERA 1cheshire".
    #[arg(long)]
    pub iters: Option<String>,
    /// Override the master seed.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
struct PhaseReport {
    output_store: PathBuf,
    manifest: PathBuf,
    iterations: usize,
    final_emod: Option<f64>,
    final_econ: Option<f64>,
    fidelity: Option<Fidelity>,
}

pub fn run(args: &PhaseArgs) -> Result<(), Box<dyn Error>> {
    let mut config = PhaseConfig::load(&args.config)?;
    if let Some(iters) = &args.iters {
        config.schedule.iters = iters.clone();
    }
    if let Some(seed) = args.seed {
        config.seed_policy.master_seed = seed;
    }
    let summary = run_phase(&config, Some(&args.config), args.store.as_deref())?;
    let info = &summary.outcome.info;
    let report = PhaseReport {
        output_store: summary.output_store.clone(),
        manifest: summary.manifest_path.clone(),
        iterations: info.emod.len(),
        final_emod: info.emod.last().copied(),
        final_econ: info.econ.last().copied(),
        fidelity: summary.fidelity,
    };
    println!("{}", String::from_utf8(to_canonical_json_bytes(&report)?)?);
    Ok(())
}

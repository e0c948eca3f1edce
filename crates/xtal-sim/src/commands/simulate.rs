use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use tracing::info;
use xtal_map::{simulate, ForwardParams, SpaceGroup};
use xtal_phase::serde::{from_yaml_slice, to_canonical_json_bytes};
use xtal_phase::{write_datasets, ArrayStore};

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Array store receiving `/data` and the `/forward_model` group.
    #[arg(long)]
    pub out: PathBuf,
    /// Optional YAML file with forward-model parameters.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Grid edge length (cubic grid), overriding the configuration.
    #[arg(long)]
    pub size: Option<usize>,
    /// Space group name, overriding the configuration.
    #[arg(long)]
    pub space_group: Option<SpaceGroup>,
    /// Master seed, overriding the configuration.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SimulateReport {
    store: PathBuf,
    params: ForwardParams,
    datasets: Vec<String>,
}

pub fn run(args: &SimulateArgs) -> Result<(), Box<dyn Error>> {
    let mut params = match &args.config {
        Some(path) => from_yaml_slice::<ForwardParams>(&fs::read(path)?)?,
        None => ForwardParams::default(),
    };
    if let Some(size) = args.size {
        params.shape = [size; 3];
    }
    if let Some(space_group) = args.space_group {
        params.space_group = space_group;
    }
    if let Some(seed) = args.seed {
        params.seed = seed;
    }

    let model = simulate(&params)?;
    let datasets = model.datasets();
    let store = ArrayStore::create(&args.out)?;
    write_datasets(&store, &datasets)?;
    info!(store = %args.out.display(), datasets = datasets.len(), "synthetic data written");

    let report = SimulateReport {
        store: args.out.clone(),
        params,
        datasets: datasets.into_iter().map(|(name, _)| name).collect(),
    };
    println!("{}", String::from_utf8(to_canonical_json_bytes(&report)?)?);
    Ok(())
}

use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    phase::{self, PhaseArgs},
    simulate::{self, SimulateArgs},
    version::{self, VersionArgs},
};

mod commands;
mod logging;

#[derive(Parser, Debug)]
#[command(name = "xtal-sim", about = "Phase retrieval for disordered crystals")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Phase a measured intensity volume as described by a YAML configuration.
    Phase(PhaseArgs),
    /// Write a seeded synthetic crystal and its intensity into an array store.
    Simulate(SimulateArgs),
    /// Print version information.
    Version(VersionArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    logging::init_tracing()?;
    match cli.command {
        Command::Phase(args) => phase::run(&args),
        Command::Simulate(args) => simulate::run(&args),
        Command::Version(args) => version::run(&args),
    }
}

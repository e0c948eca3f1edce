#![deny(missing_docs)]

//! Iterative phase retrieval over a [`xtal_core::Mapper`]: schedule parsing,
//! error-reduction and difference-map steps, the phasing driver, and the
//! on-disk run orchestration around them.

/// Error-reduction and difference-map step functions.
pub mod algorithms;
/// YAML configuration schema and defaults.
pub mod config;
/// Schedule state machine and the one-call `phase` entry point.
pub mod driver;
/// Run manifest serialization helpers.
pub mod manifest;
/// Load, phase and persist a configured run.
pub mod run;
/// Iteration schedule parsing.
pub mod schedule;
/// Canonical JSON, YAML and hashing helpers.
pub mod serde;
/// Directory-backed named-array container.
pub mod store;
/// Error-trace CSV export.
pub mod trace;

pub use algorithms::{dm, era, StepOutcome, DEFAULT_BETA};
pub use config::{InputConfig, MapperConfig, OutputConfig, PhaseConfig, ScheduleConfig, SeedPolicy};
pub use driver::{phase, DriverState, PhaseDriver, PhaseOutcome, PlannedStep};
pub use manifest::RunManifest;
pub use run::{run_phase, write_datasets, RunSummary};
pub use schedule::{format_schedule, parse_schedule, Algorithm, ScheduleStep};
pub use store::ArrayStore;
pub use trace::{read_trace, write_trace, TraceRow};

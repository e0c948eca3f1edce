use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use xtal_core::{Diagnostics, ErrorInfo, PhaseError};

/// One row of the per-iteration error trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceRow {
    /// Global iteration index across the schedule.
    pub iteration: usize,
    /// Modulus error.
    pub emod: f64,
    /// Consistency error.
    pub econ: f64,
}

/// Pairs the `eMod`/`eCon` traces of a run.
pub fn rows(info: &Diagnostics) -> Vec<TraceRow> {
    info.emod
        .iter()
        .zip(info.econ.iter())
        .enumerate()
        .map(|(iteration, (&emod, &econ))| TraceRow {
            iteration,
            emod,
            econ,
        })
        .collect()
}

fn wrap_csv(code: &str, path: &Path, err: csv::Error) -> PhaseError {
    PhaseError::Storage(
        ErrorInfo::new(code, "error trace I/O failed")
            .with_context("path", path.display().to_string())
            .with_hint(err.to_string()),
    )
}

/// Writes the trace as CSV with an `iteration,emod,econ` header.
pub fn write_trace(path: &Path, info: &Diagnostics) -> Result<(), PhaseError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            PhaseError::Storage(
                ErrorInfo::new("trace-mkdir", err.to_string())
                    .with_context("path", parent.display().to_string()),
            )
        })?;
    }
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|err| wrap_csv("trace-open", path, err))?;
    for row in rows(info) {
        writer
            .serialize(row)
            .map_err(|err| wrap_csv("trace-write-row", path, err))?;
    }
    writer
        .flush()
        .map_err(|err| wrap_csv("trace-flush", path, err.into()))
}

/// Reads a trace written by [`write_trace`].
pub fn read_trace(path: &Path) -> Result<Vec<TraceRow>, PhaseError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|err| wrap_csv("trace-open", path, err))?;
    reader
        .deserialize()
        .map(|row| row.map_err(|err| wrap_csv("trace-read-row", path, err)))
        .collect()
}

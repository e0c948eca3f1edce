use std::fmt;

use serde::{Deserialize, Serialize};
use xtal_core::{ErrorInfo, PhaseError};

/// One `(iterations, label)` entry of an iteration schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleStep {
    /// Algorithm label, case preserved.
    pub label: String,
    /// Requested iteration count.
    pub iterations: usize,
}

impl fmt::Display for ScheduleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.iterations, self.label)
    }
}

/// Algorithms the driver knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// Error reduction.
    Era,
    /// Difference map.
    Dm,
    /// Origin search over the Cheshire cell.
    Cheshire,
}

impl Algorithm {
    /// Resolves a schedule label (exact, case-sensitive match).
    pub fn from_label(label: &str) -> Result<Self, PhaseError> {
        match label {
            "ERA" => Ok(Algorithm::Era),
            "DM" => Ok(Algorithm::Dm),
            "cheshire" => Ok(Algorithm::Cheshire),
            other => Err(PhaseError::UnknownAlgorithm(
                ErrorInfo::new("unknown-algorithm", "schedule names an unknown algorithm")
                    .with_context("label", other)
                    .with_hint("expected one of ERA, DM, cheshire"),
            )),
        }
    }

    /// Canonical schedule label.
    pub fn label(&self) -> &'static str {
        match self {
            Algorithm::Era => "ERA",
            Algorithm::Dm => "DM",
            Algorithm::Cheshire => "cheshire",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn syntax_error(code: &str, message: &str, input: &str) -> PhaseError {
    PhaseError::ScheduleSyntax(ErrorInfo::new(code, message).with_context("schedule", input))
}

fn tokens(input: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut digits = None;
    for (index, ch) in input.char_indices() {
        let is_digit = ch.is_ascii_digit();
        if digits != Some(is_digit) {
            if index > start {
                out.push(&input[start..index]);
            }
            start = index;
            digits = Some(is_digit);
        }
    }
    if start < input.len() {
        out.push(&input[start..]);
    }
    out.into_iter()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect()
}

/// Parses a schedule such as `"100DM 100ERA 1cheshire"`.
///
/// Labels are not validated here; see [`Algorithm::from_label`].
pub fn parse_schedule(input: &str) -> Result<Vec<ScheduleStep>, PhaseError> {
    let tokens = tokens(input);
    if tokens.is_empty() {
        return Err(syntax_error("empty-schedule", "schedule is empty", input));
    }
    if tokens.len() % 2 != 0 {
        return Err(syntax_error(
            "unpaired-token",
            "schedule tokens do not pair into count and label",
            input,
        ));
    }
    tokens
        .chunks(2)
        .map(|pair| {
            let (count, label) = (pair[0], pair[1]);
            if !count.chars().all(|ch| ch.is_ascii_digit()) {
                return Err(PhaseError::ScheduleSyntax(
                    ErrorInfo::new("missing-count", "schedule entry does not start with a count")
                        .with_context("schedule", input)
                        .with_context("token", count),
                ));
            }
            let iterations = count.parse::<usize>().map_err(|err| {
                PhaseError::ScheduleSyntax(
                    ErrorInfo::new("count-overflow", err.to_string())
                        .with_context("schedule", input)
                        .with_context("token", count),
                )
            })?;
            Ok(ScheduleStep {
                label: label.to_string(),
                iterations,
            })
        })
        .collect()
}

/// Renders steps back into schedule syntax.
pub fn format_schedule(steps: &[ScheduleStep]) -> String {
    steps
        .iter()
        .map(ScheduleStep::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

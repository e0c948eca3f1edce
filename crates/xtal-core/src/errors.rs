//! Structured error types shared across the phasing crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`PhaseError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (dataset names, shapes, labels, ...).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for a phasing run.
///
/// Every family aborts the run it occurs in; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum PhaseError {
    /// Malformed iteration schedule (unpaired count/label, bad count, empty).
    #[error("schedule syntax error: {0}")]
    ScheduleSyntax(ErrorInfo),
    /// Schedule label that names no known algorithm.
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(ErrorInfo),
    /// Numerical or shape failure inside a mapper projection.
    #[error("projection error: {0}")]
    Projection(ErrorInfo),
    /// Missing or invalid run parameter.
    #[error("configuration error: {0}")]
    Configuration(ErrorInfo),
    /// Container, manifest or serialisation failures.
    #[error("storage error: {0}")]
    Storage(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl PhaseError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            PhaseError::ScheduleSyntax(info)
            | PhaseError::UnknownAlgorithm(info)
            | PhaseError::Projection(info)
            | PhaseError::Configuration(info)
            | PhaseError::Storage(info) => info,
        }
    }

    /// Shorthand for a [`PhaseError::Projection`] without context.
    pub fn projection(code: &str, message: impl Into<String>) -> Self {
        PhaseError::Projection(ErrorInfo::new(code, message))
    }

    /// Shorthand for a [`PhaseError::Configuration`] without context.
    pub fn configuration(code: &str, message: impl Into<String>) -> Self {
        PhaseError::Configuration(ErrorInfo::new(code, message))
    }

    /// Shorthand for a [`PhaseError::Storage`] without context.
    pub fn storage(code: &str, message: impl Into<String>) -> Self {
        PhaseError::Storage(ErrorInfo::new(code, message))
    }
}

/// Checks that two array shapes agree, reporting a projection error otherwise.
pub fn ensure_shape(code: &str, expected: &[usize], found: &[usize]) -> Result<(), PhaseError> {
    if expected == found {
        return Ok(());
    }
    Err(PhaseError::Projection(
        ErrorInfo::new(code, "array shape does not match the mapper grid")
            .with_context("expected", format!("{expected:?}"))
            .with_context("found", format!("{found:?}")),
    ))
}

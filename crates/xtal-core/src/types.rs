use std::collections::BTreeMap;

use ndarray::{Array3, Array4, ArrayD, Zip};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Working state of the iterative algorithms: one complex volume per
/// symmetry-related copy, stacked along axis 0.
pub type Modes = Array4<Complex64>;

/// Primary quantity of interest derived from [`Modes`] (the solid unit).
pub type Object = Array3<Complex64>;

/// Diffraction intensity sampled on the unit-cell grid.
pub type Intensity = Array3<f64>;

/// Integer grid translation used by the Cheshire search.
pub type Translation = [usize; 3];

/// Named value carried in diagnostics and persisted in array containers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Dataset {
    /// Single scalar value.
    Scalar(f64),
    /// One dimensional sequence, e.g. an error trace.
    Series(Vec<f64>),
    /// Real valued array of any rank.
    Real(ArrayD<f64>),
    /// Complex valued array of any rank.
    Complex(ArrayD<Complex64>),
    /// Boolean mask of any rank.
    Mask(ArrayD<bool>),
    /// Free-form text.
    Text(String),
}

impl Dataset {
    /// Returns a short label naming the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Dataset::Scalar(_) => "scalar",
            Dataset::Series(_) => "series",
            Dataset::Real(_) => "real",
            Dataset::Complex(_) => "complex",
            Dataset::Mask(_) => "mask",
            Dataset::Text(_) => "text",
        }
    }

    /// Returns the array shape, or an empty slice for scalars and text.
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Dataset::Scalar(_) | Dataset::Text(_) => Vec::new(),
            Dataset::Series(values) => vec![values.len()],
            Dataset::Real(array) => array.shape().to_vec(),
            Dataset::Complex(array) => array.shape().to_vec(),
            Dataset::Mask(array) => array.shape().to_vec(),
        }
    }
}

/// Diagnostics bundle assembled at the end of a step or a whole run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Modulus-constraint error, one entry per completed iteration.
    #[serde(rename = "eMod")]
    pub emod: Vec<f64>,
    /// Support/consistency error, one entry per completed iteration.
    #[serde(rename = "eCon")]
    pub econ: Vec<f64>,
    /// Error per candidate origin from the last Cheshire search, if any ran.
    #[serde(rename = "Cheshire_error_map", skip_serializing_if = "Option::is_none")]
    pub cheshire_error_map: Option<Array3<f64>>,
    /// Reduction of the final modes over their symmetry copies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_cell: Option<Array3<Complex64>>,
    /// Mapper specific extension fields.
    #[serde(default)]
    pub extra: BTreeMap<String, Dataset>,
}

/// Result of a Cheshire-cell translational search.
#[derive(Debug, Clone, PartialEq)]
pub struct CheshireScan {
    /// Best-scoring translated object.
    pub object: Object,
    /// Score for every candidate translation in the Cheshire cell.
    pub error_map: Array3<f64>,
    /// Translation that produced `object`.
    pub best: Translation,
}

/// Relative l2 distance `sqrt(sum |a - b|^2 / sum |b|^2)`.
///
/// Falls back to the absolute distance when `b` is identically zero and
/// returns NaN for mismatched shapes so that callers treat it as divergence.
pub fn modes_distance(a: &Modes, b: &Modes) -> f64 {
    if a.shape() != b.shape() {
        return f64::NAN;
    }
    let mut delta = 0.0;
    let mut norm = 0.0;
    Zip::from(a).and(b).for_each(|x, y| {
        delta += (x - y).norm_sqr();
        norm += y.norm_sqr();
    });
    if norm > 0.0 {
        (delta / norm).sqrt()
    } else {
        delta.sqrt()
    }
}

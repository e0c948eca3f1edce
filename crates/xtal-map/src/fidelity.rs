//! Reconstruction quality against a known solid unit.

use serde::{Deserialize, Serialize};
use xtal_core::{ensure_shape, ErrorInfo, Object, PhaseError, Translation};

use crate::crystal::CrystalMapper;
use crate::fft::Fft3;

/// Agreement between a reconstruction and a known solid unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fidelity {
    /// `sum |E - T|^2 / sum |T|^2` at zero shift.
    pub fidelity: f64,
    /// Same error minimised over circular translations of the estimate.
    pub fidelity_trans: f64,
    /// Translation achieving `fidelity_trans`, as the circular shift that
    /// moves the estimate onto the truth: `roll(estimate, shift)` aligns
    /// with `truth`. For `estimate = roll(truth, t)` this is `-t mod n`.
    pub shift: Translation,
}

/// Normalised squared error of `estimate` against `truth` for every circular
/// translation, evaluated through one FFT cross-correlation.
pub fn calculate_fidelity(truth: &Object, estimate: &Object) -> Result<Fidelity, PhaseError> {
    ensure_shape("fidelity-shape", truth.shape(), estimate.shape())?;
    let truth_norm: f64 = truth.iter().map(|value| value.norm_sqr()).sum();
    if truth_norm == 0.0 {
        return Err(PhaseError::Configuration(
            ErrorInfo::new("zero-truth", "reference solid unit is identically zero")
                .with_hint("check the truth dataset"),
        ));
    }
    let estimate_norm: f64 = estimate.iter().map(|value| value.norm_sqr()).sum();

    let (n0, n1, n2) = truth.dim();
    let fft = Fft3::new([n0, n1, n2]);
    let mut truth_hat = truth.clone();
    let mut correlation = estimate.clone();
    fft.forward(&mut truth_hat)?;
    fft.forward(&mut correlation)?;
    correlation.zip_mut_with(&truth_hat, |e, t| *e *= t.conj());
    // A forward transform of E^ conj(T^) gives sum_x E(x - s) conj(T(x)) at s.
    fft.forward(&mut correlation)?;
    let scale = 1.0 / fft.len() as f64;

    let mut best = (f64::INFINITY, [0, 0, 0]);
    let mut at_origin = f64::NAN;
    for ((i, j, k), value) in correlation.indexed_iter() {
        let overlap = value.re * scale;
        let err = ((estimate_norm + truth_norm - 2.0 * overlap) / truth_norm).max(0.0);
        if (i, j, k) == (0, 0, 0) {
            at_origin = err;
        }
        if err < best.0 {
            best = (err, [i, j, k]);
        }
    }
    Ok(Fidelity {
        fidelity: at_origin,
        fidelity_trans: best.0,
        shift: best.1,
    })
}

/// Best [`calculate_fidelity`] over the symmetry copies of `estimate`.
pub fn best_fidelity(
    mapper: &CrystalMapper,
    truth: &Object,
    estimate: &Object,
) -> Result<Fidelity, PhaseError> {
    let mut best: Option<Fidelity> = None;
    for copy in mapper.symmetry_copies(estimate) {
        let candidate = calculate_fidelity(truth, &copy)?;
        if best.map_or(true, |current| candidate.fidelity_trans < current.fidelity_trans) {
            best = Some(candidate);
        }
    }
    best.ok_or_else(|| PhaseError::configuration("no-copies", "mapper has no symmetry copies"))
}

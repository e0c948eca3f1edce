//! Real-space support: blur, threshold and the adaptive update schedule.

use std::f64::consts::PI;

use ndarray::Array3;
use num_complex::Complex64;
use tracing::debug;
use xtal_core::{ensure_shape, Object, PhaseError};

use crate::fft::{q_squared, Fft3};

/// Periodic Gaussian blur with standard deviation `sigma` (in voxels),
/// applied as a Fourier-space filter.
pub fn gaussian_blur(
    volume: &Array3<f64>,
    sigma: f64,
    fft: &Fft3,
) -> Result<Array3<f64>, PhaseError> {
    if sigma <= 0.0 {
        return Ok(volume.clone());
    }
    let shape = fft.shape();
    let mut spectrum = fft.forward_real(volume)?;
    let width = 2.0 * PI * PI * sigma * sigma;
    for ((i, j, k), value) in spectrum.indexed_iter_mut() {
        *value *= (-width * q_squared([i, j, k], shape)).exp();
    }
    fft.inverse(&mut spectrum)?;
    Ok(spectrum.mapv(|value| value.re))
}

/// Keeps the `voxels` largest entries of `values`; ties resolve to the lower
/// linear index.
pub fn threshold_voxels(values: &Array3<f64>, voxels: usize) -> Array3<bool> {
    if voxels >= values.len() {
        return Array3::from_elem(values.dim(), true);
    }
    let flat: Vec<f64> = values.iter().copied().collect();
    let mut order: Vec<usize> = (0..flat.len()).collect();
    order.sort_by(|&a, &b| flat[b].total_cmp(&flat[a]).then(a.cmp(&b)));
    let mut keep = vec![false; flat.len()];
    for &index in order.iter().take(voxels) {
        keep[index] = true;
    }
    let mut mask = Array3::from_elem(values.dim(), false);
    for (slot, flag) in mask.iter_mut().zip(keep) {
        *slot = flag;
    }
    mask
}

/// Zeroes the object outside the support.
pub fn apply_support(object: &Object, support: &Array3<bool>) -> Result<Object, PhaseError> {
    ensure_shape("support-shape", support.shape(), object.shape())?;
    let mut constrained = object.clone();
    for (value, &inside) in constrained.iter_mut().zip(support.iter()) {
        if !inside {
            *value = Complex64::default();
        }
    }
    Ok(constrained)
}

/// Schedule and parameters for the thresholded-blur support update.
#[derive(Debug, Clone, PartialEq)]
pub struct SupportUpdate {
    voxels: usize,
    sigma: f64,
    frac: f64,
    freq: usize,
    calls: usize,
}

impl SupportUpdate {
    /// Keeps `voxels` voxels of the blurred density every `freq` calls,
    /// multiplying the blur width by `frac` after each update.
    pub fn new(voxels: usize, sigma: f64, frac: f64, freq: usize) -> Self {
        Self {
            voxels,
            sigma: sigma.max(0.0),
            frac: frac.max(0.0),
            freq: freq.max(1),
            calls: 0,
        }
    }

    /// Current blur width.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Number of voxels retained per update.
    pub fn voxels(&self) -> usize {
        self.voxels
    }

    /// Counts a support projection and reports whether an update is due.
    pub fn tick(&mut self) -> bool {
        self.calls += 1;
        self.calls % self.freq == 0
    }

    /// Recomputes the support from the current object.
    pub fn refresh(&mut self, object: &Object, fft: &Fft3) -> Result<Array3<bool>, PhaseError> {
        let magnitude = object.mapv(|value| value.norm());
        let blurred = gaussian_blur(&magnitude, self.sigma, fft)?;
        let support = threshold_voxels(&blurred, self.voxels);
        debug!(
            voxels = self.voxels,
            sigma = self.sigma,
            call = self.calls,
            "support updated"
        );
        self.sigma *= self.frac;
        Ok(support)
    }
}

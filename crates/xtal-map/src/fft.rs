//! Three-dimensional FFT plans and reciprocal-space helpers.

use std::fmt;
use std::sync::Arc;

use ndarray::{Array3, Axis};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use xtal_core::{ensure_shape, PhaseError};

/// Cached 3D transform plans for one grid shape.
///
/// The forward transform is unnormalised; the inverse scales by `1/N` so that
/// `inverse(forward(x)) == x`.
#[derive(Clone)]
pub struct Fft3 {
    shape: [usize; 3],
    forward: [Arc<dyn Fft<f64>>; 3],
    inverse: [Arc<dyn Fft<f64>>; 3],
}

impl fmt::Debug for Fft3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fft3")
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

impl Fft3 {
    /// Plans forward and inverse transforms along every axis of `shape`.
    pub fn new(shape: [usize; 3]) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let forward = shape.map(|len| planner.plan_fft_forward(len));
        let inverse = shape.map(|len| planner.plan_fft_inverse(len));
        Self {
            shape,
            forward,
            inverse,
        }
    }

    /// Grid shape the plans were built for.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    /// Whether the grid is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// In-place forward transform.
    pub fn forward(&self, volume: &mut Array3<Complex64>) -> Result<(), PhaseError> {
        ensure_shape("fft-shape", &self.shape, volume.shape())?;
        for (axis, plan) in self.forward.iter().enumerate() {
            transform_axis(volume, axis, plan);
        }
        Ok(())
    }

    /// In-place inverse transform, normalised by `1/N`.
    pub fn inverse(&self, volume: &mut Array3<Complex64>) -> Result<(), PhaseError> {
        ensure_shape("fft-shape", &self.shape, volume.shape())?;
        for (axis, plan) in self.inverse.iter().enumerate() {
            transform_axis(volume, axis, plan);
        }
        let scale = 1.0 / self.len() as f64;
        volume.mapv_inplace(|value| value * scale);
        Ok(())
    }

    /// Forward transform of a real volume.
    pub fn forward_real(&self, volume: &Array3<f64>) -> Result<Array3<Complex64>, PhaseError> {
        let mut spectrum = volume.mapv(|value| Complex64::new(value, 0.0));
        self.forward(&mut spectrum)?;
        Ok(spectrum)
    }
}

fn transform_axis(volume: &mut Array3<Complex64>, axis: usize, plan: &Arc<dyn Fft<f64>>) {
    let len = volume.len_of(Axis(axis));
    let mut buffer = vec![Complex64::default(); len];
    let mut scratch = vec![Complex64::default(); plan.get_inplace_scratch_len()];
    for mut lane in volume.lanes_mut(Axis(axis)) {
        for (slot, value) in buffer.iter_mut().zip(lane.iter()) {
            *slot = *value;
        }
        plan.process_with_scratch(&mut buffer, &mut scratch);
        for (value, slot) in lane.iter_mut().zip(buffer.iter()) {
            *value = *slot;
        }
    }
}

/// Signed integer frequency of DFT bin `index` on an axis of length `len`.
pub fn frequency(index: usize, len: usize) -> f64 {
    if index <= len / 2 {
        index as f64
    } else {
        index as f64 - len as f64
    }
}

/// Squared reciprocal-space radius `|q|^2` in cycles per voxel.
pub fn q_squared(index: [usize; 3], shape: [usize; 3]) -> f64 {
    (0..3)
        .map(|axis| {
            let q = frequency(index[axis], shape[axis]) / shape[axis] as f64;
            q * q
        })
        .sum()
}

#![deny(missing_docs)]
#![doc = "Core traits and data types for the crystal phasing engine."]

use std::collections::BTreeMap;

use ndarray::{Array3, Axis};
use num_complex::Complex64;

pub mod errors;
pub mod provenance;
pub mod rng;
mod types;

pub use errors::{ensure_shape, ErrorInfo, PhaseError};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};
pub use types::{
    modes_distance, CheshireScan, Dataset, Diagnostics, Intensity, Modes, Object, Translation,
};

/// Capability contract consumed by the phasing algorithms.
///
/// A mapper owns the working [`Modes`] and knows how to move between them,
/// the measured intensity and the real-space object. Step functions borrow
/// the mapper mutably for the whole step and substitute new modes through
/// [`Mapper::set_modes`] when they finish.
pub trait Mapper {
    /// Current working state.
    fn modes(&self) -> &Modes;

    /// Replaces the working state.
    fn set_modes(&mut self, modes: Modes);

    /// Derives the primary quantity of interest from `modes`.
    fn object(&self, modes: &Modes) -> Result<Object, PhaseError>;

    /// Projects `modes` onto the measured-modulus constraint set.
    fn pmod(&self, modes: &Modes) -> Result<Modes, PhaseError>;

    /// Projects `modes` onto the support constraint set. May refresh the
    /// support when adaptive updates are configured.
    fn psup(&mut self, modes: &Modes) -> Result<Modes, PhaseError>;

    /// Projects `modes` onto the current support without advancing any
    /// adaptive update. Mappers with a fixed support can keep the default.
    fn psup_current(&mut self, modes: &Modes) -> Result<Modes, PhaseError> {
        self.psup(modes)
    }

    /// Forward map from `modes` to predicted intensity.
    fn imap(&self, modes: &Modes) -> Result<Intensity, PhaseError>;

    /// Collects mapper specific diagnostics at the end of a step.
    fn finish(&mut self, modes: &Modes) -> Result<BTreeMap<String, Dataset>, PhaseError>;

    /// Searches the Cheshire cell for the translation of `object` that best
    /// explains the data and adopts it as the new working state.
    fn scan_cheshire(
        &mut self,
        object: &Object,
        scan_points: Option<&[Translation]>,
    ) -> Result<CheshireScan, PhaseError>;

    /// Distance metric used for the per-iteration error traces.
    fn distance(&self, a: &Modes, b: &Modes) -> f64 {
        modes_distance(a, b)
    }

    /// Sum of `modes` over the symmetry-replicated copies.
    fn unit_cell(&self, modes: &Modes) -> Result<Array3<Complex64>, PhaseError> {
        Ok(modes.sum_axis(Axis(0)))
    }
}

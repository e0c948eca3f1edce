//! The crystal mapper.

use std::collections::BTreeMap;

use ndarray::{stack, Array3, Axis};
use num_complex::Complex64;
use rayon::prelude::*;
use tracing::{debug, warn};
use xtal_core::{
    ensure_shape, CheshireScan, Dataset, ErrorInfo, Intensity, Mapper, Modes, Object, PhaseError,
    RngHandle, Translation,
};

use crate::cheshire;
use crate::fft::Fft3;
use crate::support::{apply_support, SupportUpdate};
use crate::sym::{SpaceGroup, SymOp};

fn default_alpha() -> f64 {
    1e-10
}

/// Construction parameters for [`CrystalMapper`]. Every array must share the
/// intensity grid shape.
#[derive(Debug, Clone, Default)]
pub struct MapperParams {
    /// Starting solid unit; a seeded random density inside the support otherwise.
    pub solid_unit: Option<Object>,
    /// Detector mask, `true` where the intensity was measured.
    pub mask: Option<Array3<bool>>,
    /// Fixed initial support; the whole cell otherwise.
    pub support: Option<Array3<bool>>,
    /// Weight of the coherent (Bragg) term, 1 everywhere by default.
    pub bragg_weighting: Option<Array3<f64>>,
    /// Weight of the incoherent (diffuse) term, 0 everywhere by default.
    pub diffuse_weighting: Option<Array3<f64>>,
    /// Voxel count kept by the adaptive support update.
    pub voxels: Option<usize>,
    /// Blur width in voxels applied before thresholding.
    pub voxel_sup_blur: Option<f64>,
    /// Multiplier applied to the blur width after each support update.
    pub voxel_sup_blur_frac: Option<f64>,
    /// Update the support every this many support projections.
    pub support_update_freq: Option<usize>,
    /// Unit-cell edge lengths in angstrom.
    pub unit_cell: Option<[f64; 3]>,
    /// Space group of the crystal.
    pub space_group: SpaceGroup,
    /// Regulariser added to the model intensity in the modulus projection.
    pub alpha: Option<f64>,
    /// Seed for the random starting density.
    pub seed: u64,
}

/// CPU mapper for a disordered crystal whose intensity is
/// `I = B |sum_k U_k|^2 + D sum_k |U_k|^2` over the symmetry copies `U_k`.
///
/// Modes hold the Fourier transforms of the copies, stacked along axis 0.
#[derive(Debug, Clone)]
pub struct CrystalMapper {
    intensity: Intensity,
    mask: Array3<bool>,
    bragg: Array3<f64>,
    diffuse: Array3<f64>,
    support: Array3<bool>,
    adaptive: Option<SupportUpdate>,
    ops: Vec<SymOp>,
    space_group: SpaceGroup,
    unit_cell: Option<[f64; 3]>,
    alpha: f64,
    fft: Fft3,
    modes: Modes,
}

fn check_param<T>(name: &str, array: &Option<Array3<T>>, shape: [usize; 3]) -> Result<(), PhaseError> {
    match array {
        Some(array) if array.shape() != &shape[..] => Err(PhaseError::Configuration(
            ErrorInfo::new("param-shape", "parameter grid does not match the intensity")
                .with_context("param", name)
                .with_context("expected", format!("{shape:?}"))
                .with_context("found", format!("{:?}", array.shape())),
        )),
        _ => Ok(()),
    }
}

impl CrystalMapper {
    /// Builds the mapper and its initial modes.
    pub fn new(intensity: Intensity, params: MapperParams) -> Result<Self, PhaseError> {
        let (n0, n1, n2) = intensity.dim();
        let shape = [n0, n1, n2];
        if shape.iter().any(|&len| len == 0) {
            return Err(PhaseError::configuration(
                "empty-grid",
                "intensity volume has a zero-length axis",
            ));
        }
        if intensity.iter().any(|value| !value.is_finite()) {
            return Err(PhaseError::configuration(
                "non-finite-intensity",
                "intensity volume contains NaN or infinite values",
            ));
        }
        check_param("solid_unit", &params.solid_unit, shape)?;
        check_param("mask", &params.mask, shape)?;
        check_param("support", &params.support, shape)?;
        check_param("bragg_weighting", &params.bragg_weighting, shape)?;
        check_param("diffuse_weighting", &params.diffuse_weighting, shape)?;

        let negatives = intensity.iter().filter(|&&value| value < 0.0).count();
        if negatives > 0 {
            warn!(negatives, "clamping negative intensities to zero");
        }
        let intensity = intensity.mapv(|value| value.max(0.0));

        let alpha = params.alpha.unwrap_or_else(default_alpha);
        if !alpha.is_finite() || alpha < 0.0 {
            return Err(PhaseError::configuration(
                "invalid-alpha",
                "alpha must be finite and non-negative",
            ));
        }

        let adaptive = params.voxels.map(|voxels| {
            SupportUpdate::new(
                voxels,
                params.voxel_sup_blur.unwrap_or(0.0),
                params.voxel_sup_blur_frac.unwrap_or(1.0),
                params.support_update_freq.unwrap_or(1),
            )
        });

        let support = params
            .support
            .unwrap_or_else(|| Array3::from_elem(intensity.dim(), true));
        let ops = params.space_group.ops(shape)?;
        let mut mapper = Self {
            mask: params
                .mask
                .unwrap_or_else(|| Array3::from_elem(intensity.dim(), true)),
            bragg: params
                .bragg_weighting
                .unwrap_or_else(|| Array3::from_elem(intensity.dim(), 1.0)),
            diffuse: params
                .diffuse_weighting
                .unwrap_or_else(|| Array3::zeros(intensity.dim())),
            support,
            adaptive,
            ops,
            space_group: params.space_group,
            unit_cell: params.unit_cell,
            alpha,
            fft: Fft3::new(shape),
            modes: Modes::zeros((1, n0, n1, n2)),
            intensity,
        };

        let solid = match params.solid_unit {
            Some(solid) => solid,
            None => {
                let density = RngHandle::substream(params.seed, 0).uniform_volume((n0, n1, n2));
                let density = density.mapv(|value| Complex64::new(value, 0.0));
                apply_support(&density, &mapper.support)?
            }
        };
        mapper.modes = mapper.modes_from_object(&solid)?;
        debug!(
            shape = ?shape,
            copies = mapper.ops.len(),
            space_group = %mapper.space_group,
            "crystal mapper ready"
        );
        Ok(mapper)
    }

    /// Grid shape of the unit cell.
    pub fn shape(&self) -> [usize; 3] {
        self.fft.shape()
    }

    /// Measured intensity (negative values clamped to zero).
    pub fn intensity(&self) -> &Intensity {
        &self.intensity
    }

    /// Current real-space support.
    pub fn support(&self) -> &Array3<bool> {
        &self.support
    }

    /// Space group used to replicate the solid unit.
    pub fn space_group(&self) -> SpaceGroup {
        self.space_group
    }

    /// Cached transform plans.
    pub fn fft(&self) -> &Fft3 {
        &self.fft
    }

    /// The solid unit placed at every symmetry position, in real space.
    pub fn symmetry_copies(&self, object: &Object) -> Vec<Object> {
        self.ops.iter().map(|op| op.apply(object)).collect()
    }

    /// Real-space crystal: every symmetry copy of `object` summed on the grid.
    pub fn crystal(&self, object: &Object) -> Object {
        let mut crystal = Object::zeros(object.dim());
        for copy in self.symmetry_copies(object) {
            crystal += &copy;
        }
        crystal
    }

    fn modes_shape(&self) -> [usize; 4] {
        let [n0, n1, n2] = self.shape();
        [self.ops.len(), n0, n1, n2]
    }

    /// Builds Fourier-domain modes from a real-space solid unit.
    pub fn modes_from_object(&self, object: &Object) -> Result<Modes, PhaseError> {
        ensure_shape("object-shape", &self.shape(), object.shape())?;
        let copies = self
            .ops
            .par_iter()
            .map(|op| {
                let mut copy = op.apply(object);
                self.fft.forward(&mut copy)?;
                Ok(copy)
            })
            .collect::<Result<Vec<_>, PhaseError>>()?;
        let views: Vec<_> = copies.iter().map(|copy| copy.view()).collect();
        stack(Axis(0), &views)
            .map_err(|err| PhaseError::projection("modes-stack", err.to_string()))
    }

    fn real_copies(&self, modes: &Modes) -> Result<Vec<Object>, PhaseError> {
        ensure_shape("modes-shape", &self.modes_shape(), modes.shape())?;
        let mut copies: Vec<Object> = modes
            .axis_iter(Axis(0))
            .map(|copy| copy.to_owned())
            .collect();
        copies
            .par_iter_mut()
            .try_for_each(|copy| self.fft.inverse(copy))?;
        Ok(copies)
    }

    /// Model intensity `B |sum U|^2 + D sum |U|^2` at every voxel.
    fn model_intensity(&self, modes: &Modes) -> Result<Intensity, PhaseError> {
        ensure_shape("modes-shape", &self.modes_shape(), modes.shape())?;
        let copies = self.ops.len();
        let mut model = Intensity::zeros(self.intensity.dim());
        for ((i, j, k), value) in model.indexed_iter_mut() {
            let mut coherent = Complex64::default();
            let mut incoherent = 0.0;
            for m in 0..copies {
                let amplitude = modes[[m, i, j, k]];
                coherent += amplitude;
                incoherent += amplitude.norm_sqr();
            }
            *value = self.bragg[[i, j, k]] * coherent.norm_sqr()
                + self.diffuse[[i, j, k]] * incoherent;
        }
        Ok(model)
    }

    /// Relative amplitude misfit over measured voxels,
    /// `sqrt(sum (sqrt(I_model) - sqrt(I))^2 / sum I)`.
    pub fn modulus_error(&self, modes: &Modes) -> Result<f64, PhaseError> {
        let model = self.model_intensity(modes)?;
        let mut misfit = 0.0;
        let mut norm = 0.0;
        for ((&measured, &predicted), &measured_here) in self
            .intensity
            .iter()
            .zip(model.iter())
            .zip(self.mask.iter())
        {
            if measured_here {
                let delta = predicted.sqrt() - measured.sqrt();
                misfit += delta * delta;
                norm += measured;
            }
        }
        Ok(if norm > 0.0 {
            (misfit / norm).sqrt()
        } else {
            misfit.sqrt()
        })
    }
}

impl Mapper for CrystalMapper {
    fn modes(&self) -> &Modes {
        &self.modes
    }

    fn set_modes(&mut self, modes: Modes) {
        self.modes = modes;
    }

    fn object(&self, modes: &Modes) -> Result<Object, PhaseError> {
        let copies = self.real_copies(modes)?;
        let mut solid = Object::zeros(self.intensity.dim());
        for (op, copy) in self.ops.iter().zip(copies.iter()) {
            solid += &op.invert(copy);
        }
        let scale = 1.0 / self.ops.len() as f64;
        solid.mapv_inplace(|value| value * scale);
        Ok(solid)
    }

    fn pmod(&self, modes: &Modes) -> Result<Modes, PhaseError> {
        let model = self.model_intensity(modes)?;
        let mut projected = modes.clone();
        for ((i, j, k), &measured) in self.intensity.indexed_iter() {
            if !self.mask[[i, j, k]] {
                continue;
            }
            let denominator = model[[i, j, k]] + self.alpha;
            if denominator <= 0.0 {
                continue;
            }
            let scale = (measured / denominator).sqrt();
            if !scale.is_finite() {
                return Err(PhaseError::Projection(
                    ErrorInfo::new("pmod-diverged", "modulus scale is not finite")
                        .with_context("voxel", format!("{:?}", [i, j, k])),
                ));
            }
            for m in 0..self.ops.len() {
                projected[[m, i, j, k]] *= scale;
            }
        }
        Ok(projected)
    }

    fn psup(&mut self, modes: &Modes) -> Result<Modes, PhaseError> {
        let object = self.object(modes)?;
        if let Some(update) = self.adaptive.as_mut() {
            if update.tick() {
                self.support = update.refresh(&object, &self.fft)?;
            }
        }
        let constrained = apply_support(&object, &self.support)?;
        self.modes_from_object(&constrained)
    }

    fn psup_current(&mut self, modes: &Modes) -> Result<Modes, PhaseError> {
        let object = self.object(modes)?;
        let constrained = apply_support(&object, &self.support)?;
        self.modes_from_object(&constrained)
    }

    fn imap(&self, modes: &Modes) -> Result<Intensity, PhaseError> {
        self.model_intensity(modes)
    }

    fn finish(&mut self, modes: &Modes) -> Result<BTreeMap<String, Dataset>, PhaseError> {
        let mut extra = BTreeMap::new();
        extra.insert(
            "support".to_string(),
            Dataset::Mask(self.support.clone().into_dyn()),
        );
        extra.insert(
            "support_voxels".to_string(),
            Dataset::Scalar(self.support.iter().filter(|&&inside| inside).count() as f64),
        );
        extra.insert(
            "intensity".to_string(),
            Dataset::Real(self.model_intensity(modes)?.into_dyn()),
        );
        extra.insert(
            "bragg_weighting".to_string(),
            Dataset::Real(self.bragg.clone().into_dyn()),
        );
        extra.insert(
            "diffuse_weighting".to_string(),
            Dataset::Real(self.diffuse.clone().into_dyn()),
        );
        extra.insert(
            "space_group".to_string(),
            Dataset::Text(self.space_group.to_string()),
        );
        if let Some(update) = &self.adaptive {
            extra.insert(
                "voxel_sup_blur".to_string(),
                Dataset::Scalar(update.sigma()),
            );
            extra.insert(
                "voxels".to_string(),
                Dataset::Scalar(update.voxels() as f64),
            );
        }
        if let Some(cell) = self.unit_cell {
            let shape = self.shape();
            let voxel_size = (0..3).map(|axis| cell[axis] / shape[axis] as f64).collect();
            extra.insert("voxel_size".to_string(), Dataset::Series(voxel_size));
        }
        Ok(extra)
    }

    fn scan_cheshire(
        &mut self,
        object: &Object,
        scan_points: Option<&[Translation]>,
    ) -> Result<CheshireScan, PhaseError> {
        let (scan, modes) = cheshire::scan(self, object, scan_points)?;
        self.modes = modes;
        Ok(scan)
    }

    fn unit_cell(&self, modes: &Modes) -> Result<Array3<Complex64>, PhaseError> {
        let mut cell = modes.sum_axis(Axis(0));
        self.fft.inverse(&mut cell)?;
        Ok(cell)
    }
}

//! Synthetic crystal generation.

use std::f64::consts::PI;

use ndarray::Array3;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::info;
use xtal_core::{Dataset, Intensity, Mapper, Object, PhaseError, RngHandle};

use crate::crystal::{CrystalMapper, MapperParams};
use crate::fft::{q_squared, Fft3};
use crate::support::{apply_support, gaussian_blur};
use crate::sym::SpaceGroup;

fn default_shape() -> [usize; 3] {
    [16, 16, 16]
}

fn default_radii() -> [f64; 3] {
    [0.15, 0.12, 0.1]
}

fn default_blur() -> f64 {
    1.0
}

fn default_debye_waller() -> f64 {
    0.5
}

/// Parameters of the synthetic crystal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardParams {
    /// Unit-cell grid.
    #[serde(default = "default_shape")]
    pub shape: [usize; 3],
    /// Semi-axes of the molecular envelope as fractions of the cell edges.
    #[serde(default = "default_radii")]
    pub radii: [f64; 3],
    /// Blur applied to the random density, in voxels.
    #[serde(default = "default_blur")]
    pub blur: f64,
    /// Rigid-body displacement width in voxels driving the Bragg/diffuse split.
    #[serde(default = "default_debye_waller")]
    pub debye_waller: f64,
    /// Space group used to place copies of the solid unit.
    #[serde(default)]
    pub space_group: SpaceGroup,
    /// Seed for the random density.
    #[serde(default)]
    pub seed: u64,
}

impl Default for ForwardParams {
    fn default() -> Self {
        Self {
            shape: default_shape(),
            radii: default_radii(),
            blur: default_blur(),
            debye_waller: default_debye_waller(),
            space_group: SpaceGroup::default(),
            seed: 0,
        }
    }
}

/// Synthetic data set with its ground truth.
#[derive(Debug, Clone)]
pub struct ForwardModel {
    /// Ground-truth solid unit.
    pub solid_unit: Object,
    /// Molecular envelope.
    pub support: Array3<bool>,
    /// Coherent weight per voxel.
    pub bragg_weighting: Array3<f64>,
    /// Incoherent weight per voxel.
    pub diffuse_weighting: Array3<f64>,
    /// Diffracted intensity.
    pub intensity: Intensity,
    /// Space group the copies were placed with.
    pub space_group: SpaceGroup,
}

impl ForwardModel {
    /// Named datasets in the layout read back by the phasing run.
    pub fn datasets(&self) -> Vec<(String, Dataset)> {
        vec![
            ("/data".to_string(), Dataset::Real(self.intensity.clone().into_dyn())),
            (
                "/forward_model/solid_unit".to_string(),
                Dataset::Complex(self.solid_unit.clone().into_dyn()),
            ),
            (
                "/forward_model/support".to_string(),
                Dataset::Mask(self.support.clone().into_dyn()),
            ),
            (
                "/forward_model/bragg_weighting".to_string(),
                Dataset::Real(self.bragg_weighting.clone().into_dyn()),
            ),
            (
                "/forward_model/diffuse_weighting".to_string(),
                Dataset::Real(self.diffuse_weighting.clone().into_dyn()),
            ),
            (
                "/forward_model/space_group".to_string(),
                Dataset::Text(self.space_group.to_string()),
            ),
        ]
    }
}

/// Ellipsoidal envelope centred at a quarter of the cell.
pub fn envelope(shape: [usize; 3], radii: [f64; 3]) -> Array3<bool> {
    let centre = shape.map(|len| len as f64 / 4.0);
    let semi = [0, 1, 2].map(|axis| (radii[axis] * shape[axis] as f64).max(0.5));
    Array3::from_shape_fn((shape[0], shape[1], shape[2]), |(i, j, k)| {
        let r2: f64 = [i, j, k]
            .iter()
            .enumerate()
            .map(|(axis, &x)| ((x as f64 - centre[axis]) / semi[axis]).powi(2))
            .sum();
        r2 <= 1.0
    })
}

/// Builds a seeded synthetic crystal and its diffraction intensity.
pub fn simulate(params: &ForwardParams) -> Result<ForwardModel, PhaseError> {
    let shape = params.shape;
    let support = envelope(shape, params.radii);

    let mut noise =
        RngHandle::substream(params.seed, 1).uniform_volume((shape[0], shape[1], shape[2]));
    noise.zip_mut_with(&support, |value, &inside| {
        if !inside {
            *value = 0.0;
        }
    });
    let blurred = gaussian_blur(&noise, params.blur, &Fft3::new(shape))?;
    let solid_unit = apply_support(&blurred.mapv(Complex64::from), &support)?;

    let width = 4.0 * PI * PI * params.debye_waller * params.debye_waller;
    let bragg_weighting = Array3::from_shape_fn((shape[0], shape[1], shape[2]), |(i, j, k)| {
        (-width * q_squared([i, j, k], shape)).exp()
    });
    let diffuse_weighting = bragg_weighting.mapv(|b| 1.0 - b);

    let mapper = CrystalMapper::new(
        Intensity::zeros((shape[0], shape[1], shape[2])),
        MapperParams {
            solid_unit: Some(solid_unit.clone()),
            bragg_weighting: Some(bragg_weighting.clone()),
            diffuse_weighting: Some(diffuse_weighting.clone()),
            space_group: params.space_group,
            seed: params.seed,
            ..MapperParams::default()
        },
    )?;
    let intensity = mapper.imap(mapper.modes())?;
    info!(
        shape = ?shape,
        support_voxels = support.iter().filter(|&&inside| inside).count(),
        space_group = %params.space_group,
        "forward model simulated"
    );
    Ok(ForwardModel {
        solid_unit,
        support,
        bragg_weighting,
        diffuse_weighting,
        intensity,
        space_group: params.space_group,
    })
}

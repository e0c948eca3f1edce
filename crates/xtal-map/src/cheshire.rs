//! Translational search over the Cheshire cell.

use ndarray::Array3;
use rayon::prelude::*;
use tracing::info;
use xtal_core::{CheshireScan, ErrorInfo, Modes, Object, PhaseError, Translation};

use crate::crystal::CrystalMapper;

/// Circular shift: `shifted[x] = object[(x - t) mod n]`.
pub fn roll<T: Copy>(object: &Array3<T>, t: Translation) -> Array3<T> {
    let (n0, n1, n2) = object.dim();
    Array3::from_shape_fn(object.dim(), |(i, j, k)| {
        object[[
            (i + n0 - t[0] % n0) % n0,
            (j + n1 - t[1] % n1) % n1,
            (k + n2 - t[2] % n2) % n2,
        ]]
    })
}

/// Translations to score, in row-major order over `cell` unless an explicit
/// list is given.
pub fn candidates(
    cell: [usize; 3],
    scan_points: Option<&[Translation]>,
) -> Result<Vec<Translation>, PhaseError> {
    match scan_points {
        None => {
            let mut points = Vec::with_capacity(cell.iter().product());
            for i in 0..cell[0] {
                for j in 0..cell[1] {
                    for k in 0..cell[2] {
                        points.push([i, j, k]);
                    }
                }
            }
            Ok(points)
        }
        Some([]) => Err(PhaseError::configuration(
            "empty-scan",
            "explicit Cheshire scan list is empty",
        )),
        Some(points) => {
            if let Some(outside) = points
                .iter()
                .find(|point| (0..3).any(|axis| point[axis] >= cell[axis]))
            {
                return Err(PhaseError::Configuration(
                    ErrorInfo::new("scan-point-outside", "scan point lies outside the Cheshire cell")
                        .with_context("point", format!("{outside:?}"))
                        .with_context("cell", format!("{cell:?}")),
                ));
            }
            Ok(points.to_vec())
        }
    }
}

/// Scores every candidate translation of `object` and returns the scan
/// together with the modes of the best-scoring shift.
pub fn scan(
    mapper: &CrystalMapper,
    object: &Object,
    scan_points: Option<&[Translation]>,
) -> Result<(CheshireScan, Modes), PhaseError> {
    let cell = mapper.space_group().cheshire_cell(mapper.shape());
    let points = candidates(cell, scan_points)?;

    let scores = points
        .par_iter()
        .map(|&t| mapper.modulus_error(&mapper.modes_from_object(&roll(object, t))?))
        .collect::<Result<Vec<f64>, PhaseError>>()?;

    let mut best = 0;
    for (index, score) in scores.iter().enumerate() {
        if score.total_cmp(&scores[best]).is_lt() {
            best = index;
        }
    }
    let worst = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut error_map = Array3::from_elem((cell[0], cell[1], cell[2]), worst);
    for (point, &score) in points.iter().zip(scores.iter()) {
        error_map[*point] = score;
    }

    let translation = points[best];
    let shifted = roll(object, translation);
    let modes = mapper.modes_from_object(&shifted)?;
    info!(
        candidates = points.len(),
        best = ?translation,
        error = scores[best],
        "cheshire search finished"
    );
    Ok((
        CheshireScan {
            object: shifted,
            error_map,
            best: translation,
        },
        modes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roll_moves_voxels_forward() {
        let volume = Array3::from_shape_fn((3, 4, 5), |(i, j, k)| (i * 100 + j * 10 + k) as i32);
        let shifted = roll(&volume, [1, 2, 3]);
        assert_eq!(shifted[[1, 2, 3]], volume[[0, 0, 0]]);
        assert_eq!(shifted[[0, 0, 0]], volume[[2, 2, 2]]);
        assert_eq!(roll(&volume, [3, 4, 5]), volume);
    }

    #[test]
    fn default_candidates_cover_the_cell() {
        let points = candidates([2, 1, 3], None).unwrap();
        assert_eq!(points.len(), 6);
        assert_eq!(points[0], [0, 0, 0]);
        assert_eq!(points[5], [1, 0, 2]);
    }

    #[test]
    fn explicit_candidates_are_validated() {
        assert!(candidates([2, 2, 2], Some(&[])).is_err());
        assert!(candidates([2, 2, 2], Some(&[[0, 2, 0]])).is_err());
        assert_eq!(candidates([2, 2, 2], Some(&[[1, 1, 1]])).unwrap(), vec![[1, 1, 1]]);
    }
}

//! Space groups and their grid operations.

use std::fmt;
use std::str::FromStr;

use ndarray::Array3;
use serde::{Deserialize, Serialize};
use xtal_core::{ErrorInfo, PhaseError};

/// Space groups the mapper can replicate the solid unit under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SpaceGroup {
    /// No symmetry beyond lattice translations.
    #[default]
    P1,
    /// Orthorhombic group with three perpendicular screw axes.
    P212121,
}

impl SpaceGroup {
    /// Grid operations mapping the solid unit onto each copy in the unit cell.
    pub fn ops(&self, shape: [usize; 3]) -> Result<Vec<SymOp>, PhaseError> {
        match self {
            SpaceGroup::P1 => Ok(vec![SymOp::identity()]),
            SpaceGroup::P212121 => {
                if shape.iter().any(|len| len % 2 != 0) {
                    return Err(PhaseError::Configuration(
                        ErrorInfo::new("odd-grid", "P212121 needs even grid dimensions")
                            .with_context("shape", format!("{shape:?}")),
                    ));
                }
                let [h0, h1, h2] = shape.map(|len| len / 2);
                Ok(vec![
                    SymOp::identity(),
                    SymOp {
                        flip: [true, true, false],
                        shift: [h0, 0, h2],
                    },
                    SymOp {
                        flip: [true, false, true],
                        shift: [0, h1, h2],
                    },
                    SymOp {
                        flip: [false, true, true],
                        shift: [h0, h1, 0],
                    },
                ])
            }
        }
    }

    /// Number of origin choices compatible with the group along each axis.
    pub fn origin_multiplicity(&self) -> [usize; 3] {
        match self {
            SpaceGroup::P1 => [1, 1, 1],
            SpaceGroup::P212121 => [2, 2, 2],
        }
    }

    /// Grid extent of the Cheshire cell for a unit cell of `shape`.
    pub fn cheshire_cell(&self, shape: [usize; 3]) -> [usize; 3] {
        let multiplicity = self.origin_multiplicity();
        [0, 1, 2].map(|axis| (shape[axis] / multiplicity[axis]).max(1))
    }
}

impl fmt::Display for SpaceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpaceGroup::P1 => write!(f, "P1"),
            SpaceGroup::P212121 => write!(f, "P212121"),
        }
    }
}

impl FromStr for SpaceGroup {
    type Err = PhaseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
        match compact.to_ascii_uppercase().as_str() {
            "P1" => Ok(SpaceGroup::P1),
            "P212121" => Ok(SpaceGroup::P212121),
            _ => Err(PhaseError::Configuration(
                ErrorInfo::new("unknown-space-group", "unsupported space group")
                    .with_context("space_group", value)
                    .with_hint("use P1 or P212121"),
            )),
        }
    }
}

/// Diagonal point operation followed by a grid translation: `p -> R p + t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymOp {
    /// Axes whose coordinate changes sign.
    pub flip: [bool; 3],
    /// Translation in grid voxels.
    pub shift: [usize; 3],
}

impl SymOp {
    /// The identity operation.
    pub fn identity() -> Self {
        Self {
            flip: [false; 3],
            shift: [0; 3],
        }
    }

    fn source_index(&self, x: [usize; 3], shape: [usize; 3]) -> [usize; 3] {
        [0, 1, 2].map(|axis| {
            let len = shape[axis];
            let moved = (x[axis] + len - self.shift[axis] % len) % len;
            if self.flip[axis] {
                (len - moved) % len
            } else {
                moved
            }
        })
    }

    fn target_index(&self, y: [usize; 3], shape: [usize; 3]) -> [usize; 3] {
        [0, 1, 2].map(|axis| {
            let len = shape[axis];
            let rotated = if self.flip[axis] {
                (len - y[axis]) % len
            } else {
                y[axis]
            };
            (rotated + self.shift[axis]) % len
        })
    }

    /// Places the solid unit into this copy's position: `copy[x] = solid[R(x - t)]`.
    pub fn apply<T: Copy>(&self, solid: &Array3<T>) -> Array3<T> {
        let (n0, n1, n2) = solid.dim();
        let shape = [n0, n1, n2];
        Array3::from_shape_fn(solid.dim(), |(i, j, k)| {
            let [a, b, c] = self.source_index([i, j, k], shape);
            solid[[a, b, c]]
        })
    }

    /// Undoes [`SymOp::apply`]: `solid[y] = copy[R y + t]`.
    pub fn invert<T: Copy>(&self, copy: &Array3<T>) -> Array3<T> {
        let (n0, n1, n2) = copy.dim();
        let shape = [n0, n1, n2];
        Array3::from_shape_fn(copy.dim(), |(i, j, k)| {
            let [a, b, c] = self.target_index([i, j, k], shape);
            copy[[a, b, c]]
        })
    }
}

use std::collections::BTreeMap;

use ndarray::{Array3, Array4, Axis};
use num_complex::Complex64;
use xtal_core::{
    modes_distance, CheshireScan, Dataset, Intensity, Mapper, Modes, Object, PhaseError,
    Translation,
};

struct DummyMapper {
    modes: Modes,
}

impl Mapper for DummyMapper {
    fn modes(&self) -> &Modes {
        &self.modes
    }

    fn set_modes(&mut self, modes: Modes) {
        self.modes = modes;
    }

    fn object(&self, modes: &Modes) -> Result<Object, PhaseError> {
        Ok(modes.index_axis(Axis(0), 0).to_owned())
    }

    fn pmod(&self, modes: &Modes) -> Result<Modes, PhaseError> {
        Ok(modes.clone())
    }

    fn psup(&mut self, modes: &Modes) -> Result<Modes, PhaseError> {
        Ok(modes.clone())
    }

    fn imap(&self, modes: &Modes) -> Result<Intensity, PhaseError> {
        Ok(modes.sum_axis(Axis(0)).mapv(|v| v.norm_sqr()))
    }

    fn finish(&mut self, _modes: &Modes) -> Result<BTreeMap<String, Dataset>, PhaseError> {
        Ok(BTreeMap::new())
    }

    fn scan_cheshire(
        &mut self,
        object: &Object,
        _scan_points: Option<&[Translation]>,
    ) -> Result<CheshireScan, PhaseError> {
        Ok(CheshireScan {
            object: object.clone(),
            error_map: Array3::zeros((1, 1, 1)),
            best: [0, 0, 0],
        })
    }
}

fn sample_modes() -> Modes {
    Array4::from_shape_fn((2, 2, 2, 2), |(k, i, j, l)| {
        Complex64::new((k + i) as f64, (j * l) as f64)
    })
}

#[test]
fn mapper_is_object_safe() {
    let mut mapper: Box<dyn Mapper> = Box::new(DummyMapper {
        modes: sample_modes(),
    });
    let modes = mapper.modes().clone();
    let projected = mapper.psup(&modes).unwrap();
    assert_eq!(mapper.distance(&projected, &modes), 0.0);
    assert_eq!(mapper.psup_current(&modes).unwrap(), projected);
    let cell = mapper.unit_cell(&modes).unwrap();
    assert_eq!(cell.shape(), &[2, 2, 2]);
    assert_eq!(cell[[1, 0, 0]], Complex64::new(3.0, 0.0));
}

#[test]
fn distance_is_relative_to_second_argument() {
    let b = Array4::from_elem((1, 1, 1, 2), Complex64::new(1.0, 0.0));
    let a = Array4::from_elem((1, 1, 1, 2), Complex64::new(2.0, 0.0));
    assert!((modes_distance(&a, &b) - 1.0).abs() < 1e-12);

    let zero = Array4::zeros((1, 1, 1, 2));
    assert!((modes_distance(&a, &zero) - 8.0_f64.sqrt()).abs() < 1e-12);
}

#[test]
fn distance_flags_shape_mismatch() {
    let a: Modes = Array4::zeros((1, 1, 1, 2));
    let b: Modes = Array4::zeros((1, 1, 2, 1));
    assert!(modes_distance(&a, &b).is_nan());
}

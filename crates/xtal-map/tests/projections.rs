use ndarray::{Array3, Array4};
use num_complex::Complex64;
use xtal_core::{Dataset, Mapper, Object, PhaseError};
use xtal_map::{simulate, CrystalMapper, ForwardParams, MapperParams, SpaceGroup};

fn synthetic(space_group: SpaceGroup) -> (xtal_map::ForwardModel, CrystalMapper) {
    let model = simulate(&ForwardParams {
        shape: [8, 8, 8],
        space_group,
        seed: 11,
        ..ForwardParams::default()
    })
    .unwrap();
    let mapper = CrystalMapper::new(
        model.intensity.clone(),
        MapperParams {
            solid_unit: Some(model.solid_unit.clone()),
            support: Some(model.support.clone()),
            bragg_weighting: Some(model.bragg_weighting.clone()),
            diffuse_weighting: Some(model.diffuse_weighting.clone()),
            space_group,
            ..MapperParams::default()
        },
    )
    .unwrap();
    (model, mapper)
}

fn max_abs_diff(a: &Object, b: &Object) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).norm())
        .fold(0.0, f64::max)
}

#[test]
fn object_round_trips_through_modes() {
    let (model, mapper) = synthetic(SpaceGroup::P212121);
    assert_eq!(mapper.modes().shape(), &[4, 8, 8, 8]);
    let object = mapper.object(mapper.modes()).unwrap();
    assert!(max_abs_diff(&object, &model.solid_unit) < 1e-9);
}

#[test]
fn modulus_projection_fixes_consistent_modes() {
    let (_, mapper) = synthetic(SpaceGroup::P212121);
    let projected = mapper.pmod(mapper.modes()).unwrap();
    assert!(mapper.distance(&projected, mapper.modes()) < 1e-6);
    assert!(mapper.modulus_error(mapper.modes()).unwrap() < 1e-6);
}

#[test]
fn modulus_projection_matches_measured_amplitudes() {
    let (model, _) = synthetic(SpaceGroup::P1);
    let mut mapper = CrystalMapper::new(
        model.intensity.clone(),
        MapperParams {
            seed: 3,
            ..MapperParams::default()
        },
    )
    .unwrap();
    let projected = mapper.pmod(mapper.modes()).unwrap();
    let predicted = mapper.imap(&projected).unwrap();
    for (p, m) in predicted.iter().zip(model.intensity.iter()) {
        assert!((p - m).abs() <= 1e-6 * (1.0 + m));
    }
    mapper.set_modes(projected);
    assert!(mapper.modulus_error(mapper.modes()).unwrap() < 1e-6);
}

#[test]
fn unmeasured_voxels_are_left_alone() {
    let (model, _) = synthetic(SpaceGroup::P1);
    let mapper = CrystalMapper::new(
        model.intensity.clone(),
        MapperParams {
            mask: Some(Array3::from_elem((8, 8, 8), false)),
            seed: 5,
            ..MapperParams::default()
        },
    )
    .unwrap();
    let projected = mapper.pmod(mapper.modes()).unwrap();
    assert_eq!(&projected, mapper.modes());
}

#[test]
fn support_projection_zeroes_outside_the_support() {
    let (model, mut mapper) = synthetic(SpaceGroup::P1);
    let noisy = mapper
        .modes_from_object(&Object::from_elem((8, 8, 8), Complex64::new(1.0, 0.5)))
        .unwrap();
    let projected = mapper.psup(&noisy).unwrap();
    let object = mapper.object(&projected).unwrap();
    for (value, &inside) in object.iter().zip(model.support.iter()) {
        if inside {
            assert!((value - Complex64::new(1.0, 0.5)).norm() < 1e-9);
        } else {
            assert!(value.norm() < 1e-9);
        }
    }
}

#[test]
fn adaptive_support_keeps_the_requested_voxels() {
    let (model, _) = synthetic(SpaceGroup::P1);
    let mut mapper = CrystalMapper::new(
        model.intensity.clone(),
        MapperParams {
            solid_unit: Some(model.solid_unit.clone()),
            voxels: Some(20),
            voxel_sup_blur: Some(1.0),
            voxel_sup_blur_frac: Some(0.5),
            support_update_freq: Some(2),
            ..MapperParams::default()
        },
    )
    .unwrap();
    let modes = mapper.modes().clone();
    mapper.psup(&modes).unwrap();
    assert_eq!(mapper.support().iter().filter(|&&v| v).count(), 512);
    mapper.psup(&modes).unwrap();
    assert_eq!(mapper.support().iter().filter(|&&v| v).count(), 20);

    let extra = mapper.finish(&modes).unwrap();
    assert_eq!(extra.get("support_voxels"), Some(&Dataset::Scalar(20.0)));
    assert_eq!(extra.get("voxel_sup_blur"), Some(&Dataset::Scalar(0.5)));
    assert_eq!(extra.get("voxels"), Some(&Dataset::Scalar(20.0)));
}

#[test]
fn finish_reports_mapper_fields() {
    let (_, mut mapper) = synthetic(SpaceGroup::P1);
    let modes = mapper.modes().clone();
    let extra = mapper.finish(&modes).unwrap();
    for key in [
        "support",
        "support_voxels",
        "intensity",
        "bragg_weighting",
        "diffuse_weighting",
    ] {
        assert!(extra.contains_key(key), "missing {key}");
    }
    assert!(!extra.contains_key("voxel_size"));
}

#[test]
fn voxel_size_follows_the_unit_cell() {
    let (model, _) = synthetic(SpaceGroup::P1);
    let mut mapper = CrystalMapper::new(
        model.intensity,
        MapperParams {
            unit_cell: Some([16.0, 8.0, 4.0]),
            ..MapperParams::default()
        },
    )
    .unwrap();
    let modes = mapper.modes().clone();
    let extra = mapper.finish(&modes).unwrap();
    assert_eq!(
        extra.get("voxel_size"),
        Some(&Dataset::Series(vec![2.0, 1.0, 0.5]))
    );
}

#[test]
fn unit_cell_is_the_real_space_sum_of_copies() {
    let (model, mapper) = synthetic(SpaceGroup::P212121);
    let cell = mapper.unit_cell(mapper.modes()).unwrap();
    let mut expected = Object::zeros((8, 8, 8));
    for copy in mapper.symmetry_copies(&model.solid_unit) {
        expected += &copy;
    }
    assert!(max_abs_diff(&cell, &expected) < 1e-9);
}

#[test]
fn mismatched_modes_are_a_projection_error() {
    let (_, mapper) = synthetic(SpaceGroup::P1);
    let wrong = Array4::<Complex64>::zeros((1, 4, 4, 4));
    assert!(matches!(mapper.pmod(&wrong), Err(PhaseError::Projection(_))));
    assert!(matches!(mapper.object(&wrong), Err(PhaseError::Projection(_))));
}

#[test]
fn mismatched_parameters_are_rejected() {
    let err = CrystalMapper::new(
        Array3::zeros((4, 4, 4)),
        MapperParams {
            mask: Some(Array3::from_elem((4, 4, 2), true)),
            ..MapperParams::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, PhaseError::Configuration(_)));
    assert_eq!(err.info().context.get("param").map(String::as_str), Some("mask"));
}

#[test]
fn crystal_sums_the_symmetry_copies() {
    let (model, mapper) = synthetic(SpaceGroup::P1);
    assert_eq!(mapper.crystal(&model.solid_unit), model.solid_unit);

    let (model, mapper) = synthetic(SpaceGroup::P212121);
    let crystal = mapper.crystal(&model.solid_unit);
    let copies = mapper.symmetry_copies(&model.solid_unit);
    assert_eq!(copies.len(), 4);
    let expected = copies
        .iter()
        .fold(Object::zeros(crystal.dim()), |acc, copy| acc + copy);
    assert!(max_abs_diff(&crystal, &expected) < 1e-12);
}

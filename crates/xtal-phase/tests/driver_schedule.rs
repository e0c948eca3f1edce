use xtal_core::{Mapper, PhaseError};
use xtal_map::{simulate, CrystalMapper, ForwardParams, MapperParams, SpaceGroup};
use xtal_phase::{parse_schedule, phase, DriverState, PhaseDriver};

fn mapper(space_group: SpaceGroup, adaptive: bool) -> CrystalMapper {
    let model = simulate(&ForwardParams {
        shape: [8, 8, 8],
        space_group,
        seed: 21,
        ..ForwardParams::default()
    })
    .unwrap();
    CrystalMapper::new(
        model.intensity.clone(),
        MapperParams {
            bragg_weighting: Some(model.bragg_weighting.clone()),
            diffuse_weighting: Some(model.diffuse_weighting.clone()),
            support: (!adaptive).then(|| model.support.clone()),
            voxels: adaptive.then_some(24),
            voxel_sup_blur: adaptive.then_some(1.5),
            voxel_sup_blur_frac: adaptive.then_some(0.8),
            support_update_freq: adaptive.then_some(3),
            space_group,
            seed: 99,
            ..MapperParams::default()
        },
    )
    .unwrap()
}

#[test]
fn unknown_algorithm_runs_nothing() {
    let mut mapper = mapper(SpaceGroup::P1, false);
    let start = mapper.modes().clone();
    let err = phase(&mut mapper, "5ERA 10XYZ", 1.0).unwrap_err();
    assert!(matches!(err, PhaseError::UnknownAlgorithm(_)));
    assert_eq!(err.info().context.get("label").map(String::as_str), Some("XYZ"));
    assert_eq!(mapper.modes(), &start);
}

#[test]
fn syntax_errors_run_nothing() {
    let mut mapper = mapper(SpaceGroup::P1, false);
    let start = mapper.modes().clone();
    assert!(matches!(
        phase(&mut mapper, "DM", 1.0),
        Err(PhaseError::ScheduleSyntax(_))
    ));
    assert_eq!(mapper.modes(), &start);
}

#[test]
fn traces_concatenate_across_steps() {
    let mut mapper = mapper(SpaceGroup::P212121, false);
    let outcome = phase(&mut mapper, "4DM 3ERA 0ERA", 1.0).unwrap();
    assert_eq!(outcome.info.emod.len(), 7);
    assert_eq!(outcome.info.econ.len(), 7);
    assert!(outcome.info.cheshire_error_map.is_none());
    assert!(outcome.info.extra.contains_key("support"));
    let cell = outcome.info.unit_cell.unwrap();
    assert_eq!(cell.shape(), &[8, 8, 8]);
}

#[test]
fn era_then_zero_era_matches_era() {
    let mut a = mapper(SpaceGroup::P1, true);
    let mut b = a.clone();
    let first = phase(&mut a, "6ERA", 1.0).unwrap();
    let second = phase(&mut b, "6ERA 0ERA", 1.0).unwrap();
    assert_eq!(a.modes(), b.modes());
    assert_eq!(first.object, second.object);
    assert_eq!(first.info.emod, second.info.emod);
}

#[test]
fn chained_dm_runs_match_a_single_run() {
    let mut split = mapper(SpaceGroup::P212121, true);
    let mut whole = split.clone();
    let chained = phase(&mut split, "4DM 5DM", 0.9).unwrap();
    let single = phase(&mut whole, "9DM", 0.9).unwrap();
    assert_eq!(split.modes(), whole.modes());
    assert_eq!(chained.info.emod, single.info.emod);
    assert_eq!(chained.info.econ, single.info.econ);
    assert_eq!(chained.object, single.object);
}

#[test]
fn cheshire_step_adds_a_map_but_no_errors() {
    let mut mapper = mapper(SpaceGroup::P212121, false);
    let outcome = phase(&mut mapper, "3ERA 7cheshire", 1.0).unwrap();
    assert_eq!(outcome.info.emod.len(), 3);
    let map = outcome.info.cheshire_error_map.unwrap();
    assert_eq!(map.shape(), &[4, 4, 4]);
    assert!(outcome.info.extra.contains_key("support"));
}

#[test]
fn extras_are_empty_without_projection_steps() {
    let mut mapper = mapper(SpaceGroup::P212121, false);
    let outcome = phase(&mut mapper, "1cheshire", 1.0).unwrap();
    assert!(outcome.info.emod.is_empty());
    assert!(outcome.info.extra.is_empty());
    assert!(outcome.info.cheshire_error_map.is_some());
}

#[test]
fn driver_steps_through_its_plan() {
    let mut mapper = mapper(SpaceGroup::P1, false);
    let steps = parse_schedule("2DM 2ERA").unwrap();
    let mut driver = PhaseDriver::new(&mut mapper, &steps, 1.0).unwrap();
    assert_eq!(driver.state(), DriverState::Idle);
    assert_eq!(driver.step().unwrap(), DriverState::Running { step: 1 });
    assert_eq!(driver.info().emod.len(), 2);
    assert_eq!(driver.step().unwrap(), DriverState::Finished);
    assert_eq!(driver.step().unwrap(), DriverState::Finished);
    let outcome = driver.run().unwrap();
    assert_eq!(outcome.info.emod.len(), 4);
}

#[test]
fn driver_accepts_trait_objects() {
    let mut concrete = mapper(SpaceGroup::P1, false);
    let dynamic: &mut dyn Mapper = &mut concrete;
    let outcome = phase(dynamic, "2ERA", 1.0).unwrap();
    assert_eq!(outcome.info.emod.len(), 2);
}


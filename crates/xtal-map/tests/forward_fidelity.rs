use xtal_core::Intensity;
use xtal_map::{
    best_fidelity, calculate_fidelity, roll, simulate, CrystalMapper, ForwardParams, MapperParams,
    SpaceGroup,
};

fn params(seed: u64) -> ForwardParams {
    ForwardParams {
        shape: [8, 8, 8],
        space_group: SpaceGroup::P212121,
        seed,
        ..ForwardParams::default()
    }
}

#[test]
fn simulation_is_seeded() {
    let a = simulate(&params(3)).unwrap();
    let b = simulate(&params(3)).unwrap();
    let c = simulate(&params(4)).unwrap();
    assert_eq!(a.intensity, b.intensity);
    assert_eq!(a.solid_unit, b.solid_unit);
    assert_ne!(a.solid_unit, c.solid_unit);
}

#[test]
fn simulated_density_lives_inside_the_envelope() {
    let model = simulate(&params(1)).unwrap();
    let inside = model.support.iter().filter(|&&v| v).count();
    assert!(inside > 0 && inside < 512);
    for (value, &keep) in model.solid_unit.iter().zip(model.support.iter()) {
        if !keep {
            assert_eq!(value.norm(), 0.0);
        }
    }
    assert!(model.intensity.iter().all(|&v| v >= 0.0));
}

#[test]
fn weights_split_bragg_and_diffuse() {
    let model = simulate(&params(1)).unwrap();
    assert!((model.bragg_weighting[[0, 0, 0]] - 1.0).abs() < 1e-12);
    assert!(model.diffuse_weighting[[0, 0, 0]].abs() < 1e-12);
    for (b, d) in model
        .bragg_weighting
        .iter()
        .zip(model.diffuse_weighting.iter())
    {
        assert!(*b > 0.0 && *b <= 1.0);
        assert!((b + d - 1.0).abs() < 1e-12);
    }
    assert!(model.bragg_weighting[[4, 4, 4]] < model.bragg_weighting[[1, 0, 0]]);
}

#[test]
fn datasets_use_the_run_layout() {
    let model = simulate(&params(1)).unwrap();
    let names: Vec<String> = model.datasets().into_iter().map(|(name, _)| name).collect();
    assert!(names.contains(&"/data".to_string()));
    assert!(names.contains(&"/forward_model/solid_unit".to_string()));
}

#[test]
fn translated_reconstruction_has_perfect_translational_fidelity() {
    let model = simulate(&params(2)).unwrap();
    let estimate = roll(&model.solid_unit, [2, 0, 5]);
    let fid = calculate_fidelity(&model.solid_unit, &estimate).unwrap();
    assert!(fid.fidelity > 0.1);
    assert!(fid.fidelity_trans < 1e-9);
    assert_eq!(roll(&estimate, fid.shift), model.solid_unit);
}

#[test]
fn best_fidelity_searches_symmetry_copies() {
    let model = simulate(&params(2)).unwrap();
    let mapper = CrystalMapper::new(
        Intensity::zeros((8, 8, 8)),
        MapperParams {
            space_group: SpaceGroup::P212121,
            ..MapperParams::default()
        },
    )
    .unwrap();
    let copy = mapper.symmetry_copies(&model.solid_unit).remove(2);
    let direct = calculate_fidelity(&model.solid_unit, &copy).unwrap();
    let best = best_fidelity(&mapper, &model.solid_unit, &copy).unwrap();
    assert!(best.fidelity_trans < 1e-9);
    assert!(direct.fidelity_trans > best.fidelity_trans);
}

use criterion::{criterion_group, criterion_main, Criterion};
use xtal_map::{simulate, CrystalMapper, ForwardParams, MapperParams, SpaceGroup};
use xtal_phase::phase;

fn make_mapper() -> CrystalMapper {
    let model = simulate(&ForwardParams {
        shape: [16, 16, 16],
        space_group: SpaceGroup::P212121,
        seed: 4242,
        ..ForwardParams::default()
    })
    .expect("simulate");
    CrystalMapper::new(
        model.intensity,
        MapperParams {
            bragg_weighting: Some(model.bragg_weighting),
            diffuse_weighting: Some(model.diffuse_weighting),
            voxels: Some(64),
            voxel_sup_blur: Some(2.0),
            voxel_sup_blur_frac: Some(0.9),
            space_group: SpaceGroup::P212121,
            seed: 1234,
            ..MapperParams::default()
        },
    )
    .expect("mapper")
}

fn bench_phase(c: &mut Criterion) {
    let mapper = make_mapper();
    c.bench_function("phase_dm_era", |b| {
        b.iter(|| {
            let mut working = mapper.clone();
            let _ = phase(&mut working, "10DM 5ERA", 1.0).expect("phase");
        });
    });
    c.bench_function("phase_cheshire", |b| {
        b.iter(|| {
            let mut working = mapper.clone();
            let _ = phase(&mut working, "1cheshire", 1.0).expect("phase");
        });
    });
}

criterion_group!(benches, bench_phase);
criterion_main!(benches);

use ndarray::Array3;
use proptest::prelude::*;
use xtal_core::RngHandle;
use xtal_map::{roll, SpaceGroup};

fn random_volume(seed: u64, shape: [usize; 3]) -> Array3<f64> {
    RngHandle::from_seed(seed).uniform_volume((shape[0], shape[1], shape[2]))
}

proptest! {
    #[test]
    fn symmetry_ops_are_invertible(seed in any::<u64>(), h in prop::array::uniform3(1usize..4)) {
        let shape = h.map(|half| half * 2);
        let solid = random_volume(seed, shape);
        for op in SpaceGroup::P212121.ops(shape).unwrap() {
            prop_assert_eq!(op.invert(&op.apply(&solid)), solid.clone());
            prop_assert_eq!(op.apply(&op.apply(&solid)), solid.clone());
        }
    }

    #[test]
    fn roll_composes_modulo_the_grid(
        seed in any::<u64>(),
        shape in prop::array::uniform3(1usize..6),
        t in prop::array::uniform3(0usize..12),
    ) {
        let volume = random_volume(seed, shape);
        let back = [0, 1, 2].map(|axis| shape[axis] - t[axis] % shape[axis]);
        prop_assert_eq!(roll(&roll(&volume, t), back), volume);
    }
}

#![deny(missing_docs)]
#![doc = "CPU mapper for disordered crystals: symmetry copies, modulus and support projections, Cheshire search, fidelity and a synthetic forward model."]

pub mod cheshire;
pub mod crystal;
pub mod fft;
pub mod fidelity;
pub mod forward;
pub mod support;
pub mod sym;

pub use cheshire::roll;
pub use crystal::{CrystalMapper, MapperParams};
pub use fft::Fft3;
pub use fidelity::{best_fidelity, calculate_fidelity, Fidelity};
pub use forward::{simulate, ForwardModel, ForwardParams};
pub use support::SupportUpdate;
pub use sym::{SpaceGroup, SymOp};

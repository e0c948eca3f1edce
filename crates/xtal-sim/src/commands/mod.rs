pub mod phase;
pub mod simulate;
pub mod version;

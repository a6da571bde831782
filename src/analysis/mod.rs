//! Per-index computations run by the background workers.

pub mod band;
pub mod spectrum;
pub mod timecodes;

pub use band::{FrameBand, FrameBandContext};
pub use spectrum::SpectralTransformContext;
pub use timecodes::TimecodesJob;

//! Public types exposed by the `scrubline` crate.

pub mod media;
pub mod options;
pub mod timecodes;

pub use media::{ArtifactKind, LoadedMedia, MediaIdentity, MediaState};
pub use options::{PipelineConfig, PipelineConfigBuilder};
pub use timecodes::TimecodeSet;

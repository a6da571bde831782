#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::useless_vec,
        clippy::uninlined_format_args,
        clippy::float_cmp,
        clippy::cast_precision_loss
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Documentation lints: internal helpers don't need error/panic sections.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Cast safety: sample values, band heights and slice indices are bounded by
// the media itself; quantization to u8/f32 is the intended behaviour.
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
//
// Style lints that add noise without improving clarity here.
#![allow(clippy::items_after_statements)]
#![allow(clippy::similar_names)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::unused_self)]
// Queueing calls return informational counts that callers routinely ignore.
#![allow(clippy::must_use_candidate)]

//! Background media analysis for an interactive subtitle editor.
//!
//! A [`MediaSession`] owns three worker threads for the loaded video file:
//! one extracts frame timecodes, one computes per-frame colour bands, and one
//! computes spectral columns of the audio track. Results are published
//! incrementally, persisted in a content-keyed on-disk cache, and reused the
//! next time the same file is opened.

/// The scrubline crate version (matches `Cargo.toml`).
pub const SCRUBLINE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod analysis;
pub mod constants;
pub mod decoder;
pub mod error;
pub mod events;
pub mod io;
pub mod session;
pub mod types;
pub mod worker;

pub use analysis::{FrameBand, FrameBandContext, SpectralTransformContext, TimecodesJob};
pub use constants::*;
pub use decoder::{AudioFormat, FrameBuffer, MediaDecoder, SampleFormat, SampleWindow};
pub use error::{Result, ScrublineError};
pub use events::{ChangeFlag, EventSink, PipelineEvent, RedrawGate};
pub use io::cache::{CacheKey, PersistentCache};
pub use session::MediaSession;
pub use types::{
    ArtifactKind, LoadedMedia, MediaIdentity, MediaState, PipelineConfig, PipelineConfigBuilder,
    TimecodeSet,
};
pub use worker::{
    ComputationWorker, IndexedProvider, ProviderContext, TaskCompletion, WorkerJob, WorkerState,
};

//! Error types shared by the cache, workers, and analysis contexts.

use std::path::PathBuf;

use thiserror::Error;

use crate::decoder::SampleFormat;

pub type Result<T> = std::result::Result<T, ScrublineError>;

#[derive(Debug, Error)]
pub enum ScrublineError {
    #[error("media source not found: {path}")]
    NotFound { path: PathBuf },

    #[error("unsupported audio sample format: {format:?}")]
    UnsupportedSampleFormat { format: SampleFormat },

    #[error("decoder failed: {reason}")]
    Decode { reason: String },

    #[error("frame buffer too small for a {width}x{height} strip: {len} bytes (stride {stride})")]
    InvalidFrameBuffer {
        width: u32,
        height: u32,
        stride: usize,
        len: usize,
    },

    #[error("cache record {key} is corrupt: {reason}")]
    CacheCorrupt { key: String, reason: &'static str },

    #[error("invalid pipeline configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("background task panicked: {message}")]
    WorkerPanicked { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Encode(#[from] bincode::error::EncodeError),

    #[error(transparent)]
    Bincode(#[from] bincode::error::DecodeError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ScrublineError {
    /// Whether this failure should stop all further work of the same kind for
    /// the currently loaded media instead of only blanking one index.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnsupportedSampleFormat { .. })
    }
}

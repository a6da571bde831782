//! Narrow interface to the external media decoder.
//!
//! Every method may block for a long time and is only ever called from a
//! background worker thread. Implementations must be shareable across the
//! band and spectrum threads, hence `Send + Sync`.

use std::path::Path;

use crate::error::Result;

/// Raw PCM layout reported by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    S16,
    S32,
    F32,
    F64,
    /// A decoder-specific format code this pipeline cannot normalize.
    Other(u32),
}

impl SampleFormat {
    /// Bytes per single-channel sample, `None` for unrecognized formats.
    #[must_use]
    pub fn bytes_per_sample(self) -> Option<usize> {
        match self {
            Self::S16 => Some(2),
            Self::S32 | Self::F32 => Some(4),
            Self::F64 => Some(8),
            Self::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

/// Interleaved little-endian samples starting at `first_sample`.
///
/// `data` may hold fewer frames than requested near the end of the stream.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    pub first_sample: u64,
    pub channels: u16,
    pub sample_format: SampleFormat,
    pub sample_rate: u32,
    pub data: Vec<u8>,
}

/// Packed RGB24 pixels; rows are `stride` bytes apart.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub data: Vec<u8>,
}

pub trait MediaDecoder: Send + Sync {
    /// Presentation timestamps (ms) of every frame, and the keyframe subset.
    ///
    /// Must fail with [`crate::ScrublineError::NotFound`] when `path` is gone.
    fn extract_timecodes_and_keyframes(&self, path: &Path) -> Result<(Vec<i64>, Vec<i64>)>;

    /// Decode the frame at `frame_index` scaled down to `width` x `height`.
    fn decode_thumbnail_strip(
        &self,
        frame_index: usize,
        width: u32,
        height: u32,
    ) -> Result<FrameBuffer>;

    /// Layout of the audio track, `None` when the media has no audio.
    fn audio_format(&self) -> Result<Option<AudioFormat>>;

    fn read_sample_window(&self, first_sample: u64, count: usize) -> Result<SampleWindow>;
}

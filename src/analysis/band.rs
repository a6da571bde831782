//! One-pixel-wide colour strips for the video preview band.

use crate::constants::BAND_HEIGHT;
use crate::decoder::{FrameBuffer, MediaDecoder};
use crate::error::{Result, ScrublineError};
use crate::types::{ArtifactKind, LoadedMedia};
use crate::worker::ProviderContext;

/// Top-to-bottom RGB pixels of one downscaled frame.
pub type FrameBand = Vec<[u8; 3]>;

#[derive(Debug, Default)]
pub struct FrameBandContext;

impl FrameBandContext {
    /// Decode frame `frame_index` as a 1 x [`BAND_HEIGHT`] strip.
    pub fn band_at(decoder: &dyn MediaDecoder, frame_index: usize) -> Result<FrameBand> {
        let buffer = decoder.decode_thumbnail_strip(frame_index, 1, BAND_HEIGHT as u32)?;
        copy_strip(&buffer)
    }
}

impl ProviderContext for FrameBandContext {
    type Key = usize;
    type Value = FrameBand;

    fn kind(&self) -> ArtifactKind {
        ArtifactKind::FrameBands
    }

    fn work(&mut self, media: &LoadedMedia, key: usize) -> Result<FrameBand> {
        Self::band_at(media.decoder.as_ref(), key)
    }
}

/// Copy the first pixel of each of the first `BAND_HEIGHT` rows out of a
/// decoder-owned buffer.
fn copy_strip(buffer: &FrameBuffer) -> Result<FrameBand> {
    let invalid = || ScrublineError::InvalidFrameBuffer {
        width: buffer.width,
        height: buffer.height,
        stride: buffer.stride,
        len: buffer.data.len(),
    };

    if buffer.width == 0 || (buffer.height as usize) < BAND_HEIGHT || buffer.stride < 3 {
        return Err(invalid());
    }
    let required = buffer.stride * (BAND_HEIGHT - 1) + 3;
    if buffer.data.len() < required {
        return Err(invalid());
    }

    Ok((0..BAND_HEIGHT)
        .map(|row| {
            let at = row * buffer.stride;
            [buffer.data[at], buffer.data[at + 1], buffer.data[at + 2]]
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(stride: usize, rows: usize) -> FrameBuffer {
        let mut data = vec![0xEE; stride * rows];
        for row in 0..rows {
            let at = row * stride;
            data[at..at + 3].copy_from_slice(&[row as u8, 100, 255 - row as u8]);
        }
        FrameBuffer {
            width: 1,
            height: rows as u32,
            stride,
            data,
        }
    }

    #[test]
    fn packed_rows_are_copied_in_order() {
        let band = copy_strip(&strip(3, BAND_HEIGHT)).unwrap();
        assert_eq!(band.len(), BAND_HEIGHT);
        assert_eq!(band[0], [0, 100, 255]);
        assert_eq!(band[29], [29, 100, 226]);
    }

    #[test]
    fn padded_stride_skips_row_padding() {
        let band = copy_strip(&strip(16, BAND_HEIGHT)).unwrap();
        assert_eq!(band[1], [1, 100, 254]);
        assert!(band.iter().all(|pixel| pixel[1] == 100));
    }

    #[test]
    fn short_buffer_is_rejected() {
        let mut buffer = strip(3, BAND_HEIGHT);
        buffer.data.truncate(50);
        let err = copy_strip(&buffer).unwrap_err();
        assert!(matches!(err, ScrublineError::InvalidFrameBuffer { len: 50, .. }));
        assert!(!err.is_fatal());

        assert!(copy_strip(&strip(3, BAND_HEIGHT - 1)).is_err());
    }
}

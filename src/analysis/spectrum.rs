//! Spectral magnitude columns for the audio waveform view.
//!
//! A column is the log-scaled magnitude spectrum of a 2048-sample window,
//! quantized to bytes with the highest frequency first. Window start offsets
//! are rounded down to a multiple of 64 samples so neighbouring timestamps
//! share a column.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::constants::{DERIVATION_DISTANCE, DERIVATION_SIZE, SPECTRUM_BINS, SPECTRUM_WINDOW};
use crate::decoder::{MediaDecoder, SampleFormat, SampleWindow};
use crate::error::{Result, ScrublineError};
use crate::types::{ArtifactKind, LoadedMedia};
use crate::worker::ProviderContext;

/// Computes spectrum columns. Keys are slice indices of `slice_ms` each.
pub struct SpectralTransformContext {
    slice_ms: u32,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    mono: Vec<f32>,
}

impl SpectralTransformContext {
    #[must_use]
    pub fn new(slice_ms: u32) -> Self {
        let fft = FftPlanner::<f32>::new().plan_fft_forward(SPECTRUM_WINDOW);
        let scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
        Self {
            slice_ms,
            fft,
            buffer: vec![Complex::default(); SPECTRUM_WINDOW],
            scratch,
            mono: Vec::with_capacity(SPECTRUM_WINDOW),
        }
    }

    #[must_use]
    pub fn slice_ms(&self) -> u32 {
        self.slice_ms
    }

    /// Presentation time (ms) at which slice `slice` starts.
    #[must_use]
    pub fn slice_pts(&self, slice: u64) -> i64 {
        i64::try_from(slice.saturating_mul(u64::from(self.slice_ms))).unwrap_or(i64::MAX)
    }

    /// Compute the column for the window containing `pts`. Media without an
    /// audio track yields a silent (all-zero) column.
    pub fn column_at(&mut self, decoder: &dyn MediaDecoder, pts: i64) -> Result<Vec<u8>> {
        let Some(format) = decoder.audio_format()? else {
            return Ok(vec![0; SPECTRUM_BINS]);
        };
        let first = window_start(pts, format.sample_rate);
        let window = decoder.read_sample_window(first, SPECTRUM_WINDOW)?;

        downmix(&window, &mut self.mono)?;
        if self.mono.len() < SPECTRUM_WINDOW {
            tracing::trace!(
                spectrum.first_sample = first,
                spectrum.frames = self.mono.len(),
                "short sample window; zero padding"
            );
        }

        for (slot, index) in self.buffer.iter_mut().zip(0..) {
            let sample = self.mono.get(index).copied().unwrap_or(0.0);
            *slot = Complex::new(sample, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        Ok(quantize(&self.buffer[..SPECTRUM_BINS]))
    }
}

impl ProviderContext for SpectralTransformContext {
    type Key = u64;
    type Value = Vec<u8>;

    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Spectrum {
            slice_ms: self.slice_ms,
        }
    }

    fn work(&mut self, media: &LoadedMedia, key: u64) -> Result<Vec<u8>> {
        let pts = self.slice_pts(key);
        self.column_at(media.decoder.as_ref(), pts)
    }
}

/// First sample of the window for `pts`, aligned down to the derivation grid.
fn window_start(pts: i64, sample_rate: u32) -> u64 {
    let pts = u64::try_from(pts).unwrap_or(0);
    let audio_frame = pts.saturating_mul(u64::from(sample_rate)) / 1000;
    (audio_frame >> DERIVATION_DISTANCE) << DERIVATION_DISTANCE
}

/// Decode interleaved little-endian samples into normalized mono frames.
fn downmix(window: &SampleWindow, mono: &mut Vec<f32>) -> Result<()> {
    mono.clear();
    let width = window
        .sample_format
        .bytes_per_sample()
        .ok_or(ScrublineError::UnsupportedSampleFormat {
            format: window.sample_format,
        })?;
    let channels = usize::from(window.channels.max(1));
    let frame_bytes = width * channels;

    for frame in window.data.chunks_exact(frame_bytes).take(SPECTRUM_WINDOW) {
        let sum: f64 = frame
            .chunks_exact(width)
            .map(|bytes| normalize(window.sample_format, bytes))
            .sum();
        mono.push((sum / channels as f64) as f32);
    }
    Ok(())
}

/// Map one sample to [-1, 1]. Integer formats are divided by their full
/// scale (2^15, 2^31). The divisor determines the bytes stored in spectrum
/// records, so changing it requires a new `CACHE_FORMAT_VERSION`.
fn normalize(format: SampleFormat, bytes: &[u8]) -> f64 {
    match (format, bytes) {
        (SampleFormat::S16, &[a, b]) => f64::from(i16::from_le_bytes([a, b])) / 32_768.0,
        (SampleFormat::S32, &[a, b, c, d]) => {
            f64::from(i32::from_le_bytes([a, b, c, d])) / 2_147_483_648.0
        }
        (SampleFormat::F32, &[a, b, c, d]) => f64::from(f32::from_le_bytes([a, b, c, d])),
        (SampleFormat::F64, &[a, b, c, d, e, f, g, h]) => {
            f64::from_le_bytes([a, b, c, d, e, f, g, h])
        }
        _ => 0.0,
    }
}

fn quantize(bins: &[Complex<f32>]) -> Vec<u8> {
    let scale = 9.0 / ((1u32 << DERIVATION_SIZE) as f32).sqrt();
    bins.iter()
        .rev()
        .map(|bin| {
            let value = (bin.norm() * scale + 1.0).ln() * 255.0;
            value.clamp(0.0, 255.0) as u8
        })
        .collect()
}

//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use scrubline::{
    AudioFormat, FrameBuffer, MediaDecoder, MediaSession, PipelineConfig, Result, SampleFormat,
    SampleWindow, ScrublineError,
};
use tempfile::TempDir;

pub const FRAME_COUNT: usize = 10;
pub const FRAME_MS: i64 = 40;
pub const SAMPLE_RATE: u32 = 8_000;
pub const SLICE_MS: u32 = 40;
pub const WAIT: Duration = Duration::from_secs(10);

/// Decoder over a synthetic clip. Every call is counted so tests can assert
/// that cached data never reaches the decoder.
pub struct FakeDecoder {
    /// Red channel of every band pixel; tells media apart in results.
    pub tint: u8,
    pub sample_format: SampleFormat,
    pub has_audio: bool,
    pub strip_delay: Duration,
    pub extract_calls: AtomicUsize,
    pub strip_calls: AtomicUsize,
    pub window_calls: AtomicUsize,
    pub format_calls: AtomicUsize,
}

impl FakeDecoder {
    pub fn new(tint: u8) -> Self {
        Self {
            tint,
            sample_format: SampleFormat::S16,
            has_audio: true,
            strip_delay: Duration::ZERO,
            extract_calls: AtomicUsize::new(0),
            strip_calls: AtomicUsize::new(0),
            window_calls: AtomicUsize::new(0),
            format_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_strip_delay(mut self, delay: Duration) -> Self {
        self.strip_delay = delay;
        self
    }

    pub fn without_audio(mut self) -> Self {
        self.has_audio = false;
        self
    }

    pub fn with_sample_format(mut self, format: SampleFormat) -> Self {
        self.sample_format = format;
        self
    }

    pub fn total_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
            + self.strip_calls.load(Ordering::SeqCst)
            + self.window_calls.load(Ordering::SeqCst)
    }

    fn total_samples() -> u64 {
        u64::from(SAMPLE_RATE) * (FRAME_COUNT as u64) * (FRAME_MS as u64) / 1000
    }
}

impl MediaDecoder for FakeDecoder {
    fn extract_timecodes_and_keyframes(&self, path: &Path) -> Result<(Vec<i64>, Vec<i64>)> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        if !path.exists() {
            return Err(ScrublineError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let timecodes = (0..FRAME_COUNT as i64).map(|i| i * FRAME_MS).collect();
        Ok((timecodes, vec![0, 5 * FRAME_MS]))
    }

    fn decode_thumbnail_strip(
        &self,
        frame_index: usize,
        width: u32,
        height: u32,
    ) -> Result<FrameBuffer> {
        self.strip_calls.fetch_add(1, Ordering::SeqCst);
        if !self.strip_delay.is_zero() {
            std::thread::sleep(self.strip_delay);
        }
        let stride = width as usize * 3;
        let data = (0..height as usize * width as usize)
            .flat_map(|_| [self.tint, frame_index as u8, 0])
            .collect();
        Ok(FrameBuffer {
            width,
            height,
            stride,
            data,
        })
    }

    fn audio_format(&self) -> Result<Option<AudioFormat>> {
        self.format_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.has_audio.then_some(AudioFormat {
            sample_rate: SAMPLE_RATE,
            channels: 1,
            sample_format: self.sample_format,
        }))
    }

    fn read_sample_window(&self, first_sample: u64, count: usize) -> Result<SampleWindow> {
        self.window_calls.fetch_add(1, Ordering::SeqCst);
        let end = (first_sample + count as u64).min(Self::total_samples());
        let data = (first_sample..end)
            .flat_map(|i| {
                let phase = i as f32 * 2.0 * std::f32::consts::PI * 440.0 / SAMPLE_RATE as f32;
                ((phase.sin() * 8_000.0) as i16).to_le_bytes()
            })
            .collect();
        Ok(SampleWindow {
            first_sample,
            channels: 1,
            sample_format: self.sample_format,
            sample_rate: SAMPLE_RATE,
            data,
        })
    }
}

pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// Create an (empty) media file; only its existence matters.
    pub fn media(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"not really a video").unwrap();
        path
    }

    pub fn config(&self) -> PipelineConfig {
        self.config_with_slice(SLICE_MS)
    }

    pub fn config_with_slice(&self, slice_ms: u32) -> PipelineConfig {
        PipelineConfig::builder()
            .cache_dir(self.dir.path().join("cache"))
            .spectrum_slice_ms(slice_ms)
            .sync_interval_ms(10)
            .build()
    }

    pub fn session(&self) -> MediaSession {
        self.session_with_slice(SLICE_MS)
    }

    /// Session sharing this workspace's cache but cutting the spectrum into
    /// `slice_ms` slices.
    pub fn session_with_slice(&self, slice_ms: u32) -> MediaSession {
        let mut session = MediaSession::new(self.config_with_slice(slice_ms)).unwrap();
        session.start().unwrap();
        session
    }
}

/// Poll `session` until `condition` holds, failing the test after [`WAIT`].
pub fn wait_until(session: &mut MediaSession, mut condition: impl FnMut(&MediaSession) -> bool) {
    let deadline = Instant::now() + WAIT;
    loop {
        session.poll();
        if condition(session) {
            return;
        }
        assert!(Instant::now() < deadline, "session did not reach the expected state");
        std::thread::sleep(Duration::from_millis(5));
    }
}

pub fn decoder(tint: u8) -> Arc<FakeDecoder> {
    Arc::new(FakeDecoder::new(tint))
}

/// Number of spectrum slices covering the synthetic clip.
pub fn slice_count() -> usize {
    ((FRAME_COUNT as i64 - 1) * FRAME_MS / i64::from(SLICE_MS)) as usize + 1
}

//! Per-column cost of the spectral transform.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench spectrum_benchmark
//! ```

use std::hint::black_box;
use std::path::Path;

use criterion::{Criterion, criterion_group, criterion_main};
use scrubline::{
    AudioFormat, FrameBuffer, MediaDecoder, Result, SampleFormat, SampleWindow,
    SpectralTransformContext,
};

/// White noise in memory, so the benchmark measures the transform alone.
struct NoiseDecoder {
    format: SampleFormat,
    channels: u16,
    data: Vec<u8>,
}

impl NoiseDecoder {
    fn new(format: SampleFormat, channels: u16, frames: usize) -> Self {
        let mut rng = fastrand::Rng::with_seed(0x5c7b);
        let samples = frames * usize::from(channels);
        let data = match format {
            SampleFormat::S16 => (0..samples)
                .flat_map(|_| rng.i16(..).to_le_bytes())
                .collect(),
            _ => (0..samples)
                .flat_map(|_| (rng.f32() * 2.0 - 1.0).to_le_bytes())
                .collect(),
        };
        Self {
            format,
            channels,
            data,
        }
    }
}

impl MediaDecoder for NoiseDecoder {
    fn extract_timecodes_and_keyframes(&self, _: &Path) -> Result<(Vec<i64>, Vec<i64>)> {
        Ok((Vec::new(), Vec::new()))
    }

    fn decode_thumbnail_strip(&self, _: usize, width: u32, height: u32) -> Result<FrameBuffer> {
        Ok(FrameBuffer {
            width,
            height,
            stride: 3,
            data: Vec::new(),
        })
    }

    fn audio_format(&self) -> Result<Option<AudioFormat>> {
        Ok(Some(AudioFormat {
            sample_rate: 48_000,
            channels: self.channels,
            sample_format: self.format,
        }))
    }

    fn read_sample_window(&self, first_sample: u64, count: usize) -> Result<SampleWindow> {
        let frame_bytes = self.format.bytes_per_sample().unwrap_or(1) * usize::from(self.channels);
        let start = (first_sample as usize * frame_bytes).min(self.data.len());
        let end = (start + count * frame_bytes).min(self.data.len());
        Ok(SampleWindow {
            first_sample,
            channels: self.channels,
            sample_format: self.format,
            sample_rate: 48_000,
            data: self.data[start..end].to_vec(),
        })
    }
}

fn bench_columns(c: &mut Criterion) {
    let mut group = c.benchmark_group("spectrum_column");
    for (label, format, channels) in [
        ("s16_mono", SampleFormat::S16, 1),
        ("s16_stereo", SampleFormat::S16, 2),
        ("f32_stereo", SampleFormat::F32, 2),
    ] {
        let decoder = NoiseDecoder::new(format, channels, 48_000 * 10);
        let mut context = SpectralTransformContext::new(10);
        let mut pts = 0i64;
        group.bench_function(label, |b| {
            b.iter(|| {
                pts = (pts + 10) % 9_000;
                black_box(context.column_at(&decoder, black_box(pts)).unwrap())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_columns);
criterion_main!(benches);

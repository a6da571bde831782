//! Fixed numeric parameters of the analysis pipeline.
//!
//! Changing any of the spectral constants changes the bytes written into
//! spectrum cache records; bump [`CACHE_FORMAT_VERSION`] alongside.

/// Rows in a frame colour band (the strip is one pixel wide).
pub const BAND_HEIGHT: usize = 30;

/// log2 of the transform's point count divided by two.
pub const DERIVATION_SIZE: u32 = 10;
/// Sample offsets are rounded down to a multiple of `1 << DERIVATION_DISTANCE`.
pub const DERIVATION_DISTANCE: u32 = 6;

/// Samples read per spectral window.
pub const SPECTRUM_WINDOW: usize = 2 << DERIVATION_SIZE;
/// Frequency bins in one spectrum column.
pub const SPECTRUM_BINS: usize = (1 << DERIVATION_SIZE) + 1;

pub const CACHE_MAGIC: [u8; 4] = *b"SCRB";
pub const CACHE_FORMAT_VERSION: u16 = 2;
pub const CACHE_FILE_EXTENSION: &str = "bin";

pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 100;
pub const DEFAULT_SPECTRUM_SLICE_MS: u32 = 10;
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

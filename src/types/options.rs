//! Builder-style configuration for a media session.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_EVENT_CAPACITY, DEFAULT_SPECTRUM_SLICE_MS, DEFAULT_SYNC_INTERVAL_MS};
use crate::error::{Result, ScrublineError};

const CACHE_DIR_NAME: &str = "scrubline";

fn default_cache_dir() -> PathBuf {
    dirs_next::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR_NAME)
}

fn default_sync_interval_ms() -> u64 {
    DEFAULT_SYNC_INTERVAL_MS
}

fn default_spectrum_slice_ms() -> u32 {
    DEFAULT_SPECTRUM_SLICE_MS
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

/// Tunables for the analysis pipeline.
/// Every field has a default, so a partial JSON document is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding persistent cache records.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Minimum time between two redraws triggered by new band/spectrum data.
    #[serde(default = "default_sync_interval_ms")]
    pub sync_interval_ms: u64,
    /// Duration covered by one spectrum column.
    #[serde(default = "default_spectrum_slice_ms")]
    pub spectrum_slice_ms: u32,
    /// Capacity of the session event channel; overflowing events are dropped.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            sync_interval_ms: default_sync_interval_ms(),
            spectrum_slice_ms: default_spectrum_slice_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Parse and validate a JSON config document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.spectrum_slice_ms == 0 {
            return Err(ScrublineError::InvalidConfig {
                reason: "spectrum_slice_ms must be non-zero".into(),
            });
        }
        if self.event_capacity == 0 {
            return Err(ScrublineError::InvalidConfig {
                reason: "event_capacity must be non-zero".into(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    inner: PipelineConfig,
}

impl PipelineConfigBuilder {
    #[must_use]
    pub fn cache_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.inner.cache_dir = dir.as_ref().to_path_buf();
        self
    }

    #[must_use]
    pub fn sync_interval_ms(mut self, interval: u64) -> Self {
        self.inner.sync_interval_ms = interval;
        self
    }

    #[must_use]
    pub fn spectrum_slice_ms(mut self, slice: u32) -> Self {
        self.inner.spectrum_slice_ms = slice;
        self
    }

    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.inner.event_capacity = capacity;
        self
    }

    #[must_use]
    pub fn build(self) -> PipelineConfig {
        self.inner
    }
}

//! Cache-first timecode and keyframe extraction.

use std::sync::Arc;

use crate::error::{Result, ScrublineError};
use crate::io::cache::{CacheKey, PersistentCache};
use crate::types::{ArtifactKind, LoadedMedia, TimecodeSet};
use crate::worker::WorkerJob;

/// Runs on the session's [`crate::worker::ComputationWorker`]. The decoder is
/// only consulted on a cache miss; a fresh extraction is written back.
pub struct TimecodesJob {
    cache: Arc<PersistentCache>,
}

impl TimecodesJob {
    #[must_use]
    pub fn new(cache: Arc<PersistentCache>) -> Self {
        Self { cache }
    }
}

impl WorkerJob for TimecodesJob {
    type Input = LoadedMedia;
    type Output = TimecodeSet;

    fn name(&self) -> &'static str {
        "timecodes"
    }

    fn run(&mut self, media: &LoadedMedia) -> Result<TimecodeSet> {
        let key = CacheKey::new(ArtifactKind::Timecodes, &media.identity);
        if let Some(cached) = self.cache.load::<TimecodeSet>(&key) {
            tracing::info!(media = %media.identity, frames = cached.len(), "timecodes restored from cache");
            return Ok(cached);
        }

        let path = media.identity.path();
        if !path.exists() {
            return Err(ScrublineError::NotFound {
                path: path.to_path_buf(),
            });
        }

        tracing::info!(media = %media.identity, "extracting timecodes");
        let (timecodes, keyframes) = media.decoder.extract_timecodes_and_keyframes(path)?;
        let set = TimecodeSet::new(timecodes, keyframes);
        if let Err(err) = self.cache.save(&key, &set) {
            tracing::warn!(cache.key = %key.name(), error = %err, "failed to persist timecodes");
        }
        tracing::info!(media = %media.identity, frames = set.len(), keyframes = set.keyframes().len(), "timecodes extracted");
        Ok(set)
    }
}

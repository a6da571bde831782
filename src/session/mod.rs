//! Media session lifecycle driver.
//!
//! Owns the three background threads for one editor window and moves the
//! loaded media through `Unloaded -> Loading -> Loaded`:
//!
//! - **Loading**: stale queued work is dropped, both providers are warm-started
//!   from the persistent cache, and timecode extraction is scheduled.
//! - **Loaded**: reached from [`MediaSession::poll`] once timecodes arrive;
//!   every frame index and spectrum slice is queued for computation.
//! - **Unloaded**: unsaved results are flushed, then all in-memory data is
//!   dropped.
//!
//! The session is driven from a single (interactive) thread. It never blocks
//! on a background computation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crossbeam_channel::Receiver;

use crate::analysis::{FrameBand, FrameBandContext, SpectralTransformContext, TimecodesJob};
use crate::decoder::MediaDecoder;
use crate::error::Result;
use crate::events::{ChangeFlag, EventSink, PipelineEvent, RedrawGate};
use crate::io::cache::PersistentCache;
use crate::types::{LoadedMedia, MediaIdentity, MediaState, PipelineConfig, TimecodeSet};
use crate::worker::{ComputationWorker, IndexedProvider, TaskCompletion};

pub struct MediaSession {
    config: PipelineConfig,
    cache: Arc<PersistentCache>,
    state: MediaState,
    current: Option<LoadedMedia>,
    timecodes: TimecodeSet,
    timecodes_worker: ComputationWorker<TimecodesJob>,
    bands: IndexedProvider<FrameBandContext>,
    spectrum: IndexedProvider<SpectralTransformContext>,
    events: EventSink,
    event_rx: Receiver<PipelineEvent>,
}

impl MediaSession {
    /// Validate `config` and open the cache directory it names.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(PersistentCache::open(&config.cache_dir)?);
        Self::with_cache(config, cache)
    }

    /// Build a session on an already opened cache, e.g. one shared between
    /// several windows.
    pub fn with_cache(config: PipelineConfig, cache: Arc<PersistentCache>) -> Result<Self> {
        config.validate()?;
        let (events, event_rx) = EventSink::channel(config.event_capacity);
        Ok(Self {
            timecodes_worker: ComputationWorker::new(TimecodesJob::new(Arc::clone(&cache))),
            bands: IndexedProvider::new(FrameBandContext, Arc::clone(&cache), events.clone()),
            spectrum: IndexedProvider::new(
                SpectralTransformContext::new(config.spectrum_slice_ms),
                Arc::clone(&cache),
                events.clone(),
            ),
            config,
            cache,
            state: MediaState::Unloaded,
            current: None,
            timecodes: TimecodeSet::default(),
            events,
            event_rx,
        })
    }

    /// Spawn the background threads.
    pub fn start(&mut self) -> Result<()> {
        self.timecodes_worker.start()?;
        self.bands.start()?;
        self.spectrum.start()?;
        tracing::debug!(cache.root = %self.cache.root().display(), "media session started");
        Ok(())
    }

    /// Persist unsaved results and join every background thread.
    pub fn stop(&mut self) {
        if let Err(err) = self.flush() {
            tracing::warn!(error = %err, "failed to persist results on shutdown");
        }
        self.timecodes_worker.stop();
        self.bands.stop();
        self.spectrum.stop();
    }

    /// Begin analysing `path`, unloading the current media first.
    pub fn load<P: AsRef<Path>>(&mut self, path: P, decoder: Arc<dyn MediaDecoder>) -> Result<()> {
        let identity = MediaIdentity::from_path(path)?;
        if self.state != MediaState::Unloaded {
            self.unload();
        }

        tracing::info!(media = %identity, "loading media");
        let media = LoadedMedia::new(identity, decoder);
        self.set_state(MediaState::Loading);
        self.timecodes = TimecodeSet::default();
        self.events.emit(PipelineEvent::TimecodesUpdated);

        let bands = self.bands.load(media.clone());
        let columns = self.spectrum.load(media.clone());
        tracing::debug!(cache.bands = bands, cache.columns = columns, "visual caches restored");

        self.current = Some(media.clone());
        self.timecodes_worker.schedule_task(media);
        Ok(())
    }

    /// Flush and drop everything derived from the current media.
    pub fn unload(&mut self) {
        if self.state == MediaState::Unloaded {
            return;
        }
        if let Some(media) = self.current.take() {
            tracing::info!(media = %media.identity, "unloading media");
        }
        self.bands.unload();
        self.spectrum.unload();
        self.timecodes = TimecodeSet::default();
        self.events.emit(PipelineEvent::TimecodesUpdated);
        self.events.emit(PipelineEvent::VisualDataCleared);
        self.set_state(MediaState::Unloaded);
    }

    /// Apply finished timecode extractions. Call from the interactive thread's
    /// event loop; returns whether the session reached `Loaded`.
    pub fn poll(&mut self) -> bool {
        let mut loaded = false;
        while let Some(completion) = self.timecodes_worker.try_completion() {
            loaded |= self.apply_timecodes(completion);
        }
        loaded
    }

    /// Queue the spectrum slices covering `[start_pts, end_pts]`, e.g. the
    /// visible part of the waveform. The range is clamped to the media length,
    /// so nothing is queued before timecodes are known. Returns how many
    /// slices were queued.
    pub fn request_spectrum(&self, start_pts: i64, end_pts: i64) -> usize {
        let Some(final_slice) = self.last_slice() else {
            return 0;
        };
        match (self.slice_of(start_pts), self.slice_of(end_pts)) {
            (Some(first), Some(last)) if first <= last.min(final_slice) => {
                self.spectrum.enqueue(first..=last.min(final_slice))
            }
            _ => 0,
        }
    }

    /// Persist provider maps that changed since their last save.
    pub fn flush(&self) -> Result<()> {
        self.bands.flush()?;
        self.spectrum.flush()?;
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> MediaState {
        self.state
    }

    #[must_use]
    pub fn identity(&self) -> Option<&MediaIdentity> {
        self.current.as_ref().map(|media| &media.identity)
    }

    #[must_use]
    pub fn timecodes(&self) -> &TimecodeSet {
        &self.timecodes
    }

    #[must_use]
    pub fn band(&self, frame_index: usize) -> Option<FrameBand> {
        self.bands.get(frame_index)
    }

    #[must_use]
    pub fn band_snapshot(&self) -> HashMap<usize, FrameBand> {
        self.bands.snapshot()
    }

    /// Column of the slice containing `pts`, if computed.
    #[must_use]
    pub fn spectrum_at(&self, pts: i64) -> Option<Vec<u8>> {
        self.spectrum.get(self.slice_of(pts)?)
    }

    #[must_use]
    pub fn bands(&self) -> &IndexedProvider<FrameBandContext> {
        &self.bands
    }

    #[must_use]
    pub fn spectrum(&self) -> &IndexedProvider<SpectralTransformContext> {
        &self.spectrum
    }

    /// Whether band or spectrum data changed since the last call.
    pub fn take_visual_changes(&self) -> bool {
        let bands = self.bands.changes().take();
        let spectrum = self.spectrum.changes().take();
        bands || spectrum
    }

    /// Redraw limiter for this session's visual data; pair with
    /// [`Self::visual_flags`].
    #[must_use]
    pub fn redraw_gate(&self) -> RedrawGate {
        RedrawGate::new(self.config.sync_interval())
    }

    #[must_use]
    pub fn visual_flags(&self) -> [&ChangeFlag; 2] {
        [self.bands.changes(), self.spectrum.changes()]
    }

    #[must_use]
    pub fn events(&self) -> &Receiver<PipelineEvent> {
        &self.event_rx
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<PersistentCache> {
        &self.cache
    }

    fn set_state(&mut self, state: MediaState) {
        self.state = state;
        self.events.emit(PipelineEvent::MediaStateChanged(state));
    }

    fn slice_of(&self, pts: i64) -> Option<u64> {
        let pts = u64::try_from(pts.max(0)).ok()?;
        Some(pts / u64::from(self.config.spectrum_slice_ms))
    }

    fn last_slice(&self) -> Option<u64> {
        self.timecodes.last_pts().and_then(|pts| self.slice_of(pts))
    }

    fn apply_timecodes(&mut self, completion: TaskCompletion<LoadedMedia, TimecodeSet>) -> bool {
        let is_current = self
            .current
            .as_ref()
            .is_some_and(|media| media.identity == completion.input.identity);
        if !is_current || self.state != MediaState::Loading {
            tracing::debug!(media = %completion.input.identity, "discarding timecodes for stale media");
            return false;
        }

        self.timecodes = completion.output.unwrap_or_else(|| {
            tracing::warn!(media = %completion.input.identity, "timecodes unavailable; continuing without frames");
            TimecodeSet::default()
        });
        self.events.emit(PipelineEvent::TimecodesUpdated);
        self.set_state(MediaState::Loaded);

        let frames = self.bands.enqueue(0..self.timecodes.len());
        let slices = match self.last_slice() {
            Some(last) => self.spectrum.enqueue(0..=last),
            None => 0,
        };
        tracing::info!(
            media = %completion.input.identity,
            frames = self.timecodes.len(),
            queued.bands = frames,
            queued.slices = slices,
            "media loaded"
        );
        true
    }
}

impl Drop for MediaSession {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Notifications from the pipeline toward the editor.
//!
//! Discrete lifecycle events travel over a bounded channel. High-frequency
//! "more band/spectrum data arrived" signals are an atomic dirty flag instead,
//! which the consumer samples at its redraw cadence via [`RedrawGate`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::types::{ArtifactKind, MediaState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    MediaStateChanged(MediaState),
    /// Timecodes were cleared or replaced.
    TimecodesUpdated,
    /// All band and spectrum data was dropped from memory.
    VisualDataCleared,
    /// A provider stopped computing for the current media after a fatal error.
    AnalysisHalted { kind: ArtifactKind, reason: String },
}

/// Sending half of the event channel; never blocks.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<PipelineEvent>,
}

impl EventSink {
    /// Create a sink and its receiver with room for `capacity` undelivered events.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, Receiver<PipelineEvent>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: PipelineEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::debug!(?event, "event channel full; dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Coalescing "something changed" marker shared between a writer thread and
/// the consumer.
#[derive(Debug, Clone, Default)]
pub struct ChangeFlag(Arc<AtomicBool>);

impl ChangeFlag {
    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Consume the flag, returning whether anything changed since the last take.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Rate-limits redraws driven by one or more [`ChangeFlag`]s.
#[derive(Debug, Clone)]
pub struct RedrawGate {
    interval: Duration,
    last_redraw: Option<Instant>,
}

impl RedrawGate {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_redraw: None,
        }
    }

    /// Whether a redraw is due at `now`. Flags stay set while the gate is
    /// closed, so no change is lost, only deferred.
    pub fn poll(&mut self, flags: &[&ChangeFlag], now: Instant) -> bool {
        if self
            .last_redraw
            .is_some_and(|last| now.saturating_duration_since(last) < self.interval)
        {
            return false;
        }
        let mut changed = false;
        for flag in flags {
            changed |= flag.take();
        }
        if changed {
            self.last_redraw = Some(now);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_coalesces_marks() {
        let flag = ChangeFlag::default();
        for _ in 0..1000 {
            flag.mark();
        }
        assert!(flag.take());
        assert!(!flag.take());
    }

    #[test]
    fn gate_defers_until_interval_elapses() {
        let flag = ChangeFlag::default();
        let mut gate = RedrawGate::new(Duration::from_millis(100));
        let start = Instant::now();

        flag.mark();
        assert!(gate.poll(&[&flag], start));

        flag.mark();
        assert!(!gate.poll(&[&flag], start + Duration::from_millis(50)));
        assert!(flag.is_set());
        assert!(gate.poll(&[&flag], start + Duration::from_millis(120)));
        assert!(!gate.poll(&[&flag], start + Duration::from_millis(400)));
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (sink, rx) = EventSink::channel(1);
        sink.emit(PipelineEvent::TimecodesUpdated);
        sink.emit(PipelineEvent::VisualDataCleared);
        assert_eq!(rx.try_recv().unwrap(), PipelineEvent::TimecodesUpdated);
        assert!(rx.try_recv().is_err());
    }
}

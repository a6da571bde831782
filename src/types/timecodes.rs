//! Per-frame presentation timestamps and keyframe queries.

use serde::{Deserialize, Serialize};

/// Frame PTS values in milliseconds, non-decreasing, plus the keyframe subset.
///
/// Replaced wholesale when a different file loads; never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimecodeSet {
    timecodes: Vec<i64>,
    keyframes: Vec<i64>,
}

impl TimecodeSet {
    /// Sorts both sequences so the ordering invariant holds regardless of how
    /// the decoder reported them.
    #[must_use]
    pub fn new(mut timecodes: Vec<i64>, mut keyframes: Vec<i64>) -> Self {
        timecodes.sort_unstable();
        keyframes.sort_unstable();
        keyframes.dedup();
        Self {
            timecodes,
            keyframes,
        }
    }

    #[must_use]
    pub fn timecodes(&self) -> &[i64] {
        &self.timecodes
    }

    #[must_use]
    pub fn keyframes(&self) -> &[i64] {
        &self.keyframes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.timecodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timecodes.is_empty()
    }

    #[must_use]
    pub fn last_pts(&self) -> Option<i64> {
        self.timecodes.last().copied()
    }

    #[must_use]
    pub fn pts_of_frame(&self, frame_index: usize) -> Option<i64> {
        self.timecodes.get(frame_index).copied()
    }

    #[must_use]
    pub fn is_keyframe(&self, pts: i64) -> bool {
        self.keyframes.binary_search(&pts).is_ok()
    }

    /// First frame at or after `pts`; `pts` itself when no such frame exists.
    #[must_use]
    pub fn align_pts_to_next_frame(&self, pts: i64) -> i64 {
        let idx = self.timecodes.partition_point(|&tc| tc < pts);
        self.timecodes.get(idx).copied().unwrap_or(pts)
    }

    /// Last frame at or before `pts`; `pts` itself when no such frame exists.
    #[must_use]
    pub fn align_pts_to_prev_frame(&self, pts: i64) -> i64 {
        let idx = self.timecodes.partition_point(|&tc| tc <= pts);
        if idx == 0 {
            pts
        } else {
            self.timecodes[idx - 1]
        }
    }

    /// Closest frame to `pts`. Equidistant candidates resolve to the earlier one.
    #[must_use]
    pub fn align_pts_to_near_frame(&self, pts: i64) -> i64 {
        let idx = self.timecodes.partition_point(|&tc| tc < pts);
        let next = self.timecodes.get(idx).copied();
        let prev = idx.checked_sub(1).map(|i| self.timecodes[i]);
        match (prev, next) {
            (Some(prev), Some(next)) => {
                if next - pts < pts - prev {
                    next
                } else {
                    prev
                }
            }
            (Some(only), None) | (None, Some(only)) => only,
            (None, None) => pts,
        }
    }

    /// Index of the frame displayed at `pts`; frames before the first
    /// timecode map to frame 0. `None` when there are no frames at all.
    #[must_use]
    pub fn frame_idx_from_pts(&self, pts: i64) -> Option<usize> {
        if self.timecodes.is_empty() {
            return None;
        }
        let upper = self.timecodes.partition_point(|&tc| tc <= pts);
        Some(upper.saturating_sub(1))
    }
}

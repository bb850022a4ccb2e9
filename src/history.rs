// Time-windowed history of normalized accelerometer samples
//
// Shared by every steering model so that switching models mid-session keeps
// the smoothing window. Newest sample at the front, oldest at the back.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::{HISTORY_MAX_AGE, HISTORY_MAX_LEN};

/// Unit gravity direction in the handset frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
}

impl Orientation {
    /// Normalize raw accelerometer axes. A zero vector yields NaN components.
    pub fn from_raw(x: f32, y: f32, z: f32) -> Self {
        let len = (x * x + y * y + z * z).sqrt();
        Self {
            ax: x / len,
            ay: y / len,
            az: z / len,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationSample {
    pub orientation: Orientation,
    pub timestamp: Instant,
}

#[derive(Debug, Clone)]
pub struct SampleHistory {
    samples: VecDeque<OrientationSample>,
    max_len: usize,
    max_age: Duration,
}

impl Default for SampleHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleHistory {
    pub fn new() -> Self {
        Self::with_limits(HISTORY_MAX_LEN, HISTORY_MAX_AGE)
    }

    pub fn with_limits(max_len: usize, max_age: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_len + 2),
            max_len,
            max_age,
        }
    }

    /// Normalize and store a raw sample, returning the stored value
    ///
    /// The length bound after insertion is `max_len + 1`, one more than
    /// `max_len`. Trimming happens after the push, so the bound is never
    /// exceeded; trimming before the push would let it reach `max_len + 2`.
    /// Age is not checked here, only in [`SampleHistory::window`].
    pub fn insert(&mut self, x: f32, y: f32, z: f32, now: Instant) -> OrientationSample {
        let sample = OrientationSample {
            orientation: Orientation::from_raw(x, y, z),
            timestamp: now,
        };
        self.samples.push_front(sample);
        self.samples.truncate(self.max_len + 1);
        sample
    }

    /// Samples no older than `max_age` relative to `now`, newest first
    ///
    /// Stale entries are evicted from the back; the scan stops at the first
    /// fresh one since insertion keeps the deque ordered by time.
    pub fn window(&mut self, now: Instant) -> &VecDeque<OrientationSample> {
        while let Some(oldest) = self.samples.back() {
            if now.saturating_duration_since(oldest.timestamp) > self.max_age {
                self.samples.pop_back();
            } else {
                break;
            }
        }
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

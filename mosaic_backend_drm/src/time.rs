// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Page-flip timestamps.

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_MICRO: i64 = 1_000;

/// Converts a DRM event's `(tv_sec, tv_usec)` pair to nanoseconds.
///
/// Both fields are unsigned 32-bit in the event record, so the result always
/// fits in an `i64`.
#[must_use]
pub fn flip_timestamp(sec: u32, usec: u32) -> i64 {
    i64::from(sec) * NANOS_PER_SECOND + i64::from(usec) * NANOS_PER_MICRO
}

/// Tracks the interval between consecutive flip timestamps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameInterval {
    last: Option<i64>,
}

impl FrameInterval {
    /// Creates a tracker with no previous timestamp.
    #[must_use]
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Records `timestamp` and returns the time since the previous one.
    ///
    /// Returns `None` for the first timestamp after creation or a
    /// [`reset`](Self::reset).
    pub fn observe(&mut self, timestamp: i64) -> Option<i64> {
        let delta = self.last.map(|last| timestamp - last);
        self.last = Some(timestamp);
        delta
    }

    /// Forgets the previous timestamp.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// The last recorded timestamp.
    #[must_use]
    pub const fn last(&self) -> Option<i64> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameInterval, flip_timestamp};

    #[test]
    fn seconds_and_micros_become_nanoseconds() {
        assert_eq!(flip_timestamp(12, 345_678), 12_345_678_000);
        assert_eq!(flip_timestamp(0, 0), 0);
    }

    #[test]
    fn largest_event_time_does_not_overflow() {
        let ns = flip_timestamp(u32::MAX, u32::MAX);
        assert_eq!(
            ns,
            i64::from(u32::MAX) * 1_000_000_000 + i64::from(u32::MAX) * 1_000
        );
    }

    #[test]
    fn interval_skips_first_sample_and_after_reset() {
        let mut interval = FrameInterval::new();
        assert_eq!(interval.observe(1_000), None);
        assert_eq!(interval.observe(17_667), Some(16_667));
        interval.reset();
        assert_eq!(interval.last(), None);
        assert_eq!(interval.observe(40_000), None);
    }
}

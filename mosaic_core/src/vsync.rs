// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vsync aggregation across outputs.
//!
//! Every connected output reports its own vblank. The mosaic reports one
//! logical vsync per *aggregation cycle*: once a timestamp has been collected
//! from each connected output, the mean of those timestamps is emitted and a
//! new cycle begins.
//!
//! ```text
//!            divisor = 3 connected outputs
//!  observe(t0) ─► counter 2, pending
//!  observe(t1) ─► counter 1, pending
//!  observe(t2) ─► counter 0 ─► emit (t0 + t1 + t2) / 3, counter 3
//! ```
//!
//! A topology change restarts the cycle with the new connected count. If an
//! output drops mid-cycle and the remaining count equals the number of
//! timestamps still outstanding, the samples already collected are flushed
//! as one averaged vsync so the consumer does not stall waiting for a report
//! that will never arrive.

/// Snapshot of the aggregation counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct VsyncAggregationState {
    /// Timestamps still outstanding in the current cycle.
    pub counter: u32,
    /// Connected outputs contributing to each cycle.
    pub divisor: u32,
    /// Sum of the timestamps collected so far in this cycle.
    pub accumulated_timestamp: i64,
    /// A cycle has started but not completed.
    pub pending: bool,
}

/// Counter/divisor state machine producing one averaged vsync per cycle.
#[derive(Clone, Debug, Default)]
pub struct VsyncAggregator {
    state: VsyncAggregationState,
}

impl VsyncAggregator {
    /// Creates an aggregator with no connected outputs.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: VsyncAggregationState {
                counter: 0,
                divisor: 0,
                accumulated_timestamp: 0,
                pending: false,
            },
        }
    }

    /// Returns the current counters.
    #[must_use]
    pub const fn state(&self) -> VsyncAggregationState {
        self.state
    }

    /// Records one output's vblank timestamp, in nanoseconds.
    ///
    /// Returns the averaged timestamp when this sample completes the cycle.
    /// Samples are ignored while no output is connected.
    pub fn observe(&mut self, timestamp: i64) -> Option<i64> {
        let state = &mut self.state;
        if state.divisor == 0 {
            return None;
        }

        state.counter = state.counter.saturating_sub(1);
        state.accumulated_timestamp = state.accumulated_timestamp.saturating_add(timestamp);
        if state.counter == 0 {
            let average = state.accumulated_timestamp / i64::from(state.divisor);
            state.counter = state.divisor;
            state.accumulated_timestamp = 0;
            state.pending = false;
            Some(average)
        } else {
            state.pending = true;
            None
        }
    }

    /// Restarts aggregation for `connected` outputs.
    ///
    /// When `flush` is set and a pending cycle can no longer complete in the
    /// usual way (the new connected count equals the number of outstanding
    /// samples), returns the mean of the samples collected so far.
    pub fn topology_changed(&mut self, connected: u32, flush: bool) -> Option<i64> {
        let state = &mut self.state;
        let flushed = if flush && state.pending && connected > 0 && state.counter == connected {
            let collected = state.divisor.saturating_sub(state.counter);
            state
                .accumulated_timestamp
                .checked_div(i64::from(collected))
        } else {
            None
        };

        state.counter = connected;
        state.divisor = connected;
        state.accumulated_timestamp = 0;
        state.pending = false;
        flushed
    }

    /// Drops any partial cycle without changing the divisor.
    pub fn restart_cycle(&mut self) {
        let state = &mut self.state;
        state.counter = state.divisor;
        state.accumulated_timestamp = 0;
        state.pending = false;
    }
}

//! Event-time primitives: timestamps, windows, and timestamped records.
//!
//! A [`Window`] is a half-open interval `[start, start + duration)`. Windows
//! produced by [`Window::fixed`] are *tumbling*: for a fixed duration they are
//! contiguous and never overlap, so every timestamp lands in exactly one of
//! them.
//!
//! ```
//! use ironstream::window::Window;
//!
//! let w = Window::fixed(17, 10);
//! assert_eq!(w, Window::new(10, 10));
//! assert_eq!(w.end(), 20);
//! assert!(w.contains(17));
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Milliseconds since UNIX epoch (UTC).
pub type TimestampMs = i64;

/// A span of event time in milliseconds.
pub type DurationMs = i64;

/// Stands for "unbounded future": the `min_ts` of empty state.
pub const MAX_TIMESTAMP: TimestampMs = i64::MAX;

/// Stands for "no watermark observed yet".
pub const MIN_TIMESTAMP: TimestampMs = i64::MIN;

/// A closed-open time range: `[start, start + duration)`.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Window {
    pub start: TimestampMs,
    pub duration: DurationMs,
}

impl Window {
    #[inline]
    pub fn new(start: TimestampMs, duration: DurationMs) -> Self {
        debug_assert!(duration > 0);
        Self { start, duration }
    }

    /// End boundary (exclusive). Saturates at [`MAX_TIMESTAMP`] for the last
    /// window of the timeline, which therefore closes only at the final
    /// watermark.
    #[inline]
    pub fn end(&self) -> TimestampMs {
        self.start.saturating_add(self.duration)
    }

    #[inline]
    pub fn contains(&self, ts: TimestampMs) -> bool {
        self.start <= ts && i128::from(ts) < i128::from(self.start) + i128::from(self.duration)
    }

    /// Compute the tumbling window `[floor(ts / d) * d, .. + d)` for a timestamp.
    #[inline]
    pub fn fixed(ts: TimestampMs, duration: DurationMs) -> Self {
        Self::fixed_with_offset(ts, duration, 0)
    }

    /// Tumbling window with boundaries shifted by `offset_ms`.
    /// `duration` > 0; `offset_ms` may be negative or positive.
    ///
    /// Total over `i64`: the first window of the timeline is clipped to start
    /// at [`MIN_TIMESTAMP`] (and so may be shorter than `duration`).
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub fn fixed_with_offset(ts: TimestampMs, duration: DurationMs, offset_ms: i64) -> Self {
        assert!(duration > 0, "window duration must be positive, got {duration}");
        let d = i128::from(duration);
        let off = i128::from(offset_ms);
        // start <= ts < start + d, so start only leaves i64 below MIN_TIMESTAMP
        let start = (i128::from(ts) - off).div_euclid(d) * d + off;
        let lo = i128::from(MIN_TIMESTAMP);
        if start < lo {
            return Self { start: MIN_TIMESTAMP, duration: (start + d - lo) as i64 };
        }
        Self { start: start as i64, duration }
    }

    /// The window immediately following this one.
    #[inline]
    pub fn next(&self) -> Self {
        Self { start: self.end(), duration: self.duration }
    }
}

// Ordered by start so that a cutoff scan over a BTreeMap<Window, _> is a prefix.
impl Ord for Window {
    #[inline]
    fn cmp(&self, o: &Self) -> Ordering {
        self.start.cmp(&o.start).then(self.duration.cmp(&o.duration))
    }
}

impl PartialOrd for Window {
    #[inline]
    fn partial_cmp(&self, o: &Self) -> Option<Ordering> {
        Some(self.cmp(o))
    }
}

/// A timestamped element (event-time semantics).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Timestamped<T> {
    pub ts: TimestampMs,
    pub value: T,
}

impl<T> Timestamped<T> {
    #[inline]
    pub fn new(ts: TimestampMs, value: T) -> Self {
        Self { ts, value }
    }
}

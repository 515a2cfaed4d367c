//! Per-transform watermarks.
//!
//! A watermark asserts that no future input will carry a timestamp earlier
//! than its value. It only moves forward: a request to move it backwards is
//! a regression and is handled per [`RegressionPolicy`].
//!
//! The candidate value for a transform comes from its upstream watermark,
//! lowered by the minimum timestamp of any bundle still being evaluated
//! ([`InflightTracker`]), so that a window cannot be released while records
//! destined for it are mid-flight.

use crate::config::RegressionPolicy;
use crate::window::{MAX_TIMESTAMP, MIN_TIMESTAMP, TimestampMs};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Outcome of [`Watermark::advance`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    Advanced { from: TimestampMs, to: TimestampMs },
    Unchanged,
    /// The candidate was older than the current value, which was kept.
    Regressed { current: TimestampMs, attempted: TimestampMs },
}

#[derive(Debug)]
pub struct Watermark {
    value: AtomicI64,
    policy: RegressionPolicy,
}

impl Default for Watermark {
    fn default() -> Self {
        Self::new(RegressionPolicy::default())
    }
}

impl Watermark {
    pub fn new(policy: RegressionPolicy) -> Self {
        Self { value: AtomicI64::new(MIN_TIMESTAMP), policy }
    }

    pub fn get(&self) -> TimestampMs {
        self.value.load(Ordering::Acquire)
    }

    /// Move the watermark to `candidate` if that is forward.
    ///
    /// # Panics
    ///
    /// Panics on regression under [`RegressionPolicy::Strict`].
    pub fn advance(&self, name: &str, candidate: TimestampMs) -> Advance {
        let mut cur = self.get();
        loop {
            if candidate == cur {
                return Advance::Unchanged;
            }
            if candidate < cur {
                return self.regressed(name, cur, candidate);
            }
            match self.value.compare_exchange_weak(cur, candidate, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return Advance::Advanced { from: cur, to: candidate },
                Err(actual) => cur = actual,
            }
        }
    }

    /// Recompute from the upstream watermark and in-flight input.
    ///
    /// Only an upstream value behind the current watermark counts as a
    /// regression; in-flight input merely holds the watermark where it is.
    pub fn refresh(&self, name: &str, upstream: TimestampMs, inflight: &InflightTracker) -> Advance {
        let cur = self.get();
        if upstream < cur {
            return self.regressed(name, cur, upstream);
        }
        let candidate = upstream.min(inflight.min_ts());
        let prev = self.value.fetch_max(candidate, Ordering::AcqRel);
        if prev < candidate {
            Advance::Advanced { from: prev, to: candidate }
        } else {
            Advance::Unchanged
        }
    }

    fn regressed(&self, name: &str, current: TimestampMs, attempted: TimestampMs) -> Advance {
        match self.policy {
            RegressionPolicy::Warn => {
                warn!(transform = name, current, attempted, "watermark regression ignored");
                Advance::Regressed { current, attempted }
            }
            RegressionPolicy::Strict => {
                panic!("{name}: watermark regression from {current} to {attempted}")
            }
        }
    }
}

/// Multiset of the minimum timestamps of bundles currently under evaluation.
#[derive(Debug, Default)]
pub struct InflightTracker {
    inner: Arc<Mutex<BTreeMap<TimestampMs, usize>>>,
}

impl InflightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bundle; it stays in flight until the guard drops.
    #[must_use]
    pub fn enter(&self, min_ts: TimestampMs) -> InflightGuard {
        *self.lock().entry(min_ts).or_insert(0) += 1;
        InflightGuard { inner: Arc::clone(&self.inner), min_ts }
    }

    /// Oldest in-flight timestamp, or [`MAX_TIMESTAMP`] if nothing is in flight.
    pub fn min_ts(&self) -> TimestampMs {
        self.lock().keys().next().copied().unwrap_or(MAX_TIMESTAMP)
    }

    pub fn len(&self) -> usize {
        self.lock().values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<TimestampMs, usize>> {
        self.inner.lock().expect("inflight tracker lock poisoned")
    }
}

pub struct InflightGuard {
    inner: Arc<Mutex<BTreeMap<TimestampMs, usize>>>,
    min_ts: TimestampMs,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        let Ok(mut m) = self.inner.lock() else { return };
        if let Some(n) = m.get_mut(&self.min_ts) {
            *n -= 1;
            if *n == 0 {
                m.remove(&self.min_ts);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_is_monotonic() {
        let wm = Watermark::default();
        assert_eq!(wm.advance("t", 10), Advance::Advanced { from: MIN_TIMESTAMP, to: 10 });
        assert_eq!(wm.advance("t", 10), Advance::Unchanged);
        assert_eq!(wm.advance("t", 5), Advance::Regressed { current: 10, attempted: 5 });
        assert_eq!(wm.get(), 10);
    }

    #[test]
    #[should_panic(expected = "watermark regression")]
    fn strict_policy_panics() {
        let wm = Watermark::new(RegressionPolicy::Strict);
        wm.advance("t", 10);
        wm.advance("t", 9);
    }

    #[test]
    fn inflight_holds_back_refresh() {
        let wm = Watermark::default();
        let inflight = InflightTracker::new();
        let g = inflight.enter(7);
        let _g2 = inflight.enter(7);
        wm.refresh("t", 15, &inflight);
        assert_eq!(wm.get(), 7);
        drop(g);
        assert_eq!(inflight.min_ts(), 7);
        assert_eq!(inflight.len(), 1);
    }

    #[test]
    fn inflight_below_current_is_not_a_regression() {
        let wm = Watermark::new(RegressionPolicy::Strict);
        let inflight = InflightTracker::new();
        wm.advance("t", 20);
        let _g = inflight.enter(5);
        assert_eq!(wm.refresh("t", 25, &inflight), Advance::Unchanged);
        assert_eq!(wm.get(), 20);
    }
}

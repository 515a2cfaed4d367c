//! Builders for timestamped test input.

use crate::bundle::{BundleHandle, RecordBundle, StreamData};
use crate::window::{TimestampMs, Timestamped};
use std::sync::Arc;

/// A fluent builder for [`RecordBundle`]s.
///
/// # Example
///
/// ```
/// use ironstream::testing::RecordBundleBuilder;
///
/// let bundle = RecordBundleBuilder::new()
///     .at(5, "a")
///     .every(10, 3, &["b", "c"])
///     .build();
///
/// let ts: Vec<i64> = bundle.iter().map(|r| r.ts).collect();
/// assert_eq!(ts, vec![5, 10, 13]);
/// ```
#[derive(Debug)]
pub struct RecordBundleBuilder<T> {
    records: Vec<Timestamped<T>>,
}

impl<T> Default for RecordBundleBuilder<T> {
    fn default() -> Self {
        Self { records: Vec::new() }
    }
}

impl<T: StreamData> RecordBundleBuilder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one record at `ts`.
    #[must_use]
    pub fn at(mut self, ts: TimestampMs, value: T) -> Self {
        self.records.push(Timestamped::new(ts, value));
        self
    }

    /// Add `values` at `start`, `start + step`, ...
    #[must_use]
    pub fn every(mut self, start: TimestampMs, step: i64, values: &[T]) -> Self {
        let mut ts = start;
        for v in values {
            self.records.push(Timestamped::new(ts, v.clone()));
            ts += step;
        }
        self
    }

    /// Add `value` `count` times, all at `ts`.
    #[must_use]
    pub fn repeated(mut self, ts: TimestampMs, value: T, count: usize) -> Self {
        self.records.extend(std::iter::repeat_n(Timestamped::new(ts, value), count));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn build(self) -> RecordBundle<T> {
        RecordBundle::new(self.records)
    }

    /// Split the records round-robin into `n` bundle handles.
    #[must_use]
    pub fn build_split(self, n: usize) -> Vec<BundleHandle> {
        split_round_robin(self.records, n)
    }
}

/// Deal `records` round-robin into `n` bundles (at least one).
#[must_use]
pub fn split_round_robin<T: StreamData>(records: Vec<Timestamped<T>>, n: usize) -> Vec<BundleHandle> {
    let n = n.max(1);
    let mut parts: Vec<RecordBundle<T>> = (0..n).map(|_| RecordBundle::default()).collect();
    for (i, r) in records.into_iter().enumerate() {
        parts[i % n].push(r);
    }
    parts.into_iter().map(|b| Arc::new(b) as BundleHandle).collect()
}

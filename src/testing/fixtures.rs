//! Pre-built record sets for common windowing scenarios.

use crate::bundle::RecordBundle;
use crate::window::{TimestampMs, Timestamped};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Records whose value equals their timestamp.
///
/// # Example
///
/// ```
/// use ironstream::testing::records_at;
///
/// let b = records_at(&[0, 1, 2]);
/// assert_eq!(b.records()[2].value, 2);
/// ```
#[must_use]
pub fn records_at(ts: &[TimestampMs]) -> RecordBundle<i64> {
    ts.iter().map(|&t| Timestamped::new(t, t)).collect()
}

/// Records `(key, ts)` at each timestamp, all under one key.
#[must_use]
pub fn keyed_records_at(key: &'static str, ts: &[TimestampMs]) -> RecordBundle<(&'static str, i64)> {
    ts.iter().map(|&t| Timestamped::new(t, (key, t))).collect()
}

/// One `(word, 1)` record per whitespace-separated word, `step_ms` apart.
#[must_use]
pub fn word_records(text: &str, start: TimestampMs, step_ms: i64) -> RecordBundle<(String, u64)> {
    text.split_whitespace()
        .enumerate()
        .map(|(i, w)| Timestamped::new(start + i as i64 * step_ms, (w.to_lowercase(), 1)))
        .collect()
}

/// A source/destination address pair, as used for per-flow counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IpPair {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

impl IpPair {
    #[must_use]
    pub fn new(src: [u8; 4], dst: [u8; 4]) -> Self {
        Self { src: Ipv4Addr::from(src), dst: Ipv4Addr::from(dst) }
    }
}

impl fmt::Display for IpPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.src, self.dst)
    }
}

/// `n` flow records spread over `flows` distinct pairs, one per millisecond
/// from `start`. Each record carries a byte count of `64 * (i % 4 + 1)`.
#[must_use]
pub fn ip_flow_records(n: usize, flows: u8, start: TimestampMs) -> RecordBundle<(IpPair, i64)> {
    let flows = flows.max(1);
    (0..n)
        .map(|i| {
            let f = (i % usize::from(flows)) as u8;
            let pair = IpPair::new([10, 0, 0, f], [192, 168, 1, f]);
            Timestamped::new(start + i as i64, (pair, 64 * (i as i64 % 4 + 1)))
        })
        .collect()
}

//! Metrics owned by pipeline nodes.
//!
//! Counters live on the node instance that produces them (a sink's
//! [`ThroughputMetric`], a reducer's fired-window count) and are published
//! into a [`MetricsCollector`] on demand. Nothing here is process-global.
//!
//! ```
//! use ironstream::metrics::{MetricsCollector, ThroughputMetric};
//! use std::sync::Arc;
//! use std::time::{Duration, Instant};
//!
//! let t0 = Instant::now();
//! let tput = Arc::new(ThroughputMetric::starting_at("sink.throughput", t0));
//! tput.record(100, 6400);
//!
//! let report = tput.report(t0 + Duration::from_secs(2)).unwrap();
//! assert_eq!(report.records_per_sec, 50.0);
//!
//! let metrics = MetricsCollector::new();
//! metrics.register(Box::new(Arc::clone(&tput)));
//! assert_eq!(metrics.snapshot()["sink.throughput"]["total_records"], 100);
//! ```

use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// A named value that can be reported as JSON.
pub trait Metric: Send + Sync + Any {
    fn name(&self) -> &str;

    fn value(&self) -> Value;

    fn description(&self) -> Option<&str> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

// Lets a node keep its own handle while the collector holds another.
impl<M: Metric> Metric for Arc<M> {
    fn name(&self) -> &str {
        (**self).name()
    }
    fn value(&self) -> Value {
        (**self).value()
    }
    fn description(&self) -> Option<&str> {
        (**self).description()
    }
    fn as_any(&self) -> &dyn Any {
        (**self).as_any()
    }
}

/// Thread-safe registry of metrics.
#[derive(Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<Mutex<CollectorInner>>,
}

#[derive(Default)]
struct CollectorInner {
    metrics: HashMap<String, Box<dyn Metric>>,
    start_time: Option<Instant>,
    end_time: Option<Instant>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CollectorInner> {
        self.inner.lock().expect("metrics lock poisoned")
    }

    /// Register a metric, replacing any metric of the same name.
    pub fn register(&self, metric: Box<dyn Metric>) {
        self.lock().metrics.insert(metric.name().to_string(), metric);
    }

    pub fn record_start(&self) {
        self.lock().start_time = Some(Instant::now());
    }

    pub fn record_end(&self) {
        self.lock().end_time = Some(Instant::now());
    }

    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        let inner = self.lock();
        match (inner.start_time, inner.end_time) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    /// Add `value` to a counter, creating it at zero if missing.
    pub fn increment_counter(&self, name: &str, value: u64) {
        let mut inner = self.lock();
        let current = inner
            .metrics
            .get(name)
            .and_then(|m| m.as_any().downcast_ref::<CounterMetric>())
            .map_or(0, |c| c.count);
        inner
            .metrics
            .insert(name.to_string(), Box::new(CounterMetric::with_value(name, current + value)));
    }

    pub fn set_counter(&self, name: &str, value: u64) {
        self.lock()
            .metrics
            .insert(name.to_string(), Box::new(CounterMetric::with_value(name, value)));
    }

    pub fn set_gauge(&self, name: &str, value: f64) {
        self.lock()
            .metrics
            .insert(name.to_string(), Box::new(GaugeMetric::new(name, value)));
    }

    /// Name → value for every registered metric.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.lock()
            .metrics
            .iter()
            .map(|(name, metric)| (name.clone(), metric.value()))
            .collect()
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        let inner = self.lock();
        let mut out = serde_json::Map::new();
        for (name, metric) in &inner.metrics {
            let mut obj = serde_json::Map::new();
            obj.insert("value".to_string(), metric.value());
            if let Some(desc) = metric.description() {
                obj.insert("description".to_string(), json!(desc));
            }
            out.insert(name.clone(), Value::Object(obj));
        }
        if let (Some(start), Some(end)) = (inner.start_time, inner.end_time) {
            out.insert(
                "execution_time_ms".to_string(),
                json!({ "value": end.duration_since(start).as_millis() }),
            );
        }
        Value::Object(out)
    }

    /// Save all metrics to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let formatted = serde_json::to_string_pretty(&self.to_json())?;
        std::fs::write(path, formatted)?;
        Ok(())
    }
}

/// A simple counter metric.
pub struct CounterMetric {
    name: String,
    count: u64,
}

impl CounterMetric {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_value(name, 0)
    }

    pub fn with_value(name: impl Into<String>, count: u64) -> Self {
        Self { name: name.into(), count }
    }
}

impl Metric for CounterMetric {
    fn name(&self) -> &str {
        &self.name
    }
    fn value(&self) -> Value {
        json!(self.count)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A point-in-time value.
pub struct GaugeMetric {
    name: String,
    value: f64,
}

impl GaugeMetric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self { name: name.into(), value }
    }
}

impl Metric for GaugeMetric {
    fn name(&self) -> &str {
        &self.name
    }
    fn value(&self) -> Value {
        json!(self.value)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Rates since the previous report.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThroughputReport {
    pub records_per_sec: f64,
    pub bytes_per_sec: f64,
    pub total_records: u64,
    pub total_bytes: u64,
}

#[derive(Debug)]
struct ThroughputInner {
    total_records: u64,
    total_bytes: u64,
    last_records: u64,
    last_bytes: u64,
    last_check: Instant,
}

/// Records and bytes seen by one node, with interval rate reports.
#[derive(Debug)]
pub struct ThroughputMetric {
    name: String,
    inner: Mutex<ThroughputInner>,
}

impl ThroughputMetric {
    pub fn new(name: impl Into<String>) -> Self {
        Self::starting_at(name, Instant::now())
    }

    pub fn starting_at(name: impl Into<String>, now: Instant) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(ThroughputInner {
                total_records: 0,
                total_bytes: 0,
                last_records: 0,
                last_bytes: 0,
                last_check: now,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ThroughputInner> {
        self.inner.lock().expect("throughput lock poisoned")
    }

    pub fn record(&self, records: u64, bytes: u64) {
        let mut inner = self.lock();
        inner.total_records += records;
        inner.total_bytes += bytes;
    }

    /// Time since the last report.
    pub fn since_last_report(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.lock().last_check)
    }

    /// Rates since the last report; `None` if no time has passed.
    #[allow(clippy::cast_precision_loss)]
    pub fn report(&self, now: Instant) -> Option<ThroughputReport> {
        let mut inner = self.lock();
        let secs = now.saturating_duration_since(inner.last_check).as_secs_f64();
        if secs <= 0.0 {
            return None;
        }
        let report = ThroughputReport {
            records_per_sec: (inner.total_records - inner.last_records) as f64 / secs,
            bytes_per_sec: (inner.total_bytes - inner.last_bytes) as f64 / secs,
            total_records: inner.total_records,
            total_bytes: inner.total_bytes,
        };
        inner.last_records = inner.total_records;
        inner.last_bytes = inner.total_bytes;
        inner.last_check = now;
        Some(report)
    }

    /// Zero every counter and restart the interval at `now`.
    pub fn reset(&self, now: Instant) {
        *self.lock() = ThroughputInner {
            total_records: 0,
            total_bytes: 0,
            last_records: 0,
            last_bytes: 0,
            last_check: now,
        };
    }

    pub fn total_records(&self) -> u64 {
        self.lock().total_records
    }

    pub fn total_bytes(&self) -> u64 {
        self.lock().total_bytes
    }
}

impl Metric for ThroughputMetric {
    fn name(&self) -> &str {
        &self.name
    }
    fn value(&self) -> Value {
        let inner = self.lock();
        json!({ "total_records": inner.total_records, "total_bytes": inner.total_bytes })
    }
    fn description(&self) -> Option<&str> {
        Some("records and bytes received")
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

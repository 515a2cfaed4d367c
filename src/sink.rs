//! Terminal node for windowed output.
//!
//! [`WindowsBundleSink`] consumes [`WindowsBundle`]s and emits nothing. Each
//! sink owns a [`ThroughputMetric`]; once per report interval it logs the
//! record and byte rates seen since the previous report.

use crate::bundle::{BundleBase, BundleHandle, StreamData, WindowsBundle};
use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::evaluator::Evaluator;
use crate::metrics::{MetricsCollector, ThroughputMetric, ThroughputReport};
use crate::node_id::NodeId;
use crate::transform::{Transform, TransformBase};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, enabled, info, trace, Level};

pub struct WindowsBundleSink<T> {
    base: TransformBase,
    throughput: Arc<ThroughputMetric>,
    report_interval: Duration,
    _t: PhantomData<fn() -> T>,
}

impl<T: StreamData> WindowsBundleSink<T> {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            throughput: Arc::new(ThroughputMetric::new(format!("{name}.throughput"))),
            base: TransformBase::new(name),
            report_interval: Duration::from_secs(1),
            _t: PhantomData,
        }
    }

    pub fn from_config(name: impl Into<String>, cfg: &EngineConfig) -> Self {
        let name = name.into();
        Self {
            throughput: Arc::new(ThroughputMetric::new(format!("{name}.throughput"))),
            base: TransformBase::with_policy(name, cfg.regression_policy),
            report_interval: Duration::from_millis(cfg.report_interval_ms),
            _t: PhantomData,
        }
    }

    #[must_use]
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn throughput(&self) -> &ThroughputMetric {
        &self.throughput
    }

    /// Register this sink's throughput metric with `collector`.
    pub fn register_metrics(&self, collector: &MetricsCollector) {
        collector.register(Box::new(Arc::clone(&self.throughput)));
    }

    /// Log a report if the interval has elapsed at `now`.
    pub fn maybe_report(&self, now: Instant) -> Option<ThroughputReport> {
        if self.throughput.since_last_report(now) < self.report_interval {
            return None;
        }
        let report = self.throughput.report(now)?;
        info!(
            sink = self.name(),
            records_per_sec = report.records_per_sec,
            bytes_per_sec = report.bytes_per_sec,
            total_records = report.total_records,
            "sink throughput"
        );
        Some(report)
    }

    /// Zero the throughput counters.
    pub fn reset(&self) {
        self.throughput.reset(Instant::now());
    }
}

impl<T: StreamData> Transform for WindowsBundleSink<T> {
    fn base(&self) -> &TransformBase {
        &self.base
    }

    fn exec_evaluator(&self, node: NodeId, ctx: &dyn ExecutionContext, bundle: BundleHandle) {
        WindowsBundleSinkEvaluator::<T>::new(node).evaluate(self, ctx, bundle);
    }
}

pub struct WindowsBundleSinkEvaluator<T> {
    node: NodeId,
    _t: PhantomData<fn() -> T>,
}

impl<T> WindowsBundleSinkEvaluator<T> {
    pub fn new(node: NodeId) -> Self {
        Self { node, _t: PhantomData }
    }
}

impl<T: StreamData> Evaluator for WindowsBundleSinkEvaluator<T> {
    type Transform = WindowsBundleSink<T>;
    type Input = WindowsBundle<T>;
    type Output = WindowsBundle<T>;

    fn node(&self) -> NodeId {
        self.node
    }

    fn evaluate_single_input(
        &self,
        trans: &WindowsBundleSink<T>,
        input: Arc<WindowsBundle<T>>,
        _output: &mut WindowsBundle<T>,
    ) -> bool {
        trans.throughput.record(input.len() as u64, input.byte_size() as u64);
        debug!(
            node = %self.node,
            windows = input.window_count(),
            records = input.len(),
            "sink received bundle"
        );
        if enabled!(Level::TRACE) {
            for line in window_lines(&input) {
                trace!(node = %self.node, "{line}");
            }
        }
        trans.maybe_report(Instant::now());
        false
    }
}

/// One `[start, end): [values..]` line per window, in window order.
fn window_lines<T: StreamData>(bundle: &WindowsBundle<T>) -> Vec<String> {
    bundle
        .iter()
        .map(|(w, recs)| {
            let values: Vec<&T> = recs.iter().map(|r| &r.value).collect();
            format!("[{}, {}): {values:?}", w.start, w.end())
        })
        .collect()
}

//! Windowed keyed reduction with watermark-gated release.
//!
//! [`WinKeyReducer`] accumulates, per window and per key, every value it has
//! seen, and releases a window once the transform's watermark has reached the
//! window's end. Reduction itself is deferred: the plugged-in [`ReduceFn`]
//! runs exactly once per key when its window is released, never on combine.
//!
//! Each evaluator invocation:
//!
//! 1. folds its input bundle into a fresh task-local accumulator
//!    (unsynchronized [`UnsafeFragment`]s, one per window);
//! 2. merges the accumulator into the shared state under the state lock;
//! 3. takes out every window closed by the current watermark, reduces each
//!    key, and emits the result as one [`WindowsBundle`].
//!
//! ```
//! use ironstream::prelude::*;
//! use std::sync::Arc;
//!
//! let reducer: WinKeyReducer<&str, i64, _> =
//!     WinKeyReducer::new("sum", CombineReduce::new(Sum::<i64>::new()));
//! let mut input = WindowsBundle::new();
//! for ts in [0, 1, 2, 10, 11, 20] {
//!     input.add(Window::fixed(ts, 10), Timestamped::new(ts, ("k", ts)));
//! }
//!
//! let ctx = LocalContext::new();
//! reducer.exec_evaluator(NodeId::new(0), &ctx, Arc::new(input));
//! assert!(ctx.is_empty()); // nothing is closed yet
//!
//! reducer.on_watermark(NodeId::new(0), &ctx, 20);
//! assert_eq!(ctx.len(), 1);
//! assert_eq!(reducer.window_count(), 1);
//! ```

use crate::bundle::{BundleHandle, StreamData, StreamKey, WindowsBundle};
use crate::combiners::CombineFn;
use crate::config::{EngineConfig, MinTsPolicy};
use crate::context::ExecutionContext;
use crate::evaluator::Evaluator;
use crate::fragment::{SafeFragment, SafeValueContainer, UnsafeFragment, UnsafeValueContainer};
use crate::metrics::MetricsCollector;
use crate::node_id::NodeId;
use crate::stateful::WindowedState;
use crate::transform::{StatefulTransform, Transform, TransformBase};
use crate::watermark::Advance;
use crate::window::{TimestampMs, Timestamped, Window};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-key reduction, run once per key when its window is released.
pub trait ReduceFn<K, V: Clone>: Send + Sync + 'static {
    type Out;

    /// Reduce the values held in the shared state.
    fn do_reduce(&self, key: &K, values: &SafeValueContainer<V>) -> (K, Self::Out) {
        self.do_reduce_unsafe(key, &values.to_unsafe())
    }

    /// Reduce the values of a task-local container.
    fn do_reduce_unsafe(&self, key: &K, values: &UnsafeValueContainer<V>) -> (K, Self::Out);
}

/// Adapts a [`CombineFn`] into a [`ReduceFn`].
pub struct CombineReduce<C, A, O> {
    comb: C,
    _t: PhantomData<fn() -> (A, O)>,
}

impl<C, A, O> CombineReduce<C, A, O> {
    pub fn new(comb: C) -> Self {
        Self { comb, _t: PhantomData }
    }
}

impl<K, V, C, A, O> ReduceFn<K, V> for CombineReduce<C, A, O>
where
    K: Clone,
    V: Clone,
    C: CombineFn<V, A, O>,
    A: 'static,
    O: 'static,
{
    type Out = O;

    fn do_reduce_unsafe(&self, key: &K, values: &UnsafeValueContainer<V>) -> (K, O) {
        let mut acc = self.comb.create();
        for v in values.iter() {
            self.comb.add_input(&mut acc, v.clone());
        }
        (key.clone(), self.comb.finish(acc))
    }
}

/// A closure `(key, values) -> output` used as a [`ReduceFn`].
pub struct FnReduce<F, O> {
    f: F,
    _o: PhantomData<fn() -> O>,
}

pub fn reduce_fn<K, V, F, O>(f: F) -> FnReduce<F, O>
where
    F: Fn(&K, &[V]) -> O + Send + Sync + 'static,
{
    FnReduce { f, _o: PhantomData }
}

impl<K, V, F, O> ReduceFn<K, V> for FnReduce<F, O>
where
    K: Clone,
    V: Clone,
    F: Fn(&K, &[V]) -> O + Send + Sync + 'static,
    O: 'static,
{
    type Out = O;

    fn do_reduce_unsafe(&self, key: &K, values: &UnsafeValueContainer<V>) -> (K, O) {
        (key.clone(), (self.f)(key, values.as_slice()))
    }
}

type SharedFragment<K, V> = Arc<SafeFragment<K, V>>;

/// Task-local accumulator: one unsynchronized fragment per window.
pub type LocalAccumulator<K, V> = BTreeMap<Window, UnsafeFragment<K, V>>;

pub struct WinKeyReducer<K, V, F> {
    base: TransformBase,
    reduce: F,
    state: WindowedState<SharedFragment<K, V>>,
    purge: bool,
    windows_fired: AtomicU64,
    late_records: AtomicU64,
}

impl<K, V, F> WinKeyReducer<K, V, F>
where
    K: StreamKey,
    V: StreamData,
    F: ReduceFn<K, V>,
    F::Out: StreamData,
{
    pub fn new(name: impl Into<String>, reduce: F) -> Self {
        Self {
            base: TransformBase::new(name),
            reduce,
            state: WindowedState::new(MinTsPolicy::default()),
            purge: true,
            windows_fired: AtomicU64::new(0),
            late_records: AtomicU64::new(0),
        }
    }

    pub fn from_config(name: impl Into<String>, reduce: F, cfg: &EngineConfig) -> Self {
        Self {
            base: TransformBase::with_policy(name, cfg.regression_policy),
            reduce,
            state: WindowedState::new(cfg.min_ts_policy),
            purge: cfg.purge,
            windows_fired: AtomicU64::new(0),
            late_records: AtomicU64::new(0),
        }
    }

    /// Keep fired windows in the state; each release then re-emits the
    /// window's current aggregate.
    #[must_use]
    pub fn without_purge(mut self) -> Self {
        self.purge = false;
        self
    }

    #[must_use]
    pub fn with_min_ts_policy(mut self, policy: MinTsPolicy) -> Self {
        self.state = WindowedState::new(policy);
        self
    }

    pub fn purges(&self) -> bool {
        self.purge
    }

    /// Number of open windows.
    pub fn window_count(&self) -> usize {
        self.state.window_count()
    }

    /// Minimum timestamp over retained state. Not the watermark.
    pub fn min_ts(&self) -> TimestampMs {
        self.state.min_ts()
    }

    pub fn windows(&self) -> Vec<Window> {
        self.state.windows()
    }

    /// Values retained across all windows and keys.
    pub fn record_count(&self) -> usize {
        self.state.inspect(|m| m.values().map(|f| f.record_count()).sum())
    }

    pub fn windows_fired(&self) -> u64 {
        self.windows_fired.load(Ordering::Relaxed)
    }

    /// Records that arrived for a window the watermark had already closed.
    pub fn late_records(&self) -> u64 {
        self.late_records.load(Ordering::Relaxed)
    }

    /// Reduce every key of the given windows into `out`.
    pub fn reduce_windows(&self, windows: BTreeMap<Window, SharedFragment<K, V>>, out: &mut WindowsBundle<(K, F::Out)>) {
        for (w, frag) in windows {
            for (k, values) in frag.entries() {
                let kv = self.reduce.do_reduce(&k, &values);
                out.add(w, Timestamped::new(w.start, kv));
            }
            debug!(transform = self.name(), start = w.start, end = w.end(), keys = frag.len(), "window fired");
            self.windows_fired.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Release windows closed by the current watermark.
    fn fire(&self, out: &mut WindowsBundle<(K, F::Out)>) -> bool {
        let closed = self.retrieve_windows(self.purge, self.watermark(), None);
        if closed.is_empty() {
            return false;
        }
        self.reduce_windows(closed, out);
        true
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn publish_metrics(&self, collector: &MetricsCollector) {
        let name = self.name();
        collector.set_gauge(&format!("{name}.windows_open"), self.window_count() as f64);
        collector.set_counter(&format!("{name}.windows_fired"), self.windows_fired());
        collector.set_counter(&format!("{name}.late_records"), self.late_records());
    }
}

impl<K, V, F> StatefulTransform for WinKeyReducer<K, V, F>
where
    K: StreamKey,
    V: StreamData,
    F: ReduceFn<K, V>,
    F::Out: StreamData,
{
    type Input = WindowsBundle<(K, V)>;
    type LocalResult = LocalAccumulator<K, V>;
    type WindowResult = SharedFragment<K, V>;

    fn aggregate_init(&self) -> LocalAccumulator<K, V> {
        BTreeMap::new()
    }

    fn aggregate(&self, acc: &mut LocalAccumulator<K, V>, input: &WindowsBundle<(K, V)>) {
        let wm = self.watermark();
        for (w, recs) in input.iter() {
            if w.end() <= wm {
                warn!(
                    transform = self.name(),
                    watermark = wm,
                    window_start = w.start,
                    records = recs.len(),
                    "stale input for a closed window, accepting"
                );
                self.late_records.fetch_add(recs.len() as u64, Ordering::Relaxed);
            }
            let frag = acc.entry(*w).or_default();
            for r in recs {
                frag.add(r.value.0.clone(), r.value.1.clone(), r.ts);
            }
        }
    }

    fn combine(&self, local: LocalAccumulator<K, V>) {
        self.state.merge(local, |shared, l| shared.merge_unsafe(l));
    }

    fn retrieve_windows(
        &self,
        purge: bool,
        watermark: TimestampMs,
        limit: Option<usize>,
    ) -> BTreeMap<Window, SharedFragment<K, V>> {
        self.state.retrieve(purge, watermark, limit)
    }
}

impl<K, V, F> Transform for WinKeyReducer<K, V, F>
where
    K: StreamKey,
    V: StreamData,
    F: ReduceFn<K, V>,
    F::Out: StreamData,
{
    fn base(&self) -> &TransformBase {
        &self.base
    }

    fn exec_evaluator(&self, node: NodeId, ctx: &dyn ExecutionContext, bundle: BundleHandle) {
        WinKeyReducerEvaluator::<K, V, F>::new(node).evaluate(self, ctx, bundle);
    }

    fn on_watermark(&self, node: NodeId, ctx: &dyn ExecutionContext, upstream: TimestampMs) -> Advance {
        let advance = self.base.watermark().refresh(self.name(), upstream, self.base.inflight());
        let mut out = WindowsBundle::new();
        if self.fire(&mut out) {
            ctx.emit(node, Arc::new(out));
        }
        advance
    }
}

pub struct WinKeyReducerEvaluator<K, V, F> {
    node: NodeId,
    _t: PhantomData<fn() -> (K, V, F)>,
}

impl<K, V, F> WinKeyReducerEvaluator<K, V, F> {
    pub fn new(node: NodeId) -> Self {
        Self { node, _t: PhantomData }
    }
}

impl<K, V, F> Evaluator for WinKeyReducerEvaluator<K, V, F>
where
    K: StreamKey,
    V: StreamData,
    F: ReduceFn<K, V>,
    F::Out: StreamData,
{
    type Transform = WinKeyReducer<K, V, F>;
    type Input = WindowsBundle<(K, V)>;
    type Output = WindowsBundle<(K, F::Out)>;

    fn node(&self) -> NodeId {
        self.node
    }

    fn evaluate_single_input(
        &self,
        trans: &Self::Transform,
        input: Arc<Self::Input>,
        output: &mut Self::Output,
    ) -> bool {
        let mut local = trans.aggregate_init();
        trans.aggregate(&mut local, &input);
        trans.combine(local);
        trans.fire(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::downcast_bundle;
    use crate::combiners::{Count, Sum};
    use crate::context::LocalContext;

    fn bundle(recs: &[(i64, &'static str, i64)]) -> WindowsBundle<(&'static str, i64)> {
        let mut b = WindowsBundle::new();
        for &(ts, k, v) in recs {
            b.add(Window::fixed(ts, 10), Timestamped::new(ts, (k, v)));
        }
        b
    }

    #[test]
    fn aggregate_does_not_touch_shared_state() {
        let r: WinKeyReducer<&str, i64, _> = WinKeyReducer::new("r", CombineReduce::new(Sum::<i64>::new()));
        let mut acc = r.aggregate_init();
        r.aggregate(&mut acc, &bundle(&[(1, "a", 1), (12, "a", 2)]));
        assert_eq!(acc.len(), 2);
        assert_eq!(r.window_count(), 0);
        r.combine(acc);
        assert_eq!(r.window_count(), 2);
        assert_eq!(r.record_count(), 2);
    }

    #[test]
    fn evaluator_emits_only_when_windows_close() {
        let r: WinKeyReducer<&str, i64, _> = WinKeyReducer::new("r", CombineReduce::new(Count));
        let ctx = LocalContext::new();
        let node = NodeId::new(3);

        r.exec_evaluator(node, &ctx, Arc::new(bundle(&[(1, "a", 0), (2, "a", 0)])));
        assert!(ctx.is_empty());

        r.base().watermark().advance("r", 10);
        r.exec_evaluator(node, &ctx, Arc::new(bundle(&[(11, "b", 0)])));
        let emitted = ctx.take();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].0, node);

        let out = downcast_bundle::<WindowsBundle<(&'static str, u64)>>(emitted[0].1.clone());
        let recs = out.get(&Window::new(0, 10)).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].value, ("a", 2));
        assert_eq!(r.windows(), vec![Window::new(10, 10)]);
        assert_eq!(r.windows_fired(), 1);
    }

    #[test]
    fn late_records_are_counted_and_kept() {
        let r: WinKeyReducer<&str, i64, _> = WinKeyReducer::new("r", reduce_fn(|_k: &&'static str, vs: &[i64]| vs.len()));
        r.base().watermark().advance("r", 30);
        let mut acc = r.aggregate_init();
        r.aggregate(&mut acc, &bundle(&[(5, "a", 1)]));
        r.combine(acc);
        assert_eq!(r.late_records(), 1);
        assert_eq!(r.window_count(), 1);
    }

    #[test]
    fn without_purge_re_emits() {
        let r: WinKeyReducer<&str, i64, _> = WinKeyReducer::new("r", CombineReduce::new(Sum::<i64>::new())).without_purge();
        let ctx = LocalContext::new();
        let mut acc = r.aggregate_init();
        r.aggregate(&mut acc, &bundle(&[(1, "a", 4)]));
        r.combine(acc);
        r.on_watermark(NodeId::new(0), &ctx, 10);
        r.on_watermark(NodeId::new(0), &ctx, 11);
        assert_eq!(ctx.len(), 2);
        assert_eq!(r.window_count(), 1);
    }
}

//! Tumbling window assignment.
//!
//! [`FixedWindowInto`] buckets raw timestamped records into fixed-size,
//! non-overlapping windows. Assignment is a pure function of a record's
//! timestamp (see [`Window::fixed_with_offset`]); the transform keeps no
//! state between bundles.
//!
//! ```
//! use ironstream::prelude::*;
//! use std::sync::Arc;
//!
//! let win = FixedWindowInto::<u32>::new("win", 10);
//! let ctx = LocalContext::new();
//! let input = RecordBundle::new(vec![Timestamped::new(3, 1u32), Timestamped::new(14, 2)]);
//! win.exec_evaluator(NodeId::new(1), &ctx, Arc::new(input));
//!
//! let out = downcast_bundle::<WindowsBundle<u32>>(ctx.take_bundles().remove(0));
//! assert_eq!(out.windows(), vec![Window::new(0, 10), Window::new(10, 10)]);
//! ```

use crate::bundle::{BundleHandle, RecordBundle, StreamData, WindowsBundle};
use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::evaluator::Evaluator;
use crate::node_id::NodeId;
use crate::transform::{Transform, TransformBase};
use crate::window::{DurationMs, Window};
use std::marker::PhantomData;
use std::sync::Arc;

pub struct FixedWindowInto<T> {
    base: TransformBase,
    duration: DurationMs,
    offset_ms: i64,
    _t: PhantomData<fn() -> T>,
}

impl<T: StreamData> FixedWindowInto<T> {
    /// # Panics
    ///
    /// Panics if `duration` is not positive.
    pub fn new(name: impl Into<String>, duration: DurationMs) -> Self {
        assert!(duration > 0, "window duration must be positive, got {duration}");
        Self { base: TransformBase::new(name), duration, offset_ms: 0, _t: PhantomData }
    }

    pub fn from_config(name: impl Into<String>, cfg: &EngineConfig) -> Self {
        Self {
            base: TransformBase::with_policy(name, cfg.regression_policy),
            ..Self::new("", cfg.window_size_ms)
        }
    }

    /// Shift window boundaries by `offset_ms`.
    #[must_use]
    pub fn with_offset(mut self, offset_ms: i64) -> Self {
        self.offset_ms = offset_ms;
        self
    }

    pub fn duration(&self) -> DurationMs {
        self.duration
    }

    #[inline]
    pub fn assign(&self, ts: i64) -> Window {
        Window::fixed_with_offset(ts, self.duration, self.offset_ms)
    }
}

impl<T: StreamData> Transform for FixedWindowInto<T> {
    fn base(&self) -> &TransformBase {
        &self.base
    }

    fn exec_evaluator(&self, node: NodeId, ctx: &dyn ExecutionContext, bundle: BundleHandle) {
        FixedWindowIntoEvaluator::<T>::new(node).evaluate(self, ctx, bundle);
    }
}

pub struct FixedWindowIntoEvaluator<T> {
    node: NodeId,
    _t: PhantomData<fn() -> T>,
}

impl<T> FixedWindowIntoEvaluator<T> {
    pub fn new(node: NodeId) -> Self {
        Self { node, _t: PhantomData }
    }
}

impl<T: StreamData> Evaluator for FixedWindowIntoEvaluator<T> {
    type Transform = FixedWindowInto<T>;
    type Input = RecordBundle<T>;
    type Output = WindowsBundle<T>;

    fn node(&self) -> NodeId {
        self.node
    }

    fn evaluate_single_input(
        &self,
        trans: &FixedWindowInto<T>,
        input: Arc<RecordBundle<T>>,
        output: &mut WindowsBundle<T>,
    ) -> bool {
        for rec in input.iter() {
            output.add(trans.assign(rec.ts), rec.clone());
        }
        !input.records().is_empty()
    }
}

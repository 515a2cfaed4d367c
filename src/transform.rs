//! Transforms: the per-node objects the execution context dispatches to.
//!
//! Every transform embeds a [`TransformBase`] carrying its name, watermark and
//! in-flight bookkeeping, and implements [`Transform::exec_evaluator`] by
//! constructing its evaluator type and calling
//! [`Evaluator::evaluate`](crate::evaluator::Evaluator::evaluate).
//!
//! Stateful transforms additionally implement [`StatefulTransform`], the
//! two-level aggregation protocol: evaluators fold their input into a cheap
//! task-local accumulator (`aggregate_init` + `aggregate`) and then merge it
//! into the shared state under a lock (`combine`). Completed windows are
//! taken out with `retrieve_windows`.

use crate::bundle::BundleHandle;
use crate::config::RegressionPolicy;
use crate::context::ExecutionContext;
use crate::node_id::NodeId;
use crate::watermark::{Advance, InflightTracker, Watermark};
use crate::window::{TimestampMs, Window};
use std::collections::BTreeMap;

/// State shared by every transform.
#[derive(Debug)]
pub struct TransformBase {
    name: String,
    watermark: Watermark,
    inflight: InflightTracker,
}

impl TransformBase {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_policy(name, RegressionPolicy::default())
    }

    pub fn with_policy(name: impl Into<String>, policy: RegressionPolicy) -> Self {
        Self { name: name.into(), watermark: Watermark::new(policy), inflight: InflightTracker::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn watermark(&self) -> &Watermark {
        &self.watermark
    }

    pub fn inflight(&self) -> &InflightTracker {
        &self.inflight
    }
}

pub trait Transform: Send + Sync {
    fn base(&self) -> &TransformBase;

    /// Run one evaluator for `node` over one input bundle.
    fn exec_evaluator(&self, node: NodeId, ctx: &dyn ExecutionContext, bundle: BundleHandle);

    fn name(&self) -> &str {
        self.base().name()
    }

    fn watermark(&self) -> TimestampMs {
        self.base().watermark().get()
    }

    /// Called when the upstream watermark may have moved. Stateless
    /// transforms only track it; stateful ones may release windows.
    fn on_watermark(&self, _node: NodeId, _ctx: &dyn ExecutionContext, upstream: TimestampMs) -> Advance {
        let base = self.base();
        base.watermark().refresh(base.name(), upstream, base.inflight())
    }
}

/// Two-level aggregation over windowed state.
pub trait StatefulTransform: Transform {
    /// One input unit folded by `aggregate`.
    type Input;
    /// Task-local accumulator; never shared.
    type LocalResult;
    /// What retrieval hands back per window.
    type WindowResult;

    /// A fresh, empty local accumulator.
    fn aggregate_init(&self) -> Self::LocalResult;

    /// Fold `input` into `acc`. Touches nothing but `acc`.
    fn aggregate(&self, acc: &mut Self::LocalResult, input: &Self::Input);

    /// Merge a local accumulator into the shared state.
    fn combine(&self, local: Self::LocalResult);

    /// Take every window whose end is at or before `watermark`, oldest first,
    /// at most `limit` of them. With `purge` they leave the state.
    fn retrieve_windows(
        &self,
        purge: bool,
        watermark: TimestampMs,
        limit: Option<usize>,
    ) -> BTreeMap<Window, Self::WindowResult>;
}

//! Evaluators: one unit of work for one node.
//!
//! An evaluator is created per invocation, bound to the node it runs for,
//! and consumes exactly one input bundle. It may or may not produce an output
//! bundle; only when [`Evaluator::evaluate_single_input`] reports `true` is
//! the output handed to the context.

use crate::bundle::{downcast_bundle, BundleBase, BundleHandle};
use crate::context::ExecutionContext;
use crate::node_id::NodeId;
use crate::transform::Transform;
use std::sync::Arc;

pub trait Evaluator {
    type Transform: Transform;
    type Input: BundleBase;
    type Output: BundleBase + Default;

    fn node(&self) -> NodeId;

    /// Process `input`, filling the pre-allocated `output`.
    /// Returns whether `output` should be emitted.
    fn evaluate_single_input(
        &self,
        trans: &Self::Transform,
        input: Arc<Self::Input>,
        output: &mut Self::Output,
    ) -> bool;

    /// Downcast the handle, evaluate, and emit at most one bundle.
    ///
    /// # Panics
    ///
    /// Panics if `bundle` is not a `Self::Input`.
    fn evaluate(&self, trans: &Self::Transform, ctx: &dyn ExecutionContext, bundle: BundleHandle) {
        let input = downcast_bundle::<Self::Input>(bundle);
        let _inflight = trans.base().inflight().enter(input.min_ts());
        let mut output = Self::Output::default();
        if self.evaluate_single_input(trans, input, &mut output) {
            ctx.emit(self.node(), Arc::new(output));
        }
    }
}

//! # Ironstream
//!
//! Windowed, watermark-driven stateful reduction for Rust.
//!
//! Ironstream buckets timestamped records into fixed, non-overlapping time
//! windows, aggregates them per window and per key from many threads at once,
//! and releases ("fires") each window exactly once when the watermark passes
//! its end.
//!
//! ## Key Features
//!
//! - **Tumbling windows** - [`FixedWindowInto`] assigns each record to `[start, start + duration)`
//! - **Two-level aggregation** - cheap task-local accumulation, then one locked merge per bundle
//! - **Watermark-gated release** - windows fire oldest first, at most once when purging
//! - **Pluggable reductions** - any [`CombineFn`] (Sum, Count, Min, Max) or a plain closure
//! - **Sequential and parallel execution** - the [`Runner`] evaluates bundles on a rayon pool
//!
//! ## Quick Start
//!
//! ```
//! use ironstream::prelude::*;
//! use std::sync::Arc;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let p = Pipeline::default();
//! p.apply(FixedWindowInto::<(&'static str, i64)>::new("window", 10));
//! p.apply(WinKeyReducer::<&str, i64, _>::new("sum", CombineReduce::new(Sum::<i64>::new())));
//!
//! let input: RecordBundle<(&str, i64)> =
//!     [0, 1, 2, 10, 11, 20].into_iter().map(|ts| Timestamped::new(ts, ("k", ts))).collect();
//!
//! let runner = Runner::new(ExecMode::Sequential);
//! assert!(runner.run(&p, vec![Arc::new(input)])?.is_empty());
//!
//! let fired = runner.advance_watermark(&p, 20)?;
//! let out = downcast_bundle::<WindowsBundle<(&str, i64)>>(fired[0].clone());
//! assert_eq!(out.get(&Window::new(0, 10)).unwrap()[0].value, ("k", 3));
//! assert_eq!(out.get(&Window::new(10, 10)).unwrap()[0].value, ("k", 21));
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Bundles
//!
//! Nodes exchange [`BundleHandle`]s: type-erased, shared pointers to a
//! [`RecordBundle`] or a [`WindowsBundle`]. An evaluator recovers the concrete
//! type with [`downcast_bundle`]; a mismatch is a wiring bug and panics.
//!
//! ### Transforms and evaluators
//!
//! A [`Transform`] is the long-lived node object. For every input bundle the
//! execution context calls [`Transform::exec_evaluator`], which builds a
//! short-lived [`Evaluator`] and runs it. Stateful transforms also implement
//! [`StatefulTransform`].
//!
//! ### Watermarks
//!
//! Each transform owns a monotonic [`Watermark`](watermark::Watermark). A
//! [`WinKeyReducer`] releases every window whose end is at or before it.
//! Regression handling follows [`RegressionPolicy`].
//!
//! ## Configuration
//!
//! [`EngineConfig`] collects the tunables (window size, purge mode, `min_ts`
//! policy, regression policy, execution mode) and loads from JSON.
//!
//! ## Testing
//!
//! The [`testing`] module offers window-aware assertions, fixtures and a
//! [`TestContext`](testing::TestContext) for driving evaluators directly.

pub mod bundle;
pub mod combiners;
pub mod config;
pub mod context;
pub mod evaluator;
pub mod fixed_window;
pub mod fragment;
pub mod metrics;
pub mod node_id;
pub mod pipeline;
pub mod reducer;
pub mod runner;
pub mod sink;
pub mod stateful;
pub mod testing;
pub mod transform;
pub mod watermark;
pub mod window;

// General re-exports
pub use bundle::{downcast_bundle, BundleBase, BundleHandle, RecordBundle, StreamData, StreamKey, WindowsBundle};
pub use combiners::{CombineFn, Count, Max, Min, Sum};
pub use config::{EngineConfig, MinTsPolicy, RegressionPolicy};
pub use context::{ExecutionContext, LocalContext};
pub use evaluator::Evaluator;
pub use fixed_window::FixedWindowInto;
pub use fragment::{SafeFragment, SafeValueContainer, UnsafeFragment, UnsafeValueContainer, ValueContainer};
pub use node_id::NodeId;
pub use pipeline::Pipeline;
pub use reducer::{reduce_fn, CombineReduce, ReduceFn, WinKeyReducer};
pub use runner::{ExecMode, Runner};
pub use sink::WindowsBundleSink;
pub use transform::{StatefulTransform, Transform, TransformBase};
pub use window::{DurationMs, TimestampMs, Timestamped, Window};

/// Everything needed to build and drive a pipeline.
pub mod prelude {
    pub use crate::bundle::{downcast_bundle, BundleBase, BundleHandle, RecordBundle, WindowsBundle};
    pub use crate::combiners::{CombineFn, Count, Max, Min, Sum};
    pub use crate::config::{EngineConfig, MinTsPolicy, RegressionPolicy};
    pub use crate::context::{ExecutionContext, LocalContext};
    pub use crate::fixed_window::FixedWindowInto;
    pub use crate::node_id::NodeId;
    pub use crate::pipeline::Pipeline;
    pub use crate::reducer::{reduce_fn, CombineReduce, ReduceFn, WinKeyReducer};
    pub use crate::runner::{ExecMode, Runner};
    pub use crate::sink::WindowsBundleSink;
    pub use crate::transform::{StatefulTransform, Transform};
    pub use crate::window::{TimestampMs, Timestamped, Window};
}

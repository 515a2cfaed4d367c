//! Testing utilities for Ironstream pipelines.
//!
//! - **Assertions**: compare windowed output with expected results
//! - **Builders**: assemble timestamped record bundles fluently
//! - **Fixtures**: ready-made record sets (constant-key, word, IP-pair)
//! - **[`TestContext`]**: an execution context for driving one transform by hand
//!
//! # Quick Start
//!
//! ```
//! use ironstream::prelude::*;
//! use ironstream::testing::*;
//! use std::sync::Arc;
//!
//! let win = FixedWindowInto::<i64>::new("win", 10);
//! let ctx = TestContext::new();
//! win.exec_evaluator(NodeId::new(0), &ctx, Arc::new(records_at(&[0, 1, 2, 10, 11, 20])));
//!
//! assert_windows_equal(
//!     &ctx.take_windows::<i64>(),
//!     &[
//!         (Window::new(0, 10), vec![0, 1, 2]),
//!         (Window::new(10, 10), vec![10, 11]),
//!         (Window::new(20, 10), vec![20]),
//!     ],
//! );
//! ```

pub mod assertions;
pub mod builders;
pub mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;

use crate::bundle::{downcast_bundle, BundleHandle, StreamData, WindowsBundle};
use crate::context::{ExecutionContext, LocalContext};
use crate::node_id::NodeId;
use crate::window::Window;
use std::collections::BTreeMap;

/// Flatten emitted [`WindowsBundle`]s into window → values.
///
/// Values from several bundles for the same window are concatenated in
/// bundle order.
///
/// # Panics
///
/// Panics if any bundle is not a `WindowsBundle<T>`.
#[must_use]
pub fn collect_windows<T: StreamData>(bundles: &[BundleHandle]) -> BTreeMap<Window, Vec<T>> {
    let mut out: BTreeMap<Window, Vec<T>> = BTreeMap::new();
    for b in bundles {
        let wb = downcast_bundle::<WindowsBundle<T>>(b.clone());
        for (w, recs) in wb.iter() {
            out.entry(*w).or_default().extend(recs.iter().map(|r| r.value.clone()));
        }
    }
    out
}

/// A [`LocalContext`] with windowed-output helpers.
#[derive(Debug, Default)]
pub struct TestContext {
    inner: LocalContext,
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything emitted and flatten it per window.
    #[must_use]
    pub fn take_windows<T: StreamData>(&self) -> BTreeMap<Window, Vec<T>> {
        collect_windows(&self.inner.take_bundles())
    }
}

impl ExecutionContext for TestContext {
    fn emit(&self, node: NodeId, bundle: BundleHandle) {
        self.inner.emit(node, bundle);
    }
}

impl std::ops::Deref for TestContext {
    type Target = LocalContext;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

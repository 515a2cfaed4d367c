//! The execution context seen by evaluators.
//!
//! Evaluators never return bundles; they hand them to the context on behalf of
//! the node they run for. Whoever schedules evaluators decides what happens to
//! emitted bundles next.

use crate::bundle::BundleHandle;
use crate::node_id::NodeId;
use std::sync::Mutex;

pub trait ExecutionContext: Send + Sync {
    /// Enqueue one output bundle produced by `node`.
    fn emit(&self, node: NodeId, bundle: BundleHandle);
}

/// In-process context that buffers everything emitted.
#[derive(Debug, Default)]
pub struct LocalContext {
    emitted: Mutex<Vec<(NodeId, BundleHandle)>>,
}

impl LocalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain all emitted bundles, in emission order.
    pub fn take(&self) -> Vec<(NodeId, BundleHandle)> {
        std::mem::take(&mut *self.lock())
    }

    /// Drain the bundles emitted by `node`, leaving the rest in place.
    pub fn take_from(&self, node: NodeId) -> Vec<BundleHandle> {
        let mut emitted = self.lock();
        let (mine, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut *emitted).into_iter().partition(|(n, _)| *n == node);
        *emitted = rest;
        mine.into_iter().map(|(_, b)| b).collect()
    }

    /// Drain only the bundles, dropping node attribution.
    pub fn take_bundles(&self) -> Vec<BundleHandle> {
        self.take().into_iter().map(|(_, b)| b).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(NodeId, BundleHandle)>> {
        self.emitted.lock().expect("context lock poisoned")
    }
}

impl ExecutionContext for LocalContext {
    fn emit(&self, node: NodeId, bundle: BundleHandle) {
        self.lock().push((node, bundle));
    }
}

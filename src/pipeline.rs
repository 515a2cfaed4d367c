use crate::metrics::MetricsCollector;
use crate::node_id::NodeId;
use crate::transform::Transform;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// -------- Pipeline + nodes --------
/// A linear chain of transforms. Each `apply` appends a node downstream of
/// the current tail.
pub struct Pipeline {
    pub(crate) inner: Arc<Mutex<PipelineInner>>,
}

pub struct PipelineInner {
    pub next_id: u64,
    pub nodes: HashMap<NodeId, Arc<dyn Transform>>,
    pub edges: Vec<(NodeId, NodeId)>,
    pub tail: Option<NodeId>,
    pub metrics: Option<MetricsCollector>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(PipelineInner {
                next_id: 0,
                nodes: HashMap::new(),
                edges: Vec::new(),
                tail: None,
                metrics: None,
            })),
        }
    }
}

/// Clones share the same graph.
impl Clone for Pipeline {
    fn clone(&self) -> Self {
        Pipeline { inner: Arc::clone(&self.inner) }
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PipelineInner> {
        self.inner.lock().expect("pipeline lock poisoned")
    }

    /// Append `transform` after the current tail and return its id.
    pub fn apply<T: Transform + 'static>(&self, transform: T) -> NodeId {
        self.apply_shared(Arc::new(transform))
    }

    /// Like [`apply`](Self::apply), for a transform the caller keeps a handle to.
    pub fn apply_shared(&self, transform: Arc<dyn Transform>) -> NodeId {
        let mut g = self.lock();
        let id = NodeId::new(g.next_id);
        g.next_id += 1;
        g.nodes.insert(id, transform);
        if let Some(prev) = g.tail.replace(id) {
            g.edges.push((prev, id));
        }
        id
    }

    pub fn len(&self) -> usize {
        self.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<Arc<dyn Transform>> {
        self.lock().nodes.get(&id).cloned()
    }

    /// Nodes in execution order, source first.
    ///
    /// # Errors
    ///
    /// Returns an error if an edge points at a node that is not in the graph.
    pub fn chain(&self) -> Result<Vec<(NodeId, Arc<dyn Transform>)>> {
        let g = self.lock();
        let Some(mut cur) = g.tail else {
            return Ok(Vec::new());
        };

        // Linear backwalk: tail → … → source
        let mut chain = Vec::with_capacity(g.nodes.len());
        loop {
            let t = g.nodes.get(&cur).ok_or_else(|| anyhow!("missing node {cur}"))?;
            chain.push((cur, Arc::clone(t)));
            match g.edges.iter().find(|(_, to)| *to == cur) {
                Some((from, _)) => cur = *from,
                None => break,
            }
        }
        chain.reverse();
        Ok(chain)
    }

    pub fn set_metrics(&self, metrics: MetricsCollector) {
        self.lock().metrics = Some(metrics);
    }

    pub fn metrics(&self) -> Option<MetricsCollector> {
        self.lock().metrics.clone()
    }

    pub fn take_metrics(&self) -> Option<MetricsCollector> {
        self.lock().metrics.take()
    }
}

//! Identifier of a node within a [`Pipeline`](crate::pipeline::Pipeline).
//!
//! Each transform added to a pipeline is assigned a sequential `NodeId`. The
//! execution context passes it to every evaluator invocation so emitted
//! bundles can be attributed to the node that produced them.

use std::fmt;

/// Unique numeric identifier for a node in a pipeline.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(u64);

impl NodeId {
    pub fn new(v: u64) -> Self {
        Self(v)
    }

    /// Return the underlying numeric value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

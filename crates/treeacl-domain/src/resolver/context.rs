//! Internal traversal context for ancestor walks.

use std::collections::HashSet;

use treeacl_storage::{NodeId, TreeKind};

use crate::error::{DomainError, DomainResult};

/// Tracks one walk up a tree so that cycles and runaway depth terminate it.
#[derive(Debug)]
pub(crate) struct AncestorWalk {
    kind: TreeKind,
    max_depth: u32,
    /// Nodes visited so far, in walk order.
    path: Vec<NodeId>,
    visited: HashSet<NodeId>,
}

impl AncestorWalk {
    pub(crate) fn new(kind: TreeKind, max_depth: u32) -> Self {
        Self {
            kind,
            max_depth,
            path: Vec::new(),
            visited: HashSet::new(),
        }
    }

    /// Records the next node of the walk.
    pub(crate) fn visit(&mut self, node_id: NodeId) -> DomainResult<()> {
        if !self.visited.insert(node_id) {
            return Err(DomainError::CycleDetected {
                kind: self.kind,
                node_id,
            });
        }
        if self.path.len() >= self.max_depth as usize {
            return Err(DomainError::DepthLimitExceeded {
                kind: self.kind,
                max_depth: self.max_depth,
            });
        }
        self.path.push(node_id);
        Ok(())
    }

    pub(crate) fn into_path(self) -> Vec<NodeId> {
        self.path
    }
}

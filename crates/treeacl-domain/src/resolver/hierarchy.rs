//! Parent lookup and ancestor walks.

use tracing::warn;
use treeacl_storage::{NodeFields, NodeId, NodeStore, PermissionStore, TreeKind};

use crate::error::{DomainError, DomainResult};
use crate::model::NodeRef;

use super::context::AncestorWalk;
use super::AclEngine;

impl<N, P> AclEngine<N, P>
where
    N: NodeStore,
    P: PermissionStore,
{
    /// Returns the parent id of a node, or `None` for roots and unknown nodes.
    pub async fn parent_of(
        &self,
        kind: TreeKind,
        node: impl Into<NodeRef>,
    ) -> DomainResult<Option<NodeId>> {
        Ok(self
            .resolve(kind, node, false)
            .await?
            .and_then(|node| node.parent_id))
    }

    /// Returns the root of the tree containing the node.
    ///
    /// A node without a parent is its own topmost ancestor. Returns `None`
    /// only if the reference itself does not resolve.
    pub async fn topmost_ancestor(
        &self,
        kind: TreeKind,
        node: impl Into<NodeRef>,
    ) -> DomainResult<Option<NodeId>> {
        let Some(start) = self.resolve(kind, node, false).await? else {
            return Ok(None);
        };
        let chain = self.ancestors(kind, start.id).await?;
        Ok(chain.last().copied())
    }

    /// Returns the node followed by its ancestors, nearest first.
    ///
    /// The walk stops at a root or at the last parent that still resolves.
    /// Fails with `CycleDetected` if a node repeats and with
    /// `DepthLimitExceeded` past `max_depth` nodes.
    pub async fn ancestors(&self, kind: TreeKind, node_id: NodeId) -> DomainResult<Vec<NodeId>> {
        let mut walk = AncestorWalk::new(kind, self.config.max_depth);
        let mut current = self.resolve_fields(kind, &NodeFields::id(node_id), false).await?;

        while let Some(node) = current {
            if let Err(err) = walk.visit(node.id) {
                warn!(kind = %kind, start = %node_id, error = %err, "ancestor walk aborted");
                return Err(err);
            }
            current = match node.parent_id {
                Some(parent_id) => {
                    self.resolve_fields(kind, &NodeFields::id(parent_id), false)
                        .await?
                }
                None => None,
            };
        }

        Ok(walk.into_path())
    }

    /// Fails if making `parent_id` the parent of `child_id` would close a loop.
    pub(crate) async fn ensure_acyclic(
        &self,
        kind: TreeKind,
        child_id: NodeId,
        parent_id: NodeId,
    ) -> DomainResult<()> {
        let chain = self.ancestors(kind, parent_id).await?;
        if chain.contains(&child_id) {
            warn!(kind = %kind, child = %child_id, parent = %parent_id, "re-parent rejected: would create a cycle");
            return Err(DomainError::CycleDetected {
                kind,
                node_id: child_id,
            });
        }
        Ok(())
    }
}

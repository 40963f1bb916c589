//! Read-only listing views over the trees.

use std::collections::HashSet;

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use treeacl_storage::{NodeFields, NodeId, NodeStore, PermissionStore, TreeKind, TreeNode};

use crate::error::{DomainError, DomainResult};
use crate::model::{NodeRef, PairAccess};

use super::AclEngine;

/// A node together with its number of direct children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeInfo {
    #[serde(flatten)]
    pub node: TreeNode,
    pub num_children: usize,
}

/// An action node, with the subject's decision when one was asked for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionEntry {
    #[serde(flatten)]
    pub node: TreeNode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed: Option<bool>,
}

/// One node of a tree listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeEntry {
    #[serde(flatten)]
    pub node: TreeNode,
    /// Inherited decision for the subject (resource trees only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed: Option<bool>,
    /// Row stored for exactly this pair (resource trees only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_entry: Option<PairAccess>,
    pub children: Vec<TreeEntry>,
    pub actions: Vec<ActionEntry>,
}

impl<N, P> AclEngine<N, P>
where
    N: NodeStore,
    P: PermissionStore,
{
    /// Lists nodes matching `fields`; an empty field set lists every node.
    pub async fn nodes(&self, kind: TreeKind, fields: &NodeFields) -> DomainResult<Vec<TreeNode>> {
        Ok(self.nodes.find_many(kind, fields).await?)
    }

    /// Lists the direct children of a node, action nodes included.
    pub async fn children_of(
        &self,
        kind: TreeKind,
        parent: impl Into<NodeRef>,
    ) -> DomainResult<Vec<TreeNode>> {
        let Some(parent) = self.resolve(kind, parent, false).await? else {
            return Ok(Vec::new());
        };
        self.nodes(kind, &NodeFields::new().with_parent(Some(parent.id)))
            .await
    }

    /// Returns a node with its child count.
    pub async fn node_info(
        &self,
        kind: TreeKind,
        node: impl Into<NodeRef>,
    ) -> DomainResult<Option<NodeInfo>> {
        let Some(node) = self.resolve(kind, node, false).await? else {
            return Ok(None);
        };
        let num_children = self
            .nodes(kind, &NodeFields::new().with_parent(Some(node.id)))
            .await?
            .len();
        Ok(Some(NodeInfo { node, num_children }))
    }

    /// Lists the actions of a resource with the subject's decision for each.
    pub async fn action_report(
        &self,
        resource: impl Into<NodeRef>,
        subject: impl Into<NodeRef>,
    ) -> DomainResult<Vec<ActionEntry>> {
        let subject = subject.into();
        let Some(resource) = self.resolve(TreeKind::Resource, resource, false).await? else {
            return Ok(Vec::new());
        };
        self.action_entries(resource.id, Some(&subject)).await
    }

    /// Lists the tree below `parent` (the roots when `None`), skipping
    /// action nodes, which are reported on their resource instead.
    ///
    /// With a subject, resource entries carry the subject's decision and the
    /// pair's own row.
    pub async fn tree(
        &self,
        kind: TreeKind,
        subject: Option<NodeRef>,
        parent: Option<NodeId>,
    ) -> DomainResult<Vec<TreeEntry>> {
        let subject = match subject {
            Some(subject) => match self.resolve(TreeKind::Subject, subject, false).await? {
                Some(node) => Some(node.id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        let mut visited = HashSet::new();
        self.tree_level(kind, subject, parent, 0, &mut visited).await
    }

    fn tree_level<'a>(
        &'a self,
        kind: TreeKind,
        subject: Option<NodeId>,
        parent: Option<NodeId>,
        depth: u32,
        visited: &'a mut HashSet<NodeId>,
    ) -> BoxFuture<'a, DomainResult<Vec<TreeEntry>>> {
        async move {
            let level = self
                .nodes(kind, &NodeFields::new().with_parent(parent))
                .await?;
            if !level.is_empty() && depth >= self.config.max_depth {
                return Err(DomainError::DepthLimitExceeded {
                    kind,
                    max_depth: self.config.max_depth,
                });
            }

            let mut entries = Vec::with_capacity(level.len());
            for node in level {
                if kind == TreeKind::Resource && self.is_action_node(&node) {
                    continue;
                }
                if !visited.insert(node.id) {
                    return Err(DomainError::CycleDetected {
                        kind,
                        node_id: node.id,
                    });
                }

                let (allowed, access_entry, actions) = match (kind, subject) {
                    (TreeKind::Resource, Some(subject_id)) => (
                        Some(self.check(subject_id, node.id, None).await?),
                        Some(self.pair_access(subject_id, node.id, None).await?),
                        self.action_entries(node.id, Some(&NodeRef::ById(subject_id)))
                            .await?,
                    ),
                    (TreeKind::Resource, None) => {
                        (None, None, self.action_entries(node.id, None).await?)
                    }
                    (TreeKind::Subject, _) => (None, None, Vec::new()),
                };

                let children = self
                    .tree_level(kind, subject, Some(node.id), depth + 1, &mut *visited)
                    .await?;

                entries.push(TreeEntry {
                    node,
                    allowed,
                    access_entry,
                    children,
                    actions,
                });
            }
            Ok(entries)
        }
        .boxed()
    }

    async fn action_entries(
        &self,
        resource_id: NodeId,
        subject: Option<&NodeRef>,
    ) -> DomainResult<Vec<ActionEntry>> {
        let mut entries = Vec::new();
        for node in self.actions_under(resource_id).await? {
            let allowed = match subject {
                Some(subject) => Some(
                    self.check(subject, resource_id, node.title.as_deref())
                        .await?,
                ),
                None => None,
            };
            entries.push(ActionEntry { node, allowed });
        }
        Ok(entries)
    }
}

//! Action nodes: named operations modeled as children of a resource.
//!
//! An action node is an ordinary resource node whose `model` is the
//! configured action marker, whose parent is the resource it refines and
//! whose title is the action name. `(parent_id, model, title)` identifies it.

use treeacl_storage::{NodeFields, NodeId, NodeStore, PermissionStore, TreeKind, TreeNode};

use crate::error::DomainResult;
use crate::model::NodeRef;

use super::AclEngine;

impl<N, P> AclEngine<N, P>
where
    N: NodeStore,
    P: PermissionStore,
{
    /// Resolves the action node named `action` under a resource.
    ///
    /// Returns `None` if the resource does not resolve, or if the action
    /// node is missing and `create` is false.
    pub async fn action_node_of(
        &self,
        resource: impl Into<NodeRef>,
        action: &str,
        create: bool,
    ) -> DomainResult<Option<TreeNode>> {
        let Some(resource) = self.resolve(TreeKind::Resource, resource, false).await? else {
            return Ok(None);
        };
        self.find_action_node(resource.id, action, create).await
    }

    /// Lists the action nodes directly under a resource.
    pub async fn actions_of(&self, resource: impl Into<NodeRef>) -> DomainResult<Vec<TreeNode>> {
        let Some(resource) = self.resolve(TreeKind::Resource, resource, false).await? else {
            return Ok(Vec::new());
        };
        self.actions_under(resource.id).await
    }

    /// Returns true if the node carries the action marker.
    pub fn is_action_node(&self, node: &TreeNode) -> bool {
        node.model.as_deref() == Some(self.config.action_model.as_str())
    }

    pub(crate) fn action_fields(&self, resource_id: NodeId) -> NodeFields {
        NodeFields::new()
            .with_model(self.config.action_model.clone())
            .with_parent(Some(resource_id))
    }

    pub(crate) async fn find_action_node(
        &self,
        resource_id: NodeId,
        action: &str,
        create: bool,
    ) -> DomainResult<Option<TreeNode>> {
        let fields = self.action_fields(resource_id).with_title(action);
        self.resolve_fields(TreeKind::Resource, &fields, create).await
    }

    pub(crate) async fn actions_under(&self, resource_id: NodeId) -> DomainResult<Vec<TreeNode>> {
        Ok(self
            .nodes
            .find_many(TreeKind::Resource, &self.action_fields(resource_id))
            .await?)
    }
}

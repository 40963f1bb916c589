//! Permission and node mutations.
//!
//! Every public mutation runs under the engine's write lock and clears the
//! check cache when it finishes, whether or not it succeeded, since a failed
//! cascade may already have been partially applied. Structural changes
//! (delete, re-parent, update) also clear the node caches of their kind.

use std::collections::HashSet;

use tracing::{info, instrument, warn};
use treeacl_storage::{Access, NodeFields, NodeId, NodeStore, PermissionStore, TreeKind, TreeNode};

use crate::error::{DomainError, DomainResult};
use crate::model::{Grant, NodeRef};

use super::AclEngine;

impl<N, P> AclEngine<N, P>
where
    N: NodeStore,
    P: PermissionStore,
{
    /// Grants `subject` access to `resource`, creating either node if needed.
    pub async fn allow(
        &self,
        subject: impl Into<NodeRef>,
        resource: impl Into<NodeRef>,
    ) -> DomainResult<bool> {
        self.set_access(subject, resource, Grant::Allow).await
    }

    /// Grants `subject` the named action on `resource`, allowing the
    /// resource itself as well.
    pub async fn allow_action(
        &self,
        subject: impl Into<NodeRef>,
        resource: impl Into<NodeRef>,
        action: &str,
    ) -> DomainResult<bool> {
        self.set_access(subject, resource, Grant::Action(action.to_string()))
            .await
    }

    /// Denies `subject` access to `resource`, revoking its action entries.
    pub async fn deny(
        &self,
        subject: impl Into<NodeRef>,
        resource: impl Into<NodeRef>,
    ) -> DomainResult<bool> {
        self.set_access(subject, resource, Grant::Deny).await
    }

    /// Writes an explicit deny on the named action node of `resource`,
    /// leaving the resource's own entry untouched.
    #[instrument(skip(self, subject, resource))]
    pub async fn deny_action(
        &self,
        subject: impl Into<NodeRef>,
        resource: impl Into<NodeRef>,
        action: &str,
    ) -> DomainResult<bool> {
        let (subject, resource) = (subject.into(), resource.into());
        let _guard = self.write_lock.lock().await;
        let result: DomainResult<bool> = async {
            let Some(resource) = self.resolve(TreeKind::Resource, resource, true).await? else {
                return Ok(false);
            };
            let Some(action_node) = self.find_action_node(resource.id, action, true).await? else {
                return Ok(false);
            };
            self.set_access_locked(subject, NodeRef::ById(action_node.id), Grant::Deny)
                .await
        }
        .await;
        self.after_permission_change();
        result
    }

    /// Writes a grant for the pair, creating missing nodes.
    ///
    /// - `Grant::Allow` / `Grant::Deny` upsert the pair's row. A deny first
    ///   removes the subject's rows on every action node under the resource.
    /// - `Grant::Action(name)` allows the resource, then allows the action
    ///   node (created if missing).
    ///
    /// Returns false if either node could not be resolved or created.
    #[instrument(skip(self, subject, resource, grant))]
    pub async fn set_access(
        &self,
        subject: impl Into<NodeRef>,
        resource: impl Into<NodeRef>,
        grant: impl Into<Grant>,
    ) -> DomainResult<bool> {
        let (subject, resource, grant) = (subject.into(), resource.into(), grant.into());
        let _guard = self.write_lock.lock().await;
        let result = self.set_access_locked(subject, resource, grant).await;
        self.after_permission_change();
        result
    }

    /// Removes the pair's row, or the row on the named action node.
    ///
    /// Without an action, the subject's rows on every action node under the
    /// resource go as well. Unknown subjects, resources or actions count as
    /// already removed, so this is idempotent.
    #[instrument(skip(self, subject, resource))]
    pub async fn unset_access(
        &self,
        subject: impl Into<NodeRef>,
        resource: impl Into<NodeRef>,
        action: Option<&str>,
    ) -> DomainResult<bool> {
        let (subject, resource) = (subject.into(), resource.into());
        let action = action.filter(|name| !name.is_empty());
        let _guard = self.write_lock.lock().await;
        let result: DomainResult<bool> = async {
            let subject = self.resolve(TreeKind::Subject, subject, false).await?;
            let resource = self.resolve(TreeKind::Resource, resource, false).await?;

            let target = match (resource, action) {
                (Some(resource), Some(name)) => {
                    self.find_action_node(resource.id, name, false).await?
                }
                (resource, _) => resource,
            };

            let (Some(subject), Some(target)) = (subject, target) else {
                return Ok(true);
            };

            if action.is_none() {
                self.clear_action_entries(subject.id, target.id).await?;
            }
            self.permissions.delete(subject.id, target.id).await?;
            Ok(true)
        }
        .await;
        self.after_permission_change();
        result
    }

    /// Removes the subject's row on one action node.
    pub async fn unset_action(
        &self,
        subject: impl Into<NodeRef>,
        resource: impl Into<NodeRef>,
        action: &str,
    ) -> DomainResult<bool> {
        self.unset_access(subject, resource, Some(action)).await
    }

    /// Deletes a node.
    ///
    /// Direct children move to the deleted node's parent (or become roots).
    /// Action nodes of a deleted resource are deleted with it. Every
    /// permission row referencing a deleted node is removed. Deleting an
    /// unknown node succeeds without doing anything.
    #[instrument(skip(self, node))]
    pub async fn delete_node(&self, kind: TreeKind, node: impl Into<NodeRef>) -> DomainResult<bool> {
        let node = node.into();
        let _guard = self.write_lock.lock().await;
        let result: DomainResult<bool> = async {
            let Some(node) = self.resolve(kind, node, false).await? else {
                return Ok(true);
            };
            // The parent pointer may have moved since the node was cached
            let node = self
                .find_unique(kind, &NodeFields::id(node.id))
                .await?
                .unwrap_or(node);

            let mut removed_rows = 0;
            if kind == TreeKind::Resource {
                removed_rows += self.delete_action_subtree(node.id).await?;
            }

            self.nodes.delete(kind, node.id).await?;
            let moved = self
                .nodes
                .reparent_children(kind, node.id, node.parent_id)
                .await?;
            removed_rows += self.permissions.delete_all_for(kind, node.id).await?;

            info!(
                kind = %kind,
                node_id = %node.id,
                children_moved = moved,
                permissions_removed = removed_rows,
                "deleted node"
            );
            Ok(true)
        }
        .await;
        self.after_structure_change(kind);
        result
    }

    /// Returns the id of the node matching `fields`, inserting it if absent.
    #[instrument(skip(self, fields))]
    pub async fn create_node(&self, kind: TreeKind, fields: NodeFields) -> DomainResult<NodeId> {
        if fields.id.is_some() {
            return Err(DomainError::InvalidReference {
                value: "node ids are assigned by the store".to_string(),
            });
        }
        if fields.is_empty() {
            return Err(DomainError::InvalidReference {
                value: "empty field set".to_string(),
            });
        }
        let _guard = self.write_lock.lock().await;
        let node = self.resolve_fields(kind, &fields, true).await?;
        node.map(|node| node.id)
            .ok_or_else(|| DomainError::InvalidReference {
                value: format!("{fields:?} matches more than one node"),
            })
    }

    /// Applies `fields` to an existing node. Returns false if it does not resolve.
    ///
    /// A parent change is refused with `CycleDetected` if it would make the
    /// node its own ancestor.
    #[instrument(skip(self, node, fields))]
    pub async fn update_node(
        &self,
        kind: TreeKind,
        node: impl Into<NodeRef>,
        fields: NodeFields,
    ) -> DomainResult<bool> {
        let node = node.into();
        let _guard = self.write_lock.lock().await;
        let result: DomainResult<bool> = async {
            let Some(node) = self.resolve(kind, node, false).await? else {
                return Ok(false);
            };
            if let Some(Some(parent_id)) = fields.parent_id {
                self.ensure_acyclic(kind, node.id, parent_id).await?;
            }
            self.nodes.update(kind, node.id, &fields).await?;
            Ok(true)
        }
        .await;
        self.after_structure_change(kind);
        result
    }

    /// Moves `child` under `parent`, or to the root when `parent` is `None`
    /// or does not resolve. Returns false if the child does not resolve.
    #[instrument(skip(self, child, parent))]
    pub async fn set_parent(
        &self,
        kind: TreeKind,
        child: impl Into<NodeRef>,
        parent: Option<NodeRef>,
    ) -> DomainResult<bool> {
        let child = child.into();
        let _guard = self.write_lock.lock().await;
        let result: DomainResult<bool> = async {
            let Some(child) = self.resolve(kind, child, false).await? else {
                return Ok(false);
            };
            let parent_id = match parent {
                Some(parent) => self.resolve(kind, parent, false).await?.map(|p| p.id),
                None => None,
            };
            if let Some(parent_id) = parent_id {
                self.ensure_acyclic(kind, child.id, parent_id).await?;
            }
            self.nodes.set_parent(kind, child.id, parent_id).await?;
            Ok(true)
        }
        .await;
        self.after_structure_change(kind);
        result
    }

    async fn set_access_locked(
        &self,
        subject: NodeRef,
        resource: NodeRef,
        grant: Grant,
    ) -> DomainResult<bool> {
        let subject = self.resolve(TreeKind::Subject, subject, true).await?;
        let resource = self.resolve(TreeKind::Resource, resource, true).await?;
        let (Some(subject), Some(resource)) = (subject, resource) else {
            warn!("set_access: subject or resource could not be resolved");
            return Ok(false);
        };

        match grant {
            Grant::Allow => self.write_access(&subject, &resource, Access::Allow).await?,
            Grant::Deny => self.write_access(&subject, &resource, Access::Deny).await?,
            Grant::Action(name) if name.is_empty() => {
                warn!("set_access: empty action name");
                return Ok(false);
            }
            Grant::Action(name) => {
                let Some(action_node) = self.find_action_node(resource.id, &name, true).await?
                else {
                    return Ok(false);
                };
                // The base row must allow, otherwise the action never applies
                self.write_access(&subject, &resource, Access::Allow).await?;
                self.write_access(&subject, &action_node, Access::Allow).await?;
            }
        }
        Ok(true)
    }

    async fn write_access(
        &self,
        subject: &TreeNode,
        resource: &TreeNode,
        access: Access,
    ) -> DomainResult<()> {
        if access == Access::Deny {
            self.clear_action_entries(subject.id, resource.id).await?;
        }
        self.permissions
            .upsert(subject.id, resource.id, access)
            .await?;
        info!(
            subject_id = %subject.id,
            resource_id = %resource.id,
            access = ?access,
            "permission written"
        );
        Ok(())
    }

    /// Removes the subject's rows on every action node below `resource_id`.
    async fn clear_action_entries(&self, subject_id: NodeId, resource_id: NodeId) -> DomainResult<()> {
        for action_id in self.action_subtree(resource_id).await? {
            self.permissions.delete(subject_id, action_id).await?;
        }
        Ok(())
    }

    /// Deletes every action node below a resource and their rows.
    async fn delete_action_subtree(&self, resource_id: NodeId) -> DomainResult<usize> {
        let mut removed = 0;
        for action_id in self.action_subtree(resource_id).await? {
            self.nodes.delete(TreeKind::Resource, action_id).await?;
            removed += self
                .permissions
                .delete_all_for(TreeKind::Resource, action_id)
                .await?;
        }
        Ok(removed)
    }

    /// Ids of the action nodes under a resource, including actions nested
    /// under actions.
    async fn action_subtree(&self, resource_id: NodeId) -> DomainResult<Vec<NodeId>> {
        let mut found = Vec::new();
        let mut seen = HashSet::from([resource_id]);
        let mut pending = vec![resource_id];
        while let Some(id) = pending.pop() {
            for action in self.actions_under(id).await? {
                if seen.insert(action.id) {
                    found.push(action.id);
                    pending.push(action.id);
                }
            }
        }
        Ok(found)
    }

    fn after_permission_change(&self) {
        self.bump_generation();
        if let Some(cache) = &self.config.cache {
            cache.invalidate_all();
        }
    }

    fn after_structure_change(&self, kind: TreeKind) {
        self.bump_generation();
        self.node_cache.clear_kind(kind);
        if let Some(cache) = &self.config.cache {
            cache.invalidate_all();
        }
    }
}

//! Access checks: the nested ancestor walk.

use tracing::{debug, instrument};
use treeacl_storage::{NodeId, NodeStore, PermissionStore, TreeKind};

use crate::cache::CacheKey;
use crate::error::DomainResult;
use crate::model::{NodeRef, PairAccess};

use super::AclEngine;

impl<N, P> AclEngine<N, P>
where
    N: NodeStore,
    P: PermissionStore,
{
    /// Decides whether `subject` may access `resource`, or perform `action`
    /// on it when one is given.
    ///
    /// The walk visits `(subject, resource)`, then every resource ancestor
    /// for the same subject, before moving to the subject's parent. The
    /// first pair with a defined result wins. Unknown subjects or resources
    /// and a walk that finds nothing all yield `false`.
    ///
    /// # Caching
    ///
    /// Decisions are cached per `(subject id, resource id, action)` when a
    /// cache is configured. A decision is not cached if a mutation finished
    /// while it was being computed.
    #[instrument(skip(self, subject, resource))]
    pub async fn check(
        &self,
        subject: impl Into<NodeRef>,
        resource: impl Into<NodeRef>,
        action: Option<&str>,
    ) -> DomainResult<bool> {
        let action = action.filter(|name| !name.is_empty());

        let subject = self.resolve(TreeKind::Subject, subject, false).await?;
        let resource = self.resolve(TreeKind::Resource, resource, false).await?;
        let (Some(subject), Some(resource)) = (subject, resource) else {
            debug!("subject or resource not found, denying");
            return Ok(false);
        };

        let key = CacheKey::new(subject.id, resource.id, action);
        if let Some(cache) = &self.config.cache {
            if let Some(allowed) = cache.get(&key).await {
                debug!(subject_id = %subject.id, resource_id = %resource.id, allowed, "check cache hit");
                return Ok(allowed);
            }
        }

        let generation = self.generation();
        let allowed = self.walk(subject.id, resource.id, action).await?;

        if let Some(cache) = &self.config.cache {
            if self.generation() == generation {
                cache.insert(key.clone(), allowed).await;
                // A mutation may have cleared the cache while we inserted
                if self.generation() != generation {
                    cache.invalidate(&key).await;
                }
            } else {
                debug!(subject_id = %subject.id, resource_id = %resource.id, "permissions changed during walk, not caching");
            }
        }

        debug!(subject_id = %subject.id, resource_id = %resource.id, allowed, "check resolved");
        Ok(allowed)
    }

    async fn walk(
        &self,
        subject_id: NodeId,
        resource_id: NodeId,
        action: Option<&str>,
    ) -> DomainResult<bool> {
        let subjects = self.ancestors(TreeKind::Subject, subject_id).await?;
        let resources = self.ancestors(TreeKind::Resource, resource_id).await?;

        for current_subject in &subjects {
            for current_resource in &resources {
                let access = self
                    .pair_access(*current_subject, *current_resource, action)
                    .await?;
                if access.is_defined() {
                    debug!(
                        subject_id = %current_subject,
                        resource_id = %current_resource,
                        ?access,
                        "first defined permission"
                    );
                    return Ok(access.is_allowed());
                }
            }
        }

        Ok(false)
    }

    /// Access defined for exactly this pair, without inheritance.
    ///
    /// With an action, the action node must exist under `resource_id`;
    /// a missing action node is a deny. An explicit deny on the resource
    /// blocks the action. An allow or an undefined base defers to the row
    /// stored for the action node.
    pub async fn pair_access(
        &self,
        subject_id: NodeId,
        resource_id: NodeId,
        action: Option<&str>,
    ) -> DomainResult<PairAccess> {
        let action_node = match action {
            Some(name) => match self.find_action_node(resource_id, name, false).await? {
                Some(node) => Some(node),
                None => return Ok(PairAccess::Deny),
            },
            None => None,
        };

        let base = self.stored_access(subject_id, resource_id).await?;

        match action_node {
            None => Ok(base),
            Some(_) if base == PairAccess::Deny => Ok(PairAccess::Deny),
            Some(node) => self.stored_access(subject_id, node.id).await,
        }
    }

    async fn stored_access(&self, subject_id: NodeId, resource_id: NodeId) -> DomainResult<PairAccess> {
        let row = self.permissions.find(subject_id, resource_id).await?;
        Ok(PairAccess::from(row.map(|row| row.access)))
    }
}

//! Identity resolution: loose references to canonical node records.

use dashmap::DashMap;
use tracing::{debug, info, instrument, warn};
use treeacl_storage::{NodeFields, NodeId, NodeMatch, NodeStore, PermissionStore, TreeKind, TreeNode};

use crate::error::DomainResult;
use crate::model::NodeRef;

use super::singleflight::{SingleflightGuard, SingleflightSlot};
use super::AclEngine;

/// Process-local node caches.
///
/// - `verified`: nodes confirmed to exist, keyed by id
/// - `resolved`: keyed by the normalized lookup fields (the fingerprint)
/// - `last`: the most recent top-level resolution per kind
///
/// Misses are never cached, and neither is a record read while a mutation
/// was finishing.
#[derive(Debug, Default)]
pub(crate) struct NodeCache {
    verified: DashMap<(TreeKind, NodeId), TreeNode>,
    resolved: DashMap<(TreeKind, NodeFields), TreeNode>,
    last: DashMap<TreeKind, Option<TreeNode>>,
}

impl NodeCache {
    fn lookup(&self, kind: TreeKind, fields: &NodeFields) -> Option<TreeNode> {
        if let Some(node) = self.resolved.get(&(kind, fields.clone())) {
            return Some(node.clone());
        }
        if fields.is_id_only() {
            if let Some(id) = fields.id {
                return self.verified.get(&(kind, id)).map(|node| node.clone());
            }
        }
        None
    }

    fn remember(&self, kind: TreeKind, fields: &NodeFields, node: &TreeNode) {
        self.verified.insert((kind, node.id), node.clone());
        self.resolved.insert((kind, fields.clone()), node.clone());
    }

    fn forget(&self, kind: TreeKind, fields: &NodeFields, id: NodeId) {
        self.verified.remove(&(kind, id));
        self.resolved.remove(&(kind, fields.clone()));
    }

    fn set_last(&self, kind: TreeKind, node: Option<TreeNode>) {
        self.last.insert(kind, node);
    }

    fn last(&self, kind: TreeKind) -> Option<TreeNode> {
        self.last.get(&kind).and_then(|node| node.clone())
    }

    /// Drops the fingerprint entries of a kind, keeping verified ids.
    fn forget_lookups(&self, kind: TreeKind) {
        self.resolved.retain(|(k, _), _| *k != kind);
    }

    /// Drops every cached record of a kind. Used after structural changes,
    /// since a re-parent or delete can stale records other than the target.
    pub(crate) fn clear_kind(&self, kind: TreeKind) {
        self.verified.retain(|(k, _), _| *k != kind);
        self.resolved.retain(|(k, _), _| *k != kind);
        self.last.remove(&kind);
    }
}

impl<N, P> AclEngine<N, P>
where
    N: NodeStore,
    P: PermissionStore,
{
    /// Resolves a reference to a node of the given kind.
    ///
    /// Lookup order: fingerprint cache, verified-by-id cache (for bare ids),
    /// then the store, which must report exactly one match. Zero or several
    /// matches resolve to `None`, as does an empty field set. With `create`
    /// set and no `id` in the reference, a missing node is inserted from the
    /// reference's fields.
    ///
    /// Updates the last-resolved pointer for `kind`, to `None` on a miss.
    #[instrument(skip(self, reference))]
    pub async fn resolve(
        &self,
        kind: TreeKind,
        reference: impl Into<NodeRef>,
        create: bool,
    ) -> DomainResult<Option<TreeNode>> {
        let fields = reference.into().normalize();
        let node = self.resolve_fields(kind, &fields, create).await?;
        self.node_cache.set_last(kind, node.clone());
        Ok(node)
    }

    /// Resolves a subject reference without creating it.
    pub async fn subject(&self, reference: impl Into<NodeRef>) -> DomainResult<Option<TreeNode>> {
        self.resolve(TreeKind::Subject, reference, false).await
    }

    /// Resolves a resource reference without creating it.
    pub async fn resource(&self, reference: impl Into<NodeRef>) -> DomainResult<Option<TreeNode>> {
        self.resolve(TreeKind::Resource, reference, false).await
    }

    /// Resolves a reference to its id.
    pub async fn resolve_id(
        &self,
        kind: TreeKind,
        reference: impl Into<NodeRef>,
        create: bool,
    ) -> DomainResult<Option<NodeId>> {
        Ok(self.resolve(kind, reference, create).await?.map(|node| node.id))
    }

    /// The node returned by the most recent `resolve` of this kind.
    pub fn last_resolved(&self, kind: TreeKind) -> Option<TreeNode> {
        self.node_cache.last(kind)
    }

    /// Resolution without touching the last-resolved pointer; used by
    /// internal traversals.
    pub(crate) async fn resolve_fields(
        &self,
        kind: TreeKind,
        fields: &NodeFields,
        create: bool,
    ) -> DomainResult<Option<TreeNode>> {
        if fields.is_empty() {
            debug!(kind = %kind, "empty reference resolves to nothing");
            return Ok(None);
        }

        if let Some(node) = self.node_cache.lookup(kind, fields) {
            debug!(kind = %kind, node_id = %node.id, "node cache hit");
            return Ok(Some(node));
        }

        let key = (kind, fields.clone(), create);
        match self.resolving.acquire(key.clone()) {
            SingleflightSlot::Leader(tx) => {
                let _guard = SingleflightGuard::new(&self.resolving, key);
                let result = self.resolve_uncached(kind, fields, create).await;
                if let Ok(ref node) = result {
                    // No receivers is fine
                    let _ = tx.send(node.clone());
                }
                result
            }
            SingleflightSlot::Follower(mut rx) => match rx.recv().await {
                Ok(node) => Ok(node),
                // Leader failed or finished before we subscribed
                Err(_) => self.resolve_uncached(kind, fields, create).await,
            },
        }
    }

    async fn resolve_uncached(
        &self,
        kind: TreeKind,
        fields: &NodeFields,
        create: bool,
    ) -> DomainResult<Option<TreeNode>> {
        let generation = self.generation();
        let found = match self.nodes.find_one(kind, fields).await? {
            NodeMatch::One(node) => Some(node),
            NodeMatch::None if create && fields.id.is_none() => {
                let id = self.nodes.insert(kind, fields).await?;
                info!(kind = %kind, node_id = %id, "created node");
                // A new node can make a cached lookup ambiguous
                self.node_cache.forget_lookups(kind);
                self.find_unique(kind, &NodeFields::id(id)).await?
            }
            NodeMatch::None => None,
            NodeMatch::Many(count) => {
                warn!(kind = %kind, count, ?fields, "ambiguous node reference treated as not found");
                None
            }
        };

        if let Some(ref node) = found {
            if self.generation() == generation {
                self.node_cache.remember(kind, fields, node);
                // Lost a race with a mutation clearing the cache
                if self.generation() != generation {
                    self.node_cache.forget(kind, fields, node.id);
                }
            }
        }
        Ok(found)
    }

    /// Store lookup requiring exactly one match.
    pub(crate) async fn find_unique(
        &self,
        kind: TreeKind,
        fields: &NodeFields,
    ) -> DomainResult<Option<TreeNode>> {
        match self.nodes.find_one(kind, fields).await? {
            NodeMatch::One(node) => Ok(Some(node)),
            NodeMatch::None => Ok(None),
            NodeMatch::Many(count) => {
                warn!(kind = %kind, count, ?fields, "ambiguous node reference treated as not found");
                Ok(None)
            }
        }
    }
}

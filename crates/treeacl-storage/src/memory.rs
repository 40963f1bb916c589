//! In-memory storage implementation.
//!
//! Nodes are kept per tree kind in a `BTreeMap` so that `find_many` returns
//! them in id order without sorting. Permission rows are keyed by the
//! (subject, resource) pair, which makes the at-most-one-row-per-pair rule
//! structural.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, instrument};

use crate::error::{StorageError, StorageResult};
use crate::traits::{
    validate_fields, Access, NodeFields, NodeId, NodeMatch, NodeStore, PermissionEntry,
    PermissionFilter, PermissionStore, TreeKind, TreeNode,
};

#[derive(Debug, Default)]
struct NodeTable {
    /// Last assigned id; ids start at 1.
    last_id: u64,
    nodes: BTreeMap<NodeId, TreeNode>,
}

/// In-memory implementation of NodeStore and PermissionStore.
///
/// # Performance Characteristics
///
/// - **Insert / update / delete node**: O(log N)
/// - **Find nodes**: O(N) linear scan of the kind's table (O(log N) when `id` is given)
/// - **Permission find / upsert / delete**: O(1) average
/// - **Permission delete_all_for / list**: O(P) over all rows
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: DashMap<TreeKind, NodeTable>,
    permissions: DashMap<(NodeId, NodeId), Access>,
}

impl MemoryStore {
    /// Creates a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns the number of nodes of a kind.
    pub fn node_count(&self, kind: TreeKind) -> usize {
        self.tables.get(&kind).map(|t| t.nodes.len()).unwrap_or(0)
    }

    /// Returns the number of permission rows.
    pub fn permission_count(&self) -> usize {
        self.permissions.len()
    }

    fn matching(&self, kind: TreeKind, fields: &NodeFields) -> Vec<TreeNode> {
        let Some(table) = self.tables.get(&kind) else {
            return Vec::new();
        };

        // Direct lookup when the id is part of the predicate
        if let Some(id) = fields.id {
            return table
                .nodes
                .get(&id)
                .filter(|node| fields.matches(node))
                .cloned()
                .into_iter()
                .collect();
        }

        table
            .nodes
            .values()
            .filter(|node| fields.matches(node))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn find_one(&self, kind: TreeKind, fields: &NodeFields) -> StorageResult<NodeMatch> {
        let mut found = self.matching(kind, fields);
        Ok(match found.len() {
            0 => NodeMatch::None,
            1 => NodeMatch::One(found.remove(0)),
            n => NodeMatch::Many(n),
        })
    }

    async fn find_many(&self, kind: TreeKind, fields: &NodeFields) -> StorageResult<Vec<TreeNode>> {
        Ok(self.matching(kind, fields))
    }

    #[instrument(skip(self, fields))]
    async fn insert(&self, kind: TreeKind, fields: &NodeFields) -> StorageResult<NodeId> {
        validate_fields(fields)?;

        let mut table = self.tables.entry(kind).or_default();

        let parent_id = fields.parent_id.flatten();
        if let Some(parent_id) = parent_id {
            if !table.nodes.contains_key(&parent_id) {
                return Err(StorageError::ParentNotFound { kind, parent_id });
            }
        }

        table.last_id += 1;
        let id = NodeId(table.last_id);
        table.nodes.insert(
            id,
            TreeNode {
                id,
                parent_id,
                title: fields.title.clone(),
                model: fields.model.clone(),
                foreign_key: fields.foreign_key.clone(),
                description: fields.description.clone(),
            },
        );

        debug!(node_id = %id, "inserted node");
        Ok(id)
    }

    async fn update(&self, kind: TreeKind, id: NodeId, fields: &NodeFields) -> StorageResult<()> {
        validate_fields(fields)?;

        let mut table = self
            .tables
            .get_mut(&kind)
            .ok_or(StorageError::NodeNotFound { kind, id })?;

        if let Some(Some(parent_id)) = fields.parent_id {
            if !table.nodes.contains_key(&parent_id) {
                return Err(StorageError::ParentNotFound { kind, parent_id });
            }
        }

        let node = table
            .nodes
            .get_mut(&id)
            .ok_or(StorageError::NodeNotFound { kind, id })?;

        if let Some(parent_id) = fields.parent_id {
            node.parent_id = parent_id;
        }
        if let Some(ref title) = fields.title {
            node.title = Some(title.clone());
        }
        if let Some(ref model) = fields.model {
            node.model = Some(model.clone());
        }
        if let Some(ref foreign_key) = fields.foreign_key {
            node.foreign_key = Some(foreign_key.clone());
        }
        if let Some(ref description) = fields.description {
            node.description = Some(description.clone());
        }

        Ok(())
    }

    async fn delete(&self, kind: TreeKind, id: NodeId) -> StorageResult<bool> {
        Ok(self
            .tables
            .get_mut(&kind)
            .map(|mut table| table.nodes.remove(&id).is_some())
            .unwrap_or(false))
    }

    async fn reparent_children(
        &self,
        kind: TreeKind,
        from: NodeId,
        to: Option<NodeId>,
    ) -> StorageResult<usize> {
        let Some(mut table) = self.tables.get_mut(&kind) else {
            return Ok(0);
        };

        if let Some(parent_id) = to {
            if !table.nodes.contains_key(&parent_id) {
                return Err(StorageError::ParentNotFound { kind, parent_id });
            }
        }

        // Single pass under one lock so no child is observed half-moved
        let mut moved = 0;
        for node in table.nodes.values_mut() {
            if node.parent_id == Some(from) {
                node.parent_id = to;
                moved += 1;
            }
        }
        Ok(moved)
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn find(
        &self,
        subject_id: NodeId,
        resource_id: NodeId,
    ) -> StorageResult<Option<PermissionEntry>> {
        Ok(self
            .permissions
            .get(&(subject_id, resource_id))
            .map(|access| PermissionEntry {
                subject_id,
                resource_id,
                access: *access,
            }))
    }

    async fn upsert(
        &self,
        subject_id: NodeId,
        resource_id: NodeId,
        access: Access,
    ) -> StorageResult<()> {
        self.permissions.insert((subject_id, resource_id), access);
        Ok(())
    }

    async fn delete(&self, subject_id: NodeId, resource_id: NodeId) -> StorageResult<bool> {
        Ok(self.permissions.remove(&(subject_id, resource_id)).is_some())
    }

    async fn delete_all_for(&self, kind: TreeKind, node_id: NodeId) -> StorageResult<usize> {
        let before = self.permissions.len();
        self.permissions
            .retain(|(subject_id, resource_id), _| match kind {
                TreeKind::Subject => *subject_id != node_id,
                TreeKind::Resource => *resource_id != node_id,
            });
        Ok(before.saturating_sub(self.permissions.len()))
    }

    async fn list(&self, filter: &PermissionFilter) -> StorageResult<Vec<PermissionEntry>> {
        let mut rows: Vec<PermissionEntry> = self
            .permissions
            .iter()
            .filter(|row| {
                let (subject_id, resource_id) = *row.key();
                filter.subject_id.map_or(true, |s| s == subject_id)
                    && filter.resource_id.map_or(true, |r| r == resource_id)
            })
            .map(|row| PermissionEntry {
                subject_id: row.key().0,
                resource_id: row.key().1,
                access: *row.value(),
            })
            .collect();
        rows.sort_by_key(|row| (row.subject_id, row.resource_id));
        Ok(rows)
    }
}

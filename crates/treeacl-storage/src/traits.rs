//! NodeStore and PermissionStore trait definitions.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Maximum length of a node title.
pub const MAX_TITLE_LENGTH: usize = 40;
/// Maximum length of a node model name.
pub const MAX_MODEL_LENGTH: usize = 40;
/// Maximum length of a node description.
pub const MAX_DESCRIPTION_LENGTH: usize = 255;

/// The two tree populations an ACL is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeKind {
    /// Who is asking (users, roles, groups).
    Subject,
    /// What is being accessed, including action nodes.
    Resource,
}

impl TreeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreeKind::Subject => "subject",
            TreeKind::Resource => "resource",
        }
    }
}

impl fmt::Display for TreeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store-assigned node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        NodeId(value)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(NodeId)
    }
}

/// A stored tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub title: Option<String>,
    /// Together with `foreign_key`, names the external object this node stands for.
    pub model: Option<String>,
    pub foreign_key: Option<String>,
    pub description: Option<String>,
}

impl TreeNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Partial node record.
///
/// Used as an exact-match predicate for lookups (only the populated fields
/// are compared), as the payload for inserts and as the change set for
/// updates.
///
/// `parent_id` is doubly optional: `None` leaves the field out,
/// `Some(None)` means "no parent" (matches roots, or detaches on update).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeFields {
    pub id: Option<NodeId>,
    pub parent_id: Option<Option<NodeId>>,
    pub title: Option<String>,
    pub model: Option<String>,
    pub foreign_key: Option<String>,
    pub description: Option<String>,
}

impl NodeFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(id: NodeId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Fields naming the proxy node for an external object.
    pub fn model(model: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            foreign_key: Some(foreign_key.into()),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: impl Into<String>) -> Self {
        self.foreign_key = Some(foreign_key.into());
        self
    }

    pub fn with_parent(mut self, parent_id: Option<NodeId>) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns true if no field is populated.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Returns true if the only populated field is `id`.
    pub fn is_id_only(&self) -> bool {
        self.id.is_some()
            && Self {
                id: None,
                ..self.clone()
            }
            .is_empty()
    }

    /// Returns true if every populated field equals the node's value.
    pub fn matches(&self, node: &TreeNode) -> bool {
        self.id.map_or(true, |id| node.id == id)
            && self.parent_id.map_or(true, |p| node.parent_id == p)
            && self
                .title
                .as_ref()
                .map_or(true, |t| node.title.as_ref() == Some(t))
            && self
                .model
                .as_ref()
                .map_or(true, |m| node.model.as_ref() == Some(m))
            && self
                .foreign_key
                .as_ref()
                .map_or(true, |fk| node.foreign_key.as_ref() == Some(fk))
            && self
                .description
                .as_ref()
                .map_or(true, |d| node.description.as_ref() == Some(d))
    }
}

/// Outcome of a single-node lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeMatch {
    None,
    One(TreeNode),
    /// The predicate matched more than one node.
    Many(usize),
}

impl NodeMatch {
    /// Collapses the match to the unique node, if any.
    pub fn into_unique(self) -> Option<TreeNode> {
        match self {
            NodeMatch::One(node) => Some(node),
            NodeMatch::None | NodeMatch::Many(_) => None,
        }
    }
}

/// Stored access value for a (subject, resource) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Deny,
    Allow,
}

impl Access {
    pub fn is_allow(&self) -> bool {
        matches!(self, Access::Allow)
    }
}

impl From<bool> for Access {
    fn from(allowed: bool) -> Self {
        if allowed {
            Access::Allow
        } else {
            Access::Deny
        }
    }
}

/// A stored permission row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEntry {
    pub subject_id: NodeId,
    pub resource_id: NodeId,
    pub access: Access,
}

/// Filter for listing permission rows.
#[derive(Debug, Clone, Default)]
pub struct PermissionFilter {
    pub subject_id: Option<NodeId>,
    pub resource_id: Option<NodeId>,
}

/// Storage for the subject and resource trees.
///
/// Implementations must be thread-safe (Send + Sync) and support
/// async operations.
#[async_trait]
pub trait NodeStore: Send + Sync + 'static {
    /// Finds the node matching every populated field.
    async fn find_one(&self, kind: TreeKind, fields: &NodeFields) -> StorageResult<NodeMatch>;

    /// Finds all nodes matching every populated field, ordered by id.
    async fn find_many(&self, kind: TreeKind, fields: &NodeFields) -> StorageResult<Vec<TreeNode>>;

    /// Inserts a node built from the populated fields. `id` is ignored.
    async fn insert(&self, kind: TreeKind, fields: &NodeFields) -> StorageResult<NodeId>;

    /// Applies the populated fields to an existing node. `id` is ignored.
    async fn update(&self, kind: TreeKind, id: NodeId, fields: &NodeFields) -> StorageResult<()>;

    /// Deletes a node. Returns false if it did not exist.
    async fn delete(&self, kind: TreeKind, id: NodeId) -> StorageResult<bool>;

    /// Sets or clears a node's parent.
    async fn set_parent(
        &self,
        kind: TreeKind,
        id: NodeId,
        parent_id: Option<NodeId>,
    ) -> StorageResult<()> {
        let fields = NodeFields::new().with_parent(parent_id);
        self.update(kind, id, &fields).await
    }

    /// Moves every direct child of `from` under `to`. Returns the number moved.
    async fn reparent_children(
        &self,
        kind: TreeKind,
        from: NodeId,
        to: Option<NodeId>,
    ) -> StorageResult<usize> {
        let children = self
            .find_many(kind, &NodeFields::new().with_parent(Some(from)))
            .await?;
        for child in &children {
            self.set_parent(kind, child.id, to).await?;
        }
        Ok(children.len())
    }
}

/// Storage for permission rows, at most one per (subject, resource) pair.
#[async_trait]
pub trait PermissionStore: Send + Sync + 'static {
    /// Finds the row for a pair.
    async fn find(
        &self,
        subject_id: NodeId,
        resource_id: NodeId,
    ) -> StorageResult<Option<PermissionEntry>>;

    /// Inserts the row for a pair, or updates its access value.
    async fn upsert(&self, subject_id: NodeId, resource_id: NodeId, access: Access)
        -> StorageResult<()>;

    /// Deletes the row for a pair. Returns false if there was none.
    async fn delete(&self, subject_id: NodeId, resource_id: NodeId) -> StorageResult<bool>;

    /// Deletes every row referencing the node on the side matching `kind`.
    async fn delete_all_for(&self, kind: TreeKind, node_id: NodeId) -> StorageResult<usize>;

    /// Lists rows matching the filter.
    async fn list(&self, filter: &PermissionFilter) -> StorageResult<Vec<PermissionEntry>>;
}

/// Validates field lengths before a write.
pub fn validate_fields(fields: &NodeFields) -> StorageResult<()> {
    fn check(name: &str, value: &Option<String>, max: usize) -> StorageResult<()> {
        if let Some(value) = value {
            if value.chars().count() > max {
                return Err(StorageError::InvalidInput {
                    message: format!("{name} exceeds {max} characters"),
                });
            }
        }
        Ok(())
    }

    check("title", &fields.title, MAX_TITLE_LENGTH)?;
    check("model", &fields.model, MAX_MODEL_LENGTH)?;
    check("description", &fields.description, MAX_DESCRIPTION_LENGTH)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u64, parent: Option<u64>, title: &str) -> TreeNode {
        TreeNode {
            id: NodeId(id),
            parent_id: parent.map(NodeId),
            title: Some(title.to_string()),
            model: None,
            foreign_key: None,
            description: None,
        }
    }

    #[test]
    fn test_empty_fields_match_everything() {
        assert!(NodeFields::new().matches(&node(1, None, "a")));
        assert!(NodeFields::new().matches(&node(2, Some(1), "b")));
    }

    #[test]
    fn test_root_filter_only_matches_roots() {
        let roots = NodeFields::new().with_parent(None);
        assert!(roots.matches(&node(1, None, "a")));
        assert!(!roots.matches(&node(2, Some(1), "b")));
    }

    #[test]
    fn test_title_filter_requires_title() {
        let fields = NodeFields::title("admins");
        assert!(fields.matches(&node(1, None, "admins")));
        assert!(!fields.matches(&node(1, None, "users")));

        let mut untitled = node(3, None, "x");
        untitled.title = None;
        assert!(!fields.matches(&untitled));
    }

    #[test]
    fn test_is_id_only() {
        assert!(NodeFields::id(NodeId(4)).is_id_only());
        assert!(!NodeFields::id(NodeId(4)).with_title("x").is_id_only());
        assert!(!NodeFields::title("x").is_id_only());
    }

    #[test]
    fn test_validate_fields_rejects_long_title() {
        let fields = NodeFields::title("t".repeat(MAX_TITLE_LENGTH + 1));
        assert!(matches!(
            validate_fields(&fields),
            Err(StorageError::InvalidInput { .. })
        ));
        assert!(validate_fields(&NodeFields::title("t".repeat(MAX_TITLE_LENGTH))).is_ok());
    }

    #[test]
    fn test_tree_kind_serializes_lowercase() {
        let json = serde_json::to_string(&TreeKind::Resource).unwrap();
        assert_eq!(json, "\"resource\"");
        assert_eq!(TreeKind::Subject.to_string(), "subject");
    }

    #[test]
    fn test_node_id_parses_from_digits() {
        assert_eq!("42".parse::<NodeId>().unwrap(), NodeId(42));
        assert!("abc".parse::<NodeId>().is_err());
    }
}

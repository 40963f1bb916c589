//! Node references and access values.

use std::fmt;

use serde::Serialize;
use treeacl_storage::{Access, NodeFields, NodeId, TreeNode};

/// A loose reference to a tree node.
///
/// Every variant normalizes to a [`NodeFields`] predicate. A field set that
/// matches more than one node does not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRef {
    ById(NodeId),
    ByTitle(String),
    ByFields(NodeFields),
}

impl NodeRef {
    /// Parses a string reference: all digits is an id, anything else a title.
    pub fn parse(value: &str) -> Self {
        if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = value.parse::<NodeId>() {
                return NodeRef::ById(id);
            }
        }
        NodeRef::ByTitle(value.to_string())
    }

    /// Reference to the proxy node of an external object.
    pub fn model(model: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        NodeRef::ByFields(NodeFields::model(model, foreign_key))
    }

    /// The exact-match predicate this reference stands for.
    pub fn normalize(&self) -> NodeFields {
        match self {
            NodeRef::ById(id) => NodeFields::id(*id),
            NodeRef::ByTitle(title) => NodeFields::title(title.clone()),
            NodeRef::ByFields(fields) => fields.clone(),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::ById(id) => write!(f, "#{id}"),
            NodeRef::ByTitle(title) => write!(f, "{title:?}"),
            NodeRef::ByFields(fields) => write!(f, "{fields:?}"),
        }
    }
}

impl From<NodeId> for NodeRef {
    fn from(id: NodeId) -> Self {
        NodeRef::ById(id)
    }
}

impl From<u64> for NodeRef {
    fn from(id: u64) -> Self {
        NodeRef::ById(NodeId(id))
    }
}

impl From<&str> for NodeRef {
    fn from(value: &str) -> Self {
        NodeRef::parse(value)
    }
}

impl From<String> for NodeRef {
    fn from(value: String) -> Self {
        NodeRef::parse(&value)
    }
}

impl From<NodeFields> for NodeRef {
    fn from(fields: NodeFields) -> Self {
        NodeRef::ByFields(fields)
    }
}

impl From<&TreeNode> for NodeRef {
    fn from(node: &TreeNode) -> Self {
        NodeRef::ById(node.id)
    }
}

impl From<&NodeRef> for NodeRef {
    fn from(node_ref: &NodeRef) -> Self {
        node_ref.clone()
    }
}

/// Value written by `set_access`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    Allow,
    Deny,
    /// Allow the base resource and the named action under it.
    Action(String),
}

impl From<bool> for Grant {
    fn from(allowed: bool) -> Self {
        if allowed {
            Grant::Allow
        } else {
            Grant::Deny
        }
    }
}

impl From<Access> for Grant {
    fn from(access: Access) -> Self {
        Grant::from(access.is_allow())
    }
}

impl From<&str> for Grant {
    fn from(action: &str) -> Self {
        Grant::Action(action.to_string())
    }
}

/// Result of checking a single (subject, resource) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PairAccess {
    Allow,
    Deny,
    /// No row for the pair; the ancestor walk continues.
    Undefined,
}

impl PairAccess {
    pub fn is_defined(&self) -> bool {
        !matches!(self, PairAccess::Undefined)
    }

    /// Collapses to a decision, treating `Undefined` as denied.
    pub fn is_allowed(&self) -> bool {
        matches!(self, PairAccess::Allow)
    }
}

impl From<Option<Access>> for PairAccess {
    fn from(access: Option<Access>) -> Self {
        match access {
            Some(Access::Allow) => PairAccess::Allow,
            Some(Access::Deny) => PairAccess::Deny,
            None => PairAccess::Undefined,
        }
    }
}

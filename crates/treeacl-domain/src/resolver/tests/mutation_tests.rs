//! Permission and node mutation tests.

use std::sync::Arc;

use treeacl_storage::{
    Access, MemoryStore, NodeFields, NodeId, PermissionEntry, PermissionFilter, PermissionStore,
    TreeKind,
};

use super::mocks::{memory_engine, FailingPermissionStore, MemoryEngine};
use crate::error::DomainError;
use crate::model::{Grant, NodeRef, PairAccess};
use crate::resolver::AclEngine;

async fn rows_for(store: &MemoryStore, subject_id: NodeId) -> Vec<PermissionEntry> {
    store
        .list(&PermissionFilter {
            subject_id: Some(subject_id),
            resource_id: None,
        })
        .await
        .unwrap()
}

async fn id_of(engine: &MemoryEngine, kind: TreeKind, title: &str) -> NodeId {
    engine
        .resolve_id(kind, title, false)
        .await
        .unwrap()
        .unwrap()
}

// ========== Section 1: set_access ==========

#[tokio::test]
async fn test_allow_creates_missing_nodes() {
    let (store, engine) = memory_engine();
    assert!(engine.allow("alice", "docs").await.unwrap());

    assert_eq!(store.node_count(TreeKind::Subject), 1);
    assert_eq!(store.node_count(TreeKind::Resource), 1);
    assert_eq!(store.permission_count(), 1);
}

#[tokio::test]
async fn test_set_access_upserts_a_single_row() {
    let (store, engine) = memory_engine();
    engine.set_access("alice", "docs", true).await.unwrap();
    engine.set_access("alice", "docs", false).await.unwrap();
    engine.set_access("alice", "docs", Access::Allow).await.unwrap();

    let alice = id_of(&engine, TreeKind::Subject, "alice").await;
    let rows = rows_for(&store, alice).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].access, Access::Allow);
}

#[tokio::test]
async fn test_set_access_with_action_name_allows_base_and_action() {
    let (store, engine) = memory_engine();
    engine.set_access("alice", "docs", "edit").await.unwrap();

    let alice = id_of(&engine, TreeKind::Subject, "alice").await;
    let docs = id_of(&engine, TreeKind::Resource, "docs").await;
    let edit = engine
        .action_node_of(docs, "edit", false)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(edit.parent_id, Some(docs));
    assert!(engine.is_action_node(&edit));
    let rows = rows_for(&store, alice).await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.access == Access::Allow));
}

#[tokio::test]
async fn test_empty_action_name_is_refused() {
    let (store, engine) = memory_engine();
    let written = engine
        .set_access("alice", "docs", Grant::Action(String::new()))
        .await
        .unwrap();

    assert!(!written);
    assert_eq!(store.permission_count(), 0);
}

#[tokio::test]
async fn test_deny_cascades_to_action_entries() {
    let (store, engine) = memory_engine();
    engine.allow_action("alice", "docs", "edit").await.unwrap();
    engine.allow_action("alice", "docs", "view").await.unwrap();
    engine.allow_action("bob", "docs", "edit").await.unwrap();

    engine.deny("alice", "docs").await.unwrap();

    let alice = id_of(&engine, TreeKind::Subject, "alice").await;
    let bob = id_of(&engine, TreeKind::Subject, "bob").await;
    let rows = rows_for(&store, alice).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].access, Access::Deny);
    // Other subjects keep their action rows
    assert_eq!(rows_for(&store, bob).await.len(), 2);

    // Re-allowing the base does not bring the actions back
    engine.allow("alice", "docs").await.unwrap();
    assert!(!engine.check("alice", "docs", Some("edit")).await.unwrap());
}

#[tokio::test]
async fn test_base_deny_blocks_direct_action_row() {
    let (store, engine) = memory_engine();
    engine.deny("alice", "docs").await.unwrap();
    let alice = id_of(&engine, TreeKind::Subject, "alice").await;
    let edit = engine
        .action_node_of("docs", "edit", true)
        .await
        .unwrap()
        .unwrap();
    // Written straight to the store, bypassing the cascade
    store.upsert(alice, edit.id, Access::Allow).await.unwrap();

    assert!(!engine.check("alice", "docs", Some("edit")).await.unwrap());

    engine.allow("alice", "docs").await.unwrap();
    assert!(engine.check("alice", "docs", Some("edit")).await.unwrap());

    // With the base row gone the action row still answers
    let docs = edit.parent_id.unwrap();
    store.delete(alice, docs).await.unwrap();
    assert_eq!(
        engine.pair_access(alice, docs, None).await.unwrap(),
        PairAccess::Undefined
    );
    assert!(engine.check("alice", "docs", Some("edit")).await.unwrap());
}

#[tokio::test]
async fn test_deny_action_leaves_base_row_alone() {
    let (store, engine) = memory_engine();
    engine.allow("alice", "docs").await.unwrap();
    engine.deny_action("alice", "docs", "edit").await.unwrap();

    let alice = id_of(&engine, TreeKind::Subject, "alice").await;
    let rows = rows_for(&store, alice).await;
    assert_eq!(rows.len(), 2);
    assert!(engine.check("alice", "docs", None).await.unwrap());
    assert!(!engine.check("alice", "docs", Some("edit")).await.unwrap());
}

// ========== Section 2: unset_access ==========

#[tokio::test]
async fn test_unset_is_idempotent() {
    let (store, engine) = memory_engine();
    engine.allow("alice", "docs").await.unwrap();

    assert!(engine.unset_access("alice", "docs", None).await.unwrap());
    assert!(engine.unset_access("alice", "docs", None).await.unwrap());
    assert!(engine.unset_access("ghost", "nowhere", None).await.unwrap());
    assert!(engine
        .unset_access("alice", "docs", Some("missing"))
        .await
        .unwrap());

    assert_eq!(store.permission_count(), 0);
    assert!(!engine.check("alice", "docs", None).await.unwrap());
}

#[tokio::test]
async fn test_unset_without_action_clears_action_rows() {
    let (store, engine) = memory_engine();
    engine.allow_action("alice", "docs", "edit").await.unwrap();

    engine.unset_access("alice", "docs", None).await.unwrap();

    let alice = id_of(&engine, TreeKind::Subject, "alice").await;
    assert!(rows_for(&store, alice).await.is_empty());
    // The action node itself survives
    assert_eq!(engine.actions_of("docs").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unset_action_only_touches_the_action_row() {
    let (store, engine) = memory_engine();
    engine.allow_action("alice", "docs", "edit").await.unwrap();

    engine.unset_action("alice", "docs", "edit").await.unwrap();

    let alice = id_of(&engine, TreeKind::Subject, "alice").await;
    let docs = id_of(&engine, TreeKind::Resource, "docs").await;
    let rows = rows_for(&store, alice).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].resource_id, docs);
}

#[tokio::test]
async fn test_unset_does_not_create_nodes() {
    let (store, engine) = memory_engine();
    engine.unset_access("alice", "docs", Some("edit")).await.unwrap();
    assert_eq!(store.node_count(TreeKind::Subject), 0);
    assert_eq!(store.node_count(TreeKind::Resource), 0);
}

// ========== Section 3: delete_node ==========

#[tokio::test]
async fn test_delete_node_reparents_children_and_drops_rows() {
    let (store, engine) = memory_engine();
    let root = engine
        .create_node(TreeKind::Resource, NodeFields::title("root"))
        .await
        .unwrap();
    let docs = engine
        .create_node(TreeKind::Resource, NodeFields::title("docs").with_parent(Some(root)))
        .await
        .unwrap();
    let a = engine
        .create_node(TreeKind::Resource, NodeFields::title("a").with_parent(Some(docs)))
        .await
        .unwrap();
    let b = engine
        .create_node(TreeKind::Resource, NodeFields::title("b").with_parent(Some(docs)))
        .await
        .unwrap();
    engine.allow("alice", docs).await.unwrap();
    engine.allow("alice", a).await.unwrap();

    assert!(engine.delete_node(TreeKind::Resource, docs).await.unwrap());

    assert!(engine.resource(docs).await.unwrap().is_none());
    assert_eq!(engine.parent_of(TreeKind::Resource, a).await.unwrap(), Some(root));
    assert_eq!(engine.parent_of(TreeKind::Resource, b).await.unwrap(), Some(root));
    let alice = id_of(&engine, TreeKind::Subject, "alice").await;
    let rows = rows_for(&store, alice).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].resource_id, a);
}

#[tokio::test]
async fn test_delete_root_makes_children_roots() {
    let (_, engine) = memory_engine();
    let staff = engine
        .create_node(TreeKind::Subject, NodeFields::title("staff"))
        .await
        .unwrap();
    let alice = engine
        .create_node(TreeKind::Subject, NodeFields::title("alice").with_parent(Some(staff)))
        .await
        .unwrap();
    engine.allow(staff, "docs").await.unwrap();
    assert!(engine.check(alice, "docs", None).await.unwrap());

    engine.delete_node(TreeKind::Subject, "staff").await.unwrap();

    assert_eq!(engine.parent_of(TreeKind::Subject, alice).await.unwrap(), None);
    assert!(!engine.check(alice, "docs", None).await.unwrap());
}

#[tokio::test]
async fn test_delete_resource_removes_its_action_nodes() {
    let (store, engine) = memory_engine();
    engine.allow_action("alice", "docs", "edit").await.unwrap();
    engine.allow_action("alice", "docs", "view").await.unwrap();
    assert_eq!(store.node_count(TreeKind::Resource), 3);

    engine.delete_node(TreeKind::Resource, "docs").await.unwrap();

    assert_eq!(store.node_count(TreeKind::Resource), 0);
    assert_eq!(store.permission_count(), 0);
}

#[tokio::test]
async fn test_delete_unknown_node_succeeds() {
    let (_, engine) = memory_engine();
    assert!(engine
        .delete_node(TreeKind::Subject, "nobody")
        .await
        .unwrap());
}

// ========== Section 4: node maintenance ==========

#[tokio::test]
async fn test_create_node_returns_existing_match() {
    let (store, engine) = memory_engine();
    let first = engine
        .create_node(TreeKind::Subject, NodeFields::model("User", "1"))
        .await
        .unwrap();
    let again = engine
        .create_node(TreeKind::Subject, NodeFields::model("User", "1"))
        .await
        .unwrap();

    assert_eq!(first, again);
    assert_eq!(store.node_count(TreeKind::Subject), 1);
}

#[tokio::test]
async fn test_create_node_rejects_explicit_id() {
    let (_, engine) = memory_engine();
    let result = engine
        .create_node(TreeKind::Subject, NodeFields::id(NodeId(9)).with_title("x"))
        .await;
    assert!(matches!(result, Err(DomainError::InvalidReference { .. })));
}

#[tokio::test]
async fn test_create_node_rejects_empty_fields() {
    let (store, engine) = memory_engine();
    let result = engine.create_node(TreeKind::Resource, NodeFields::new()).await;
    assert!(matches!(result, Err(DomainError::InvalidReference { .. })));
    assert_eq!(store.node_count(TreeKind::Resource), 0);
}

#[tokio::test]
async fn test_empty_references_are_unresolved() {
    let (store, engine) = memory_engine();
    engine.allow("alice", "docs").await.unwrap();

    // Nothing to write against
    assert!(!engine
        .set_access(NodeFields::new(), "docs", Grant::Allow)
        .await
        .unwrap());
    // Already absent
    assert!(engine
        .unset_access("alice", NodeFields::new(), None)
        .await
        .unwrap());
    assert!(engine
        .delete_node(TreeKind::Subject, NodeFields::new())
        .await
        .unwrap());

    assert_eq!(store.node_count(TreeKind::Subject), 1);
    assert_eq!(store.permission_count(), 1);
}

#[tokio::test]
async fn test_create_node_reports_store_validation() {
    let (_, engine) = memory_engine();
    let result = engine
        .create_node(TreeKind::Subject, NodeFields::title("t".repeat(41)))
        .await;
    assert!(matches!(result, Err(DomainError::Storage(_))));
}

#[tokio::test]
async fn test_update_node_changes_fields() {
    let (_, engine) = memory_engine();
    let id = engine
        .create_node(TreeKind::Resource, NodeFields::title("docs"))
        .await
        .unwrap();

    assert!(engine
        .update_node(
            TreeKind::Resource,
            id,
            NodeFields::new()
                .with_title("documents")
                .with_description("shared files"),
        )
        .await
        .unwrap());

    assert!(engine.resource("docs").await.unwrap().is_none());
    let node = engine.resource("documents").await.unwrap().unwrap();
    assert_eq!(node.id, id);
    assert_eq!(node.description.as_deref(), Some("shared files"));
    assert!(!engine
        .update_node(TreeKind::Resource, "missing", NodeFields::title("x"))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_update_node_refuses_cycles() {
    let (_, engine) = memory_engine();
    let a = engine
        .create_node(TreeKind::Subject, NodeFields::title("a"))
        .await
        .unwrap();
    let b = engine
        .create_node(TreeKind::Subject, NodeFields::title("b").with_parent(Some(a)))
        .await
        .unwrap();

    let result = engine
        .update_node(TreeKind::Subject, a, NodeFields::new().with_parent(Some(b)))
        .await;
    assert!(matches!(result, Err(DomainError::CycleDetected { .. })));
    assert_eq!(engine.parent_of(TreeKind::Subject, a).await.unwrap(), None);
}

#[tokio::test]
async fn test_set_parent_moves_and_detaches() {
    let (_, engine) = memory_engine();
    let a = engine
        .create_node(TreeKind::Subject, NodeFields::title("a"))
        .await
        .unwrap();
    let b = engine
        .create_node(TreeKind::Subject, NodeFields::title("b"))
        .await
        .unwrap();

    assert!(engine
        .set_parent(TreeKind::Subject, b, Some(NodeRef::ById(a)))
        .await
        .unwrap());
    assert_eq!(engine.topmost_ancestor(TreeKind::Subject, b).await.unwrap(), Some(a));

    // An unresolvable parent detaches to root
    assert!(engine
        .set_parent(TreeKind::Subject, b, Some(NodeRef::from("nobody")))
        .await
        .unwrap());
    assert_eq!(engine.parent_of(TreeKind::Subject, b).await.unwrap(), None);

    assert!(!engine
        .set_parent(TreeKind::Subject, "nobody", None)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_set_parent_to_self_is_a_cycle() {
    let (_, engine) = memory_engine();
    let a = engine
        .create_node(TreeKind::Subject, NodeFields::title("a"))
        .await
        .unwrap();

    let result = engine
        .set_parent(TreeKind::Subject, a, Some(NodeRef::ById(a)))
        .await;
    assert!(matches!(result, Err(DomainError::CycleDetected { .. })));
}

// ========== Section 5: Failures ==========

#[tokio::test]
async fn test_write_failure_propagates() {
    let store = MemoryStore::new_shared();
    let permissions = Arc::new(FailingPermissionStore::new(Arc::clone(&store)));
    let engine = AclEngine::new(Arc::clone(&store), Arc::clone(&permissions));
    permissions.fail();

    let result = engine.allow("alice", "docs").await;
    assert!(matches!(result, Err(DomainError::Storage(_))));
    // Nodes created before the failing write stay
    assert_eq!(store.node_count(TreeKind::Subject), 1);
}

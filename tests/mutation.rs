//! Root creation, deletion and tree-id retry

use std::time::Duration;

use nestedset::*;
use test_helpers::*;

fn multi_over(store: FlakyStore, retry: RetryPolicy) -> NestedSet<Node, FlakyStore> {
    init_tracing();
    let config = TreeConfig::builder()
        .tree_field("tree_id")
        .retry(retry)
        .build()
        .unwrap();
    NestedSet::new(store, config).unwrap()
}

#[test]
fn test_delete_leaf_closes_gap() {
    let (mut tree, _) = build_tree(&[("root", None), ("x", Some(0)), ("L", Some(0))]);
    let leaf = by_title(tree.store(), "L");
    assert_eq!(leaf.interval(), Some(Interval::new(4, 5)));

    tree.delete_node(&leaf).unwrap();

    let root = tree.get_root().unwrap().unwrap();
    let x = by_title(tree.store(), "x");
    assert_eq!(root.interval(), Some(Interval::new(1, 4)));
    assert_eq!(tree.depth(&x).unwrap(), 1);
    assert!(tree.is_ancestor_of(&root, &x));
    assert_eq!(tree.store().len(), 2);
    tree.check_integrity().unwrap();
}

#[test]
fn test_delete_internal_node_is_refused() {
    let (mut tree, _) = sample_tree();
    let before = intervals(tree.store());
    let a = by_title(tree.store(), "a");

    let err = tree.delete_node(&a).unwrap_err();
    assert!(matches!(err, TreeError::StructuralConflict(_)));
    assert_eq!(intervals(tree.store()), before);
}

#[test]
fn test_delete_subtree() {
    let (mut tree, _) = sample_tree();
    let a = by_title(tree.store(), "a");

    assert_eq!(tree.delete_subtree(&a).unwrap(), 3);

    let s = tree.store();
    assert_eq!(by_title(s, "root").interval(), Some(Interval::new(1, 4)));
    assert_eq!(by_title(s, "d").interval(), Some(Interval::new(2, 3)));
    tree.check_integrity().unwrap();
}

#[test]
fn test_delete_bottom_up_empties_subtree() {
    let (mut tree, _) = sample_tree();
    for title in ["b", "c", "a"] {
        let node = by_title(tree.store(), title);
        tree.delete_node(&node).unwrap();
        tree.check_integrity().unwrap();
    }
    let root = tree.get_root().unwrap().unwrap();
    assert_eq!(child_titles(&tree, &root), vec!["d"]);
}

#[test]
fn test_deleted_node_is_invalid_input() {
    let (mut tree, _) = sample_tree();
    let b = by_title(tree.store(), "b");
    tree.delete_node(&b).unwrap();

    let err = tree.get_parent(&b).unwrap_err();
    assert!(matches!(err, TreeError::InvalidNode(_)));
    assert!(tree.delete_node(&b).is_err());
}

#[test]
fn test_delete_tree_of_node() {
    init_tracing();
    let mut tree = NestedSet::new(MemoryStore::new(), TreeConfig::multi_tree("tree_id")).unwrap();
    let one = tree.new_root(Node::new("one")).unwrap();
    let two = tree.new_root(Node::new("two")).unwrap();
    let leaf = tree.make_firstchild_of(&Node::new("leaf"), &two).unwrap();

    assert_eq!(tree.delete_tree_of(&leaf).unwrap(), 2);
    assert_eq!(tree.store().len(), 1);
    assert!(tree.store().fetch(one.id.unwrap()).unwrap().is_some());
}

#[test]
fn test_failed_delete_rolls_back() {
    let (tree, _) = sample_tree();
    let before = intervals(tree.store());
    let mut store = FlakyStore::new(tree.into_store());
    store.fail_increment_at = Some(2);
    let mut tree = NestedSet::new(store, TreeConfig::default()).unwrap();

    let b = by_title(tree.store(), "b");
    assert!(tree.delete_node(&b).is_err());
    assert_eq!(intervals(tree.store()), before);
    assert_eq!(tree.store().inner.len(), 5);
}

#[test]
fn test_new_root_retries_taken_tree_id() {
    let mut store = FlakyStore::new(MemoryStore::new());
    store.duplicate_saves = 2;
    let mut tree = multi_over(store, RetryPolicy::default());

    let root = tree.new_root(Node::new("menu")).unwrap();
    assert_eq!(root.tree_id, Some(3));
    assert_eq!(tree.store().saves_rejected, 2);
    assert!(!tree.store().in_transaction());
}

#[test]
fn test_new_root_gives_up_after_bound() {
    let mut store = FlakyStore::new(MemoryStore::new());
    store.duplicate_saves = 10;
    let mut tree = multi_over(store, RetryPolicy::new(3, Duration::ZERO));

    let err = tree.new_root(Node::new("menu")).unwrap_err();
    match err {
        TreeError::RetryExhausted { attempts, source } => {
            assert_eq!(attempts, 3);
            assert!(source.is_unique_violation());
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
    assert_eq!(tree.store().saves_rejected, 3);
    assert!(tree.store().inner.is_empty());
}

#[test]
fn test_no_retry_policy_fails_fast() {
    let mut store = FlakyStore::new(MemoryStore::new());
    store.duplicate_saves = 1;
    let mut tree = multi_over(store, RetryPolicy::no_retry());

    assert!(matches!(
        tree.new_root(Node::new("menu")),
        Err(TreeError::RetryExhausted { attempts: 1, .. })
    ));
}

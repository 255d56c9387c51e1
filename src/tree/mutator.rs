//! Tree lifecycle: root creation and deletion
//!
//! Deleting a subtree of width w = right − left + 1 closes its gap with
//!   shift(right + 1, −w)
//! A single leaf has w = 2, i.e. shift(right + 1, left − right − 1).

use tracing::{debug, info, instrument, warn};

use super::NestedSet;
use crate::config::{Column, TreeId};
use crate::interval::Interval;
use crate::shift::RangeShift;
use crate::store::{Op, RecordStore, Scope, TreeRecord};
use crate::{Result, TreeError};

impl<R, S> NestedSet<R, S>
where
    R: TreeRecord,
    S: RecordStore<R>,
{
    /// Persist `candidate` as the root `[1, 2]` of a new tree
    ///
    /// A record that is already saved is copied, never re-rooted. In
    /// multi-tree mode the next unused tree id is assigned; uniqueness
    /// conflicts are retried with the following id up to the configured
    /// retry bound.
    #[instrument(skip(self, candidate))]
    pub fn new_root(&mut self, candidate: R) -> Result<R> {
        let mut root = candidate;
        root.set_id(None);
        root.set_interval(Interval::ROOT);

        if !self.config.is_multi_tree() {
            root.set_tree_id(None);
            return self.atomically(|store| {
                if store.count(&Scope::whole_table().query())? > 0 {
                    return Err(TreeError::StructuralConflict(
                        "table already holds a tree".to_string(),
                    ));
                }
                store.save(&mut root)?;
                info!(id = ?root.id(), "created root");
                Ok(root)
            });
        }

        let policy = self.config.retry;
        let mut tree_id: TreeId = self.store.max(Column::Tree)?.unwrap_or(0) + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut attempt_root = root.clone();
            attempt_root.set_tree_id(Some(tree_id));

            let saved = self.atomically(|store| {
                store.save(&mut attempt_root)?;
                Ok(attempt_root)
            });
            match saved {
                Ok(saved) => {
                    info!(id = ?saved.id(), tree_id, attempt, "created root");
                    return Ok(saved);
                }
                Err(TreeError::Storage(err)) if err.is_unique_violation() => {
                    if attempt >= policy.attempts() {
                        return Err(TreeError::RetryExhausted {
                            attempts: attempt,
                            source: err,
                        });
                    }
                    warn!(tree_id, attempt, error = %err, "tree id taken, retrying");
                    tree_id += 1;
                    policy.pause();
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Delete a leaf and close its gap
    ///
    /// Internal nodes are refused: removing one row would leave its children
    /// numbered as if the parent still existed. Relocate or delete the
    /// children first, or use [`delete_subtree`](Self::delete_subtree).
    #[instrument(skip(self, node))]
    pub fn delete_node(&mut self, node: &R) -> Result<()> {
        let (node, iv) = self.current(node)?;
        if !iv.is_leaf() {
            return Err(TreeError::StructuralConflict(format!(
                "node {iv} still has {} descendants",
                iv.child_count()
            )));
        }

        let scope = self.scope_of(&node);
        self.atomically(|store| {
            store.delete_record(&node)?;
            RangeShift::from(iv.right + 1, iv.left - iv.right - 1)
                .apply::<R, S>(store, &scope)?;
            Ok(())
        })?;
        info!(id = ?node.id(), %iv, "deleted node");
        Ok(())
    }

    /// Delete a node with all its descendants and close the gap
    ///
    /// Returns the number of rows removed.
    #[instrument(skip(self, node))]
    pub fn delete_subtree(&mut self, node: &R) -> Result<u64> {
        let (node, iv) = self.current(node)?;
        let scope = self.scope_of(&node);
        let subtree = scope
            .query()
            .filter(Column::Left, Op::Ge, iv.left)
            .filter(Column::Right, Op::Le, iv.right);

        let removed = self.atomically(|store| {
            let removed = store.delete_where(&subtree)?;
            if removed as i64 != iv.subtree_size() {
                return Err(TreeError::Corrupted(format!(
                    "subtree {iv} should hold {} rows, found {removed}",
                    iv.subtree_size()
                )));
            }
            RangeShift::from(iv.right + 1, -iv.width()).apply::<R, S>(store, &scope)?;
            Ok(removed)
        })?;
        info!(id = ?node.id(), %iv, removed, "deleted subtree");
        Ok(removed)
    }

    /// Delete every row of a tree
    ///
    /// `tree_id` picks the tree in multi-tree mode; `None` falls back to the
    /// selected tree. A single-tree table is cleared whatever the id. Ids
    /// must be positive, as for [`select`](Self::select).
    #[instrument(skip(self))]
    pub fn delete_tree(&mut self, tree_id: Option<TreeId>) -> Result<u64> {
        if let Some(id) = tree_id.filter(|id| *id <= 0) {
            return Err(TreeError::InvalidConfiguration(format!(
                "tree id must be positive, got {id}"
            )));
        }
        let scope = match (self.config.is_multi_tree(), tree_id) {
            (false, Some(id)) => {
                debug!(tree_id = id, "single-tree table, ignoring tree id");
                Scope::whole_table()
            }
            (true, Some(id)) => Scope::tree(id),
            (_, None) => self.selected_scope()?,
        };
        self.clear(scope)
    }

    /// Delete every row of the tree `node` belongs to
    #[instrument(skip(self, node))]
    pub fn delete_tree_of(&mut self, node: &R) -> Result<u64> {
        self.checked(node)?;
        let scope = self.scope_of(node);
        self.clear(scope)
    }

    fn clear(&mut self, scope: Scope) -> Result<u64> {
        let query = scope.query();
        let removed = self.atomically(|store| Ok(store.delete_where(&query)?))?;
        info!(tree = ?scope.tree_id, removed, "deleted tree");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::store::{MemoryStore, Node, RecordStore};
    use crate::{Interval, NestedSet, RetryPolicy, TreeConfig, TreeError};

    fn single() -> NestedSet<Node, MemoryStore<Node>> {
        NestedSet::new(MemoryStore::new(), TreeConfig::default()).unwrap()
    }

    #[test]
    fn test_new_root() {
        let mut tree = single();
        let root = tree.new_root(Node::new("root")).unwrap();
        assert_eq!(root.interval(), Some(Interval::ROOT));
        assert!(root.id.is_some());
        assert!(tree.is_leaf(&root));
        assert_eq!(tree.get_root().unwrap(), Some(root));
    }

    #[test]
    fn test_single_tree_refuses_second_root() {
        let mut tree = single();
        tree.new_root(Node::new("first")).unwrap();
        let err = tree.new_root(Node::new("second")).unwrap_err();
        assert!(matches!(err, TreeError::StructuralConflict(_)));
        assert_eq!(tree.store().len(), 1);
    }

    #[test]
    fn test_new_root_copies_saved_record() {
        let mut tree = NestedSet::new(
            MemoryStore::new(),
            TreeConfig::multi_tree("tree_id"),
        )
        .unwrap();
        let first = tree.new_root(Node::new("menu")).unwrap();
        let copy = tree.new_root(first.clone()).unwrap();

        assert_ne!(first.id, copy.id);
        assert_eq!(first.tree_id, Some(1));
        assert_eq!(copy.tree_id, Some(2));
        assert_eq!(tree.store().len(), 2);
    }

    #[test]
    fn test_delete_tree_requires_selection() {
        let mut tree = NestedSet::new(
            MemoryStore::new(),
            TreeConfig::builder()
                .tree_field("tree_id")
                .retry(RetryPolicy::new(3, Duration::ZERO))
                .build()
                .unwrap(),
        )
        .unwrap();
        tree.new_root(Node::new("one")).unwrap();
        tree.new_root(Node::new("two")).unwrap();

        assert!(matches!(
            tree.delete_tree(None),
            Err(TreeError::InvalidConfiguration(_))
        ));
        assert_eq!(tree.delete_tree(Some(2)).unwrap(), 1);
        tree.select(Some(1)).unwrap();
        assert_eq!(tree.delete_tree(None).unwrap(), 1);
        assert!(tree.store().is_empty());
    }

    #[test]
    fn test_single_tree_delete_tree_clears_table() {
        let mut tree = single();
        let root = tree.new_root(Node::new("root")).unwrap();
        tree.make_lastchild_of(&Node::new("a"), &root).unwrap();
        assert_eq!(tree.delete_tree(None).unwrap(), 2);
        assert_eq!(tree.store().count(&crate::Query::new()).unwrap(), 0);
    }

    #[test]
    fn test_single_tree_delete_tree_ignores_id() {
        let mut tree = single();
        let root = tree.new_root(Node::new("root")).unwrap();
        tree.make_lastchild_of(&Node::new("a"), &root).unwrap();
        assert_eq!(tree.delete_tree(Some(7)).unwrap(), 2);
        assert!(tree.store().is_empty());
    }

    #[test]
    fn test_delete_tree_rejects_non_positive_id() {
        let mut tree = NestedSet::new(
            MemoryStore::new(),
            TreeConfig::multi_tree("tree_id"),
        )
        .unwrap();
        tree.new_root(Node::new("one")).unwrap();

        for id in [0, -1] {
            assert!(matches!(
                tree.delete_tree(Some(id)),
                Err(TreeError::InvalidConfiguration(_))
            ));
        }
        assert!(single().delete_tree(Some(0)).is_err());
        assert_eq!(tree.store().len(), 1);
    }
}

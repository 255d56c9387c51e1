//! Read-only tree queries
//!
//! Each relative is one interval predicate:
//!   parent         left < n.left ∧ right > n.right, smallest right
//!   first child    left  = n.left + 1
//!   last child     right = n.right − 1
//!   prev sibling   right = n.left − 1
//!   next sibling   left  = n.right + 1
//!   depth          |{a : a.left < n.left ∧ a.right > n.right}|
//!
//! "Not found" is `Ok(None)`; only an invalid input node is an error.

use tracing::trace;

use super::NestedSet;
use crate::config::Column;
use crate::interval::Interval;
use crate::store::{Direction, Op, Query, RecordStore, TreeRecord};
use crate::Result;

impl<R, S> NestedSet<R, S>
where
    R: TreeRecord,
    S: RecordStore<R>,
{
    /// Root of the selected tree
    ///
    /// `None` if the tree is empty, or if no tree is selected in a
    /// multi-tree table.
    pub fn get_root(&self) -> Result<Option<R>> {
        if self.config.is_multi_tree() && self.config.tree_value.is_none() {
            trace!("get_root without a selected tree");
            return Ok(None);
        }
        let scope = self.selected_scope()?;
        let root = self.root_of(&scope)?;
        trace!(tree = ?scope.tree_id, found = root.is_some(), "get_root");
        Ok(root)
    }

    /// Immediate parent: the enclosing node with the smallest right
    pub fn get_parent(&self, node: &R) -> Result<Option<R>> {
        let (node, iv) = self.current(node)?;
        self.first_match(
            &node,
            self.enclosing(&node, iv)
                .order_by(Column::Right, Direction::Asc),
        )
    }

    /// Child with `left = node.left + 1`
    pub fn get_first_child(&self, node: &R) -> Result<Option<R>> {
        let (node, iv) = self.current(node)?;
        self.first_match(
            &node,
            self.scope_of(&node).query().filter_eq(Column::Left, iv.left + 1),
        )
    }

    /// Child with `right = node.right - 1`
    pub fn get_last_child(&self, node: &R) -> Result<Option<R>> {
        let (node, iv) = self.current(node)?;
        self.first_match(
            &node,
            self.scope_of(&node).query().filter_eq(Column::Right, iv.right - 1),
        )
    }

    /// Sibling with `right = node.left - 1`
    pub fn get_previous_sibling(&self, node: &R) -> Result<Option<R>> {
        let (node, iv) = self.current(node)?;
        self.first_match(
            &node,
            self.scope_of(&node).query().filter_eq(Column::Right, iv.left - 1),
        )
    }

    /// Sibling with `left = node.right + 1`
    pub fn get_next_sibling(&self, node: &R) -> Result<Option<R>> {
        let (node, iv) = self.current(node)?;
        self.first_match(
            &node,
            self.scope_of(&node).query().filter_eq(Column::Left, iv.right + 1),
        )
    }

    /// A previous sibling exists
    pub fn has_previous_sibling(&self, node: &R) -> Result<bool> {
        Ok(self.get_previous_sibling(node)?.is_some())
    }

    /// A next sibling exists
    pub fn has_next_sibling(&self, node: &R) -> Result<bool> {
        Ok(self.get_next_sibling(node)?.is_some())
    }

    /// Number of strict ancestors (root = 0)
    pub fn depth(&self, node: &R) -> Result<u64> {
        let (node, iv) = self.current(node)?;
        let depth = self.store.count(&self.enclosing(&node, iv))?;
        trace!(node = ?node.id(), %iv, depth, "depth");
        Ok(depth)
    }

    /// Strict ancestors, root first
    pub fn ancestors(&self, node: &R) -> Result<Vec<R>> {
        let (node, iv) = self.current(node)?;
        let query = self
            .enclosing(&node, iv)
            .order_by(Column::Left, Direction::Asc);
        Ok(self.store.find_all(&query)?)
    }

    /// Direct children in sibling order
    pub fn children(&self, node: &R) -> Result<Vec<R>> {
        let mut children = Vec::new();
        let mut next = self.get_first_child(node)?;
        while let Some(child) = next {
            next = self.get_next_sibling(&child)?;
            children.push(child);
        }
        Ok(children)
    }

    /// Every descendant ordered by left, with its depth below `node`
    ///
    /// Direct children have depth 1.
    pub fn descendants(&self, node: &R) -> Result<Vec<(u64, R)>> {
        let (node, iv) = self.current(node)?;
        let query = self
            .scope_of(&node)
            .query()
            .filter(Column::Left, Op::Gt, iv.left)
            .filter(Column::Right, Op::Lt, iv.right)
            .order_by(Column::Left, Direction::Asc);

        // Stack of right endpoints of the open ancestors
        let mut open = vec![iv.right];
        let mut out = Vec::new();
        for row in self.store.find_all(&query)? {
            let Some(row_iv) = Interval::of(&row) else {
                continue;
            };
            while open.last().map_or(false, |right| *right < row_iv.left) {
                open.pop();
            }
            out.push((open.len() as u64, row));
            open.push(row_iv.right);
        }
        Ok(out)
    }

    fn enclosing(&self, node: &R, iv: Interval) -> Query {
        self.scope_of(node)
            .query()
            .filter(Column::Left, Op::Lt, iv.left)
            .filter(Column::Right, Op::Gt, iv.right)
    }

    fn first_match(&self, node: &R, query: Query) -> Result<Option<R>> {
        let found = self.store.find_one(&query)?;
        trace!(node = ?node.id(), %query, found = found.is_some(), "navigate");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use crate::store::{MemoryStore, Node, RecordStore, TreeRecord};
    use crate::{Interval, NestedSet, TreeConfig};

    /// root(1,10) > a(2,7) > [b(3,4), c(5,6)], d(8,9)
    fn sample() -> (NestedSet<Node, MemoryStore<Node>>, Vec<Node>) {
        let mut store = MemoryStore::new();
        let mut nodes = Vec::new();
        for (title, left, right) in [
            ("root", 1, 10),
            ("a", 2, 7),
            ("b", 3, 4),
            ("c", 5, 6),
            ("d", 8, 9),
        ] {
            let mut node = Node::new(title);
            node.set_interval(Interval::new(left, right));
            store.save(&mut node).unwrap();
            nodes.push(node);
        }
        (NestedSet::new(store, TreeConfig::default()).unwrap(), nodes)
    }

    fn title(node: Option<Node>) -> Option<String> {
        node.map(|n| n.title)
    }

    #[test]
    fn test_parent_is_nearest_ancestor() {
        let (tree, n) = sample();
        assert_eq!(title(tree.get_parent(&n[2]).unwrap()), Some("a".into()));
        assert_eq!(title(tree.get_parent(&n[1]).unwrap()), Some("root".into()));
        assert_eq!(tree.get_parent(&n[0]).unwrap(), None);
    }

    #[test]
    fn test_children_and_siblings() {
        let (tree, n) = sample();
        assert_eq!(title(tree.get_first_child(&n[1]).unwrap()), Some("b".into()));
        assert_eq!(title(tree.get_last_child(&n[1]).unwrap()), Some("c".into()));
        assert_eq!(title(tree.get_last_child(&n[0]).unwrap()), Some("d".into()));
        assert_eq!(tree.get_first_child(&n[4]).unwrap(), None);

        assert_eq!(title(tree.get_next_sibling(&n[2]).unwrap()), Some("c".into()));
        assert_eq!(title(tree.get_previous_sibling(&n[4]).unwrap()), Some("a".into()));
        assert!(!tree.has_next_sibling(&n[4]).unwrap());
        assert!(!tree.has_previous_sibling(&n[1]).unwrap());
        assert!(tree.has_previous_sibling(&n[3]).unwrap());
    }

    #[test]
    fn test_depth_and_ancestors() {
        let (tree, n) = sample();
        assert_eq!(tree.depth(&n[0]).unwrap(), 0);
        assert_eq!(tree.depth(&n[1]).unwrap(), 1);
        assert_eq!(tree.depth(&n[3]).unwrap(), 2);

        let path: Vec<_> = tree
            .ancestors(&n[3])
            .unwrap()
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert_eq!(path, vec!["root", "a"]);
    }

    #[test]
    fn test_children_walk() {
        let (tree, n) = sample();
        let kids: Vec<_> = tree
            .children(&n[0])
            .unwrap()
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(kids, vec!["a", "d"]);
        assert!(tree.children(&n[2]).unwrap().is_empty());
    }

    #[test]
    fn test_descendants_with_depth() {
        let (tree, n) = sample();
        let listing: Vec<_> = tree
            .descendants(&n[0])
            .unwrap()
            .into_iter()
            .map(|(depth, node)| (depth, node.title))
            .collect();
        assert_eq!(
            listing,
            vec![
                (1, "a".to_string()),
                (2, "b".to_string()),
                (2, "c".to_string()),
                (1, "d".to_string()),
            ]
        );
    }

    #[test]
    fn test_stale_copy_is_reread() {
        let (tree, n) = sample();
        let mut stale = n[2].clone();
        stale.set_interval(Interval::new(8, 9)); // looks like d, is still b
        assert_eq!(title(tree.get_parent(&stale).unwrap()), Some("a".into()));
    }

    #[test]
    fn test_invalid_input_is_an_error() {
        let (tree, _) = sample();
        assert!(tree.get_parent(&Node::new("unsaved")).is_err());
        assert!(tree.depth(&Node::new("unsaved")).is_err());
    }

    #[test]
    fn test_root() {
        let (tree, _) = sample();
        assert_eq!(title(tree.get_root().unwrap()), Some("root".into()));
        let empty: NestedSet<Node, _> =
            NestedSet::new(MemoryStore::new(), TreeConfig::default()).unwrap();
        assert_eq!(empty.get_root().unwrap(), None);
        assert!(tree.store().count(&crate::Query::new()).unwrap() == 5);
    }

    #[test]
    fn test_root_without_selection_is_absent() {
        let mut tree: NestedSet<Node, _> =
            NestedSet::new(MemoryStore::new(), TreeConfig::multi_tree("tree_id")).unwrap();
        tree.new_root(Node::new("one")).unwrap();

        assert_eq!(tree.get_root().unwrap(), None);
        tree.select(Some(1)).unwrap();
        assert_eq!(title(tree.get_root().unwrap()), Some("one".into()));
        tree.select(None).unwrap();
        assert_eq!(tree.get_root().unwrap(), None);
    }
}

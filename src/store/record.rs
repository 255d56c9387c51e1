//! Record capability interface
//!
//! The tree works over any record type exposing typed accessors for its
//! interval and partition columns. Column names are resolved once by the
//! configuration; records are never read through string-keyed lookups.

use crate::config::{Column, TreeId};
use crate::interval::Interval;

/// Store-assigned record identity
pub type RecordId = u64;

/// Capabilities the tree needs from a stored record
pub trait TreeRecord: Clone + std::fmt::Debug {
    /// Identity assigned by the store (`None` until first save)
    fn id(&self) -> Option<RecordId>;

    /// Set or clear the identity
    fn set_id(&mut self, id: Option<RecordId>);

    /// Left index
    fn left(&self) -> Option<i64>;

    /// Right index
    fn right(&self) -> Option<i64>;

    /// Partition key
    fn tree_id(&self) -> Option<TreeId>;

    /// Set left index
    fn set_left(&mut self, left: i64);

    /// Set right index
    fn set_right(&mut self, right: i64);

    /// Set partition key
    fn set_tree_id(&mut self, tree_id: Option<TreeId>);

    /// Not persisted yet
    fn is_new(&self) -> bool {
        self.id().is_none()
    }

    /// Typed column read, used by filters
    fn column(&self, column: Column) -> Option<i64> {
        match column {
            Column::Left => self.left(),
            Column::Right => self.right(),
            Column::Tree => self.tree_id(),
        }
    }

    /// Typed column write, used by bulk updates
    fn set_column(&mut self, column: Column, value: i64) {
        match column {
            Column::Left => self.set_left(value),
            Column::Right => self.set_right(value),
            Column::Tree => self.set_tree_id(Some(value)),
        }
    }

    /// Assign both endpoints
    fn set_interval(&mut self, interval: Interval) {
        self.set_left(interval.left);
        self.set_right(interval.right);
    }
}

/// Plain tree row: interval and partition columns plus a title
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    /// Store identity
    pub id: Option<RecordId>,

    /// Left index
    pub left: Option<i64>,

    /// Right index
    pub right: Option<i64>,

    /// Partition key
    pub tree_id: Option<TreeId>,

    /// Display title
    pub title: String,

    /// Secondary (non-tree) link to another record
    pub symlink: Option<RecordId>,
}

impl Node {
    /// Create unsaved node with a title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Current interval, if both endpoints are set
    pub fn interval(&self) -> Option<Interval> {
        Interval::of(self)
    }
}

impl TreeRecord for Node {
    fn id(&self) -> Option<RecordId> {
        self.id
    }

    fn set_id(&mut self, id: Option<RecordId>) {
        self.id = id;
    }

    fn left(&self) -> Option<i64> {
        self.left
    }

    fn right(&self) -> Option<i64> {
        self.right
    }

    fn tree_id(&self) -> Option<TreeId> {
        self.tree_id
    }

    fn set_left(&mut self, left: i64) {
        self.left = Some(left);
    }

    fn set_right(&mut self, right: i64) {
        self.right = Some(right);
    }

    fn set_tree_id(&mut self, tree_id: Option<TreeId>) {
        self.tree_id = tree_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_column_access() {
        let mut node = Node::new("docs");
        assert!(node.is_new());
        assert_eq!(node.column(Column::Left), None);

        node.set_interval(Interval::new(4, 9));
        node.set_column(Column::Tree, 2);
        assert_eq!(node.column(Column::Left), Some(4));
        assert_eq!(node.column(Column::Right), Some(9));
        assert_eq!(node.column(Column::Tree), Some(2));
        assert_eq!(node.interval(), Some(Interval::new(4, 9)));

        node.set_id(Some(11));
        assert!(!node.is_new());
    }
}

//! Interval algebra for nested-set nodes
//!
//! Node = interval [left, right] with integer endpoints
//! Ancestry is containment:
//!   a ancestor of b  ⇔  a.left < b.left ∧ a.right > b.right
//! Adjacency is sibling order:
//!   b next sibling of a  ⇔  b.left = a.right + 1
//!
//! Pure arithmetic, no storage access.

use std::fmt;

use crate::store::TreeRecord;

/// Position of a node in its tree (just an interval)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interval {
    /// Left endpoint (inclusive)
    pub left: i64,

    /// Right endpoint (inclusive)
    pub right: i64,
}

impl Interval {
    /// Interval of a freshly created root: [1, 2]
    pub const ROOT: Interval = Interval { left: 1, right: 2 };

    /// Create interval [left, right]
    pub const fn new(left: i64, right: i64) -> Self {
        Self { left, right }
    }

    /// Read the interval stored on a record, if both endpoints are present
    pub fn of<R: TreeRecord>(record: &R) -> Option<Self> {
        Some(Self::new(record.left()?, record.right()?))
    }

    /// Both endpoints positive and `left < right`
    #[inline]
    pub fn is_well_formed(&self) -> bool {
        self.left > 0 && self.right > 0 && self.left < self.right
    }

    /// Number of endpoint slots the subtree occupies: 2 × (node count)
    #[inline]
    pub fn width(&self) -> i64 {
        self.right - self.left + 1
    }

    /// Number of nodes in the subtree rooted here, the node included
    #[inline]
    pub fn subtree_size(&self) -> i64 {
        self.width() / 2
    }

    /// Check if this is a tree root
    #[inline]
    pub fn is_root(&self) -> bool {
        self.left == 1
    }

    /// Check if leaf (no endpoints inside)
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.right - self.left == 1
    }

    /// Count of nodes strictly inside: (right − left − 1) / 2
    ///
    /// For a leaf this is 0. It counts every descendant, not only the
    /// direct children.
    #[inline]
    pub fn child_count(&self) -> i64 {
        (self.right - self.left - 1) / 2
    }

    /// Point lies within [left, right]
    #[inline]
    pub fn contains(&self, point: i64) -> bool {
        self.left <= point && point <= self.right
    }

    /// Relocating this subtree to `target_left` would put it inside itself
    ///
    /// Targets `left` and `right + 1` leave the subtree where it is; every
    /// target in (left, right] lands between the subtree's own endpoints.
    #[inline]
    pub fn swallows_target(&self, target_left: i64) -> bool {
        self.left < target_left && target_left <= self.right
    }

    /// Strict containment: `other` lies inside `self`
    #[inline]
    pub fn is_ancestor_of(&self, other: &Interval) -> bool {
        self.left < other.left && self.right > other.right
    }

    /// Strict containment: `self` lies inside `other`
    #[inline]
    pub fn is_descendant_of(&self, other: &Interval) -> bool {
        other.is_ancestor_of(self)
    }

    /// `other` starts right after `self` ends
    #[inline]
    pub fn is_previous_sibling_of(&self, other: &Interval) -> bool {
        self.right + 1 == other.left
    }

    /// `self` starts right after `other` ends
    #[inline]
    pub fn is_next_sibling_of(&self, other: &Interval) -> bool {
        other.is_previous_sibling_of(self)
    }

    /// `self` opens right after `parent` opens
    #[inline]
    pub fn is_first_child_of(&self, parent: &Interval) -> bool {
        self.left == parent.left + 1
    }

    /// `self` closes right before `parent` closes
    #[inline]
    pub fn is_last_child_of(&self, parent: &Interval) -> bool {
        self.right == parent.right - 1
    }

    /// Same interval moved by `delta`
    #[inline]
    pub fn shifted(&self, delta: i64) -> Self {
        Self::new(self.left + delta, self.right + delta)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.left, self.right)
    }
}

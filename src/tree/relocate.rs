//! Subtree relocation
//!
//! Moving subtree [L, R] (width w = R − L + 1) so its root starts at t:
//!
//!   1. park      shift [L, R] by −R         subtree now in [L − R, 0]
//!   2. close     shift ≥ R + 1 by −w        old gap removed
//!   3. adjust    t' = t − w if t > R, else t
//!   4. open      shift ≥ t' by +w           new gap of width w at t'
//!   5. unpark    shift [L − R, 0] by t' − L + R
//!
//! Live endpoints are always ≥ 1, so nothing but the parked block ever
//! sits at or below 0 and steps 2 and 4 cannot touch it. All five steps
//! run in one transaction.

use tracing::{debug, info, instrument};

use super::NestedSet;
use crate::config::Column;
use crate::interval::Interval;
use crate::shift::RangeShift;
use crate::store::{RecordStore, Scope, StoreError, TreeRecord};
use crate::{Result, TreeError};

/// Position relative to an anchor node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
// Variants read as `Placement::FirstChildOf` at the call site.
#[allow(clippy::enum_variant_names)]
pub enum Placement {
    /// Right after the anchor, same parent
    NextSiblingOf,
    /// Right before the anchor, same parent
    PreviousSiblingOf,
    /// First child of the anchor
    FirstChildOf,
    /// Last child of the anchor
    LastChildOf,
}

impl Placement {
    /// Left endpoint the moved subtree's root takes, before renumbering
    pub fn target_left(self, anchor: Interval) -> i64 {
        match self {
            Self::NextSiblingOf => anchor.right + 1,
            Self::PreviousSiblingOf => anchor.left,
            Self::FirstChildOf => anchor.left + 1,
            Self::LastChildOf => anchor.right,
        }
    }

    /// Placement shares the anchor's parent
    pub fn is_sibling(self) -> bool {
        matches!(self, Self::NextSiblingOf | Self::PreviousSiblingOf)
    }
}

/// Move `subtree` so its left endpoint becomes `target`
///
/// Runs inside the caller's transaction. `target` is read against the
/// numbering before the move and must lie in `2..=root.right` outside
/// `(left, right]`; anything else is a `StructuralConflict` and the store
/// is left untouched. Returns the subtree's new interval.
pub fn relocate<R, S>(
    store: &mut S,
    scope: &Scope,
    subtree: Interval,
    target: i64,
) -> Result<Interval>
where
    R: TreeRecord,
    S: RecordStore<R> + ?Sized,
{
    check_target(subtree, target, root_interval::<R, S>(store, scope)?)?;
    if !store.in_transaction() {
        return Err(StoreError::Transaction(
            "relocation requires an open transaction".to_string(),
        )
        .into());
    }

    let Interval { left, right } = subtree;
    let width = subtree.width();

    let park = RangeShift::within(left, right, -right);
    park.apply::<R, S>(store, scope)?;

    let close = RangeShift::from(right + 1, -width);
    close.apply::<R, S>(store, scope)?;

    let target = if target > right { target - width } else { target };
    let open = RangeShift::from(target, width);
    open.apply::<R, S>(store, scope)?;

    let unpark = RangeShift::within(left - right, 0, target - left + right);
    unpark.apply::<R, S>(store, scope)?;

    let moved = Interval::new(target, target + width - 1);
    debug!(from = %subtree, to = %moved, tree = ?scope.tree_id, "relocated subtree");
    Ok(moved)
}

fn root_interval<R, S>(store: &S, scope: &Scope) -> Result<Interval>
where
    R: TreeRecord,
    S: RecordStore<R> + ?Sized,
{
    store
        .find_one(&scope.query().filter_eq(Column::Left, 1))?
        .and_then(|root| Interval::of(&root))
        .ok_or_else(|| TreeError::Corrupted(format!("tree {:?} has no root", scope.tree_id)))
}

/// Reject targets that would nest the subtree in itself or leave the root
fn check_target(subtree: Interval, target: i64, root: Interval) -> Result<()> {
    if !subtree.is_well_formed() || subtree.right > root.right {
        return Err(TreeError::InvalidNode(format!(
            "subtree {subtree} does not lie in root {root}"
        )));
    }
    if subtree.swallows_target(target) {
        return Err(TreeError::StructuralConflict(format!(
            "cannot move {subtree} into itself at {target}"
        )));
    }
    if target < 2 || target > root.right {
        return Err(TreeError::StructuralConflict(format!(
            "target {target} lies outside root {root}"
        )));
    }
    Ok(())
}

impl<R, S> NestedSet<R, S>
where
    R: TreeRecord,
    S: RecordStore<R>,
{
    /// Move the subtree rooted at `object` so its left becomes `target_left`
    ///
    /// `target_left` is read against the numbering before the move. Targets
    /// `left` and `right + 1` leave the tree unchanged; targets inside
    /// `(left, right]` or outside the root are rejected. Returns the object
    /// as stored after the move.
    #[instrument(skip(self, object))]
    pub fn move_subtree(&mut self, object: &R, target_left: i64) -> Result<R> {
        let (object, iv) = self.current(object)?;
        let scope = self.scope_of(&object);
        check_target(iv, target_left, root_interval::<R, S>(&self.store, &scope)?)?;
        if target_left == iv.left || target_left == iv.right + 1 {
            debug!(%iv, target_left, "subtree already in place");
            return Ok(object);
        }

        let moved =
            self.atomically(|store| relocate::<R, S>(store, &scope, iv, target_left))?;
        info!(id = ?object.id(), from = %iv, to = %moved, "moved subtree");
        self.reload(&object)
    }

    /// Put `object` at `placement` relative to `to`
    ///
    /// A new record is inserted as a leaf; a saved one is moved together
    /// with its subtree. Moving a node next to or under itself or one of
    /// its descendants, beside a root, or into another tree is rejected.
    #[instrument(skip(self, object, to))]
    pub fn place(&mut self, object: &R, placement: Placement, to: &R) -> Result<R> {
        let (to, anchor) = self.current(to)?;
        if placement.is_sibling() && anchor.is_root() {
            return Err(TreeError::StructuralConflict(
                "a root cannot have siblings".to_string(),
            ));
        }
        let target = placement.target_left(anchor);

        if object.is_new() {
            return self.insert_leaf(object, &to, target);
        }

        let (object, iv) = self.current(object)?;
        if object.id() == to.id() {
            return Err(TreeError::StructuralConflict(
                "cannot place a node relative to itself".to_string(),
            ));
        }
        if self.scope_of(&object) != self.scope_of(&to) {
            return Err(TreeError::StructuralConflict(format!(
                "cannot move across trees ({:?} to {:?})",
                object.tree_id(),
                to.tree_id()
            )));
        }
        if iv.is_ancestor_of(&anchor) {
            return Err(TreeError::StructuralConflict(format!(
                "{anchor} lies inside the moved subtree {iv}"
            )));
        }
        self.move_subtree(&object, target)
    }

    /// Make `object` the next sibling of `to`
    pub fn make_nextsibling_of(&mut self, object: &R, to: &R) -> Result<R> {
        self.place(object, Placement::NextSiblingOf, to)
    }

    /// Make `object` the previous sibling of `to`
    pub fn make_previoussibling_of(&mut self, object: &R, to: &R) -> Result<R> {
        self.place(object, Placement::PreviousSiblingOf, to)
    }

    /// Make `object` the first child of `to`
    pub fn make_firstchild_of(&mut self, object: &R, to: &R) -> Result<R> {
        self.place(object, Placement::FirstChildOf, to)
    }

    /// Make `object` the last child of `to`
    pub fn make_lastchild_of(&mut self, object: &R, to: &R) -> Result<R> {
        self.place(object, Placement::LastChildOf, to)
    }

    /// Open a two-slot gap at `target` and save `object` into it
    fn insert_leaf(&mut self, object: &R, to: &R, target: i64) -> Result<R> {
        let scope = self.scope_of(to);
        let mut leaf = object.clone();
        leaf.set_interval(Interval::new(target, target + 1));
        leaf.set_tree_id(to.tree_id());

        let leaf = self.atomically(|store| {
            RangeShift::from(target, 2).apply::<R, S>(store, &scope)?;
            store.save(&mut leaf)?;
            Ok(leaf)
        })?;
        info!(id = ?leaf.id(), at = target, tree = ?scope.tree_id, "inserted node");
        Ok(leaf)
    }

    fn reload(&self, record: &R) -> Result<R> {
        let id = record
            .id()
            .ok_or_else(|| TreeError::InvalidNode("record has not been saved".to_string()))?;
        self.store
            .fetch(id)?
            .ok_or_else(|| TreeError::Corrupted(format!("record {id} vanished during a move")))
    }
}

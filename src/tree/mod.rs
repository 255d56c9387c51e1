//! Nested-set tree over a record store
//!
//! `NestedSet` combines the configuration, the interval algebra and a store:
//! - navigator: read-only interval queries (`&self`)
//! - mutator: root creation and deletion with gap closing (`&mut self`)
//! - relocator: subtree moves and placements (`&mut self`)
//!
//! Nodes are never cached. Every operation re-reads the intervals it needs,
//! and every mutation runs inside one store transaction. Taking the store by
//! `&mut` for mutations gives the single-writer discipline in-process;
//! separate processes sharing a table must serialize writers externally.

mod mutator;
mod navigator;
mod relocate;

pub use relocate::{relocate, Placement};

use std::collections::BTreeSet;
use std::marker::PhantomData;

use tracing::warn;

use crate::config::{Column, TreeConfig, TreeId};
use crate::interval::Interval;
use crate::store::{Direction, RecordStore, Scope, TreeRecord};
use crate::{Result, TreeError};

/// Tree of `R` records kept in store `S`
#[derive(Debug)]
pub struct NestedSet<R, S> {
    store: S,
    config: TreeConfig,
    _record: PhantomData<fn() -> R>,
}

impl<R, S> NestedSet<R, S>
where
    R: TreeRecord,
    S: RecordStore<R>,
{
    /// Create tree over a store, validating the configuration
    pub fn new(store: S, config: TreeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            _record: PhantomData,
        })
    }

    /// Select the active tree of a multi-tree table (chainable)
    pub fn select(&mut self, tree_id: Option<TreeId>) -> Result<&mut Self> {
        if tree_id.is_some() && !self.config.is_multi_tree() {
            return Err(TreeError::InvalidConfiguration(
                "cannot select a tree without a tree_field".to_string(),
            ));
        }
        if let Some(id) = tree_id.filter(|id| *id <= 0) {
            return Err(TreeError::InvalidConfiguration(format!(
                "tree id must be positive, got {id}"
            )));
        }
        self.config.tree_value = tree_id;
        Ok(self)
    }

    /// Active configuration
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Underlying store, mutable
    ///
    /// Writing left/right/tree columns through this handle bypasses the
    /// renumbering logic and can corrupt the tree.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Release the store
    pub fn into_store(self) -> S {
        self.store
    }

    // =========================================================================
    // Node predicates (pure, no storage access)
    // =========================================================================

    /// Persisted, positive endpoints with `left < right`, and a positive tree
    /// id in multi-tree mode
    pub fn is_valid(&self, record: &R) -> bool {
        self.checked(record).is_ok()
    }

    /// Valid and `left == 1`
    pub fn is_root(&self, record: &R) -> bool {
        self.checked(record).map_or(false, |iv| iv.is_root())
    }

    /// Valid and `right - left == 1`
    pub fn is_leaf(&self, record: &R) -> bool {
        self.checked(record).map_or(false, |iv| iv.is_leaf())
    }

    /// Valid and not a root
    pub fn is_child(&self, record: &R) -> bool {
        self.checked(record).map_or(false, |iv| !iv.is_root())
    }

    /// Alias of [`is_child`](Self::is_child)
    pub fn has_parent(&self, record: &R) -> bool {
        self.is_child(record)
    }

    /// Valid and not a leaf
    pub fn has_children(&self, record: &R) -> bool {
        self.checked(record).map_or(false, |iv| !iv.is_leaf())
    }

    /// Both valid, same tree, `child` strictly inside `parent`
    pub fn is_child_of(&self, child: &R, parent: &R) -> bool {
        self.related(parent, child)
            .map_or(false, |(p, c)| p.is_ancestor_of(&c))
    }

    /// Both valid, same tree, `child` strictly inside `parent`
    pub fn is_parent_of(&self, parent: &R, child: &R) -> bool {
        self.is_child_of(child, parent)
    }

    /// Both valid, same tree, `a` strictly encloses `b`
    pub fn is_ancestor_of(&self, a: &R, b: &R) -> bool {
        self.is_child_of(b, a)
    }

    /// Both valid, same tree, `b` strictly encloses `a`
    pub fn is_descendant_of(&self, a: &R, b: &R) -> bool {
        self.is_child_of(a, b)
    }

    /// Descendants below the node: `(right - left - 1) / 2`
    ///
    /// `None` for an invalid node.
    pub fn count_children(&self, record: &R) -> Option<i64> {
        self.checked(record).ok().map(|iv| iv.child_count())
    }

    // =========================================================================
    // Integrity
    // =========================================================================

    /// Verify the nested-set invariants of the selected tree
    ///
    /// Endpoints are exactly `{1, …, 2n}`, every node has `left < right`
    /// with an even width, the root is `[1, 2n]` and no two intervals
    /// partially overlap.
    pub fn check_integrity(&self) -> Result<()> {
        let scope = self.selected_scope()?;
        let rows = self
            .store
            .find_all(&scope.query().order_by(Column::Left, Direction::Asc))?;

        let mut endpoints = BTreeSet::new();
        let mut open: Vec<Interval> = Vec::new();
        for row in &rows {
            let iv = Interval::of(row)
                .filter(Interval::is_well_formed)
                .ok_or_else(|| TreeError::Corrupted(format!("malformed interval on {row:?}")))?;
            if iv.width() % 2 != 0 {
                return Err(TreeError::Corrupted(format!(
                    "interval {iv} has odd width {}",
                    iv.width()
                )));
            }
            if !endpoints.insert(iv.left) || !endpoints.insert(iv.right) {
                return Err(TreeError::Corrupted(format!(
                    "interval {iv} reuses an endpoint"
                )));
            }
            while open.last().map_or(false, |parent| parent.right < iv.left) {
                open.pop();
            }
            if let Some(parent) = open.last() {
                if !parent.is_ancestor_of(&iv) {
                    return Err(TreeError::Corrupted(format!(
                        "interval {iv} overlaps {parent}"
                    )));
                }
            } else if iv.left != 1 {
                return Err(TreeError::Corrupted(format!(
                    "interval {iv} lies outside the root"
                )));
            }
            open.push(iv);
        }

        let expected = 2 * rows.len() as i64;
        if endpoints.len() as i64 != expected
            || endpoints.iter().next().map_or(false, |first| *first != 1)
            || endpoints.iter().next_back().map_or(false, |last| *last != expected)
        {
            return Err(TreeError::Corrupted(format!(
                "endpoints of {} nodes are not 1..={expected}",
                rows.len()
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Interval of a record that passes validation
    fn checked(&self, record: &R) -> Result<Interval> {
        if record.is_new() {
            return Err(TreeError::InvalidNode(
                "record has not been saved".to_string(),
            ));
        }
        let iv = Interval::of(record).ok_or_else(|| {
            TreeError::InvalidNode(format!("record {:?} has no interval", record.id()))
        })?;
        if !iv.is_well_formed() {
            return Err(TreeError::InvalidNode(format!(
                "record {:?} has malformed interval {iv}",
                record.id()
            )));
        }
        if self.config.is_multi_tree() && !record.tree_id().map_or(false, |t| t > 0) {
            return Err(TreeError::InvalidNode(format!(
                "record {:?} has no valid tree id",
                record.id()
            )));
        }
        Ok(iv)
    }

    /// Two valid records of the same tree
    fn related(&self, a: &R, b: &R) -> Result<(Interval, Interval)> {
        let (ia, ib) = (self.checked(a)?, self.checked(b)?);
        if self.scope_of(a) != self.scope_of(b) {
            return Err(TreeError::StructuralConflict(format!(
                "records belong to different trees ({:?} and {:?})",
                a.tree_id(),
                b.tree_id()
            )));
        }
        Ok((ia, ib))
    }

    /// Re-read a record from the store and validate its current interval
    fn current(&self, record: &R) -> Result<(R, Interval)> {
        self.checked(record)?;
        let id = record
            .id()
            .ok_or_else(|| TreeError::InvalidNode("record has not been saved".to_string()))?;
        let fresh = self.store.fetch(id)?.ok_or_else(|| {
            TreeError::InvalidNode(format!("record {id} no longer exists"))
        })?;
        let iv = self.checked(&fresh)?;
        Ok((fresh, iv))
    }

    /// Tree the record belongs to
    fn scope_of(&self, record: &R) -> Scope {
        if self.config.is_multi_tree() {
            Scope {
                tree_id: record.tree_id(),
            }
        } else {
            Scope::whole_table()
        }
    }

    /// Tree chosen by `select` (whole table in single-tree mode)
    fn selected_scope(&self) -> Result<Scope> {
        if !self.config.is_multi_tree() {
            return Ok(Scope::whole_table());
        }
        self.config.tree_value.map(Scope::tree).ok_or_else(|| {
            TreeError::InvalidConfiguration("no tree selected in a multi-tree table".to_string())
        })
    }

    /// Root row of a scope
    fn root_of(&self, scope: &Scope) -> Result<Option<R>> {
        Ok(self
            .store
            .find_one(&scope.query().filter_eq(Column::Left, 1))?)
    }

    /// Run `op` inside one transaction: commit on success, roll back on error
    fn atomically<T>(&mut self, op: impl FnOnce(&mut S) -> Result<T>) -> Result<T> {
        self.store.begin()?;
        let outcome = op(&mut self.store).and_then(|value| {
            self.store.commit()?;
            Ok(value)
        });
        if let Err(err) = &outcome {
            warn!(error = %err, "rolling back tree mutation");
            if let Err(rollback) = self.store.rollback() {
                warn!(error = %rollback, "rollback failed");
            }
        }
        outcome
    }
}

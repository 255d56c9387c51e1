//! Range shifting
//!
//! The only primitive that changes interval endpoints:
//!   left  += delta  for every node with boundary ≤ left  (≤ upper)
//!   right += delta  for every node with boundary ≤ right (≤ upper)
//!
//! Left and right are two independent bulk statements, so a node may have
//! only one endpoint moved when the other lies outside the range. Both
//! statements must run inside the caller's transaction.

use tracing::debug;

use crate::config::Column;
use crate::store::{Op, Query, RecordStore, Scope, StoreError, TreeRecord};

/// Bulk renumbering of every endpoint in `[boundary, upper]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeShift {
    /// Smallest endpoint affected
    pub boundary: i64,

    /// Amount added to each affected endpoint
    pub delta: i64,

    /// Largest endpoint affected (`None` = unbounded)
    pub upper: Option<i64>,
}

/// Rows touched by one shift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShiftOutcome {
    /// Rows whose left endpoint moved
    pub lefts: u64,

    /// Rows whose right endpoint moved
    pub rights: u64,
}

impl RangeShift {
    /// Shift every endpoint ≥ `boundary`
    pub fn from(boundary: i64, delta: i64) -> Self {
        Self {
            boundary,
            delta,
            upper: None,
        }
    }

    /// Shift every endpoint in `[boundary, upper]`
    pub fn within(boundary: i64, upper: i64, delta: i64) -> Self {
        Self {
            boundary,
            delta,
            upper: Some(upper),
        }
    }

    /// Nothing can move: zero delta or empty range
    pub fn is_noop(&self) -> bool {
        self.delta == 0 || self.upper.map_or(false, |upper| upper < self.boundary)
    }

    /// Filter selecting the endpoints of one column
    pub fn query(&self, scope: &Scope, column: Column) -> Query {
        let query = scope.query().filter(column, Op::Ge, self.boundary);
        match self.upper {
            Some(upper) => query.filter(column, Op::Le, upper),
            None => query,
        }
    }

    /// Issue the left and right bulk updates
    ///
    /// Fails without touching the store when no transaction is open: a crash
    /// between the two statements would otherwise leave `left ≥ right` rows.
    pub fn apply<R, S>(&self, store: &mut S, scope: &Scope) -> Result<ShiftOutcome, StoreError>
    where
        R: TreeRecord,
        S: RecordStore<R> + ?Sized,
    {
        if !store.in_transaction() {
            return Err(StoreError::Transaction(
                "range shift requires an open transaction".to_string(),
            ));
        }
        if self.is_noop() {
            return Ok(ShiftOutcome::default());
        }

        let lefts = store.increment(&self.query(scope, Column::Left), Column::Left, self.delta)?;
        let rights =
            store.increment(&self.query(scope, Column::Right), Column::Right, self.delta)?;

        debug!(
            boundary = self.boundary,
            upper = ?self.upper,
            delta = self.delta,
            tree = ?scope.tree_id,
            lefts,
            rights,
            "shifted range"
        );
        Ok(ShiftOutcome { lefts, rights })
    }
}

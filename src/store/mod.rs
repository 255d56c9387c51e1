//! Record store interface
//!
//! The tree never owns node data. Every read, bulk update and delete is a
//! filtered statement against a `RecordStore`:
//! - `Query`: conjunction of column conditions plus optional ordering
//! - `increment`: bulk `column += delta` (the primitive under range shifts)
//! - `begin`/`commit`/`rollback`: atomic multi-statement boundary
//!
//! `MemoryStore` is the reference backend (snapshot transactions).

mod memory;
mod record;

pub use memory::MemoryStore;
pub use record::{Node, RecordId, TreeRecord};

use std::fmt;

use thiserror::Error;

use crate::config::{Column, TreeId};

/// Errors reported by a record store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Save would duplicate a unique key
    #[error("unique constraint violated on {column:?} = {value}")]
    UniqueViolation {
        /// Column of the violated key
        column: Column,
        /// Conflicting value
        value: i64,
    },

    /// Record does not exist (anymore)
    #[error("record {0} not found")]
    NotFound(RecordId),

    /// Transaction boundary misuse or abort
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Any other backend failure (I/O, connectivity)
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Uniqueness conflicts are the only storage errors worth retrying
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }
}

/// Comparison operator of a filter condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// `=`
    Eq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Op {
    /// Evaluate `lhs op rhs`
    #[inline]
    pub fn matches(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Op::Eq => lhs == rhs,
            Op::Lt => lhs < rhs,
            Op::Le => lhs <= rhs,
            Op::Gt => lhs > rhs,
            Op::Ge => lhs >= rhs,
        }
    }

    /// SQL spelling
    pub fn as_sql(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Smallest first
    Asc,
    /// Largest first
    Desc,
}

/// Single `column op value` filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Condition {
    /// Filtered column
    pub column: Column,
    /// Operator
    pub op: Op,
    /// Right-hand side
    pub value: i64,
}

impl Condition {
    /// Rows with no value in the column never match
    pub fn matches<R: TreeRecord>(&self, record: &R) -> bool {
        record
            .column(self.column)
            .map_or(false, |lhs| self.op.matches(lhs, self.value))
    }
}

/// Filter + ordering for find/count/delete/increment statements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    conditions: Vec<Condition>,
    order: Option<(Column, Direction)>,
}

impl Query {
    /// Query matching every row
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `column op value`
    pub fn filter(mut self, column: Column, op: Op, value: i64) -> Self {
        self.conditions.push(Condition { column, op, value });
        self
    }

    /// Add `column = value`
    pub fn filter_eq(self, column: Column, value: i64) -> Self {
        self.filter(column, Op::Eq, value)
    }

    /// Order results by a column
    pub fn order_by(mut self, column: Column, direction: Direction) -> Self {
        self.order = Some((column, direction));
        self
    }

    /// Conditions (all must hold)
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Requested ordering
    pub fn order(&self) -> Option<(Column, Direction)> {
        self.order
    }

    /// Evaluate the conjunction against a record
    pub fn matches<R: TreeRecord>(&self, record: &R) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conditions.is_empty() {
            write!(f, "(all)")?;
        }
        for (i, c) in self.conditions.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{:?} {} {}", c.column, c.op.as_sql(), c.value)?;
        }
        if let Some((column, direction)) = self.order {
            write!(f, " ORDER BY {column:?} {direction:?}")?;
        }
        Ok(())
    }
}

/// Set of rows forming one tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Scope {
    /// Partition filter (`None` = whole table)
    pub tree_id: Option<TreeId>,
}

impl Scope {
    /// Every row of the table (single-tree mode)
    pub fn whole_table() -> Self {
        Self { tree_id: None }
    }

    /// Rows of one partition
    pub fn tree(tree_id: TreeId) -> Self {
        Self {
            tree_id: Some(tree_id),
        }
    }

    /// Base query restricted to this scope
    pub fn query(&self) -> Query {
        match self.tree_id {
            Some(tree_id) => Query::new().filter_eq(Column::Tree, tree_id),
            None => Query::new(),
        }
    }
}

/// Persistent storage of tree rows
///
/// Statements between `begin` and `commit` apply atomically; `rollback`
/// discards all of them. Filters are evaluated against row values as they
/// were before the statement (SQL `UPDATE ... WHERE` semantics).
pub trait RecordStore<R: TreeRecord> {
    /// All rows matching the query, in the requested order
    fn find_all(&self, query: &Query) -> Result<Vec<R>, StoreError>;

    /// First row matching the query
    fn find_one(&self, query: &Query) -> Result<Option<R>, StoreError> {
        Ok(self.find_all(query)?.into_iter().next())
    }

    /// Number of matching rows
    fn count(&self, query: &Query) -> Result<u64, StoreError> {
        Ok(self.find_all(query)?.len() as u64)
    }

    /// Row by identity
    fn fetch(&self, id: RecordId) -> Result<Option<R>, StoreError>;

    /// Largest value stored in a column
    fn max(&self, column: Column) -> Result<Option<i64>, StoreError>;

    /// Insert (assigning an id) or update a row
    fn save(&mut self, record: &mut R) -> Result<(), StoreError>;

    /// Remove one row
    fn delete_record(&mut self, record: &R) -> Result<(), StoreError>;

    /// Remove every matching row, returning the count
    fn delete_where(&mut self, query: &Query) -> Result<u64, StoreError>;

    /// `column += delta` on every matching row, returning the count
    fn increment(&mut self, query: &Query, column: Column, delta: i64)
        -> Result<u64, StoreError>;

    /// Open a transaction
    fn begin(&mut self) -> Result<(), StoreError>;

    /// Make the open transaction durable
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Discard the open transaction
    fn rollback(&mut self) -> Result<(), StoreError>;

    /// A transaction is open
    fn in_transaction(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;

    fn row(left: i64, right: i64, tree: Option<TreeId>) -> Node {
        let mut node = Node::new("row");
        node.set_interval(Interval::new(left, right));
        node.tree_id = tree;
        node
    }

    #[test]
    fn test_query_conjunction() {
        let query = Query::new()
            .filter(Column::Left, Op::Lt, 4)
            .filter(Column::Right, Op::Gt, 5);
        assert!(query.matches(&row(1, 8, None)));
        assert!(!query.matches(&row(4, 5, None)));
        assert!(!query.matches(&row(2, 3, None)));
    }

    #[test]
    fn test_missing_column_never_matches() {
        let query = Scope::tree(2).query();
        assert!(!query.matches(&row(1, 2, None)));
        assert!(query.matches(&row(1, 2, Some(2))));
        assert!(Scope::whole_table().query().matches(&row(1, 2, None)));
    }

    #[test]
    fn test_query_display() {
        let query = Scope::tree(3)
            .query()
            .filter(Column::Left, Op::Ge, 4)
            .order_by(Column::Right, Direction::Asc);
        assert_eq!(query.to_string(), "Tree = 3 AND Left >= 4 ORDER BY Right Asc");
        assert_eq!(Query::new().to_string(), "(all)");
    }

    #[test]
    fn test_unique_violation_classification() {
        assert!(StoreError::UniqueViolation {
            column: Column::Tree,
            value: 1
        }
        .is_unique_violation());
        assert!(!StoreError::Backend("timeout".into()).is_unique_violation());
    }
}

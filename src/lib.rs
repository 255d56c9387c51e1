//! # Nested-set trees over a record store
//!
//! This library maintains a hierarchy stored in a flat table using the
//! nested-set model: every node carries an interval `[left, right]` and the
//! descendants of a node are exactly the nodes whose intervals lie strictly
//! inside its own.
//!
//! ## Core Algorithm
//!
//! 1. **Interval algebra**: ancestry, depth and child counts are range predicates
//! 2. **Range shifting**: every structural change is a bulk `+delta` on the
//!    left column and, independently, on the right column
//! 3. **Subtree relocation**: park the moved block below 1, close its old gap,
//!    open a gap at the target, re-place the block
//! 4. **Transactions**: each mutation runs inside one store transaction
//!
//! Invariant: the endpoints of a tree with `n` nodes are exactly `{1, …, 2n}`.
//!
//! ## Usage Example
//!
//! ```
//! use nestedset::{MemoryStore, NestedSet, Node, TreeConfig};
//!
//! let mut tree = NestedSet::new(MemoryStore::new(), TreeConfig::default())?;
//! let root = tree.new_root(Node::new("root"))?;
//! let child = tree.make_lastchild_of(&Node::new("child"), &root)?;
//!
//! let root = tree.get_root()?.expect("root exists");
//! assert_eq!((root.left, root.right), (Some(1), Some(4)));
//! assert_eq!(tree.get_parent(&child)?.map(|p| p.id), Some(root.id));
//! # Ok::<(), nestedset::TreeError>(())
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod config; // Column map and retry policy
pub mod interval; // Pure interval algebra
pub mod shift; // Bulk left/right renumbering
pub mod store; // Record store interface and in-memory backend
pub mod tree; // Navigator, mutator and relocator

// Re-exports for convenience
pub use config::{Column, RetryPolicy, TreeConfig, TreeConfigBuilder, TreeId};
pub use interval::Interval;
pub use shift::{RangeShift, ShiftOutcome};
pub use store::{
    Condition, Direction, MemoryStore, Node, Op, Query, RecordId, RecordStore, Scope, StoreError,
    TreeRecord,
};
pub use tree::{relocate, NestedSet, Placement};

use thiserror::Error;

/// Result alias for tree operations
pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors that can occur while reading or restructuring a tree
#[derive(Error, Debug)]
pub enum TreeError {
    /// Input node is not a valid tree node (new, missing or malformed interval, bad tree id)
    #[error("invalid tree node: {0}")]
    InvalidNode(String),

    /// Requested change would break the tree shape
    #[error("structural conflict: {0}")]
    StructuralConflict(String),

    /// Configuration rejected or insufficient for the operation
    #[error("invalid tree configuration: {0}")]
    InvalidConfiguration(String),

    /// Stored intervals violate the nested-set invariants
    #[error("tree corruption: {0}")]
    Corrupted(String),

    /// Record store failure; the surrounding transaction has been rolled back
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    /// Tree id allocation kept colliding past the retry bound
    #[error("tree id allocation failed after {attempts} attempts: {source}")]
    RetryExhausted {
        /// Number of save attempts made
        attempts: u32,
        /// Last uniqueness conflict reported by the store
        #[source]
        source: StoreError,
    },
}

impl TreeError {
    /// Validation failures and structural conflicts leave the tree untouched and
    /// may be retried with different arguments.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TreeError::InvalidNode(_) | TreeError::StructuralConflict(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(TreeError::InvalidNode("new record".into()).is_recoverable());
        assert!(TreeError::StructuralConflict("into own subtree".into()).is_recoverable());
        assert!(!TreeError::Storage(StoreError::Backend("disk".into())).is_recoverable());
        assert!(!TreeError::RetryExhausted {
            attempts: 5,
            source: StoreError::UniqueViolation {
                column: Column::Tree,
                value: 3,
            },
        }
        .is_recoverable());
    }

    #[test]
    fn test_store_error_converts() {
        let err: TreeError = StoreError::NotFound(7).into();
        assert!(matches!(err, TreeError::Storage(StoreError::NotFound(7))));
        assert_eq!(err.to_string(), "storage failure: record 7 not found");
    }
}

//! In-memory record store
//!
//! Rows live in a `BTreeMap` keyed by id. A transaction keeps a full
//! snapshot of the table; rollback restores it, commit drops it.
//! Unique key: (tree, left), checked on `save`.

use std::collections::BTreeMap;

use tracing::trace;

use super::{Direction, Query, RecordId, RecordStore, StoreError, TreeRecord};
use crate::config::Column;

#[derive(Debug, Clone)]
struct Snapshot<R> {
    rows: BTreeMap<RecordId, R>,
    next_id: RecordId,
}

/// Table of tree rows held in memory
#[derive(Debug, Clone)]
pub struct MemoryStore<R> {
    rows: BTreeMap<RecordId, R>,
    next_id: RecordId,
    snapshot: Option<Snapshot<R>>,
}

impl<R: TreeRecord> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: TreeRecord> MemoryStore<R> {
    /// Create empty store
    pub fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
            snapshot: None,
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// No rows stored
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in id order
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.rows.values()
    }

    fn check_unique(&self, record: &R) -> Result<(), StoreError> {
        let Some(left) = record.left() else {
            return Ok(());
        };
        let clash = self.rows.values().any(|other| {
            other.id() != record.id()
                && other.left() == Some(left)
                && other.tree_id() == record.tree_id()
        });
        if !clash {
            return Ok(());
        }
        Err(match record.tree_id() {
            Some(tree_id) => StoreError::UniqueViolation {
                column: Column::Tree,
                value: tree_id,
            },
            None => StoreError::UniqueViolation {
                column: Column::Left,
                value: left,
            },
        })
    }

    fn matching_ids(&self, query: &Query) -> Vec<RecordId> {
        self.rows
            .iter()
            .filter(|(_, row)| query.matches(*row))
            .map(|(id, _)| *id)
            .collect()
    }
}

impl<R: TreeRecord> RecordStore<R> for MemoryStore<R> {
    fn find_all(&self, query: &Query) -> Result<Vec<R>, StoreError> {
        let mut found: Vec<R> = self
            .rows
            .values()
            .filter(|row| query.matches(*row))
            .cloned()
            .collect();

        // Stable sort keeps id order among equal keys; rows missing the
        // column sort first, like NULLs in ascending SQL order.
        if let Some((column, direction)) = query.order() {
            found.sort_by(|a, b| {
                let ordering = a.column(column).cmp(&b.column(column));
                match direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }

        trace!(%query, rows = found.len(), "find");
        Ok(found)
    }

    fn count(&self, query: &Query) -> Result<u64, StoreError> {
        Ok(self.rows.values().filter(|row| query.matches(*row)).count() as u64)
    }

    fn fetch(&self, id: RecordId) -> Result<Option<R>, StoreError> {
        Ok(self.rows.get(&id).cloned())
    }

    fn max(&self, column: Column) -> Result<Option<i64>, StoreError> {
        Ok(self.rows.values().filter_map(|row| row.column(column)).max())
    }

    fn save(&mut self, record: &mut R) -> Result<(), StoreError> {
        match record.id() {
            Some(id) if !self.rows.contains_key(&id) => return Err(StoreError::NotFound(id)),
            Some(_) => self.check_unique(record)?,
            None => {
                self.check_unique(record)?;
                record.set_id(Some(self.next_id));
                self.next_id += 1;
            }
        }

        if let Some(id) = record.id() {
            self.rows.insert(id, record.clone());
        }
        Ok(())
    }

    fn delete_record(&mut self, record: &R) -> Result<(), StoreError> {
        let id = record
            .id()
            .ok_or_else(|| StoreError::Backend("cannot delete an unsaved record".to_string()))?;
        self.rows
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    fn delete_where(&mut self, query: &Query) -> Result<u64, StoreError> {
        let ids = self.matching_ids(query);
        for id in &ids {
            self.rows.remove(id);
        }
        Ok(ids.len() as u64)
    }

    fn increment(
        &mut self,
        query: &Query,
        column: Column,
        delta: i64,
    ) -> Result<u64, StoreError> {
        // Select first, then update: the filter sees pre-statement values.
        let ids = self.matching_ids(query);
        for id in &ids {
            if let Some(row) = self.rows.get_mut(id) {
                if let Some(value) = row.column(column) {
                    row.set_column(column, value + delta);
                }
            }
        }
        Ok(ids.len() as u64)
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        if self.snapshot.is_some() {
            return Err(StoreError::Transaction(
                "transaction already in progress".to_string(),
            ));
        }
        self.snapshot = Some(Snapshot {
            rows: self.rows.clone(),
            next_id: self.next_id,
        });
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        match self.snapshot.take() {
            Some(_) => Ok(()),
            None => Err(StoreError::Transaction(
                "no transaction in progress".to_string(),
            )),
        }
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        // Rollback on idle is a no-op
        if let Some(snapshot) = self.snapshot.take() {
            self.rows = snapshot.rows;
            self.next_id = snapshot.next_id;
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }
}

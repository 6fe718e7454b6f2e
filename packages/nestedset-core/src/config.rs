use crate::error::{Error, Result};
use crate::prune::Disposal;
use crate::retry::RetryPolicy;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Storage naming for adapters that map rows onto a table. Resolved once when the store
/// is constructed; engines never look column names up per call.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Columns {
    pub table: String,
    pub primary: String,
    pub parent: String,
    pub left: String,
    pub right: String,
    pub depth: String,
    /// Column holding the encoded scope tuple.
    pub scope: String,
    /// Optional host column siblings and roots are sorted by (see `RowOrder::OrderColumn`).
    pub order: Option<String>,
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            table: "nested_set_nodes".into(),
            primary: "id".into(),
            parent: "parent_id".into(),
            left: "lft".into(),
            right: "rgt".into(),
            depth: "depth".into(),
            scope: "scope_key".into(),
            order: None,
        }
    }
}

impl Columns {
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_order(mut self, column: impl Into<String>) -> Self {
        self.order = Some(column.into());
        self
    }

    /// Column names callers may never write directly.
    pub fn reserved(&self) -> [&str; 3] {
        [&self.left, &self.right, &self.depth]
    }

    /// Rejects direct writes to the structure columns.
    pub fn ensure_assignable(&self, column: &str) -> Result<()> {
        if self.reserved().contains(&column) {
            return Err(Error::ReservedFieldAssignment(column.to_string()));
        }
        Ok(())
    }
}

/// Sort order applied to siblings and roots by rebuild, validation and child listings.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RowOrder {
    /// `left, right, id` with null bounds first. Falls back to primary key order once
    /// bounds have been cleared.
    #[default]
    Bounds,
    /// The store's configured order column, then primary key.
    OrderColumn,
}

/// Behavior knobs for the engines, passed explicitly to every engine call.
#[derive(Clone, Debug)]
pub struct NestedSetConfig {
    /// Disposal applied to descendants when a node is pruned.
    pub dependent: Disposal,
    pub order: RowOrder,
    /// Maintain the cached `depth` column on moves.
    pub track_depth: bool,
    pub retry: RetryPolicy,
}

impl Default for NestedSetConfig {
    fn default() -> Self {
        Self {
            dependent: Disposal::DeleteAll,
            order: RowOrder::Bounds,
            track_depth: true,
            retry: RetryPolicy::default(),
        }
    }
}

//! Structural checks over the rows of one scope.
//!
//! Each predicate is a pure function over a row slice so adapters and tests can run them
//! on rows from any source. A failed check is data, not an error.

use std::collections::{HashMap, HashSet};

use crate::bounds::NodeRow;
use crate::config::NestedSetConfig;
use crate::error::Result;
use crate::ids::{NodeId, Scope};
use crate::traits::{Filter, NodeStore};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ValidationReport {
    pub scope: Scope,
    pub null_bounds: Vec<NodeId>,
    pub inverted_bounds: Vec<NodeId>,
    pub escaped_parent: Vec<NodeId>,
    pub duplicate_bounds: Vec<(NodeId, NodeId)>,
    pub unordered_roots: Vec<NodeId>,
    pub overlapping: Vec<(NodeId, NodeId)>,
    /// Parent pointer to a row that does not exist in the scope. Reported, never fatal.
    pub orphans: Vec<NodeId>,
}

impl ValidationReport {
    pub fn from_rows(scope: Scope, rows: &[NodeRow]) -> Self {
        Self {
            scope,
            null_bounds: null_bounds(rows),
            inverted_bounds: inverted_bounds(rows),
            escaped_parent: escaped_parent(rows),
            duplicate_bounds: duplicate_bounds(rows),
            unordered_roots: unordered_roots(rows),
            overlapping: overlapping(rows),
            orphans: orphans(rows),
        }
    }

    pub fn left_and_rights_valid(&self) -> bool {
        self.null_bounds.is_empty()
            && self.inverted_bounds.is_empty()
            && self.escaped_parent.is_empty()
    }

    pub fn no_duplicates_for_columns(&self) -> bool {
        self.duplicate_bounds.is_empty()
    }

    pub fn all_roots_valid(&self) -> bool {
        self.unordered_roots.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.left_and_rights_valid()
            && self.no_duplicates_for_columns()
            && self.all_roots_valid()
            && self.overlapping.is_empty()
    }
}

/// Read the scope in the configured order and run every check.
pub fn validate_scope<S: NodeStore>(
    store: &S,
    config: &NestedSetConfig,
    scope: &Scope,
) -> Result<ValidationReport> {
    let rows = store.read(scope, &Filter::all(), config.order)?;
    Ok(ValidationReport::from_rows(scope.clone(), &rows))
}

pub fn null_bounds(rows: &[NodeRow]) -> Vec<NodeId> {
    rows.iter()
        .filter(|row| row.left.is_none() || row.right.is_none())
        .map(|row| row.id)
        .collect()
}

pub fn inverted_bounds(rows: &[NodeRow]) -> Vec<NodeId> {
    rows.iter()
        .filter(|row| matches!(row.try_bounds(), Some(b) if b.left >= b.right))
        .map(|row| row.id)
        .collect()
}

/// Rows whose interval is not strictly inside their parent's.
pub fn escaped_parent(rows: &[NodeRow]) -> Vec<NodeId> {
    let by_id: HashMap<NodeId, &NodeRow> = rows.iter().map(|row| (row.id, row)).collect();
    rows.iter()
        .filter(|row| {
            let Some(parent) = row.parent.and_then(|p| by_id.get(&p)) else {
                return false;
            };
            match (row.try_bounds(), parent.try_bounds()) {
                (Some(own), Some(outer)) => own.left <= outer.left || own.right >= outer.right,
                _ => false,
            }
        })
        .map(|row| row.id)
        .collect()
}

/// Pairs of rows sharing the same `(left, right)`; each pair names the first holder.
pub fn duplicate_bounds(rows: &[NodeRow]) -> Vec<(NodeId, NodeId)> {
    let mut seen: HashMap<(i64, i64), NodeId> = HashMap::new();
    let mut dupes = Vec::new();
    for row in rows {
        let Some(bounds) = row.try_bounds() else {
            continue;
        };
        match seen.get(&(bounds.left, bounds.right)) {
            Some(first) => dupes.push((*first, row.id)),
            None => {
                seen.insert((bounds.left, bounds.right), row.id);
            }
        }
    }
    dupes
}

/// Roots, in the order given, must have strictly increasing `left` and `right`.
pub fn unordered_roots(rows: &[NodeRow]) -> Vec<NodeId> {
    let mut bad = Vec::new();
    let mut last: Option<(i64, i64)> = None;
    for root in rows.iter().filter(|row| row.is_root()) {
        let Some(bounds) = root.try_bounds() else {
            continue;
        };
        if let Some((left, right)) = last {
            if bounds.left <= left || bounds.right <= right {
                bad.push(root.id);
            }
        }
        last = Some((bounds.left, bounds.right));
    }
    bad
}

/// Pairs of intervals that overlap without one nesting inside the other.
pub fn overlapping(rows: &[NodeRow]) -> Vec<(NodeId, NodeId)> {
    let mut sorted: Vec<_> = rows
        .iter()
        .filter_map(|row| row.try_bounds().filter(|b| b.left < b.right).map(|b| (b, row.id)))
        .collect();
    sorted.sort_by_key(|(b, id)| (b.left, std::cmp::Reverse(b.right), *id));

    let mut open: Vec<(i64, NodeId)> = Vec::new();
    let mut pairs = Vec::new();
    for (bounds, id) in sorted {
        while matches!(open.last(), Some((right, _)) if *right < bounds.left) {
            open.pop();
        }
        if let Some(&(right, outer)) = open.last() {
            if bounds.right > right {
                pairs.push((outer, id));
                continue;
            }
        }
        open.push((bounds.right, id));
    }
    pairs
}

pub fn orphans(rows: &[NodeRow]) -> Vec<NodeId> {
    let present: HashSet<NodeId> = rows.iter().map(|row| row.id).collect();
    rows.iter()
        .filter(|row| matches!(row.parent, Some(p) if !present.contains(&p)))
        .map(|row| row.id)
        .collect()
}

use std::collections::HashSet;

use tracing::debug;

use crate::config::RowOrder;
use crate::error::{Error, Result};
use crate::ids::{NodeId, Scope};
use crate::rebuild::rebuild_rows;
use crate::traits::{Change, Field, Filter, Mutation, NodeStore};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What happens to a pruned node's descendants.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Disposal {
    /// Remove every descendant in one statement.
    #[default]
    DeleteAll,
    /// Remove descendants one by one, children before parents.
    Destroy,
    /// Keep descendants as roots of the scope.
    Nullify,
    /// Refuse to prune a node that has descendants (`Error::RestrictedDeletion`).
    Restrict,
    /// Refuse to prune a node that has descendants, reported as an outcome.
    RestrictWithError,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PruneOutcome {
    /// The node no longer exists, typically because an ancestor was pruned first.
    AlreadyGone,
    Pruned {
        /// Deleted rows in deletion order; the pruned node comes last.
        removed: Vec<NodeId>,
        /// Descendants turned into roots by `Disposal::Nullify`.
        detached: Vec<NodeId>,
    },
    Restricted {
        node: NodeId,
    },
}

/// Remove `node_id` and dispose of its descendants, then close the gap it leaves so the
/// intervals to its right stay contiguous.
pub fn prune<S: NodeStore>(
    store: &mut S,
    node_id: NodeId,
    disposal: Disposal,
) -> Result<PruneOutcome> {
    let Some(node) = store.get(node_id)? else {
        debug!(node = %node_id, "prune target already gone");
        return Ok(PruneOutcome::AlreadyGone);
    };
    let scope = node.scope.clone();

    let Some(bounds) = node.try_bounds() else {
        return prune_unplaced(store, node_id, &scope, disposal);
    };

    let descendants: Vec<NodeId> = store
        .read(&scope, &Filter::inside(bounds), RowOrder::Bounds)?
        .into_iter()
        .map(|row| row.id)
        .collect();

    if !descendants.is_empty() {
        match disposal {
            Disposal::Restrict => return Err(Error::RestrictedDeletion(node_id)),
            Disposal::RestrictWithError => return Ok(PruneOutcome::Restricted { node: node_id }),
            _ => {}
        }
    }

    if disposal == Disposal::Nullify {
        store.apply_batch(&[
            Mutation::update(&scope, Filter::inside(bounds), vec![Change::SetParent(None)]),
            Mutation::delete(&scope, Filter::id(node_id)),
        ])?;
        // the detached rows still carry the pruned interval; renumber the scope
        rebuild_rows(store, RowOrder::Bounds, &scope, None)?;
        debug!(node = %node_id, detached = descendants.len(), "pruned node, kept descendants");
        return Ok(PruneOutcome::Pruned {
            removed: vec![node_id],
            detached: descendants,
        });
    }

    let mut removed = Vec::with_capacity(descendants.len() + 1);
    let mut batch = Vec::new();
    match disposal {
        Disposal::Destroy => {
            // post-order is ascending `right`
            let mut ordered = store.read(&scope, &Filter::inside(bounds), RowOrder::Bounds)?;
            ordered.sort_by_key(|row| (row.right, row.id));
            for row in ordered {
                batch.push(Mutation::delete(&scope, Filter::id(row.id)));
                removed.push(row.id);
            }
        }
        _ => {
            if !descendants.is_empty() {
                batch.push(Mutation::delete(&scope, Filter::inside(bounds)));
                removed.extend(descendants.iter().copied());
            }
        }
    }

    let width = bounds.width();
    batch.push(Mutation::delete(&scope, Filter::id(node_id)));
    batch.push(Mutation::shift(
        &scope,
        Filter::all().gt(Field::Left, bounds.right),
        Field::Left,
        -width,
    ));
    batch.push(Mutation::shift(
        &scope,
        Filter::all().gt(Field::Right, bounds.right),
        Field::Right,
        -width,
    ));
    store.apply_batch(&batch)?;
    removed.push(node_id);

    debug!(node = %node_id, removed = removed.len(), width, "pruned subtree");
    Ok(PruneOutcome::Pruned {
        removed,
        detached: Vec::new(),
    })
}

/// Descendants reached through parent pointers, breadth-first. Used when the pruned
/// node has no interval to range over.
fn descendants_by_parent<S: NodeStore>(
    store: &S,
    scope: &Scope,
    node_id: NodeId,
) -> Result<Vec<NodeId>> {
    let mut seen = HashSet::from([node_id]);
    let mut found = Vec::new();
    let mut next = 0;
    let mut current = node_id;
    loop {
        for child in store.read(scope, &Filter::parent(Some(current)), RowOrder::Bounds)? {
            if seen.insert(child.id) {
                found.push(child.id);
            }
        }
        let Some(id) = found.get(next) else {
            return Ok(found);
        };
        current = *id;
        next += 1;
    }
}

/// Prune a row whose bounds are null. There is no gap to close, so the disposal is
/// applied to the subtree found through parent pointers.
fn prune_unplaced<S: NodeStore>(
    store: &mut S,
    node_id: NodeId,
    scope: &Scope,
    disposal: Disposal,
) -> Result<PruneOutcome> {
    let descendants = descendants_by_parent(store, scope, node_id)?;
    if !descendants.is_empty() {
        match disposal {
            Disposal::Restrict => return Err(Error::RestrictedDeletion(node_id)),
            Disposal::RestrictWithError => return Ok(PruneOutcome::Restricted { node: node_id }),
            _ => {}
        }
    }

    let mut batch = Vec::with_capacity(descendants.len() + 1);
    let mut removed = Vec::with_capacity(descendants.len() + 1);
    let mut detached = Vec::new();
    match disposal {
        Disposal::Nullify => {
            for id in &descendants {
                batch.push(Mutation::update(
                    scope,
                    Filter::id(*id),
                    vec![Change::SetParent(None)],
                ));
            }
            detached = descendants;
        }
        _ => {
            // breadth-first reversed puts every descendant before its ancestors
            for id in descendants.iter().rev() {
                batch.push(Mutation::delete(scope, Filter::id(*id)));
                removed.push(*id);
            }
        }
    }
    batch.push(Mutation::delete(scope, Filter::id(node_id)));
    removed.push(node_id);
    store.apply_batch(&batch)?;

    if !detached.is_empty() {
        rebuild_rows(store, RowOrder::Bounds, scope, None)?;
    }
    debug!(
        node = %node_id,
        removed = removed.len(),
        detached = detached.len(),
        "pruned unplaced node"
    );
    Ok(PruneOutcome::Pruned { removed, detached })
}

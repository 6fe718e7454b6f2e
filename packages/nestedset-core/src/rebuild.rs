use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::bounds::NodeRow;
use crate::config::{NestedSetConfig, RowOrder};
use crate::error::Result;
use crate::ids::{NodeId, Scope};
use crate::traits::{Change, Filter, Mutation, NodeStore};

/// Per-row check run by `rebuild_scope` before write-back.
pub type NodeCheck<'a> = &'a dyn Fn(&NodeRow) -> Result<()>;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RebuildSummary {
    pub scope: Scope,
    /// Rows reached from a root and renumbered.
    pub visited: usize,
    /// Rows whose stored bounds or depth actually changed.
    pub updated: usize,
    /// Rows not reachable from any root (dangling parent or cycle); left untouched.
    pub unreached: usize,
}

enum Step {
    Enter(NodeId, i64),
    Exit(NodeId),
}

/// Renumber every interval of `scope` from parent pointers alone.
pub fn rebuild_scope<S: NodeStore>(
    store: &mut S,
    config: &NestedSetConfig,
    scope: &Scope,
    node_check: Option<NodeCheck<'_>>,
) -> Result<RebuildSummary> {
    rebuild_rows(store, config.order, scope, node_check)
}

pub(crate) fn rebuild_rows<S: NodeStore>(
    store: &mut S,
    order: RowOrder,
    scope: &Scope,
    node_check: Option<NodeCheck<'_>>,
) -> Result<RebuildSummary> {
    let rows = store.read(scope, &Filter::all(), order)?;
    let present: HashSet<NodeId> = rows.iter().map(|row| row.id).collect();

    // children lists inherit the read order
    let mut roots = Vec::new();
    let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for row in &rows {
        match row.parent {
            None => roots.push(row.id),
            Some(parent) if present.contains(&parent) => {
                children.entry(parent).or_default().push(row.id)
            }
            Some(_) => {}
        }
    }

    let mut stack: Vec<Step> = roots.iter().rev().map(|id| Step::Enter(*id, 0)).collect();
    let mut assigned: HashMap<NodeId, (i64, i64, i64)> = HashMap::with_capacity(rows.len());
    let mut counter = 0i64;
    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(id, depth) => {
                counter += 1;
                assigned.insert(id, (counter, 0, depth));
                stack.push(Step::Exit(id));
                if let Some(kids) = children.get(&id) {
                    stack.extend(kids.iter().rev().map(|kid| Step::Enter(*kid, depth + 1)));
                }
            }
            Step::Exit(id) => {
                counter += 1;
                if let Some(slot) = assigned.get_mut(&id) {
                    slot.1 = counter;
                }
            }
        }
    }

    let mut batch = Vec::new();
    for row in &rows {
        let Some(&(left, right, depth)) = assigned.get(&row.id) else {
            continue;
        };
        if row.left == Some(left) && row.right == Some(right) && row.depth == depth {
            continue;
        }
        if let Some(check) = node_check {
            let mut rewritten = row.clone();
            rewritten.left = Some(left);
            rewritten.right = Some(right);
            rewritten.depth = depth;
            check(&rewritten)?;
        }
        batch.push(Mutation::update(
            scope,
            Filter::id(row.id),
            vec![
                Change::SetLeft(Some(left)),
                Change::SetRight(Some(right)),
                Change::SetDepth(depth),
            ],
        ));
    }

    let summary = RebuildSummary {
        scope: scope.clone(),
        visited: assigned.len(),
        updated: batch.len(),
        unreached: rows.len() - assigned.len(),
    };
    store.apply_batch(&batch)?;

    if summary.unreached > 0 {
        warn!(
            scope = ?scope,
            unreached = summary.unreached,
            "rebuild skipped rows not reachable from a root"
        );
    }
    debug!(scope = ?scope, visited = summary.visited, updated = summary.updated, "rebuilt scope");
    Ok(summary)
}

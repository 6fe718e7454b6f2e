//! Relocating a node, together with its subtree, to a new position in its scope.
//!
//! A move is one batch of range-conditioned increments: open a gap at the insertion
//! point, shift the subtree into it, close the gap it left behind, and repoint the moved
//! node's parent. Depth is cascaded afterwards.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::bounds::{difference, offset, Bounds, NodeRow};
use crate::config::NestedSetConfig;
use crate::error::{Error, Result};
use crate::ids::{NodeId, Scope};
use crate::traits::{Change, Field, Filter, Mutation, NodeStore};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Where the moved node lands relative to the target.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Position {
    /// Last child of the target.
    Child,
    /// Immediate left sibling of the target.
    Left,
    /// Immediate right sibling of the target.
    Right,
    /// New last root of the scope; the target is ignored.
    Root,
}

impl FromStr for Position {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "child" => Ok(Position::Child),
            "left" => Ok(Position::Left),
            "right" => Ok(Position::Right),
            "root" => Ok(Position::Root),
            other => Err(Error::InvalidPosition(other.to_string())),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Position::Child => "child",
            Position::Left => "left",
            Position::Right => "right",
            Position::Root => "root",
        };
        f.write_str(name)
    }
}

/// What a `MoveGuard` gets to inspect before anything is written.
#[derive(Debug)]
pub struct MoveRequest<'a> {
    pub node: &'a NodeRow,
    pub target: &'a NodeRow,
    pub position: Position,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MoveDecision {
    Allow,
    Deny,
}

/// Caller-supplied veto consulted inside the move's transaction.
pub trait MoveGuard {
    fn check(&self, request: &MoveRequest<'_>) -> MoveDecision;
}

impl<F> MoveGuard for F
where
    F: Fn(&MoveRequest<'_>) -> MoveDecision,
{
    fn check(&self, request: &MoveRequest<'_>) -> MoveDecision {
        self(request)
    }
}

/// Permits every move.
pub struct AllowAllMoves;

impl MoveGuard for AllowAllMoves {
    fn check(&self, _request: &MoveRequest<'_>) -> MoveDecision {
        MoveDecision::Allow
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MoveOutcome {
    Moved,
    /// The node already sits at the requested position; nothing was written.
    Unchanged,
    /// The guard denied the move; nothing was written.
    Vetoed,
}

/// Whether `node` may be placed next to or under `target`: not itself, same scope, and
/// the target is not inside the node's own subtree.
pub fn move_possible(node: &NodeRow, target: &NodeRow) -> Result<bool> {
    if node.id == target.id || node.scope != target.scope {
        return Ok(false);
    }
    let own = node.bounds()?;
    let other = target.bounds()?;
    Ok(!own.covers(other.left) && !own.covers(other.right))
}

/// Interval rewrite for one move, computed from freshly loaded rows.
#[derive(Clone, Debug)]
pub(crate) struct MovePlan {
    scope: Scope,
    node: NodeId,
    bounds: Bounds,
    bound: i64,
    new_parent: Option<NodeId>,
}

impl MovePlan {
    /// `None` when the node already occupies the insertion edge.
    pub(crate) fn new(
        node: &NodeRow,
        target: &NodeRow,
        position: Position,
        rightmost: i64,
    ) -> Result<Option<Self>> {
        let bounds = node.bounds()?;
        let (bound, new_parent) = match position {
            Position::Child => (target.bounds()?.right, Some(target.id)),
            Position::Left => (target.bounds()?.left, target.parent),
            Position::Right => (offset(target.bounds()?.right, 1)?, target.parent),
            Position::Root => (offset(rightmost, 1)?, None),
        };

        let edge = if bound > bounds.right { bound - 1 } else { bound };
        if edge == bounds.left || edge == bounds.right {
            return Ok(None);
        }

        Ok(Some(Self {
            scope: node.scope.clone(),
            node: node.id,
            bounds,
            bound,
            new_parent,
        }))
    }

    pub(crate) fn mutations(&self) -> Result<Vec<Mutation>> {
        let scope = &self.scope;
        let width = self.bounds.width();
        let mut distance = difference(self.bound, self.bounds.left)?;
        let mut left_edge = self.bounds.left;
        // moving backwards: the subtree itself was pushed right by the allocation
        if distance < 0 {
            distance = difference(distance, width)?;
            left_edge = offset(left_edge, width)?;
        }
        let right_edge = offset(left_edge, width)?;

        Ok(vec![
            Mutation::shift(scope, Filter::all().ge(Field::Left, self.bound), Field::Left, width),
            Mutation::shift(scope, Filter::all().ge(Field::Right, self.bound), Field::Right, width),
            Mutation::update(
                scope,
                Filter::all()
                    .ge(Field::Left, left_edge)
                    .lt(Field::Right, right_edge),
                vec![
                    Change::Shift(Field::Left, distance),
                    Change::Shift(Field::Right, distance),
                ],
            ),
            Mutation::shift(
                scope,
                Filter::all().gt(Field::Left, self.bounds.right),
                Field::Left,
                -width,
            ),
            Mutation::shift(
                scope,
                Filter::all().gt(Field::Right, self.bounds.right),
                Field::Right,
                -width,
            ),
            Mutation::update(
                scope,
                Filter::id(self.node),
                vec![Change::SetParent(self.new_parent)],
            ),
        ])
    }
}

/// Move `node_id` relative to `target_id`. Must run inside a transaction; the facade
/// wraps it in `in_tenacious_transaction`.
pub fn move_node<S, G>(
    store: &mut S,
    config: &NestedSetConfig,
    node_id: NodeId,
    target_id: NodeId,
    position: Position,
    guard: &G,
) -> Result<MoveOutcome>
where
    S: NodeStore,
    G: MoveGuard + ?Sized,
{
    let node = store.get(node_id)?.ok_or(Error::NodeNotFound(node_id))?;
    let target = match store.get(target_id)? {
        Some(target) => target,
        None if position == Position::Root => node.clone(),
        None => return Err(Error::NodeNotFound(target_id)),
    };

    let request = MoveRequest {
        node: &node,
        target: &target,
        position,
    };
    if guard.check(&request) == MoveDecision::Deny {
        debug!(node = %node_id, %position, "move vetoed");
        return Ok(MoveOutcome::Vetoed);
    }

    if position != Position::Root && !move_possible(&node, &target)? {
        return Err(Error::ImpossibleMove(
            "target node cannot be inside moved tree".into(),
        ));
    }

    let rightmost = match position {
        Position::Root => store.max_right(&node.scope)?.unwrap_or(0),
        _ => 0,
    };
    let Some(plan) = MovePlan::new(&node, &target, position, rightmost)? else {
        debug!(node = %node_id, %position, "node already in place");
        return Ok(MoveOutcome::Unchanged);
    };

    debug!(node = %node_id, target = %target_id, %position, "moving subtree");
    store.apply_batch(&plan.mutations()?)?;

    if config.track_depth {
        cascade_depth(store, node_id)?;
    }
    Ok(MoveOutcome::Moved)
}

/// Recompute a node's depth from its parent and shift all descendants by the same delta.
/// Returns the node's new depth.
pub fn cascade_depth<S: NodeStore>(store: &mut S, node_id: NodeId) -> Result<i64> {
    let node = store.get(node_id)?.ok_or(Error::NodeNotFound(node_id))?;
    let new_depth = match node.parent {
        None => 0,
        Some(parent) => match store.get(parent)? {
            Some(p) if p.scope == node.scope => p.depth + 1,
            // missing intermediate node: fall back to counting enclosing intervals
            _ => level_by_bounds(store, &node)?,
        },
    };

    let diff = new_depth - node.depth;
    if diff == 0 {
        return Ok(new_depth);
    }

    let mut batch = vec![Mutation::update(
        &node.scope,
        Filter::id(node.id),
        vec![Change::SetDepth(new_depth)],
    )];
    if let Some(bounds) = node.try_bounds().filter(|b| !b.is_leaf()) {
        batch.push(Mutation::shift(
            &node.scope,
            Filter::inside(bounds),
            Field::Depth,
            diff,
        ));
    }
    store.apply_batch(&batch)?;
    Ok(new_depth)
}

pub(crate) fn level_by_bounds<S: NodeStore>(store: &S, node: &NodeRow) -> Result<i64> {
    let bounds = node.bounds()?;
    let ancestors = store.read(
        &node.scope,
        &Filter::enclosing(bounds),
        crate::config::RowOrder::Bounds,
    )?;
    Ok(ancestors.len() as i64)
}

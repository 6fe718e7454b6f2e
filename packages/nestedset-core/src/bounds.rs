use crate::error::{Error, Result};
use crate::ids::{NodeId, Scope};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A checked `(left, right)` interval with `left < right`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bounds {
    pub left: i64,
    pub right: i64,
}

impl Bounds {
    pub fn new(left: i64, right: i64) -> Self {
        Self { left, right }
    }

    /// Span consumed by the subtree rooted at this interval.
    pub fn width(&self) -> i64 {
        self.right - self.left + 1
    }

    pub fn is_leaf(&self) -> bool {
        self.right - self.left == 1
    }

    /// Strict nesting: `other` is a descendant interval of `self`.
    pub fn contains(&self, other: &Bounds) -> bool {
        self.left < other.left && other.right < self.right
    }

    /// Whether `position` falls on or inside this interval.
    pub fn covers(&self, position: i64) -> bool {
        self.left <= position && position <= self.right
    }
}

/// `value + delta`, or `InconsistentState` once the interval space is exhausted.
pub(crate) fn offset(value: i64, delta: i64) -> Result<i64> {
    value
        .checked_add(delta)
        .ok_or_else(|| Error::InconsistentState(format!("bound overflow: {value} + {delta}")))
}

/// `value - other`, or `InconsistentState` on overflow.
pub(crate) fn difference(value: i64, other: i64) -> Result<i64> {
    value
        .checked_sub(other)
        .ok_or_else(|| Error::InconsistentState(format!("bound overflow: {value} - {other}")))
}

/// Projection of one stored node: the fields the interval engines read and write.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeRow {
    pub id: NodeId,
    pub scope: Scope,
    pub parent: Option<NodeId>,
    pub left: Option<i64>,
    pub right: Option<i64>,
    pub depth: i64,
}

impl NodeRow {
    /// A root row without bounds yet.
    pub fn new(id: NodeId, scope: Scope) -> Self {
        Self {
            id,
            scope,
            parent: None,
            left: None,
            right: None,
            depth: 0,
        }
    }

    pub fn with_parent(mut self, parent: Option<NodeId>) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.left = Some(bounds.left);
        self.right = Some(bounds.right);
        self
    }

    pub fn with_depth(mut self, depth: i64) -> Self {
        self.depth = depth;
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Bounds when both sides are present, regardless of ordering.
    pub fn try_bounds(&self) -> Option<Bounds> {
        Some(Bounds::new(self.left?, self.right?))
    }

    /// Bounds for engines that cannot operate on a corrupt row.
    pub fn bounds(&self) -> Result<Bounds> {
        match self.try_bounds() {
            Some(b) if b.left < b.right => Ok(b),
            Some(b) => Err(Error::InconsistentState(format!(
                "node {} has inverted bounds [{}, {}]",
                self.id, b.left, b.right
            ))),
            None => Err(Error::InconsistentState(format!(
                "node {} has no bounds; rebuild the scope",
                self.id
            ))),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.try_bounds().map(|b| b.is_leaf()).unwrap_or(false)
    }
}

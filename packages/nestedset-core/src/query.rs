//! Read-only navigation over a stored forest.

use std::fmt::Write as _;

use crate::bounds::NodeRow;
use crate::config::RowOrder;
use crate::error::{Error, Result};
use crate::ids::{NodeId, Scope};
use crate::traits::{Field, Filter, NodeStore, Term};
use crate::tree::NestedSet;

pub(crate) fn load<S: NodeStore>(store: &S, id: NodeId) -> Result<NodeRow> {
    store.get(id)?.ok_or(Error::NodeNotFound(id))
}

pub(crate) fn children_of<S: NodeStore>(
    store: &S,
    order: RowOrder,
    node: &NodeRow,
) -> Result<Vec<NodeRow>> {
    store.read(&node.scope, &Filter::parent(Some(node.id)), order)
}

pub(crate) fn left_sibling_of<S: NodeStore>(store: &S, node: &NodeRow) -> Result<Option<NodeRow>> {
    let bounds = node.bounds()?;
    let filter = Filter::parent(node.parent).lt(Field::Left, bounds.left);
    Ok(store.read(&node.scope, &filter, RowOrder::Bounds)?.pop())
}

pub(crate) fn right_sibling_of<S: NodeStore>(
    store: &S,
    node: &NodeRow,
) -> Result<Option<NodeRow>> {
    let bounds = node.bounds()?;
    let filter = Filter::parent(node.parent).gt(Field::Left, bounds.left);
    Ok(store
        .read(&node.scope, &filter, RowOrder::Bounds)?
        .into_iter()
        .next())
}

impl<S: NodeStore> NestedSet<S> {
    fn node(&self, id: NodeId) -> Result<NodeRow> {
        load(self.store(), id)
    }

    pub fn roots(&self, scope: &Scope) -> Result<Vec<NodeRow>> {
        self.store()
            .read(scope, &Filter::parent(None), self.config().order)
    }

    /// Topmost ancestor of `id`, or the node itself when it is a root.
    pub fn root(&self, id: NodeId) -> Result<NodeRow> {
        self.self_and_ancestors(id)?
            .into_iter()
            .next()
            .ok_or(Error::NodeNotFound(id))
    }

    pub fn leaves(&self, scope: &Scope) -> Result<Vec<NodeRow>> {
        let rows = self.store().read(scope, &Filter::all(), RowOrder::Bounds)?;
        Ok(rows.into_iter().filter(NodeRow::is_leaf).collect())
    }

    pub fn children(&self, id: NodeId) -> Result<Vec<NodeRow>> {
        let node = self.node(id)?;
        children_of(self.store(), self.config().order, &node)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeRow>> {
        match self.node(id)?.parent {
            Some(parent) => self.store().get(parent),
            None => Ok(None),
        }
    }

    /// Ancestors from the root down, excluding the node.
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<NodeRow>> {
        let node = self.node(id)?;
        self.store()
            .read(&node.scope, &Filter::enclosing(node.bounds()?), RowOrder::Bounds)
    }

    pub fn self_and_ancestors(&self, id: NodeId) -> Result<Vec<NodeRow>> {
        let node = self.node(id)?;
        let bounds = node.bounds()?;
        let filter = Filter::all()
            .le(Field::Left, bounds.left)
            .ge(Field::Right, bounds.right);
        self.store().read(&node.scope, &filter, RowOrder::Bounds)
    }

    /// Descendants in preorder.
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeRow>> {
        let node = self.node(id)?;
        self.store()
            .read(&node.scope, &Filter::inside(node.bounds()?), RowOrder::Bounds)
    }

    pub fn self_and_descendants(&self, id: NodeId) -> Result<Vec<NodeRow>> {
        let node = self.node(id)?;
        let bounds = node.bounds()?;
        let filter = Filter::all()
            .ge(Field::Left, bounds.left)
            .le(Field::Right, bounds.right);
        self.store().read(&node.scope, &filter, RowOrder::Bounds)
    }

    pub fn siblings(&self, id: NodeId) -> Result<Vec<NodeRow>> {
        let mut rows = self.self_and_siblings(id)?;
        rows.retain(|row| row.id != id);
        Ok(rows)
    }

    pub fn self_and_siblings(&self, id: NodeId) -> Result<Vec<NodeRow>> {
        let node = self.node(id)?;
        self.store()
            .read(&node.scope, &Filter::parent(node.parent), self.config().order)
    }

    pub fn left_sibling(&self, id: NodeId) -> Result<Option<NodeRow>> {
        left_sibling_of(self.store(), &self.node(id)?)
    }

    pub fn right_sibling(&self, id: NodeId) -> Result<Option<NodeRow>> {
        right_sibling_of(self.store(), &self.node(id)?)
    }

    /// Number of ancestors, computed from bounds rather than the cached depth.
    pub fn level(&self, id: NodeId) -> Result<usize> {
        Ok(self.ancestors(id)?.len())
    }

    pub fn is_ancestor_of(&self, id: NodeId, other: NodeId) -> Result<bool> {
        let (node, other) = (self.node(id)?, self.node(other)?);
        if node.scope != other.scope {
            return Ok(false);
        }
        Ok(node.bounds()?.contains(&other.bounds()?))
    }

    pub fn is_or_is_ancestor_of(&self, id: NodeId, other: NodeId) -> Result<bool> {
        Ok(id == other || self.is_ancestor_of(id, other)?)
    }

    pub fn is_descendant_of(&self, id: NodeId, other: NodeId) -> Result<bool> {
        self.is_ancestor_of(other, id)
    }

    pub fn is_or_is_descendant_of(&self, id: NodeId, other: NodeId) -> Result<bool> {
        Ok(id == other || self.is_ancestor_of(other, id)?)
    }

    pub fn same_scope(&self, id: NodeId, other: NodeId) -> Result<bool> {
        Ok(self.node(id)?.scope == self.node(other)?.scope)
    }

    /// Indented outline of a whole scope, see `to_text`.
    pub fn outline(&self, scope: &Scope) -> Result<String> {
        let rows = self.store().read(scope, &Filter::all(), RowOrder::Bounds)?;
        Ok(to_text(&rows))
    }

    /// Rows of the scope with null bounds, which no bounds-based query can place.
    pub fn unplaced(&self, scope: &Scope) -> Result<Vec<NodeRow>> {
        let filter = Filter::all().and(Term::IsNull(Field::Left));
        self.store().read(scope, &filter, RowOrder::Bounds)
    }
}

/// Pair each row of a preorder listing with its level relative to the listing.
///
/// Levels come from the parent pointers alone; no further reads are needed.
pub fn each_with_level(rows: &[NodeRow]) -> Vec<(&NodeRow, usize)> {
    let mut path: Vec<Option<NodeId>> = vec![None];
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        if path.last() != Some(&row.parent) {
            if path.contains(&row.parent) {
                while path.last() != Some(&row.parent) {
                    path.pop();
                }
            } else {
                path.push(row.parent);
            }
        }
        out.push((row, path.len() - 1));
    }
    out
}

/// One line per row: `* id (parent, left, right)` with one star per level.
pub fn to_text(rows: &[NodeRow]) -> String {
    let mut out = String::new();
    for (i, (row, level)) in each_with_level(rows).into_iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let parent = row.parent.map(|p| p.to_string()).unwrap_or_default();
        let left = row.left.map(|v| v.to_string()).unwrap_or_default();
        let right = row.right.map(|v| v.to_string()).unwrap_or_default();
        let _ = write!(
            out,
            "{} {} ({}, {}, {})",
            "*".repeat(level + 1),
            row.id,
            parent,
            left,
            right
        );
    }
    out
}

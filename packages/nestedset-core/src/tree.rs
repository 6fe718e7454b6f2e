use tracing::debug;

use crate::allocate::allocate_bounds;
use crate::bounds::{Bounds, NodeRow};
use crate::config::{NestedSetConfig, RowOrder};
use crate::error::{Error, Result};
use crate::ids::{NodeId, Scope};
use crate::movement::{move_node, AllowAllMoves, MoveGuard, MoveOutcome, Position};
use crate::prune::{prune, Disposal, PruneOutcome};
use crate::query::{children_of, left_sibling_of, load, right_sibling_of};
use crate::rebuild::{rebuild_scope, NodeCheck, RebuildSummary};
use crate::retry::in_tenacious_transaction;
use crate::traits::NodeStore;
use crate::validate::{validate_scope, ValidationReport};

type NodeValidator = Box<dyn Fn(&NodeRow) -> Result<()>>;

/// Nested-set facade that wires a store, engine configuration and an optional per-row
/// validator together. Every mutation runs in a retried store transaction.
pub struct NestedSet<S: NodeStore> {
    store: S,
    config: NestedSetConfig,
    node_validator: Option<NodeValidator>,
}

impl<S: NodeStore> NestedSet<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, NestedSetConfig::default())
    }

    pub fn with_config(store: S, config: NestedSetConfig) -> Self {
        Self {
            store,
            config,
            node_validator: None,
        }
    }

    /// Check run on each row rewritten by `rebuild(.., validate_each = true)`.
    pub fn with_node_validator(
        mut self,
        validator: impl Fn(&NodeRow) -> Result<()> + 'static,
    ) -> Self {
        self.node_validator = Some(Box::new(validator));
        self
    }

    pub fn config(&self) -> &NestedSetConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Direct store access. Writes made here bypass the interval engines.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn get(&self, id: NodeId) -> Result<Option<NodeRow>> {
        self.store.get(id)
    }

    pub fn allocate_bounds(&self, scope: &Scope) -> Result<Bounds> {
        allocate_bounds(&self.store, scope)
    }

    /// Append a node to `scope`, then place it as the last child of `parent` if given.
    pub fn create(
        &mut self,
        id: NodeId,
        scope: Scope,
        parent: Option<NodeId>,
    ) -> Result<NodeRow> {
        let config = &self.config;
        in_tenacious_transaction(&mut self.store, &config.retry, |store| {
            let bounds = allocate_bounds(store, &scope)?;
            store.insert(NodeRow::new(id, scope.clone()).with_bounds(bounds))?;
            if let Some(parent) = parent {
                move_node(store, config, id, parent, Position::Child, &AllowAllMoves)?;
            }
            debug!(node = %id, "created node");
            load(store, id)
        })
    }

    pub fn move_node(
        &mut self,
        node: NodeId,
        target: NodeId,
        position: Position,
    ) -> Result<MoveOutcome> {
        self.move_node_with(node, target, position, &AllowAllMoves)
    }

    /// `move_node` consulting `guard` before anything is written.
    pub fn move_node_with<G: MoveGuard + ?Sized>(
        &mut self,
        node: NodeId,
        target: NodeId,
        position: Position,
        guard: &G,
    ) -> Result<MoveOutcome> {
        let config = &self.config;
        in_tenacious_transaction(&mut self.store, &config.retry, |store| {
            move_node(store, config, node, target, position, guard)
        })
    }

    pub fn move_to_left_of(&mut self, node: NodeId, target: NodeId) -> Result<MoveOutcome> {
        self.move_node(node, target, Position::Left)
    }

    pub fn move_to_right_of(&mut self, node: NodeId, target: NodeId) -> Result<MoveOutcome> {
        self.move_node(node, target, Position::Right)
    }

    pub fn move_to_child_of(&mut self, node: NodeId, parent: NodeId) -> Result<MoveOutcome> {
        self.move_node(node, parent, Position::Child)
    }

    pub fn move_to_root(&mut self, node: NodeId) -> Result<MoveOutcome> {
        self.move_node(node, node, Position::Root)
    }

    /// Swap with the left sibling. `Unchanged` for a first child.
    pub fn move_left(&mut self, node: NodeId) -> Result<MoveOutcome> {
        self.move_resolved(node, |store| {
            let row = load(store, node)?;
            Ok(left_sibling_of(store, &row)?.map(|sibling| (sibling.id, Position::Left)))
        })
    }

    /// Swap with the right sibling. `Unchanged` for a last child.
    pub fn move_right(&mut self, node: NodeId) -> Result<MoveOutcome> {
        self.move_resolved(node, |store| {
            let row = load(store, node)?;
            Ok(right_sibling_of(store, &row)?.map(|sibling| (sibling.id, Position::Right)))
        })
    }

    /// Place `node` so it ends up at `index` among `parent`'s children.
    pub fn move_to_child_with_index(
        &mut self,
        node: NodeId,
        parent: NodeId,
        index: usize,
    ) -> Result<MoveOutcome> {
        self.move_resolved(node, |store| {
            let parent_row = load(store, parent)?;
            let children = children_of(store, RowOrder::Bounds, &parent_row)?;
            if children.is_empty() {
                return Ok(Some((parent, Position::Child)));
            }
            if index == children.len() {
                return Ok(children.last().map(|last| (last.id, Position::Right)));
            }
            let Some(at_index) = children.get(index) else {
                return Err(Error::InvalidOperation(format!(
                    "index {index} out of range for {} children",
                    children.len()
                )));
            };
            match children.iter().position(|child| child.id == node) {
                Some(current) if current == index => Ok(None),
                // the child at `index` shifts left once `node` leaves its slot
                Some(current) if current < index => Ok(Some((at_index.id, Position::Right))),
                _ => Ok(Some((at_index.id, Position::Left))),
            }
        })
    }

    /// Repoint the parent and move accordingly; `None` makes the node a root.
    pub fn set_parent(&mut self, node: NodeId, parent: Option<NodeId>) -> Result<MoveOutcome> {
        self.move_resolved(node, |store| {
            let row = load(store, node)?;
            if row.parent == parent {
                return Ok(None);
            }
            Ok(Some(match parent {
                Some(parent) => (parent, Position::Child),
                None => (node, Position::Root),
            }))
        })
    }

    fn move_resolved<F>(&mut self, node: NodeId, resolve: F) -> Result<MoveOutcome>
    where
        F: Fn(&S) -> Result<Option<(NodeId, Position)>>,
    {
        let config = &self.config;
        in_tenacious_transaction(&mut self.store, &config.retry, |store| {
            match resolve(&*store)? {
                Some((target, position)) => {
                    move_node(store, config, node, target, position, &AllowAllMoves)
                }
                None => Ok(MoveOutcome::Unchanged),
            }
        })
    }

    /// Prune with the configured `dependent` disposal.
    pub fn prune(&mut self, node: NodeId) -> Result<PruneOutcome> {
        self.prune_with(node, self.config.dependent)
    }

    pub fn prune_with(&mut self, node: NodeId, disposal: Disposal) -> Result<PruneOutcome> {
        in_tenacious_transaction(&mut self.store, &self.config.retry, |store| {
            prune(store, node, disposal)
        })
    }

    /// Rebuild the given scopes, skipping those that already validate.
    pub fn rebuild(
        &mut self,
        scopes: &[Scope],
        validate_each: bool,
    ) -> Result<Vec<RebuildSummary>> {
        let mut summaries = Vec::new();
        for scope in scopes {
            if self.is_valid(scope)? {
                debug!(scope = ?scope, "scope already valid, skipping rebuild");
                continue;
            }
            let config = &self.config;
            let check: Option<NodeCheck<'_>> = match &self.node_validator {
                Some(validator) if validate_each => Some(&**validator),
                _ => None,
            };
            let summary = in_tenacious_transaction(&mut self.store, &config.retry, |store| {
                rebuild_scope(store, config, scope, check)
            })?;
            summaries.push(summary);
        }
        Ok(summaries)
    }

    pub fn rebuild_all(&mut self, validate_each: bool) -> Result<Vec<RebuildSummary>> {
        let scopes = self.store.scopes()?;
        self.rebuild(&scopes, validate_each)
    }

    pub fn validation_report(&self, scope: &Scope) -> Result<ValidationReport> {
        validate_scope(&self.store, &self.config, scope)
    }

    pub fn is_valid(&self, scope: &Scope) -> Result<bool> {
        Ok(self.validation_report(scope)?.is_valid())
    }

    pub fn is_valid_all(&self) -> Result<bool> {
        for scope in self.store.scopes()? {
            if !self.is_valid(&scope)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn left_and_rights_valid(&self, scope: &Scope) -> Result<bool> {
        Ok(self.validation_report(scope)?.left_and_rights_valid())
    }

    pub fn no_duplicates_for_columns(&self, scope: &Scope) -> Result<bool> {
        Ok(self.validation_report(scope)?.no_duplicates_for_columns())
    }

    pub fn all_roots_valid(&self, scope: &Scope) -> Result<bool> {
        Ok(self.validation_report(scope)?.all_roots_valid())
    }

    /// Rejects writes to columns the engines own.
    pub fn check_assignment(&self, column: &str) -> Result<()> {
        self.store.columns().ensure_assignable(column)
    }
}

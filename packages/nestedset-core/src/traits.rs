use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::bounds::{Bounds, NodeRow};
use crate::config::{Columns, RowOrder};
use crate::error::{Error, Result};
use crate::ids::{NodeId, Scope, Value};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Integer structure fields addressable by filters and changes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Field {
    Left,
    Right,
    Depth,
}

impl Field {
    fn read(self, row: &NodeRow) -> Option<i64> {
        match self {
            Field::Left => row.left,
            Field::Right => row.right,
            Field::Depth => Some(row.depth),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Cmp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Cmp {
    fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Cmp::Lt => lhs < rhs,
            Cmp::Le => lhs <= rhs,
            Cmp::Gt => lhs > rhs,
            Cmp::Ge => lhs >= rhs,
        }
    }
}

/// One conjunct of a `Filter`.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Term {
    Id(NodeId),
    /// `None` selects roots.
    Parent(Option<NodeId>),
    /// Comparing a null column is never true, as in SQL.
    Compare(Field, Cmp, i64),
    IsNull(Field),
}

impl Term {
    fn matches(&self, row: &NodeRow) -> bool {
        match self {
            Term::Id(id) => row.id == *id,
            Term::Parent(parent) => row.parent == *parent,
            Term::Compare(field, cmp, value) => field
                .read(row)
                .map(|current| cmp.holds(current, *value))
                .unwrap_or(false),
            Term::IsNull(field) => field.read(row).is_none(),
        }
    }
}

/// Row predicate evaluated within a single scope: a conjunction of terms.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Filter {
    pub terms: Vec<Term>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn id(id: NodeId) -> Self {
        Self::all().and(Term::Id(id))
    }

    pub fn parent(parent: Option<NodeId>) -> Self {
        Self::all().and(Term::Parent(parent))
    }

    /// Strict descendants of an interval.
    pub fn inside(bounds: Bounds) -> Self {
        Self::all()
            .gt(Field::Left, bounds.left)
            .lt(Field::Right, bounds.right)
    }

    /// Strict ancestors of an interval.
    pub fn enclosing(bounds: Bounds) -> Self {
        Self::all()
            .lt(Field::Left, bounds.left)
            .gt(Field::Right, bounds.right)
    }

    pub fn and(mut self, term: Term) -> Self {
        self.terms.push(term);
        self
    }

    pub fn lt(self, field: Field, value: i64) -> Self {
        self.and(Term::Compare(field, Cmp::Lt, value))
    }

    pub fn le(self, field: Field, value: i64) -> Self {
        self.and(Term::Compare(field, Cmp::Le, value))
    }

    pub fn gt(self, field: Field, value: i64) -> Self {
        self.and(Term::Compare(field, Cmp::Gt, value))
    }

    pub fn ge(self, field: Field, value: i64) -> Self {
        self.and(Term::Compare(field, Cmp::Ge, value))
    }

    pub fn matches(&self, row: &NodeRow) -> bool {
        self.terms.iter().all(|t| t.matches(row))
    }
}

/// Field write applied to every row a mutation selects.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Change {
    /// Add a signed delta to the field. Null stays null.
    Shift(Field, i64),
    SetLeft(Option<i64>),
    SetRight(Option<i64>),
    SetDepth(i64),
    SetParent(Option<NodeId>),
}

/// A conditional write inside an atomic batch.
///
/// Mutations of one batch apply in order; each filter sees the rows as left by the
/// previous mutation, and within one update the filter is evaluated before any change.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mutation {
    Update {
        scope: Scope,
        filter: Filter,
        changes: Vec<Change>,
    },
    Delete {
        scope: Scope,
        filter: Filter,
    },
}

impl Mutation {
    pub fn update(scope: &Scope, filter: Filter, changes: Vec<Change>) -> Self {
        Mutation::Update {
            scope: scope.clone(),
            filter,
            changes,
        }
    }

    pub fn shift(scope: &Scope, filter: Filter, field: Field, delta: i64) -> Self {
        Self::update(scope, filter, vec![Change::Shift(field, delta)])
    }

    pub fn delete(scope: &Scope, filter: Filter) -> Self {
        Mutation::Delete {
            scope: scope.clone(),
            filter,
        }
    }
}

/// Backing store the engines run against: scoped range reads, a max aggregate, atomic
/// batches of conditional updates, and a transaction boundary whose lock conflicts
/// surface as `Error::TransientConflict`.
pub trait NodeStore {
    fn columns(&self) -> &Columns;

    fn read(&self, scope: &Scope, filter: &Filter, order: RowOrder) -> Result<Vec<NodeRow>>;

    fn get(&self, id: NodeId) -> Result<Option<NodeRow>>;

    /// Largest `right` in the scope, `None` when the scope holds no bounded rows.
    fn max_right(&self, scope: &Scope) -> Result<Option<i64>>;

    /// Distinct scopes currently holding rows.
    fn scopes(&self) -> Result<Vec<Scope>>;

    fn insert(&mut self, row: NodeRow) -> Result<()>;

    /// Apply every mutation or none of them. Returns the number of rows touched.
    fn apply_batch(&mut self, batch: &[Mutation]) -> Result<u64>;

    /// Run `work` as one unit: committed when it returns `Ok`, rolled back otherwise.
    fn transaction<T, F>(&mut self, work: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
        Self: Sized;
}

/// In-memory store for tests, benches and prototyping.
#[derive(Clone, Debug, Default)]
pub struct MemoryNodeStore {
    columns: Columns,
    rows: BTreeMap<NodeId, NodeRow>,
    order_values: HashMap<NodeId, Value>,
    injected_conflicts: u32,
    tx_depth: u32,
    batches: u64,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns(columns: Columns) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    /// Make the next `count` outermost transactions fail with a transient conflict.
    pub fn inject_conflicts(&mut self, count: u32) {
        self.injected_conflicts = count;
    }

    /// Set the host ordering value used by `RowOrder::OrderColumn`.
    pub fn set_order_value(&mut self, id: NodeId, value: impl Into<Value>) {
        self.order_values.insert(id, value.into());
    }

    /// Number of non-empty batches applied so far.
    pub fn batch_count(&self) -> u64 {
        self.batches
    }

    /// Raw write that bypasses the engines. Only for simulating corruption in tests.
    pub fn overwrite(&mut self, row: NodeRow) {
        self.rows.insert(row.id, row);
    }

    pub fn remove(&mut self, id: NodeId) -> Option<NodeRow> {
        self.order_values.remove(&id);
        self.rows.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn order_value(&self, id: NodeId) -> Value {
        self.order_values.get(&id).cloned().unwrap_or(Value::Null)
    }

    fn apply_one(rows: &mut BTreeMap<NodeId, NodeRow>, mutation: &Mutation) -> Result<u64> {
        match mutation {
            Mutation::Update {
                scope,
                filter,
                changes,
            } => {
                let mut touched = 0;
                for row in rows.values_mut() {
                    if row.scope != *scope || !filter.matches(row) {
                        continue;
                    }
                    for change in changes {
                        apply_change(row, change)?;
                    }
                    touched += 1;
                }
                Ok(touched)
            }
            Mutation::Delete { scope, filter } => {
                let doomed: Vec<NodeId> = rows
                    .values()
                    .filter(|row| row.scope == *scope && filter.matches(row))
                    .map(|row| row.id)
                    .collect();
                for id in &doomed {
                    rows.remove(id);
                }
                Ok(doomed.len() as u64)
            }
        }
    }
}

fn apply_change(row: &mut NodeRow, change: &Change) -> Result<()> {
    let id = row.id;
    let overflow = move || Error::InconsistentState(format!("bound overflow on node {id}"));
    match change {
        Change::Shift(Field::Left, delta) => {
            if let Some(left) = row.left {
                row.left = Some(left.checked_add(*delta).ok_or_else(overflow)?);
            }
        }
        Change::Shift(Field::Right, delta) => {
            if let Some(right) = row.right {
                row.right = Some(right.checked_add(*delta).ok_or_else(overflow)?);
            }
        }
        Change::Shift(Field::Depth, delta) => {
            row.depth = row.depth.checked_add(*delta).ok_or_else(overflow)?;
        }
        Change::SetLeft(left) => row.left = *left,
        Change::SetRight(right) => row.right = *right,
        Change::SetDepth(depth) => row.depth = *depth,
        Change::SetParent(parent) => row.parent = *parent,
    }
    Ok(())
}

impl NodeStore for MemoryNodeStore {
    fn columns(&self) -> &Columns {
        &self.columns
    }

    fn read(&self, scope: &Scope, filter: &Filter, order: RowOrder) -> Result<Vec<NodeRow>> {
        let mut rows: Vec<NodeRow> = self
            .rows
            .values()
            .filter(|row| row.scope == *scope && filter.matches(row))
            .cloned()
            .collect();
        match order {
            RowOrder::Bounds => rows.sort_by(|a, b| {
                (a.left, a.right, a.id).cmp(&(b.left, b.right, b.id))
            }),
            RowOrder::OrderColumn => {
                rows.sort_by_cached_key(|row| (self.order_value(row.id), row.id))
            }
        }
        Ok(rows)
    }

    fn get(&self, id: NodeId) -> Result<Option<NodeRow>> {
        Ok(self.rows.get(&id).cloned())
    }

    fn max_right(&self, scope: &Scope) -> Result<Option<i64>> {
        Ok(self
            .rows
            .values()
            .filter(|row| row.scope == *scope)
            .filter_map(|row| row.right)
            .max())
    }

    fn scopes(&self) -> Result<Vec<Scope>> {
        let scopes: BTreeSet<Scope> = self.rows.values().map(|row| row.scope.clone()).collect();
        Ok(scopes.into_iter().collect())
    }

    fn insert(&mut self, row: NodeRow) -> Result<()> {
        if self.rows.contains_key(&row.id) {
            return Err(Error::InvalidOperation(format!(
                "node {} already exists",
                row.id
            )));
        }
        self.rows.insert(row.id, row);
        Ok(())
    }

    fn apply_batch(&mut self, batch: &[Mutation]) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }
        let mut staged = self.rows.clone();
        let mut touched = 0;
        for mutation in batch {
            touched += Self::apply_one(&mut staged, mutation)?;
        }
        self.order_values.retain(|id, _| staged.contains_key(id));
        self.rows = staged;
        self.batches += 1;
        Ok(touched)
    }

    fn transaction<T, F>(&mut self, work: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        if self.tx_depth == 0 && self.injected_conflicts > 0 {
            self.injected_conflicts -= 1;
            return Err(Error::TransientConflict("deadlock detected".into()));
        }

        let rows = self.rows.clone();
        let order_values = self.order_values.clone();
        self.tx_depth += 1;
        let res = work(self);
        self.tx_depth -= 1;
        if res.is_err() {
            self.rows = rows;
            self.order_values = order_values;
        }
        res
    }
}

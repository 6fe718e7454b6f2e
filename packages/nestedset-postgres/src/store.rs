use std::cell::RefCell;
use std::rc::Rc;

use postgres::error::SqlState;
use postgres::types::ToSql;
use postgres::{Client, NoTls, Row};
use tracing::debug;

use nestedset_core::sql::{Dialect, SqlParam, SqlRenderer, SqlStatement};
use nestedset_core::{
    Columns, Error, Filter, Mutation, NodeId, NodeRow, NodeStore, Result, RowOrder, Scope,
};

use crate::schema::ensure_schema;

pub(crate) fn storage_debug<E: std::fmt::Debug>(e: E) -> Error {
    Error::Storage(format!("{e:?}"))
}

/// Deadlocks, serialization failures and `NOWAIT` lock misses are worth another attempt.
fn pg_error(e: postgres::Error) -> Error {
    match e.code() {
        Some(code)
            if *code == SqlState::T_R_DEADLOCK_DETECTED
                || *code == SqlState::T_R_SERIALIZATION_FAILURE
                || *code == SqlState::LOCK_NOT_AVAILABLE =>
        {
            Error::TransientConflict(e.to_string())
        }
        Some(code) if *code == SqlState::UNIQUE_VIOLATION => {
            Error::InvalidOperation(e.to_string())
        }
        _ => storage_debug(e),
    }
}

fn bytes_to_node(bytes: &[u8]) -> Result<NodeId> {
    NodeId::from_bytes(bytes).ok_or_else(|| Error::Storage("expected 16-byte node id".into()))
}

fn bind(params: Vec<SqlParam>) -> Vec<Box<dyn ToSql + Sync>> {
    params
        .into_iter()
        .map(|p| -> Box<dyn ToSql + Sync> {
            match p {
                SqlParam::Int(v) => Box::new(v),
                SqlParam::Bytes(v) => Box::new(v),
                SqlParam::Text(v) => Box::new(v),
            }
        })
        .collect()
}

fn decode(row: &Row) -> Result<NodeRow> {
    let id: Vec<u8> = row.try_get(0).map_err(storage_debug)?;
    let scope: Vec<u8> = row.try_get(1).map_err(storage_debug)?;
    let parent: Option<Vec<u8>> = row.try_get(2).map_err(storage_debug)?;
    Ok(NodeRow {
        id: bytes_to_node(&id)?,
        scope: Scope::from_key(&scope)?,
        parent: parent.as_deref().map(bytes_to_node).transpose()?,
        left: row.try_get(3).map_err(storage_debug)?,
        right: row.try_get(4).map_err(storage_debug)?,
        depth: row.try_get(5).map_err(storage_debug)?,
    })
}

/// PostgreSQL-backed `NodeStore`. The client is shared so callers can keep issuing their
/// own statements on the same connection.
pub struct PgNodeStore {
    client: Rc<RefCell<Client>>,
    columns: Columns,
    tx_depth: usize,
}

impl PgNodeStore {
    /// Wrap `client`, creating the table and indexes if missing.
    pub fn new(client: Rc<RefCell<Client>>, columns: Columns) -> Result<Self> {
        ensure_schema(&mut client.borrow_mut(), &columns)?;
        Ok(Self::from_client(client, columns))
    }

    /// Wrap `client` for a table that already exists. Index DDL waits on open write
    /// transactions, so long-running deployments run `ensure_schema` once up front.
    pub fn from_client(client: Rc<RefCell<Client>>, columns: Columns) -> Self {
        Self {
            client,
            columns,
            tx_depth: 0,
        }
    }

    pub fn connect(url: &str, columns: Columns) -> Result<Self> {
        let client = Client::connect(url, NoTls).map_err(storage_debug)?;
        Self::new(Rc::new(RefCell::new(client)), columns)
    }

    pub fn client(&self) -> &Rc<RefCell<Client>> {
        &self.client
    }

    /// Write the host ordering value used by `RowOrder::OrderColumn`.
    pub fn set_order_value(&mut self, id: NodeId, value: Option<&str>) -> Result<()> {
        let stmt = self
            .renderer()
            .set_order(id, value.map(str::to_string))
            .ok_or_else(|| Error::InvalidOperation("no order column configured".into()))?;
        self.execute(stmt)?;
        Ok(())
    }

    fn renderer(&self) -> SqlRenderer<'_> {
        SqlRenderer::new(&self.columns, Dialect::Postgres)
    }

    fn execute(&self, stmt: SqlStatement) -> Result<u64> {
        let params = bind(stmt.params);
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();
        let mut c = self.client.borrow_mut();
        c.execute(stmt.sql.as_str(), &refs).map_err(pg_error)
    }

    fn query(&self, stmt: SqlStatement) -> Result<Vec<Row>> {
        let params = bind(stmt.params);
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();
        let mut c = self.client.borrow_mut();
        c.query(stmt.sql.as_str(), &refs).map_err(pg_error)
    }

    fn batch(&self, sql: &str) -> Result<()> {
        self.client.borrow_mut().batch_execute(sql).map_err(pg_error)
    }
}

impl NodeStore for PgNodeStore {
    fn columns(&self) -> &Columns {
        &self.columns
    }

    fn read(&self, scope: &Scope, filter: &Filter, order: RowOrder) -> Result<Vec<NodeRow>> {
        let stmt = self.renderer().select(scope, filter, order)?;
        self.query(stmt)?.iter().map(decode).collect()
    }

    fn get(&self, id: NodeId) -> Result<Option<NodeRow>> {
        let stmt = self.renderer().select_by_id(id);
        self.query(stmt)?.first().map(decode).transpose()
    }

    fn max_right(&self, scope: &Scope) -> Result<Option<i64>> {
        let stmt = self.renderer().max_right(scope)?;
        let rows = self.query(stmt)?;
        let row = rows
            .first()
            .ok_or_else(|| Error::Storage("aggregate returned no row".into()))?;
        row.try_get(0).map_err(storage_debug)
    }

    fn scopes(&self) -> Result<Vec<Scope>> {
        let sql = self.renderer().scopes();
        let rows = self
            .client
            .borrow_mut()
            .query(sql.as_str(), &[])
            .map_err(pg_error)?;
        rows.iter()
            .map(|row| {
                let key: Vec<u8> = row.try_get(0).map_err(storage_debug)?;
                Scope::from_key(&key)
            })
            .collect()
    }

    fn insert(&mut self, row: NodeRow) -> Result<()> {
        let stmt = self.renderer().insert(&row)?;
        self.execute(stmt)?;
        Ok(())
    }

    fn apply_batch(&mut self, batch: &[Mutation]) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }
        let statements = batch
            .iter()
            .map(|m| self.renderer().mutation(m))
            .collect::<Result<Vec<_>>>()?;

        let touched = self.transaction(|store| {
            statements
                .into_iter()
                .try_fold(0u64, |touched, stmt| -> Result<u64> {
                    Ok(touched + store.execute(stmt)?)
                })
        })?;
        debug!(mutations = batch.len(), touched, "applied batch");
        Ok(touched)
    }

    fn transaction<T, F>(&mut self, work: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let savepoint = format!("nested_set_tx_{}", self.tx_depth);
        let (begin, commit, rollback) = if self.tx_depth == 0 {
            (
                // concurrent movers must fail with 40001 instead of applying stale offsets
                "BEGIN ISOLATION LEVEL SERIALIZABLE".to_string(),
                "COMMIT".to_string(),
                "ROLLBACK".to_string(),
            )
        } else {
            (
                format!("SAVEPOINT {savepoint}"),
                format!("RELEASE SAVEPOINT {savepoint}"),
                format!("ROLLBACK TO SAVEPOINT {savepoint}"),
            )
        };

        self.batch(&begin)?;
        self.tx_depth += 1;
        let res = work(self);
        self.tx_depth -= 1;

        match res {
            Ok(v) => match self.batch(&commit) {
                Ok(()) => Ok(v),
                Err(e) => {
                    let _ = self.batch(&rollback);
                    Err(e)
                }
            },
            Err(e) => {
                let _ = self.batch(&rollback);
                Err(e)
            }
        }
    }
}

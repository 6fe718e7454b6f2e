use std::path::Path;
use std::time::Duration;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, ErrorCode};
use tracing::debug;

use nestedset_core::sql::{Dialect, SqlParam, SqlRenderer, SqlStatement};
use nestedset_core::{
    Columns, Error, Filter, Mutation, NodeId, NodeRow, NodeStore, Result, RowOrder, Scope,
};

/// Busy and locked databases are lock races the retry wrapper may win on a fresh attempt.
fn storage_error(e: rusqlite::Error) -> Error {
    match e.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
            Error::TransientConflict(e.to_string())
        }
        Some(ErrorCode::ConstraintViolation) => Error::InvalidOperation(e.to_string()),
        _ => Error::Storage(e.to_string()),
    }
}

fn blob_to_node(data: &[u8]) -> Result<NodeId> {
    NodeId::from_bytes(data).ok_or_else(|| Error::Storage("expected 16-byte node id".into()))
}

fn bind(params: Vec<SqlParam>) -> Vec<SqlValue> {
    params
        .into_iter()
        .map(|p| match p {
            SqlParam::Int(v) => SqlValue::Integer(v),
            SqlParam::Bytes(v) => SqlValue::Blob(v),
            SqlParam::Text(v) => SqlValue::Text(v),
        })
        .collect()
}

type RawRow = (Vec<u8>, Vec<u8>, Option<Vec<u8>>, Option<i64>, Option<i64>, i64);

fn decode((id, scope, parent, left, right, depth): RawRow) -> Result<NodeRow> {
    Ok(NodeRow {
        id: blob_to_node(&id)?,
        scope: Scope::from_key(&scope)?,
        parent: parent.as_deref().map(blob_to_node).transpose()?,
        left,
        right,
        depth,
    })
}

/// SQLite-backed `NodeStore` keeping every scope in one table named by `Columns`.
pub struct SqliteNodeStore {
    conn: Connection,
    columns: Columns,
}

impl SqliteNodeStore {
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_error)?;
        Self::from_connection(conn, Columns::default())
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_columns(path, Columns::default())
    }

    pub fn open_with_columns(path: impl AsRef<Path>, columns: Columns) -> Result<Self> {
        let conn = Connection::open(path).map_err(storage_error)?;
        Self::from_connection(conn, columns)
    }

    /// Wrap an existing connection, creating the table and indexes if missing.
    pub fn from_connection(conn: Connection, columns: Columns) -> Result<Self> {
        let store = Self { conn, columns };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn ensure_schema(&self) -> Result<()> {
        let sql = SqlRenderer::new(&self.columns, Dialect::Sqlite).create_table();
        self.conn
            .execute_batch(&sql.join(";\n"))
            .map_err(storage_error)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// How long to wait on a locked database before reporting a transient conflict.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        self.conn.busy_timeout(timeout).map_err(storage_error)
    }

    /// Write the host ordering value used by `RowOrder::OrderColumn`.
    pub fn set_order_value(&mut self, id: NodeId, value: Option<&str>) -> Result<()> {
        let stmt = SqlRenderer::new(&self.columns, Dialect::Sqlite)
            .set_order(id, value.map(str::to_string))
            .ok_or_else(|| Error::InvalidOperation("no order column configured".into()))?;
        self.execute(stmt)?;
        Ok(())
    }

    fn renderer(&self) -> SqlRenderer<'_> {
        SqlRenderer::new(&self.columns, Dialect::Sqlite)
    }

    fn execute(&self, stmt: SqlStatement) -> Result<u64> {
        let mut prepared = self.conn.prepare_cached(&stmt.sql).map_err(storage_error)?;
        let touched = prepared
            .execute(params_from_iter(bind(stmt.params)))
            .map_err(storage_error)?;
        Ok(touched as u64)
    }

    fn query_rows(&self, stmt: SqlStatement) -> Result<Vec<NodeRow>> {
        let mut prepared = self.conn.prepare_cached(&stmt.sql).map_err(storage_error)?;
        let rows = prepared
            .query_map(params_from_iter(bind(stmt.params)), |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })
            .map_err(storage_error)?;

        let mut out = Vec::new();
        for raw in rows {
            out.push(decode(raw.map_err(storage_error)?)?);
        }
        Ok(out)
    }
}

impl NodeStore for SqliteNodeStore {
    fn columns(&self) -> &Columns {
        &self.columns
    }

    fn read(&self, scope: &Scope, filter: &Filter, order: RowOrder) -> Result<Vec<NodeRow>> {
        let stmt = self.renderer().select(scope, filter, order)?;
        self.query_rows(stmt)
    }

    fn get(&self, id: NodeId) -> Result<Option<NodeRow>> {
        let stmt = self.renderer().select_by_id(id);
        Ok(self.query_rows(stmt)?.pop())
    }

    fn max_right(&self, scope: &Scope) -> Result<Option<i64>> {
        let stmt = self.renderer().max_right(scope)?;
        let mut prepared = self.conn.prepare_cached(&stmt.sql).map_err(storage_error)?;
        prepared
            .query_row(params_from_iter(bind(stmt.params)), |row| row.get(0))
            .map_err(storage_error)
    }

    fn scopes(&self) -> Result<Vec<Scope>> {
        let sql = self.renderer().scopes();
        let mut prepared = self.conn.prepare_cached(&sql).map_err(storage_error)?;
        let keys = prepared
            .query_map([], |row| row.get::<_, Vec<u8>>(0))
            .map_err(storage_error)?;
        let mut scopes = Vec::new();
        for key in keys {
            scopes.push(Scope::from_key(&key.map_err(storage_error)?)?);
        }
        Ok(scopes)
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

        self.conn
            .execute_batch("SAVEPOINT nested_set_batch")
            .map_err(storage_error)?;
        let res = statements
            .into_iter()
            .try_fold(0u64, |touched, stmt| -> Result<u64> {
                Ok(touched + self.execute(stmt)?)
            });
        match res {
            Ok(touched) => {
                self.conn
                    .execute_batch("RELEASE nested_set_batch")
                    .map_err(storage_error)?;
                debug!(mutations = batch.len(), touched, "applied batch");
                Ok(touched)
            }
            Err(e) => {
                let _ = self
                    .conn
                    .execute_batch("ROLLBACK TO nested_set_batch; RELEASE nested_set_batch");
                Err(e)
            }
        }
    }

    fn transaction<T, F>(&mut self, work: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        // nested calls join the open transaction through a savepoint
        let (begin, commit, rollback) = if self.conn.is_autocommit() {
            ("BEGIN IMMEDIATE", "COMMIT", "ROLLBACK")
        } else {
            (
                "SAVEPOINT nested_set_tx",
                "RELEASE nested_set_tx",
                "ROLLBACK TO nested_set_tx; RELEASE nested_set_tx",
            )
        };

        self.conn.execute_batch(begin).map_err(storage_error)?;
        match work(self) {
            Ok(v) => match self.conn.execute_batch(commit) {
                Ok(()) => Ok(v),
                Err(e) => {
                    let _ = self.conn.execute_batch(rollback);
                    Err(storage_error(e))
                }
            },
            Err(e) => {
                let _ = self.conn.execute_batch(rollback);
                Err(e)
            }
        }
    }
}

use postgres::Client;

use nestedset_core::sql::{quote_ident, Dialect, SqlRenderer};
use nestedset_core::{Columns, Result};

use crate::store::storage_debug;

const SCHEMA_LOCK_KEY: i64 = 0x6e65737465647374; // "nestedst"

/// Create the node table and its indexes if missing.
pub fn ensure_schema(client: &mut Client, columns: &Columns) -> Result<()> {
    // Concurrent `CREATE ... IF NOT EXISTS` can still collide on the catalog.
    client
        .query_one("SELECT pg_advisory_lock($1)", &[&SCHEMA_LOCK_KEY])
        .map_err(storage_debug)?;

    let sql = SqlRenderer::new(columns, Dialect::Postgres).create_table();
    let res = client.batch_execute(&sql.join(";\n")).map_err(storage_debug);

    let _ = client.query_one("SELECT pg_advisory_unlock($1)", &[&SCHEMA_LOCK_KEY]);

    res
}

pub fn drop_table_for_tests(client: &mut Client, columns: &Columns) -> Result<()> {
    client
        .batch_execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(&columns.table)))
        .map_err(storage_debug)
}

//! SQL rendering of store operations, shared by the relational adapters.
//!
//! Adapters own connections and row decoding; this module only turns filters, changes
//! and orderings into parameterized statements for a given `Dialect`.

use crate::bounds::NodeRow;
use crate::config::{Columns, RowOrder};
use crate::error::Result;
use crate::ids::{NodeId, Scope};
use crate::traits::{Change, Cmp, Field, Filter, Mutation, Term};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{n}"),
            Dialect::Postgres => format!("${n}"),
        }
    }

    fn blob_type(self) -> &'static str {
        match self {
            Dialect::Sqlite => "BLOB",
            Dialect::Postgres => "BYTEA",
        }
    }

    fn int_type(self) -> &'static str {
        match self {
            Dialect::Sqlite => "INTEGER",
            Dialect::Postgres => "BIGINT",
        }
    }

    /// SQLite already sorts nulls first in ascending order.
    fn nulls_first(self) -> &'static str {
        match self {
            Dialect::Sqlite => "",
            Dialect::Postgres => " NULLS FIRST",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Bytes(Vec<u8>),
    Text(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub struct SqlRenderer<'a> {
    columns: &'a Columns,
    dialect: Dialect,
}

struct Builder {
    dialect: Dialect,
    params: Vec<SqlParam>,
}

impl Builder {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        self.dialect.placeholder(self.params.len())
    }

    fn finish(self, sql: String) -> SqlStatement {
        SqlStatement {
            sql,
            params: self.params,
        }
    }
}

impl<'a> SqlRenderer<'a> {
    pub fn new(columns: &'a Columns, dialect: Dialect) -> Self {
        Self { columns, dialect }
    }

    fn table(&self) -> String {
        quote_ident(&self.columns.table)
    }

    fn col(&self, name: &str) -> String {
        quote_ident(name)
    }

    fn field(&self, field: Field) -> String {
        match field {
            Field::Left => self.col(&self.columns.left),
            Field::Right => self.col(&self.columns.right),
            Field::Depth => self.col(&self.columns.depth),
        }
    }

    /// Select list in the order `decode` implementations expect:
    /// id, scope, parent, left, right, depth.
    pub fn row_columns(&self) -> String {
        let c = self.columns;
        [&c.primary, &c.scope, &c.parent, &c.left, &c.right, &c.depth]
            .iter()
            .map(|name| self.col(name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn create_table(&self) -> Vec<String> {
        let c = self.columns;
        let blob = self.dialect.blob_type();
        let int = self.dialect.int_type();
        let mut columns = vec![
            format!("{} {blob} PRIMARY KEY", self.col(&c.primary)),
            format!("{} {blob} NOT NULL", self.col(&c.scope)),
            format!("{} {blob}", self.col(&c.parent)),
            format!("{} {int}", self.col(&c.left)),
            format!("{} {int}", self.col(&c.right)),
            format!("{} {int} NOT NULL DEFAULT 0", self.col(&c.depth)),
        ];
        if let Some(order) = &c.order {
            columns.push(format!("{} TEXT", self.col(order)));
        }
        let index = |suffix: &str| quote_ident(&format!("{}_{suffix}", c.table));
        vec![
            format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                self.table(),
                columns.join(", ")
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({}, {})",
                index("scope_left"),
                self.table(),
                self.col(&c.scope),
                self.col(&c.left)
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({}, {})",
                index("scope_right"),
                self.table(),
                self.col(&c.scope),
                self.col(&c.right)
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                index("parent"),
                self.table(),
                self.col(&c.parent)
            ),
        ]
    }

    fn order_by(&self, order: RowOrder) -> String {
        let nulls = self.dialect.nulls_first();
        let id = self.col(&self.columns.primary);
        match (order, &self.columns.order) {
            (RowOrder::OrderColumn, Some(column)) => {
                format!("ORDER BY {} ASC{nulls}, {id} ASC", self.col(column))
            }
            (RowOrder::OrderColumn, None) => format!("ORDER BY {id} ASC"),
            (RowOrder::Bounds, _) => format!(
                "ORDER BY {} ASC{nulls}, {} ASC{nulls}, {id} ASC",
                self.field(Field::Left),
                self.field(Field::Right)
            ),
        }
    }

    fn where_clause(&self, b: &mut Builder, scope: &Scope, filter: &Filter) -> Result<String> {
        let mut conds = vec![format!(
            "{} = {}",
            self.col(&self.columns.scope),
            b.bind(SqlParam::Bytes(scope.to_key()?))
        )];
        for term in &filter.terms {
            conds.push(self.term(b, term));
        }
        Ok(conds.join(" AND "))
    }

    fn term(&self, b: &mut Builder, term: &Term) -> String {
        match term {
            Term::Id(id) => format!(
                "{} = {}",
                self.col(&self.columns.primary),
                b.bind(SqlParam::Bytes(id.to_bytes().to_vec()))
            ),
            Term::Parent(None) => format!("{} IS NULL", self.col(&self.columns.parent)),
            Term::Parent(Some(parent)) => format!(
                "{} = {}",
                self.col(&self.columns.parent),
                b.bind(SqlParam::Bytes(parent.to_bytes().to_vec()))
            ),
            Term::Compare(field, cmp, value) => {
                let op = match cmp {
                    Cmp::Lt => "<",
                    Cmp::Le => "<=",
                    Cmp::Gt => ">",
                    Cmp::Ge => ">=",
                };
                format!("{} {op} {}", self.field(*field), b.bind(SqlParam::Int(*value)))
            }
            Term::IsNull(field) => format!("{} IS NULL", self.field(*field)),
        }
    }

    fn assignment(&self, b: &mut Builder, change: &Change) -> String {
        let int_or_null = |b: &mut Builder, value: Option<i64>| match value {
            Some(v) => b.bind(SqlParam::Int(v)),
            None => "NULL".to_string(),
        };
        match change {
            Change::Shift(field, delta) => {
                let col = self.field(*field);
                format!("{col} = {col} + {}", b.bind(SqlParam::Int(*delta)))
            }
            Change::SetLeft(v) => format!("{} = {}", self.field(Field::Left), int_or_null(b, *v)),
            Change::SetRight(v) => {
                format!("{} = {}", self.field(Field::Right), int_or_null(b, *v))
            }
            Change::SetDepth(v) => {
                format!("{} = {}", self.field(Field::Depth), b.bind(SqlParam::Int(*v)))
            }
            Change::SetParent(parent) => {
                let value = match parent {
                    Some(p) => b.bind(SqlParam::Bytes(p.to_bytes().to_vec())),
                    None => "NULL".to_string(),
                };
                format!("{} = {value}", self.col(&self.columns.parent))
            }
        }
    }

    pub fn select(&self, scope: &Scope, filter: &Filter, order: RowOrder) -> Result<SqlStatement> {
        let mut b = Builder::new(self.dialect);
        let cond = self.where_clause(&mut b, scope, filter)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {cond} {}",
            self.row_columns(),
            self.table(),
            self.order_by(order)
        );
        Ok(b.finish(sql))
    }

    pub fn select_by_id(&self, id: NodeId) -> SqlStatement {
        let mut b = Builder::new(self.dialect);
        let cond = self.term(&mut b, &Term::Id(id));
        let sql = format!("SELECT {} FROM {} WHERE {cond}", self.row_columns(), self.table());
        b.finish(sql)
    }

    pub fn max_right(&self, scope: &Scope) -> Result<SqlStatement> {
        let mut b = Builder::new(self.dialect);
        let cond = self.where_clause(&mut b, scope, &Filter::all())?;
        let sql = format!(
            "SELECT MAX({}) FROM {} WHERE {cond}",
            self.field(Field::Right),
            self.table()
        );
        Ok(b.finish(sql))
    }

    pub fn scopes(&self) -> String {
        let scope = self.col(&self.columns.scope);
        format!("SELECT DISTINCT {scope} FROM {} ORDER BY {scope}", self.table())
    }

    pub fn insert(&self, row: &NodeRow) -> Result<SqlStatement> {
        let mut b = Builder::new(self.dialect);
        let id = b.bind(SqlParam::Bytes(row.id.to_bytes().to_vec()));
        let scope = b.bind(SqlParam::Bytes(row.scope.to_key()?));
        let parent = match row.parent {
            Some(p) => b.bind(SqlParam::Bytes(p.to_bytes().to_vec())),
            None => "NULL".to_string(),
        };
        let mut int_or_null = |value: Option<i64>| match value {
            Some(v) => b.bind(SqlParam::Int(v)),
            None => "NULL".to_string(),
        };
        let left = int_or_null(row.left);
        let right = int_or_null(row.right);
        let depth = int_or_null(Some(row.depth));
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({id}, {scope}, {parent}, {left}, {right}, {depth})",
            self.table(),
            self.row_columns()
        );
        Ok(b.finish(sql))
    }

    /// Write the host ordering value of one row. Requires a configured order column.
    pub fn set_order(&self, id: NodeId, value: Option<String>) -> Option<SqlStatement> {
        let column = self.columns.order.as_ref()?;
        let mut b = Builder::new(self.dialect);
        let value = match value {
            Some(v) => b.bind(SqlParam::Text(v)),
            None => "NULL".to_string(),
        };
        let cond = self.term(&mut b, &Term::Id(id));
        let sql = format!(
            "UPDATE {} SET {} = {value} WHERE {cond}",
            self.table(),
            self.col(column)
        );
        Some(b.finish(sql))
    }

    pub fn mutation(&self, mutation: &Mutation) -> Result<SqlStatement> {
        let mut b = Builder::new(self.dialect);
        let sql = match mutation {
            Mutation::Update {
                scope,
                filter,
                changes,
            } => {
                let sets: Vec<String> = changes.iter().map(|c| self.assignment(&mut b, c)).collect();
                let cond = self.where_clause(&mut b, scope, filter)?;
                format!("UPDATE {} SET {} WHERE {cond}", self.table(), sets.join(", "))
            }
            Mutation::Delete { scope, filter } => {
                let cond = self.where_clause(&mut b, scope, filter)?;
                format!("DELETE FROM {} WHERE {cond}", self.table())
            }
        };
        Ok(b.finish(sql))
    }
}

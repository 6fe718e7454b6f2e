#![forbid(unsafe_code)]
//! PostgreSQL storage for the nested-set engine.
//!
//! The engines in `nestedset-core` own every structural rule; this crate only renders their
//! reads and batches into SQL against vanilla PostgreSQL, mapping lock conflicts onto
//! `Error::TransientConflict` so the retry wrapper can take another attempt.

mod schema;
mod store;

pub use schema::{drop_table_for_tests, ensure_schema};
pub use store::PgNodeStore;

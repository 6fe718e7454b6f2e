#![forbid(unsafe_code)]
//! SQLite storage for the nested-set engine.
//! Rows of every scope live in one table; statements come from the shared SQL renderer
//! in `nestedset-core` so the in-memory and relational stores agree on semantics.

mod store;

pub use store::SqliteNodeStore;

#![forbid(unsafe_code)]
//! Core primitives for maintaining an ordered forest in nested-set encoding.
//! This crate stays independent of concrete storage engines so it can be embedded behind
//! SQLite, PostgreSQL, or any host that can satisfy the `NodeStore` trait defined here.

pub mod allocate;
pub mod bounds;
pub mod config;
pub mod error;
pub mod ids;
pub mod movement;
pub mod prune;
pub mod query;
pub mod rebuild;
pub mod retry;
#[cfg(feature = "sql-storage")]
pub mod sql;
pub mod traits;
pub mod tree;
pub mod validate;

pub use allocate::allocate_bounds;
pub use bounds::{Bounds, NodeRow};
pub use config::{Columns, NestedSetConfig, RowOrder};
pub use error::{Error, Result};
pub use ids::{NodeId, Scope, Value};
pub use movement::{
    cascade_depth, move_node, move_possible, AllowAllMoves, MoveDecision, MoveGuard, MoveOutcome,
    MoveRequest, Position,
};
pub use prune::{prune, Disposal, PruneOutcome};
pub use query::{each_with_level, to_text};
pub use rebuild::{rebuild_scope, NodeCheck, RebuildSummary};
pub use retry::{in_tenacious_transaction, RetryPolicy};
pub use traits::{Change, Cmp, Field, Filter, MemoryNodeStore, Mutation, NodeStore, Term};
pub use tree::NestedSet;
pub use validate::{validate_scope, ValidationReport};

use thiserror::Error;

use crate::ids::NodeId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("impossible move: {0}")]
    ImpossibleMove(String),
    #[error("position should be child, left, right or root ('{0}' received)")]
    InvalidPosition(String),
    #[error("cannot delete node {0:?}: it still has children")]
    RestrictedDeletion(NodeId),
    #[error("transient conflict: {0}")]
    TransientConflict(String),
    #[error("gave up after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },
    #[error("unauthorized assignment to {0}: it is maintained by the nested set, use a move instead")]
    ReservedFieldAssignment(String),
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("inconsistent state: {0}")]
    InconsistentState(String),
}

impl Error {
    /// Whether the error is a lock timeout / deadlock that a fresh attempt may resolve.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientConflict(_))
    }
}

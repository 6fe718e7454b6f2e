use crate::bounds::{offset, Bounds};
use crate::error::Result;
use crate::ids::Scope;
use crate::traits::NodeStore;

/// Bounds for a node appended after every existing node of the scope.
///
/// New nodes never force a shift of existing rows; placing them elsewhere is a move.
pub fn allocate_bounds<S: NodeStore>(store: &S, scope: &Scope) -> Result<Bounds> {
    let bound = store.max_right(scope)?.unwrap_or(0);
    Ok(Bounds::new(offset(bound, 1)?, offset(bound, 2)?))
}

//! Fixtures and a store-agnostic conformance suite.
//!
//! Every backend runs the same scenarios against a fresh store so the in-memory store,
//! SQLite and PostgreSQL agree on bounds, ordering and failure modes.

use nestedset_core::{NestedSet, NestedSetConfig, NodeId, NodeStore, RetryPolicy, Scope};

/// 1 { 2, 3 { 4 }, 5 }, 6
pub const CATEGORIES: [(u128, Option<u128>); 6] = [
    (1, None),
    (2, Some(1)),
    (3, Some(1)),
    (4, Some(3)),
    (5, Some(1)),
    (6, None),
];

/// Outline of `CATEGORIES` right after seeding.
pub const CATEGORIES_OUTLINE: &str =
    "* 1 (, 1, 10)\n** 2 (1, 2, 3)\n** 3 (1, 4, 7)\n*** 4 (3, 5, 6)\n** 5 (1, 8, 9)\n* 6 (, 11, 12)";

pub fn test_config() -> NestedSetConfig {
    NestedSetConfig {
        retry: RetryPolicy::immediate(3),
        ..NestedSetConfig::default()
    }
}

/// Seed `CATEGORIES` into `scope`, offsetting ids so several scopes can share one table.
pub fn seed_categories<S: NodeStore>(set: &mut NestedSet<S>, scope: &Scope, id_offset: u128) {
    for (id, parent) in CATEGORIES {
        set.create(
            NodeId(id + id_offset),
            scope.clone(),
            parent.map(|p| NodeId(p + id_offset)),
        )
        .unwrap();
    }
}

pub fn categories<S: NodeStore>(store: S) -> NestedSet<S> {
    let mut set = NestedSet::with_config(store, test_config());
    seed_categories(&mut set, &Scope::unscoped(), 0);
    set
}

pub mod conformance {
    use super::*;
    use nestedset_core::{
        Change, Disposal, Error, Field, Filter, MoveOutcome, Mutation, Position, PruneOutcome,
    };

    fn outline<S: NodeStore>(set: &NestedSet<S>) -> String {
        set.outline(&Scope::unscoped()).unwrap()
    }

    /// Run every scenario, each against a store from `make`.
    pub fn run_all<S: NodeStore>(mut make: impl FnMut() -> S) {
        seeding_allocates_in_order(make());
        move_left_of_reorders_siblings(make());
        move_to_root_appends_last(make());
        move_into_other_tree(make());
        noop_moves_leave_rows_alone(make());
        impossible_moves_are_rejected(make());
        prune_closes_the_gap(make());
        restricted_prunes_keep_the_subtree(make());
        nullify_leaves_a_valid_forest(make());
        rebuild_restores_cleared_bounds(make());
        scopes_are_isolated(make());
        failed_transaction_rolls_back(make());
    }

    pub fn seeding_allocates_in_order<S: NodeStore>(store: S) {
        let set = categories(store);
        assert_eq!(outline(&set), CATEGORIES_OUTLINE);
        assert!(set.is_valid(&Scope::unscoped()).unwrap());
        assert_eq!(set.get(NodeId(4)).unwrap().unwrap().depth, 2);
    }

    pub fn move_left_of_reorders_siblings<S: NodeStore>(store: S) {
        let mut set = categories(store);
        assert_eq!(
            set.move_to_left_of(NodeId(5), NodeId(2)).unwrap(),
            MoveOutcome::Moved
        );
        assert_eq!(
            outline(&set),
            "* 1 (, 1, 10)\n** 5 (1, 2, 3)\n** 2 (1, 4, 5)\n** 3 (1, 6, 9)\n*** 4 (3, 7, 8)\n* 6 (, 11, 12)"
        );
        assert!(set.is_valid(&Scope::unscoped()).unwrap());
    }

    pub fn move_to_root_appends_last<S: NodeStore>(store: S) {
        let mut set = categories(store);
        set.move_to_root(NodeId(3)).unwrap();
        assert_eq!(
            outline(&set),
            "* 1 (, 1, 6)\n** 2 (1, 2, 3)\n** 5 (1, 4, 5)\n* 6 (, 7, 8)\n* 3 (, 9, 12)\n** 4 (3, 10, 11)"
        );
        let moved = set.get(NodeId(4)).unwrap().unwrap();
        assert_eq!(moved.depth, 1);
    }

    pub fn move_into_other_tree<S: NodeStore>(store: S) {
        let mut set = categories(store);
        set.move_node(NodeId(6), NodeId(4), Position::Child).unwrap();
        let moved = set.get(NodeId(6)).unwrap().unwrap();
        assert_eq!((moved.parent, moved.depth), (Some(NodeId(4)), 3));
        assert_eq!(set.root(NodeId(6)).unwrap().id, NodeId(1));
        assert_eq!(set.roots(&Scope::unscoped()).unwrap().len(), 1);
        assert!(set.is_valid(&Scope::unscoped()).unwrap());
    }

    pub fn noop_moves_leave_rows_alone<S: NodeStore>(store: S) {
        let mut set = categories(store);
        assert_eq!(
            set.move_to_left_of(NodeId(3), NodeId(5)).unwrap(),
            MoveOutcome::Unchanged
        );
        assert_eq!(
            set.move_to_child_of(NodeId(5), NodeId(1)).unwrap(),
            MoveOutcome::Unchanged
        );
        assert_eq!(set.move_to_root(NodeId(6)).unwrap(), MoveOutcome::Unchanged);
        assert_eq!(outline(&set), CATEGORIES_OUTLINE);
    }

    pub fn impossible_moves_are_rejected<S: NodeStore>(store: S) {
        let mut set = categories(store);
        assert!(matches!(
            set.move_node(NodeId(1), NodeId(4), Position::Child),
            Err(Error::ImpossibleMove(_))
        ));
        assert!(matches!(
            set.move_node(NodeId(3), NodeId(3), Position::Right),
            Err(Error::ImpossibleMove(_))
        ));
        assert!(matches!(
            set.move_node(NodeId(2), NodeId(42), Position::Left),
            Err(Error::NodeNotFound(_))
        ));
        assert_eq!(outline(&set), CATEGORIES_OUTLINE);
    }

    pub fn prune_closes_the_gap<S: NodeStore>(store: S) {
        let mut set = categories(store);
        assert_eq!(
            set.prune(NodeId(3)).unwrap(),
            PruneOutcome::Pruned {
                removed: vec![NodeId(4), NodeId(3)],
                detached: vec![],
            }
        );
        assert_eq!(
            outline(&set),
            "* 1 (, 1, 6)\n** 2 (1, 2, 3)\n** 5 (1, 4, 5)\n* 6 (, 7, 8)"
        );
        assert_eq!(set.prune(NodeId(4)).unwrap(), PruneOutcome::AlreadyGone);
    }

    pub fn restricted_prunes_keep_the_subtree<S: NodeStore>(store: S) {
        let mut set = categories(store);
        assert_eq!(
            set.prune_with(NodeId(1), Disposal::RestrictWithError).unwrap(),
            PruneOutcome::Restricted { node: NodeId(1) }
        );
        assert!(matches!(
            set.prune_with(NodeId(3), Disposal::Restrict),
            Err(Error::RestrictedDeletion(id)) if id == NodeId(3)
        ));
        assert_eq!(outline(&set), CATEGORIES_OUTLINE);

        // a leaf has nothing to restrict
        set.prune_with(NodeId(4), Disposal::Restrict).unwrap();
        assert_eq!(set.get(NodeId(3)).unwrap().unwrap().right, Some(5));
    }

    pub fn nullify_leaves_a_valid_forest<S: NodeStore>(store: S) {
        let mut set = categories(store);
        set.prune_with(NodeId(3), Disposal::Nullify).unwrap();
        let orphan = set.get(NodeId(4)).unwrap().unwrap();
        assert_eq!((orphan.parent, orphan.depth), (None, 0));
        assert!(set.is_valid(&Scope::unscoped()).unwrap());
    }

    pub fn rebuild_restores_cleared_bounds<S: NodeStore>(store: S) {
        let mut set = categories(store);
        let scope = Scope::unscoped();
        set.store_mut()
            .apply_batch(&[Mutation::update(
                &scope,
                Filter::all(),
                vec![Change::SetLeft(None), Change::SetRight(None), Change::SetDepth(0)],
            )])
            .unwrap();
        assert!(!set.is_valid(&scope).unwrap());
        assert_eq!(set.unplaced(&scope).unwrap().len(), CATEGORIES.len());

        let summaries = set.rebuild_all(false).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].visited, CATEGORIES.len());
        assert_eq!(outline(&set), CATEGORIES_OUTLINE);
        assert_eq!(set.get(NodeId(4)).unwrap().unwrap().depth, 2);
    }

    pub fn scopes_are_isolated<S: NodeStore>(store: S) {
        let mut set = NestedSet::with_config(store, test_config());
        let (a, b) = (Scope::from("a"), Scope::from("b"));
        seed_categories(&mut set, &a, 0);
        seed_categories(&mut set, &b, 100);

        assert_eq!(set.get(NodeId(101)).unwrap().unwrap().left, Some(1));
        set.move_to_root(NodeId(103)).unwrap();
        assert_eq!(set.get(NodeId(3)).unwrap().unwrap().parent, Some(NodeId(1)));
        assert!(matches!(
            set.move_to_child_of(NodeId(2), NodeId(101)),
            Err(Error::ImpossibleMove(_))
        ));
        assert_eq!(set.store().scopes().unwrap().len(), 2);
        assert!(set.is_valid_all().unwrap());
    }

    pub fn failed_transaction_rolls_back<S: NodeStore>(store: S) {
        let mut set = categories(store);
        let scope = Scope::unscoped();
        let res = set.store_mut().transaction(|s| {
            s.apply_batch(&[Mutation::shift(&scope, Filter::all(), Field::Left, 100)])?;
            Err::<(), _>(Error::InvalidOperation("abort".into()))
        });
        assert!(matches!(res, Err(Error::InvalidOperation(_))));
        assert_eq!(outline(&set), CATEGORIES_OUTLINE);
    }
}

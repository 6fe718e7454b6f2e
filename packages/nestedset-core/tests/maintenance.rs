use nestedset_core::{
    to_text, Bounds, Disposal, Error, MemoryNodeStore, NestedSet, NestedSetConfig, NodeId,
    NodeRow, NodeStore, Position, PruneOutcome, RetryPolicy, RowOrder, Scope,
};

fn quick_config() -> NestedSetConfig {
    NestedSetConfig {
        retry: RetryPolicy::immediate(10),
        ..NestedSetConfig::default()
    }
}

/// 1 { 2, 3 { 4 }, 5 }, 6
fn categories() -> NestedSet<MemoryNodeStore> {
    let mut set = NestedSet::with_config(MemoryNodeStore::new(), quick_config());
    let scope = Scope::unscoped();
    for (id, parent) in [(1, None), (2, Some(1)), (3, Some(1)), (4, Some(3)), (5, Some(1)), (6, None)] {
        set.create(NodeId(id), scope.clone(), parent.map(NodeId)).unwrap();
    }
    set
}

fn outline(set: &NestedSet<MemoryNodeStore>) -> String {
    set.outline(&Scope::unscoped()).unwrap()
}

#[test]
fn prune_closes_the_gap() {
    let mut set = categories();
    let outcome = set.prune(NodeId(3)).unwrap();
    assert_eq!(
        outcome,
        PruneOutcome::Pruned {
            removed: vec![NodeId(4), NodeId(3)],
            detached: vec![],
        }
    );
    assert_eq!(
        outline(&set),
        "* 1 (, 1, 6)\n** 2 (1, 2, 3)\n** 5 (1, 4, 5)\n* 6 (, 7, 8)"
    );
    assert!(set.is_valid(&Scope::unscoped()).unwrap());

    // the subtree went with its root
    assert_eq!(set.prune(NodeId(4)).unwrap(), PruneOutcome::AlreadyGone);
}

#[test]
fn configured_disposal_is_the_default() {
    let config = NestedSetConfig {
        dependent: Disposal::Restrict,
        ..quick_config()
    };
    let mut set = NestedSet::with_config(MemoryNodeStore::new(), config);
    set.create(NodeId(1), Scope::unscoped(), None).unwrap();
    set.create(NodeId(2), Scope::unscoped(), Some(NodeId(1))).unwrap();

    assert!(matches!(
        set.prune(NodeId(1)),
        Err(Error::RestrictedDeletion(_))
    ));
    // explicit disposal overrides it
    set.prune_with(NodeId(1), Disposal::DeleteAll).unwrap();
    assert!(set.store().is_empty());
}

#[test]
fn nullify_leaves_a_valid_forest() {
    let mut set = categories();
    set.prune_with(NodeId(1), Disposal::Nullify).unwrap();
    let roots: Vec<_> = set
        .roots(&Scope::unscoped())
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(roots, vec![NodeId(2), NodeId(3), NodeId(4), NodeId(5), NodeId(6)]);
    assert!(set.is_valid(&Scope::unscoped()).unwrap());
}

#[test]
fn rebuild_restores_corrupted_bounds() {
    let mut set = categories();
    let before = outline(&set);

    let mut broken = set.get(NodeId(3)).unwrap().unwrap();
    broken.right = None;
    set.store_mut().overwrite(broken);
    let mut shifted = set.get(NodeId(6)).unwrap().unwrap();
    shifted.left = Some(2);
    shifted.right = Some(3);
    set.store_mut().overwrite(shifted);

    let report = set.validation_report(&Scope::unscoped()).unwrap();
    assert_eq!(report.null_bounds, vec![NodeId(3)]);
    assert!(!report.no_duplicates_for_columns());
    assert!(!set.left_and_rights_valid(&Scope::unscoped()).unwrap());
    assert!(!set.is_valid_all().unwrap());

    let summaries = set.rebuild_all(false).unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].visited, 6);
    assert_eq!(outline(&set), before);
    assert!(set.is_valid_all().unwrap());
}

#[test]
fn rebuild_from_parent_pointers_only() {
    let mut store = MemoryNodeStore::new();
    let scope = Scope::from("tenant-a");
    for (id, parent) in [(1, None), (2, Some(1)), (3, Some(2)), (4, Some(1)), (5, None)] {
        store
            .insert(NodeRow::new(NodeId(id), scope.clone()).with_parent(parent.map(NodeId)))
            .unwrap();
    }
    let mut set = NestedSet::with_config(store, quick_config());
    assert!(!set.is_valid(&scope).unwrap());

    set.rebuild(&[scope.clone()], false).unwrap();
    let depths: Vec<_> = set
        .store()
        .read(&scope, &Default::default(), RowOrder::Bounds)
        .unwrap()
        .into_iter()
        .map(|r| (r.id.0, r.try_bounds().unwrap(), r.depth))
        .collect();
    assert_eq!(
        depths,
        vec![
            (1, Bounds::new(1, 8), 0),
            (2, Bounds::new(2, 5), 1),
            (3, Bounds::new(3, 4), 2),
            (4, Bounds::new(6, 7), 1),
            (5, Bounds::new(9, 10), 0),
        ]
    );
    assert!(set.is_valid(&scope).unwrap());
}

#[test]
fn rebuild_runs_node_validator_when_asked() {
    let mut store = MemoryNodeStore::new();
    store.insert(NodeRow::new(NodeId(1), Scope::unscoped())).unwrap();
    store
        .insert(NodeRow::new(NodeId(2), Scope::unscoped()).with_parent(Some(NodeId(1))))
        .unwrap();
    let mut set = NestedSet::with_config(store, quick_config()).with_node_validator(|row| {
        if row.id == NodeId(2) {
            Err(Error::InvalidOperation("node 2 is frozen".into()))
        } else {
            Ok(())
        }
    });

    assert!(matches!(
        set.rebuild_all(true),
        Err(Error::InvalidOperation(_))
    ));
    assert_eq!(set.get(NodeId(1)).unwrap().unwrap().left, None);

    set.rebuild_all(false).unwrap();
    assert!(set.is_valid_all().unwrap());
}

#[test]
fn orphans_are_reported_not_fatal() {
    let mut set = categories();
    set.store_mut().remove(NodeId(3));
    let report = set.validation_report(&Scope::unscoped()).unwrap();
    assert_eq!(report.orphans, vec![NodeId(4)]);
    assert!(report.is_valid());
}

#[test]
fn conflicts_are_retried_then_exhausted() {
    let mut set = categories();
    set.store_mut().inject_conflicts(3);
    set.move_node(NodeId(2), NodeId(5), Position::Right).unwrap();
    assert_eq!(
        to_text(&set.children(NodeId(1)).unwrap()),
        "** 3 (1, 2, 5)\n** 5 (1, 6, 7)\n** 2 (1, 8, 9)"
    );

    let config = NestedSetConfig {
        retry: RetryPolicy::immediate(2),
        ..NestedSetConfig::default()
    };
    let mut strict = NestedSet::with_config(MemoryNodeStore::new(), config);
    strict.store_mut().inject_conflicts(3);
    assert!(matches!(
        strict.create(NodeId(1), Scope::unscoped(), None),
        Err(Error::RetriesExhausted { attempts: 3, .. })
    ));
    assert!(strict.store().is_empty());
}

use nestedset_core::{each_with_level, MemoryNodeStore, NestedSet, NodeId, NodeRow, Scope};

fn ids(rows: Vec<NodeRow>) -> Vec<u128> {
    rows.into_iter().map(|r| r.id.0).collect()
}

/// 1 { 2, 3 { 4 }, 5 }, 6
fn categories() -> NestedSet<MemoryNodeStore> {
    let mut set = NestedSet::new(MemoryNodeStore::new());
    let scope = Scope::unscoped();
    for (id, parent) in [(1, None), (2, Some(1)), (3, Some(1)), (4, Some(3)), (5, Some(1)), (6, None)] {
        set.create(NodeId(id), scope.clone(), parent.map(NodeId)).unwrap();
    }
    set
}

#[test]
fn navigation() {
    let set = categories();
    let scope = Scope::unscoped();

    assert_eq!(ids(set.roots(&scope).unwrap()), vec![1, 6]);
    assert_eq!(set.root(NodeId(4)).unwrap().id, NodeId(1));
    assert_eq!(set.root(NodeId(6)).unwrap().id, NodeId(6));
    assert_eq!(ids(set.leaves(&scope).unwrap()), vec![2, 4, 5, 6]);
    assert_eq!(ids(set.children(NodeId(1)).unwrap()), vec![2, 3, 5]);
    assert_eq!(set.parent(NodeId(4)).unwrap().map(|r| r.id), Some(NodeId(3)));
    assert_eq!(set.parent(NodeId(1)).unwrap(), None);

    assert_eq!(ids(set.ancestors(NodeId(4)).unwrap()), vec![1, 3]);
    assert_eq!(ids(set.self_and_ancestors(NodeId(4)).unwrap()), vec![1, 3, 4]);
    assert_eq!(ids(set.descendants(NodeId(1)).unwrap()), vec![2, 3, 4, 5]);
    assert_eq!(ids(set.self_and_descendants(NodeId(3)).unwrap()), vec![3, 4]);

    assert_eq!(ids(set.siblings(NodeId(3)).unwrap()), vec![2, 5]);
    assert_eq!(ids(set.self_and_siblings(NodeId(6)).unwrap()), vec![1, 6]);
    assert_eq!(set.left_sibling(NodeId(3)).unwrap().map(|r| r.id), Some(NodeId(2)));
    assert_eq!(set.right_sibling(NodeId(3)).unwrap().map(|r| r.id), Some(NodeId(5)));
    assert_eq!(set.left_sibling(NodeId(2)).unwrap(), None);
    assert_eq!(set.right_sibling(NodeId(6)).unwrap(), None);

    assert_eq!(set.level(NodeId(4)).unwrap(), 2);
    assert_eq!(set.level(NodeId(6)).unwrap(), 0);
}

#[test]
fn relationship_predicates() {
    let set = categories();
    assert!(set.is_ancestor_of(NodeId(1), NodeId(4)).unwrap());
    assert!(!set.is_ancestor_of(NodeId(4), NodeId(1)).unwrap());
    assert!(!set.is_ancestor_of(NodeId(1), NodeId(1)).unwrap());
    assert!(set.is_or_is_ancestor_of(NodeId(1), NodeId(1)).unwrap());
    assert!(set.is_descendant_of(NodeId(4), NodeId(3)).unwrap());
    assert!(!set.is_descendant_of(NodeId(6), NodeId(1)).unwrap());
    assert!(set.is_or_is_descendant_of(NodeId(4), NodeId(4)).unwrap());
    assert!(set.same_scope(NodeId(2), NodeId(6)).unwrap());
}

#[test]
fn levels_of_a_subtree_listing() {
    let set = categories();
    let rows = set.self_and_descendants(NodeId(1)).unwrap();
    let levels: Vec<_> = each_with_level(&rows)
        .into_iter()
        .map(|(row, level)| (row.id.0, level))
        .collect();
    assert_eq!(levels, vec![(1, 0), (2, 1), (3, 1), (4, 2), (5, 1)]);
}

#[test]
fn unplaced_rows_are_listed() {
    let mut set = categories();
    let mut row = set.get(NodeId(5)).unwrap().unwrap();
    row.left = None;
    set.store_mut().overwrite(row);
    assert_eq!(ids(set.unplaced(&Scope::unscoped()).unwrap()), vec![5]);
}
